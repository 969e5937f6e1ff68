use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use url::Url;

use crate::error::TrackError;
use crate::offsets::prepare_file_offset_table;
use crate::track::{DocumentGroup, Track};

/// Fetches a single dataset archive.
pub trait Downloader: Send + Sync {
    /// Stores the resource at `url` in `target`. `expected_size` is informational.
    fn download(&self, url: &Url, target: &Path, expected_size: Option<u64>)
    -> Result<(), TrackError>;
}

impl<T: Downloader + ?Sized> Downloader for Arc<T> {
    fn download(
        &self,
        url: &Url,
        target: &Path,
        expected_size: Option<u64>,
    ) -> Result<(), TrackError> {
        (**self).download(url, target, expected_size)
    }
}

/// Plain HTTP(S) downloads backed by `ureq`. The body is streamed into a `.part` file that
/// is renamed once complete, so an interrupted transfer never looks like a finished one.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpDownloader;

impl Downloader for HttpDownloader {
    fn download(
        &self,
        url: &Url,
        target: &Path,
        expected_size: Option<u64>,
    ) -> Result<(), TrackError> {
        match expected_size {
            Some(size) => tracing::info!(
                "Downloading data from [{url}] ({:.1} MB) to [{}] ...",
                size as f64 / 1_048_576.0,
                target.display()
            ),
            None => tracing::info!("Downloading data from [{url}] to [{}] ...", target.display()),
        }

        let response = ureq::get(url.as_str()).call().map_err(|err| match err {
            ureq::Error::Status(code, _) => {
                TrackError::Supply(format!("failed to download {url}; status {code}"))
            }
            other => TrackError::Supply(format!("failed to download {url}: {other}")),
        })?;

        let partial = partial_path(target);
        let written = write_body(response.into_reader(), &partial);
        if let Err(err) = written {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
        fs::rename(&partial, target)?;
        Ok(())
    }
}

fn write_body(mut body: impl io::Read, partial: &Path) -> Result<(), TrackError> {
    let mut writer = BufWriter::new(File::create(partial)?);
    io::copy(&mut body, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// What happened to one document group while staging.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StagedGroup {
    pub index: String,
    pub group: String,
    pub downloaded: bool,
    pub decompressed: bool,
    pub offset_index: PathBuf,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct StagingReport {
    pub groups: Vec<StagedGroup>,
}

impl StagingReport {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn downloads(&self) -> usize {
        self.groups.iter().filter(|g| g.downloaded).count()
    }

    pub fn decompressions(&self) -> usize {
        self.groups.iter().filter(|g| g.decompressed).count()
    }
}

/// Materializes the datasets of a track on local disk.
pub struct AssetStager<D> {
    downloader: D,
    offline: bool,
}

impl<D: Downloader> AssetStager<D> {
    pub fn new(downloader: D, offline: bool) -> Self {
        Self {
            downloader,
            offline,
        }
    }

    /// Stages every document group that declares an archive. Groups without one are
    /// skipped. Running this twice over intact files neither downloads nor decompresses.
    pub fn stage(&self, track: &Track) -> Result<StagingReport, TrackError> {
        let mut report = StagingReport::default();
        for index in &track.indices {
            for group in &index.types {
                let (Some(archive), Some(document_file)) =
                    (&group.document_archive, &group.document_file)
                else {
                    tracing::debug!(index = %index.name, group = %group.name, "no document archive to stage");
                    continue;
                };

                let downloaded = self.download(&track.source_root_url, archive, group)?;
                let decompressed = decompress(archive, document_file, group.uncompressed_size_in_bytes)?;
                let offset_index = prepare_file_offset_table(document_file)?;
                report.groups.push(StagedGroup {
                    index: index.name.clone(),
                    group: group.name.clone(),
                    downloaded,
                    decompressed,
                    offset_index,
                });
            }
        }
        Ok(report)
    }

    fn download(
        &self,
        source_root_url: &str,
        archive: &Path,
        group: &DocumentGroup,
    ) -> Result<bool, TrackError> {
        let expected = group.compressed_size_in_bytes;
        if has_size(archive, expected) {
            tracing::info!("[{}] already exists locally. Skipping download.", archive.display());
            return Ok(false);
        }

        let raw_url = archive_url(source_root_url, archive);
        let mut downloaded = false;
        if !self.offline {
            if let Some(parent) = archive.parent() {
                fs::create_dir_all(parent)?;
            }
            let result = Url::parse(&raw_url)
                .map_err(|err| TrackError::Setup(format!("invalid data url {raw_url}: {err}")))
                .and_then(|url| self.downloader.download(&url, archive, expected));
            match result {
                Ok(()) => downloaded = true,
                Err(err) => {
                    tracing::error!("Could not download [{raw_url}] to [{}]: {err}", archive.display());
                }
            }
        }

        if !archive.is_file() {
            return Err(if self.offline {
                TrackError::Setup(format!(
                    "Cannot find {}. Please disable offline mode and retry again.",
                    archive.display()
                ))
            } else {
                TrackError::Setup(format!(
                    "Cannot download from {raw_url} to {}. Please verify that data are available at {raw_url} and \
                     check your internet connection.",
                    archive.display()
                ))
            });
        }

        let actual = fs::metadata(archive)?.len();
        if let Some(expected) = expected {
            if actual != expected {
                return Err(TrackError::Data(format!(
                    "[{}] is corrupt. Downloaded [{actual}] bytes but [{expected}] bytes are expected.",
                    archive.display()
                )));
            }
        }
        Ok(downloaded)
    }
}

fn has_size(path: &Path, expected: Option<u64>) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => expected.is_none_or(|size| meta.len() == size),
        _ => false,
    }
}

fn archive_url(source_root_url: &str, archive: &Path) -> String {
    let basename = archive
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    format!("{}/{basename}", source_root_url.trim_end_matches('/'))
}

fn decompress(
    archive: &Path,
    document_file: &Path,
    expected: Option<u64>,
) -> Result<bool, TrackError> {
    if has_size(document_file, expected) {
        return Ok(false);
    }

    match expected {
        Some(size) => tracing::info!(
            "Decompressing track data from [{}] to [{}] (resulting size: {:.2} GB) ...",
            archive.display(),
            document_file.display(),
            size as f64 / 1_073_741_824.0
        ),
        None => tracing::info!(
            "Decompressing track data from [{}] to [{}] ...",
            archive.display(),
            document_file.display()
        ),
    }

    let extension = archive
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let corrupt = |err: &dyn std::fmt::Display| {
        TrackError::Data(format!("[{}] is corrupt. {err}", archive.display()))
    };
    match extension {
        "zst" => {
            let source = BufReader::new(File::open(archive)?);
            let mut sink = BufWriter::new(File::create(document_file)?);
            zstd::stream::copy_decode(source, &mut sink).map_err(|err| corrupt(&err))?;
            sink.flush()?;
        }
        "zip" => {
            let mut zip = zip::ZipArchive::new(File::open(archive)?).map_err(|err| corrupt(&err))?;
            let wanted = document_file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            let position = match zip.index_for_name(wanted) {
                Some(position) => position,
                None => (0..zip.len())
                    .find(|&i| zip.by_index(i).is_ok_and(|entry| entry.is_file()))
                    .ok_or_else(|| corrupt(&"The archive does not contain any file."))?,
            };
            let mut entry = zip.by_index(position).map_err(|err| corrupt(&err))?;
            let mut sink = BufWriter::new(File::create(document_file)?);
            io::copy(&mut entry, &mut sink)?;
            sink.flush()?;
        }
        other => {
            return Err(TrackError::Setup(format!(
                "Unsupported file extension '{other}' of [{}]. Supported archives are .zst and .zip.",
                archive.display()
            )));
        }
    }

    let extracted = fs::metadata(document_file)?.len();
    if let Some(expected) = expected {
        if extracted != expected {
            return Err(TrackError::Data(format!(
                "[{}] is corrupt. Extracted [{extracted}] bytes but [{expected}] bytes are expected.",
                document_file.display()
            )));
        }
    }
    Ok(true)
}
