use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::TrackError;

/// Number of lines between two records of an offset table.
pub const OFFSET_INTERVAL: u64 = 50_000;

/// Path of the offset table that belongs to `data_file`.
pub fn offset_table_path(data_file: &Path) -> PathBuf {
    let mut name = data_file.as_os_str().to_owned();
    name.push(".offset");
    PathBuf::from(name)
}

/// Writes `<data_file>.offset`, replacing any previous table, and returns its path.
///
/// Each record is `<line_number>;<byte_offset>` where the offset points at the first byte
/// of that line. The first record is always `0;0`.
pub fn prepare_file_offset_table(data_file: &Path) -> Result<PathBuf, TrackError> {
    write_offset_table(data_file, OFFSET_INTERVAL)
}

fn write_offset_table(data_file: &Path, interval: u64) -> Result<PathBuf, TrackError> {
    let target = offset_table_path(data_file);
    tracing::info!("Preparing file offset table for [{}] ...", data_file.display());

    let mut reader = BufReader::new(File::open(data_file)?);
    let mut writer = BufWriter::new(File::create(&target)?);
    writeln!(writer, "0;0")?;

    let mut line = Vec::new();
    let mut line_number = 0u64;
    let mut offset = 0u64;
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        line_number += 1;
        offset += read as u64;
        if line_number % interval == 0 {
            writeln!(writer, "{line_number};{offset}")?;
        }
    }
    writer.flush()?;
    tracing::debug!(lines = line_number, "wrote offset table {}", target.display());
    Ok(target)
}

/// In-memory view of an offset table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OffsetTable {
    entries: Vec<(u64, u64)>,
}

impl OffsetTable {
    pub fn load(table_file: &Path) -> Result<Self, TrackError> {
        let raw = fs::read_to_string(table_file)?;
        let mut entries = Vec::new();
        for (idx, record) in raw.lines().enumerate() {
            if record.trim().is_empty() {
                continue;
            }
            let parsed = record
                .split_once(';')
                .and_then(|(line, offset)| {
                    Some((line.trim().parse().ok()?, offset.trim().parse().ok()?))
                })
                .ok_or_else(|| {
                    TrackError::Data(format!(
                        "[{}] is corrupt. Invalid record '{record}' on line {}.",
                        table_file.display(),
                        idx + 1
                    ))
                })?;
            entries.push(parsed);
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(u64, u64)] {
        &self.entries
    }

    /// Closest recorded `(line, offset)` at or before `line`.
    pub fn seek(&self, line: u64) -> (u64, u64) {
        let idx = self.entries.partition_point(|(recorded, _)| *recorded <= line);
        if idx == 0 {
            (0, 0)
        } else {
            self.entries[idx - 1]
        }
    }
}
