use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use crate::error::TrackError;

pub const REMOTE_NAME: &str = "origin";

/// Version-control operations the track repository relies on.
///
/// Every call blocks until the underlying tool finishes; no timeout is enforced.
pub trait VersionControl: Send + Sync {
    fn is_working_copy(&self, dir: &Path) -> bool;
    fn clone_repository(&self, remote: &str, dir: &Path) -> Result<(), TrackError>;
    fn fetch(&self, dir: &Path) -> Result<(), TrackError>;
    fn checkout(&self, dir: &Path, branch: &str) -> Result<(), TrackError>;
    /// Rebases the current branch onto its remote tracking branch.
    fn rebase(&self, dir: &Path, branch: &str) -> Result<(), TrackError>;
    /// Branch names without the remote prefix.
    fn branches(&self, dir: &Path, remote: bool) -> Result<Vec<String>, TrackError>;
}

impl<T> VersionControl for Arc<T>
where
    T: VersionControl + ?Sized,
{
    fn is_working_copy(&self, dir: &Path) -> bool {
        (**self).is_working_copy(dir)
    }

    fn clone_repository(&self, remote: &str, dir: &Path) -> Result<(), TrackError> {
        (**self).clone_repository(remote, dir)
    }

    fn fetch(&self, dir: &Path) -> Result<(), TrackError> {
        (**self).fetch(dir)
    }

    fn checkout(&self, dir: &Path, branch: &str) -> Result<(), TrackError> {
        (**self).checkout(dir, branch)
    }

    fn rebase(&self, dir: &Path, branch: &str) -> Result<(), TrackError> {
        (**self).rebase(dir, branch)
    }

    fn branches(&self, dir: &Path, remote: bool) -> Result<Vec<String>, TrackError> {
        (**self).branches(dir, remote)
    }
}

/// Shells out to the `git` executable found on `PATH`.
#[derive(Clone, Debug, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<Output, TrackError> {
        let mut command = Command::new("git");
        if let Some(dir) = dir {
            command.arg("-C").arg(dir);
        }
        command.args(args);
        tracing::debug!(?dir, ?args, "running git");

        let output = command
            .output()
            .map_err(|err| TrackError::Supply(format!("could not invoke git: {err}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrackError::Supply(format!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

impl VersionControl for GitCli {
    fn is_working_copy(&self, dir: &Path) -> bool {
        dir.is_dir() && dir.join(".git").exists()
    }

    fn clone_repository(&self, remote: &str, dir: &Path) -> Result<(), TrackError> {
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let target = dir.to_string_lossy();
        self.run(None, &["clone", remote, target.as_ref()]).map(|_| ())
    }

    fn fetch(&self, dir: &Path) -> Result<(), TrackError> {
        self.run(Some(dir), &["fetch", "--prune", "--quiet", REMOTE_NAME])
            .map(|_| ())
    }

    fn checkout(&self, dir: &Path, branch: &str) -> Result<(), TrackError> {
        self.run(Some(dir), &["checkout", "--quiet", branch]).map(|_| ())
    }

    fn rebase(&self, dir: &Path, branch: &str) -> Result<(), TrackError> {
        let upstream = format!("{REMOTE_NAME}/{branch}");
        match self.run(Some(dir), &["rebase", upstream.as_str()]) {
            Ok(_) => Ok(()),
            Err(err) => {
                // Leave the working copy usable instead of stuck mid-rebase.
                let _ = self.run(Some(dir), &["rebase", "--abort"]);
                Err(err)
            }
        }
    }

    fn branches(&self, dir: &Path, remote: bool) -> Result<Vec<String>, TrackError> {
        let refs = if remote {
            format!("refs/remotes/{REMOTE_NAME}/")
        } else {
            "refs/heads/".to_string()
        };
        let output = self.run(
            Some(dir),
            &["for-each-ref", "--format=%(refname)", refs.as_str()],
        )?;
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(parse_branch_listing(&listing, &refs))
    }
}

fn parse_branch_listing(listing: &str, prefix: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix(prefix))
        .filter(|name| !name.is_empty() && *name != "HEAD")
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_listing_strips_prefix_and_head() {
        let listing = "refs/remotes/origin/HEAD\nrefs/remotes/origin/master\nrefs/remotes/origin/5.4\n";
        assert_eq!(
            parse_branch_listing(listing, "refs/remotes/origin/"),
            vec!["master".to_string(), "5.4".to_string()]
        );
    }

    #[test]
    fn local_listing_keeps_nested_names() {
        let listing = "refs/heads/master\nrefs/heads/feature/x\n\n";
        assert_eq!(
            parse_branch_listing(listing, "refs/heads/"),
            vec!["master".to_string(), "feature/x".to_string()]
        );
    }

    #[test]
    fn working_copy_requires_git_dir() {
        let temp = tempfile::tempdir().unwrap();
        let git = GitCli::new();
        assert!(!git.is_working_copy(temp.path()));
        std::fs::create_dir_all(temp.path().join(".git")).unwrap();
        assert!(git.is_working_copy(temp.path()));
    }
}
