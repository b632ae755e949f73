use std::path::Path;

use async_trait::async_trait;
use snafu::{ensure, ResultExt};
use tokio::process::Command;

use crate::error::{CommandExitSnafu, CommandFailedSnafu, Result};

/// Version-control metadata for a single package's repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsInfo {
    pub commit_hash: String,
    pub dirty: bool,
    pub origin_url: String,
}

/// Queries version-control metadata for a package's base path.
/// The default [`GitQuery`] shells out to `git` with the working directory
/// passed through the child process's own launch API (`current_dir`)
/// rather than mutating the running process's current directory — a
/// process-wide `chdir` would make two concurrent manifest builds in the
/// same process unsafe.
#[async_trait]
pub trait VersionControlQuery: Send + Sync {
    async fn query(&self, base_path: &Path) -> Result<VcsInfo>;
}

pub struct GitQuery;

impl GitQuery {
    async fn run(&self, base_path: &Path, args: &[&str]) -> Result<String> {
        let owned_args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = Command::new("git")
            .args(args)
            .current_dir(base_path)
            .output()
            .await
            .context(CommandFailedSnafu {
                program: "git".to_string(),
                args: owned_args.clone(),
                path: base_path.to_path_buf(),
            })?;
        ensure!(
            output.status.success(),
            CommandExitSnafu {
                program: "git".to_string(),
                args: owned_args,
                path: base_path.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }
        );
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl VersionControlQuery for GitQuery {
    async fn query(&self, base_path: &Path) -> Result<VcsInfo> {
        let commit_hash = self.run(base_path, &["rev-parse", "HEAD"]).await?;
        let status = self.run(base_path, &["status", "--porcelain"]).await?;
        let origin_url = self
            .run(base_path, &["config", "--get", "remote.origin.url"])
            .await
            .unwrap_or_default();
        Ok(VcsInfo {
            commit_hash,
            dirty: !status.is_empty(),
            origin_url,
        })
    }
}
