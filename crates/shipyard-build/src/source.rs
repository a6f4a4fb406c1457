//! ソーステンプレートの取得
//!
//! git の shallow clone で一時ディレクトリにチェックアウトします。
//! ディレクトリは [`SourceCheckout`] の drop で削除されます。

use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;

/// 一時ディレクトリにチェックアウトしたソースツリー
#[derive(Debug)]
pub struct SourceCheckout {
    dir: TempDir,
}

impl SourceCheckout {
    /// `repo` を `--depth 1` で clone
    pub async fn clone(repo: &str) -> BuildResult<Self> {
        let dir = tempfile::Builder::new().prefix("shipyard-src-").tempdir()?;
        tracing::info!(repo = repo, dir = %dir.path().display(), "cloning source template");

        let output = Command::new("git")
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg(repo)
            .arg(dir.path())
            .output()
            .await
            .map_err(|e| BuildError::CloneFailed {
                repo: repo.to_string(),
                message: format!("failed to run git: {}", e),
            })?;

        if !output.status.success() {
            return Err(BuildError::CloneFailed {
                repo: repo.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(Self { dir })
    }

    /// 既存のディレクトリを所有するチェックアウトとして扱う
    pub fn from_dir(dir: TempDir) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// ルート直下の Dockerfile
    pub fn dockerfile(&self) -> BuildResult<PathBuf> {
        let path = self.dir.path().join("Dockerfile");
        if path.is_file() {
            Ok(path)
        } else {
            Err(BuildError::DockerfileNotFound(
                self.dir.path().display().to_string(),
            ))
        }
    }
}
