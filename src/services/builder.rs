//! Background `npm install && npm run build` for generated Vue projects.

use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::BuildConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ProjectBuilder {
    config: BuildConfig,
}

impl ProjectBuilder {
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Start a build on its own task. Returns `None` when builds are disabled.
    pub fn spawn_build(&self, project_dir: PathBuf) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            return None;
        }
        let builder = self.clone();
        Some(tokio::spawn(async move {
            info!(dir = %project_dir.display(), "Starting project build");
            match builder.build(&project_dir).await {
                Ok(()) => info!(dir = %project_dir.display(), "Project build succeeded"),
                Err(e) => warn!(dir = %project_dir.display(), error = %e, "Project build failed"),
            }
        }))
    }

    /// Install dependencies then build, in `project_dir`.
    pub async fn build(&self, project_dir: &Path) -> Result<()> {
        let has_manifest = tokio::fs::metadata(project_dir.join("package.json"))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !has_manifest {
            return Err(Error::NotFound(format!(
                "package.json in {}",
                project_dir.display()
            )));
        }
        self.npm(project_dir, &["install"]).await?;
        self.npm(project_dir, &["run", "build"]).await
    }

    async fn npm(&self, project_dir: &Path, args: &[&str]) -> Result<()> {
        let output = tokio::process::Command::new(&self.config.npm_command)
            .args(args)
            .current_dir(project_dir)
            .output()
            .await
            .map_err(|e| Error::Internal(format!("Failed to run npm {}: {}", args.join(" "), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Internal(format!("npm {} failed: {}", args.join(" "), stderr.trim())));
        }
        Ok(())
    }
}
