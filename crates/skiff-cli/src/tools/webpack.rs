//! The webpack bundler collaborator.
//!
//! Bundles a generated JS entry into the served output tree using a
//! transient config file written by the cook stage.

use crate::error::{BuildError, ToolError};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Handle to the `webpack` binary bound to the skiff working tree.
#[derive(Debug, Clone)]
pub struct Webpack {
    launch_path: PathBuf,
    cwd: PathBuf,
}

impl Webpack {
    /// Locate the `webpack` binary.
    pub fn new(cwd: impl Into<PathBuf>) -> Result<Self, ToolError> {
        Ok(Self {
            launch_path: super::which("webpack")?,
            cwd: cwd.into(),
        })
    }

    /// Run webpack with a previously written config file.
    ///
    /// `config` is relative to the working tree, matching how the config is
    /// generated by the cook stage.
    pub fn bundle(&self, config: &Path) -> Result<(), BuildError> {
        let output = Command::new(&self.launch_path)
            .current_dir(&self.cwd)
            .arg("--config")
            .arg(config)
            .output()
            .map_err(|e| BuildError::Raw(format!("failed to launch webpack: {e}")))?;

        if output.status.success() {
            return Ok(());
        }

        let mut raw = String::from_utf8_lossy(&output.stdout).into_owned();
        raw.push_str(&String::from_utf8_lossy(&output.stderr));
        if raw.trim().is_empty() {
            return Err(BuildError::ProcessFailure(super::exit_code(output.status)));
        }
        Err(BuildError::Raw(raw))
    }
}
