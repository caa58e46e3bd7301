//! npm dependency management for the cooked entrypoint.

use crate::error::ToolError;
use std::path::PathBuf;
use std::process::Command;

/// Dev dependencies the generated JS glue needs.
const DEV_DEPENDENCIES: &[&str] = &[
    "@wasmer/wasi",
    "@wasmer/wasmfs",
    "javascript-kit-swift",
    "reconnecting-websocket",
    "webpack",
    "webpack-cli",
];

/// Handle to the `npm` binary bound to the skiff working tree.
#[derive(Debug, Clone)]
pub struct Npm {
    launch_path: PathBuf,
    cwd: PathBuf,
}

impl Npm {
    /// Locate the `npm` binary.
    pub fn new(cwd: impl Into<PathBuf>) -> Result<Self, ToolError> {
        Ok(Self {
            launch_path: super::which("npm")?,
            cwd: cwd.into(),
        })
    }

    /// Install any of the required dev dependencies that are missing.
    pub fn add_dev_dependencies(&self) -> Result<(), ToolError> {
        let installed = self.list()?;
        for package in DEV_DEPENDENCIES {
            if !installed.contains(package) {
                self.add_dependency(package, true)?;
            }
        }
        Ok(())
    }

    /// Run `npm install` unless node_modules already exists.
    pub fn install(&self) -> Result<(), ToolError> {
        if self.node_modules_exists() {
            return Ok(());
        }
        self.run(&["install", "--quiet", "--no-progress"])?;
        Ok(())
    }

    fn add_dependency(&self, package: &str, dev: bool) -> Result<(), ToolError> {
        let save = if dev { "--save-dev" } else { "--save-prod" };
        self.run(&["install", package, save, "--quiet", "--no-progress"])?;
        Ok(())
    }

    fn list(&self) -> Result<String, ToolError> {
        if !self.node_modules_exists() {
            return Ok(String::new());
        }
        self.run(&["list", "--depth=0"])
    }

    fn node_modules_exists(&self) -> bool {
        self.cwd.join("node_modules").is_dir()
    }

    fn run(&self, args: &[&str]) -> Result<String, ToolError> {
        let output = Command::new(&self.launch_path)
            .current_dir(&self.cwd)
            .args(args)
            .output()
            .map_err(|_| ToolError::BrokenOutput("npm".to_string()))?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                program: "npm".to_string(),
                code: super::exit_code(output.status),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ToolError::BrokenOutput("npm".to_string()))
    }
}
