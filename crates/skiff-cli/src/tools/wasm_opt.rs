//! The `wasm-opt` optimizer collaborator.
//!
//! All passes rewrite the binary in place. Only run in release mode.

use crate::error::ToolError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Handle to the `wasm-opt` binary.
#[derive(Debug, Clone)]
pub struct WasmOpt {
    launch_path: PathBuf,
}

impl WasmOpt {
    /// Locate the `wasm-opt` binary.
    pub fn new() -> Result<Self, ToolError> {
        Ok(Self {
            launch_path: super::which("wasm-opt")?,
        })
    }

    /// Legalize the JS interface so runtimes without BigInt integration
    /// (old Safari) can instantiate the module.
    pub fn legalize_js_interface(&self, wasm: &Path) -> Result<(), ToolError> {
        self.run(wasm, &["--legalize-js-interface"])
    }

    /// Strip debug and custom sections.
    pub fn strip_debug_info(&self, wasm: &Path) -> Result<(), ToolError> {
        self.run(wasm, &["--strip-debug", "--strip-producers"])
    }

    /// Size-focused optimization pass.
    pub fn shrink(&self, wasm: &Path) -> Result<(), ToolError> {
        self.run(wasm, &["-Os"])
    }

    fn run(&self, wasm: &Path, args: &[&str]) -> Result<(), ToolError> {
        let status = Command::new(&self.launch_path)
            .args(args)
            .arg(wasm)
            .arg("-o")
            .arg(wasm)
            .status()
            .map_err(|_| ToolError::BrokenOutput("wasm-opt".to_string()))?;

        if !status.success() {
            return Err(ToolError::Failed {
                program: "wasm-opt".to_string(),
                code: super::exit_code(status),
            });
        }
        Ok(())
    }
}
