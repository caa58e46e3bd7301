//! External tool collaborators.
//!
//! Every compiler, optimizer and packager invocation goes through this
//! module. Processes are run synchronously; callers that must not block an
//! event loop run them from a blocking worker.

pub mod manifest;
pub mod npm;
pub mod swift;
pub mod wasm_opt;
pub mod webpack;

pub use manifest::{Manifest, ManifestExtractor};
pub use npm::Npm;
pub use swift::Swift;
pub use wasm_opt::WasmOpt;
pub use webpack::Webpack;

use crate::error::ToolError;
use std::path::PathBuf;
use std::process::Command;

/// Returns the path to a program binary, or an error when it is not
/// installed.
pub fn which(program: &str) -> Result<PathBuf, ToolError> {
    let output = Command::new("which")
        .arg(program)
        .output()
        .map_err(|_| ToolError::NotFound(program.to_string()))?;

    if !output.status.success() {
        return Err(ToolError::NotFound(program.to_string()));
    }

    let path = String::from_utf8(output.stdout)
        .map_err(|_| ToolError::BrokenOutput(program.to_string()))?;
    let path = path.trim();
    if path.is_empty() {
        return Err(ToolError::NotFound(program.to_string()));
    }
    Ok(PathBuf::from(path))
}

/// Check whether a program is installed without failing.
pub fn which_bool(program: &str) -> bool {
    which(program).is_ok()
}

/// Exit code of a finished process, -1 when terminated by a signal.
pub(crate) fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
