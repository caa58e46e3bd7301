//! Error handling for the skiff CLI.
//!
//! This module provides a hierarchical error type system using `thiserror`.
//! Top-level errors (`CliError`) represent broad categories of failures,
//! while domain-specific errors (`ConfigError`, `BuildError`, `PipelineError`,
//! `ToolError`) carry the detailed context. Conversion between levels is
//! automatic via `#[from]` attributes, and the `ResultExt` trait allows
//! attaching paths and hints at the call site.

use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::diagnostics::CompilerDiagnostic;

/// Top-level CLI error type.
///
/// This is the primary error type returned by CLI commands. It automatically
/// converts from domain-specific errors via `From` implementations.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration-related errors (bad arguments, unresolvable targets)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single failed build stage
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// A failed rebuild cycle, wrapping the first build error encountered
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// External tool lookup or invocation errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Development server errors
    #[error("Server error: {0}")]
    Server(String),

    /// File watching errors
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
///
/// These occur while resolving CLI arguments against the Swift package
/// manifest and the project directory layout.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No executable app product could be resolved from the package manifest
    #[error("Unable to find an executable app product in Package.swift{0}\n\nHint: Declare an executable product or pass --app-target <NAME>")]
    AppTargetNotFound(String),

    /// The named product is missing or not executable
    #[error("Executable product `{0}` not found in Package.swift\n\nHint: Check the product name and that its type is executable")]
    ProductNotFound(String),

    /// PWA mode without a service worker target
    #[error("A service worker target is required for PWA apps\n\nHint: Use -s <ServiceTargetName>")]
    MissingServiceWorkerTarget,

    /// Invalid value for a configuration option
    #[error("Invalid value for '{field}': {value}\n\nHint: {hint}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The invalid value
        value: String,
        /// Helpful hint for correct values
        hint: String,
    },

    /// I/O error while inspecting the project
    #[error("Failed to inspect project: {0}")]
    Io(#[from] std::io::Error),
}

/// A single failed build stage.
///
/// Compiler failures are parsed into structured diagnostics when the raw
/// output matches the expected grammar; otherwise the raw text is kept.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Compiler output parsed into structured diagnostics
    #[error("Compilation failed with {} error(s)", .0.len())]
    Diagnostics(Vec<CompilerDiagnostic>),

    /// Compiler or bundler output that did not match the diagnostic grammar
    #[error("Build failed:\n{0}")]
    Raw(String),

    /// The external process exited nonzero without usable output
    #[error("Build process failed with exit code {0}")]
    ProcessFailure(i32),

    /// Failed to move an artifact into the served output tree
    #[error("Failed to move artifact {}: {reason}", .artifact.display())]
    ArtifactMove {
        /// The artifact that could not be moved
        artifact: PathBuf,
        /// Underlying reason
        reason: String,
    },
}

impl From<ToolError> for BuildError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Failed { code, .. } => BuildError::ProcessFailure(code),
            other => BuildError::Raw(other.to_string()),
        }
    }
}

/// A failed rebuild cycle.
///
/// Wraps the first `BuildError` encountered and names the target whose stage
/// failed; no subsequent targets are built in that cycle.
#[derive(Debug, Error)]
#[error("Pipeline aborted while building `{target}`: {source}")]
pub struct PipelineError {
    /// The target whose stage failed first
    pub target: String,
    /// The first build error encountered
    #[source]
    pub source: BuildError,
}

/// External tool lookup and invocation errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The program is not installed or not on PATH
    #[error("Program named `{0}` not found\n\nHint: Install it and make sure it is on your PATH")]
    NotFound(String),

    /// The tool exited nonzero
    #[error("`{program}` failed with exit code {code}")]
    Failed {
        /// Program name
        program: String,
        /// Exit code, -1 when terminated by signal
        code: i32,
    },

    /// The tool produced output that could not be read or parsed
    #[error("Unable to read `{0}` output")]
    BrokenOutput(String),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Add a file path to the error context.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Add a helpful hint to the error context.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error with a custom message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

/// Convert a `CliError` to a miette report for terminal rendering.
pub fn cli_error_to_miette(err: CliError) -> miette::Report {
    match err {
        CliError::Pipeline(e) => {
            let target = e.target.clone();
            match e.source {
                BuildError::Diagnostics(diags) => {
                    let rendered = crate::pipeline::diagnostics::render(&diags);
                    miette::miette!("Build of `{}` failed:\n{}", target, rendered)
                }
                other => miette::miette!("Build of `{}` failed: {}", target, other),
            }
        }
        CliError::Build(BuildError::Diagnostics(diags)) => {
            let rendered = crate::pipeline::diagnostics::render(&diags);
            miette::miette!("Compilation failed:\n{}", rendered)
        }
        _ => miette::miette!("{}", err),
    }
}
