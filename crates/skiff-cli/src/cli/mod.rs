//! Command-line interface definition for skiff.
//!
//! Defines the complete CLI structure using clap v4 derive macros.
//!
//! # Command Structure
//!
//! - `skiff serve` - Compile, cook and serve files for debug and development
//! - `skiff release` - Compile, cook and pack files for release

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

/// Skiff - build, watch and serve SwiftWasm web apps
#[derive(Parser, Debug)]
#[command(
    name = "skiff",
    version,
    about = "Build, watch and serve SwiftWasm web apps",
    long_about = "Skiff compiles Swift packages to WebAssembly, cooks the web \
                  entrypoint (JS glue + HTML shell), and serves the result with \
                  live reload over a WebSocket channel."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available skiff subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile, cook and serve files for debug and development
    ///
    /// Watches the source tree and rebuilds on change, pushing reload
    /// notifications to connected browsers.
    Serve(ServeArgs),

    /// Compile, cook and pack files for release
    ///
    /// Runs the optimize stage (size reduction, debug-info strip, legacy
    /// runtime compatibility) on the produced wasm binaries.
    Release(BundleArgs),
}

/// App type: plain single-page app or progressive web app.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppType {
    /// Single-page app
    Spa,
    /// Progressive web app with a service worker
    Pwa,
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppType::Spa => write!(f, "spa"),
            AppType::Pwa => write!(f, "pwa"),
        }
    }
}

/// Arguments shared by `serve` and `release`.
#[derive(Args, Debug, Clone)]
pub struct BundleArgs {
    /// App type
    #[arg(short = 't', long = "type", value_enum, default_value = "spa")]
    pub app_type: AppType,

    /// Name of the app target
    ///
    /// Defaults to the first executable product found in Package.swift,
    /// excluding the service worker target.
    #[arg(short = 'a', long, value_name = "NAME")]
    pub app_target: Option<String>,

    /// Name of the service worker target (PWA only)
    #[arg(short = 's', long, value_name = "NAME")]
    pub service_worker_target: Option<String>,

    /// Project directory (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

/// Arguments for the serve command.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Port to serve on
    #[arg(short, long, default_value_t = 8888)]
    pub port: u16,

    /// Open the browser after the server starts
    #[arg(long)]
    pub open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["skiff", "serve"]).unwrap();
        match cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port, 8888);
                assert_eq!(args.bundle.app_type, AppType::Spa);
                assert!(args.bundle.service_worker_target.is_none());
                assert!(!args.open);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn release_with_pwa_targets() {
        let cli = Cli::try_parse_from([
            "skiff", "release", "-t", "pwa", "-a", "App", "-s", "Service",
        ])
        .unwrap();
        match cli.command {
            Command::Release(args) => {
                assert_eq!(args.app_type, AppType::Pwa);
                assert_eq!(args.app_target.as_deref(), Some("App"));
                assert_eq!(args.service_worker_target.as_deref(), Some("Service"));
            }
            _ => panic!("expected release"),
        }
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["skiff", "-v", "-q", "serve"]).is_err());
    }
}
