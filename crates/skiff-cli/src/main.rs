//! Skiff CLI - build, watch and serve SwiftWasm web apps.
//!
//! Entry point: argument parsing, logging initialization and command
//! dispatch.

use clap::Parser;
use miette::Result;
use skiff_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_colors();

    let result = match args.command {
        cli::Command::Serve(serve_args) => commands::serve_execute(serve_args).await,
        cli::Command::Release(bundle_args) => commands::release_execute(bundle_args).await,
    };

    result.map_err(error::cli_error_to_miette)
}
