//! Skiff - build, watch and serve SwiftWasm web apps.
//!
//! This crate is the incremental build-and-serve engine behind the `skiff`
//! binary: it watches the source tree, runs the multi-stage rebuild
//! pipeline when relevant files change, and pushes live-reload
//! notifications to browsers connected to the local dev server.
//!
//! # Architecture
//!
//! - [`watcher`] - Owned filesystem watcher with per-node coalescing
//! - [`dev`] - Rebuild coordination, notification hub and dev server
//! - [`pipeline`] - The sequential per-target build pipeline and cooking
//! - [`tools`] - External collaborators (compiler, optimizer, bundler)
//! - [`config`] - Project resolution against the package manifest
//! - [`error`] - Structured error types with actionable messages
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Terminal status output and spinners

pub mod cli;
pub mod commands;
pub mod config;
pub mod dev;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod tools;
pub mod ui;
pub mod watcher;

// Re-export commonly used types
pub use error::{BuildError, CliError, ConfigError, PipelineError, Result, ResultExt, ToolError};
