//! The multi-stage build pipeline.
//!
//! Targets are built strictly in order, never in parallel: they share the
//! build cache and the output tree. Per target the stages are compile →
//! optional secondary metadata build → optimize (release only) → package →
//! artifact move. The first stage failure aborts the whole invocation;
//! artifacts already moved for earlier targets stay in place.

pub mod cook;
pub mod diagnostics;

pub use cook::Cook;

use crate::config::ProjectConfig;
use crate::error::{BuildError, PipelineError};
use crate::tools::{ManifestExtractor, Swift, WasmOpt};
use crate::ui;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// What a build target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRole {
    /// The application binary
    PrimaryApp,
    /// The service worker binary
    ServiceWorker,
}

/// One build product participating in a rebuild cycle.
///
/// Immutable once a cycle starts; the ordered list is fixed per
/// [`BuildPipeline::execute`] invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    /// Product name as declared in Package.swift
    pub name: String,
    /// Role in the served app
    pub role: TargetRole,
    /// Also build a native debug variant to extract packaging metadata
    pub requires_secondary_native_build: bool,
}

impl BuildTarget {
    /// Name used for the served artifact and JS entry.
    pub fn output_name(&self) -> String {
        self.name.to_lowercase()
    }
}

/// One full pass over the ordered target list.
///
/// Created when a rebuild is allowed to start and discarded once the
/// outcome is reported; never persisted.
#[derive(Debug)]
pub struct RebuildCycle {
    /// When the cycle started
    pub started_at: Instant,
    /// Targets not yet built, in order
    targets: VecDeque<BuildTarget>,
}

impl RebuildCycle {
    fn new(targets: &[BuildTarget]) -> Self {
        Self {
            started_at: Instant::now(),
            targets: targets.iter().cloned().collect(),
        }
    }

    fn next_target(&mut self) -> Option<BuildTarget> {
        self.targets.pop_front()
    }

    fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Sequential multi-target build pipeline.
pub struct BuildPipeline {
    swift: Swift,
    cook: Arc<Cook>,
    config: ProjectConfig,
    dev: bool,
}

impl BuildPipeline {
    /// Create a pipeline for a mode.
    pub fn new(swift: Swift, cook: Arc<Cook>, config: ProjectConfig, dev: bool) -> Self {
        Self {
            swift,
            cook,
            config,
            dev,
        }
    }

    /// Run one rebuild cycle over the ordered target list.
    ///
    /// Blocks until the cycle finishes; callers run it on a dedicated
    /// worker. The first failed stage aborts the cycle and names its
    /// target; earlier targets' moved artifacts are not rolled back.
    pub fn execute(&self, targets: &[BuildTarget]) -> Result<(), PipelineError> {
        let mut cycle = RebuildCycle::new(targets);

        while let Some(target) = cycle.next_target() {
            self.build_target(&target).map_err(|source| PipelineError {
                target: target.name.clone(),
                source,
            })?;
        }

        ui::success(&format!("Rebuilt in {:.2}s", cycle.elapsed_secs()));
        Ok(())
    }

    fn build_target(&self, target: &BuildTarget) -> Result<(), BuildError> {
        self.compile(target)?;

        if target.requires_secondary_native_build {
            // Metadata extraction failures are reported but do not abort
            // the primary artifact.
            match self.extract_manifest(target) {
                Ok(manifest) => self.cook.set_manifest(manifest),
                Err(error) => {
                    ui::warning(&format!(
                        "Unable to extract manifest from `{}`: {error}",
                        target.name
                    ));
                }
            }
        }

        if !self.dev {
            self.optimize(target)?;
        }

        self.cook.package_target(target, self.dev)?;
        self.move_artifact(target)
    }

    fn compile(&self, target: &BuildTarget) -> Result<(), BuildError> {
        let spinner = ui::Spinner::new(&format!("Building {}", target.name));
        let started = Instant::now();

        match self.swift.build_wasm(&target.name, !self.dev) {
            Ok(()) => {
                spinner.finish(&format!(
                    "Finished building {} in {:.2}s",
                    target.name,
                    started.elapsed().as_secs_f64()
                ));
                Ok(())
            }
            Err(error) => {
                spinner.fail(&format!("Building {} failed", target.name));
                Err(error)
            }
        }
    }

    fn extract_manifest(&self, target: &BuildTarget) -> Result<crate::tools::Manifest, BuildError> {
        let spinner = ui::Spinner::new(&format!("Extracting manifest from {}", target.name));
        let result = self
            .swift
            .build_native_debug(&target.name)
            .and_then(|executable| {
                ManifestExtractor::extract(&executable).map_err(BuildError::from)
            });

        match &result {
            Ok(_) => spinner.finish("Manifest extracted"),
            Err(_) => spinner.fail("Manifest extraction failed"),
        }
        result
    }

    /// Size reduction, debug-section strip and the legacy-runtime
    /// compatibility patch, all in place on the compiled artifact.
    fn optimize(&self, target: &BuildTarget) -> Result<(), BuildError> {
        let wasm = self.artifact_path(target);
        let optimizer = WasmOpt::new()?;

        let spinner = ui::Spinner::new(&format!("Optimizing \"{}\"", target.name));
        let started = Instant::now();

        let result = optimizer
            .legalize_js_interface(&wasm)
            .and_then(|()| optimizer.strip_debug_info(&wasm))
            .and_then(|()| optimizer.shrink(&wasm));

        match result {
            Ok(()) => {
                spinner.finish(&format!(
                    "Optimized \"{}\" in {:.2}s",
                    target.name,
                    started.elapsed().as_secs_f64()
                ));
                Ok(())
            }
            Err(error) => {
                spinner.fail(&format!("Optimizing \"{}\" failed", target.name));
                Err(error.into())
            }
        }
    }

    /// Move the compiled binary into the served output tree, replacing any
    /// previous copy (remove-then-copy).
    fn move_artifact(&self, target: &BuildTarget) -> Result<(), BuildError> {
        let source = self.artifact_path(target);
        let dest_dir = self.config.point_dir(self.dev);
        let dest = dest_dir.join(format!("{}.wasm", target.output_name()));

        let moved: std::io::Result<()> = (|| {
            std::fs::create_dir_all(&dest_dir)?;
            let _ = std::fs::remove_file(&dest);
            std::fs::copy(&source, &dest)?;
            Ok(())
        })();

        moved.map_err(|e| BuildError::ArtifactMove {
            artifact: source,
            reason: e.to_string(),
        })
    }

    fn artifact_path(&self, target: &BuildTarget) -> PathBuf {
        self.swift.wasm_artifact(&target.name, !self.dev)
    }
}
