//! Release command: compile, cook and pack files for release.

use crate::cli::BundleArgs;
use crate::config::ProjectConfig;
use crate::error::{CliError, Result};
use crate::pipeline::{BuildPipeline, Cook};
use crate::tools::Swift;
use crate::ui;
use std::sync::Arc;

/// Execute the release command.
pub async fn execute(args: BundleArgs) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        let workdir = match &args.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let swift = Swift::new(workdir)?;
        ui::info(&swift.version()?);

        let config = ProjectConfig::resolve(&args, &swift)?;
        let cook = Arc::new(Cook::new(config.clone()));
        let pipeline = BuildPipeline::new(swift, Arc::clone(&cook), config.clone(), false);

        cook.prepare()?;
        pipeline.execute(&config.targets())?;
        cook.cook(false)?;

        ui::success(&format!(
            "Release bundle ready at {}",
            config.point_dir(false).display()
        ));
        Ok(())
    })
    .await
    .map_err(|e| CliError::Custom(format!("release worker failed: {e}")))?
}
