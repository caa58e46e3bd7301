//! Serve command: compile, cook and serve files for debug and development.
//!
//! Orchestrates the whole dev lifecycle:
//! 1. Resolve project configuration against the package manifest
//! 2. Initial build: pipeline over all targets, then cook the entrypoint
//! 3. Register watch roots and wire them to the two rebuild coordinators
//! 4. Start the HTTP server with the reload channel
//! 5. Run the event loop until Ctrl+C

use crate::cli::ServeArgs;
use crate::config::{ProjectConfig, ServeConfig};
use crate::dev::{DevServer, DevState, Notification, RebuildCoordinator, SharedState};
use crate::error::{CliError, Result};
use crate::pipeline::{BuildPipeline, Cook};
use crate::tools::Swift;
use crate::ui;
use crate::watcher::{ChangeEvent, Watcher};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;

/// Execute the serve command.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let serve_config = ServeConfig::resolve(&args)?;

    // Resolving the project shells out to the toolchain; keep it off the
    // runtime workers.
    let bundle_args = args.bundle.clone();
    let (swift, config) = tokio::task::spawn_blocking(move || -> Result<(Swift, ProjectConfig)> {
        let workdir = match &bundle_args.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let swift = Swift::new(workdir)?;
        ui::info(&swift.version()?);
        let config = ProjectConfig::resolve(&bundle_args, &swift)?;
        Ok((swift, config))
    })
    .await
    .map_err(|e| CliError::Custom(format!("startup worker failed: {e}")))??;

    let cook = Arc::new(Cook::new(config.clone()));
    let pipeline = Arc::new(BuildPipeline::new(
        swift.clone(),
        Arc::clone(&cook),
        config.clone(),
        true,
    ));
    let targets = config.targets();

    // Initial build: every target, then the entrypoint.
    {
        let pipeline = Arc::clone(&pipeline);
        let cook = Arc::clone(&cook);
        let targets = targets.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            cook.prepare()?;
            pipeline.execute(&targets)?;
            cook.cook(true)?;
            Ok(())
        })
        .await
        .map_err(|e| CliError::Custom(format!("build worker failed: {e}")))??;
    }

    let state: SharedState = Arc::new(DevState::new(config.point_dir(true)));

    // Wasm rebuilds and entrypoint recooks run on independent serializers;
    // they write to disjoint parts of the output tree.
    let rebuild = {
        let pipeline = Arc::clone(&pipeline);
        let state = Arc::clone(&state);
        let targets = targets.clone();
        RebuildCoordinator::new("rebuild", move || match pipeline.execute(&targets) {
            Ok(()) => state.broadcast(Notification::WasmRecompiled),
            Err(error) => ui::error(&format!("Rebuilding error: {error}")),
        })
    };
    let recook = {
        let cook = Arc::clone(&cook);
        let state = Arc::clone(&state);
        RebuildCoordinator::new("recook", move || match cook.cook(true) {
            Ok(()) => state.broadcast(Notification::EntrypointRecooked),
            Err(error) => ui::error(&format!("Recooking error: {error}")),
        })
    };

    let watcher = Watcher::new()?;
    let (rebuild_tx, mut rebuild_rx) = mpsc::channel::<ChangeEvent>(64);
    let (recook_tx, mut recook_rx) = mpsc::channel::<ChangeEvent>(64);

    watcher.register(&config.workdir.join("Package.swift"), false, rebuild_tx.clone());
    watcher.register(&config.workdir.join(".swift-version"), false, rebuild_tx.clone());
    watcher.register(&config.workdir.join("Sources"), true, rebuild_tx.clone());
    for dep in swift.local_dependency_sources().unwrap_or_default() {
        watcher.register(&dep, true, rebuild_tx.clone());
    }
    watcher.register(&config.entrypoint(), true, recook_tx);

    let server = DevServer::new(serve_config.addr, Arc::clone(&state));
    let mut server_handle = tokio::spawn(server.start());

    ui::success(&format!("Available at {}", serve_config.server_url()));
    if serve_config.open {
        open_browser(&serve_config.server_url());
    }
    ui::info("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            Some(event) = rebuild_rx.recv() => {
                tracing::debug!("change detected: {}", event.source_path.display());
                if event.source_path.ends_with("Package.swift") {
                    refresh_local_dependency_watches(&swift, &watcher, &rebuild_tx).await;
                }
                rebuild.request();
            }

            Some(event) = recook_rx.recv() => {
                tracing::debug!("entrypoint change detected: {}", event.source_path.display());
                recook.request();
            }

            _ = signal::ctrl_c() => {
                ui::info("Shutting down");
                break;
            }

            result = &mut server_handle => {
                match result {
                    Ok(Err(error)) => ui::error(&format!("Server error: {error}")),
                    Err(error) => ui::error(&format!("Server task failed: {error}")),
                    Ok(Ok(())) => ui::warning("Server stopped unexpectedly"),
                }
                break;
            }
        }
    }

    watcher.shutdown();
    Ok(())
}

/// A Package.swift change may introduce new local dependencies; watch the
/// source trees that are not watched yet.
async fn refresh_local_dependency_watches(
    swift: &Swift,
    watcher: &Watcher,
    tx: &mpsc::Sender<ChangeEvent>,
) {
    let probe = swift.clone();
    let deps = tokio::task::spawn_blocking(move || probe.local_dependency_sources()).await;
    if let Ok(Ok(deps)) = deps {
        for dep in deps {
            if !watcher.is_watching(&dep) {
                watcher.register(&dep, true, tx.clone());
            }
        }
    }
}

/// Open the server URL in the default browser.
fn open_browser(url: &str) {
    use std::process::Command;

    let result = if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()
    } else if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).spawn()
    } else {
        Command::new("xdg-open").arg(url).spawn()
    };

    if let Err(error) = result {
        ui::warning(&format!("Failed to open browser: {error}"));
    }
}
