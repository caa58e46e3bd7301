//! Project and serve configuration.
//!
//! Resolves CLI arguments against the Swift package manifest: app type,
//! app target discovery/validation, optional service worker target, and the
//! `.skiff` working tree layout. Serve mode additionally probes for an
//! available port.

use crate::cli::{AppType, BundleArgs, ServeArgs};
use crate::error::{ConfigError, Result};
use crate::pipeline::{BuildTarget, TargetRole};
use crate::tools::Swift;
use crate::ui;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Name of the working tree directory created inside the project.
pub const WORK_TREE: &str = ".skiff";

/// Resolved project configuration, immutable for the life of a command.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Project root (contains Package.swift)
    pub workdir: PathBuf,
    /// App type
    pub app_type: AppType,
    /// Resolved app target name
    pub app_target: String,
    /// Resolved service worker target name (PWA only)
    pub service_worker_target: Option<String>,
}

impl ProjectConfig {
    /// Resolve configuration from CLI arguments and the package manifest.
    pub fn resolve(args: &BundleArgs, swift: &Swift) -> Result<Self> {
        let workdir = match &args.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(ConfigError::Io)?,
        };

        if args.app_type == AppType::Pwa && args.service_worker_target.is_none() {
            return Err(ConfigError::MissingServiceWorkerTarget.into());
        }
        if args.app_type != AppType::Pwa && args.service_worker_target.is_some() {
            ui::warning(
                "You provided a service worker target but forgot to set the app type to PWA. Use: -t pwa",
            );
        }

        let service_worker_target = if args.app_type == AppType::Pwa {
            match &args.service_worker_target {
                Some(name) => {
                    if !swift.has_executable_product(name)? {
                        return Err(ConfigError::ProductNotFound(name.clone()).into());
                    }
                    Some(name.clone())
                }
                None => None,
            }
        } else {
            None
        };

        let app_target = match &args.app_target {
            Some(name) => {
                if !swift.has_executable_product(name)? {
                    return Err(ConfigError::ProductNotFound(name.clone()).into());
                }
                name.clone()
            }
            None => swift
                .lookup_executable_name(service_worker_target.as_deref())?
                .ok_or_else(|| {
                    let excluding = service_worker_target
                        .as_deref()
                        .map(|s| format!(" (excluding service worker: {s})"))
                        .unwrap_or_default();
                    ConfigError::AppTargetNotFound(excluding)
                })?,
        };

        Ok(Self {
            workdir,
            app_type: args.app_type,
            app_target,
            service_worker_target,
        })
    }

    /// The `.skiff` working tree root.
    pub fn work_tree(&self) -> PathBuf {
        self.workdir.join(WORK_TREE)
    }

    /// The hand-authored entrypoint directory inside the working tree.
    pub fn entrypoint(&self) -> PathBuf {
        self.work_tree().join("entrypoint")
    }

    /// Name of the served output directory for a mode.
    pub fn point(dev: bool) -> &'static str {
        if dev {
            "dev"
        } else {
            "release"
        }
    }

    /// The served output directory for a mode.
    pub fn point_dir(&self, dev: bool) -> PathBuf {
        self.work_tree().join(Self::point(dev))
    }

    /// The ordered target list for one pipeline invocation.
    ///
    /// The app target always builds first; the service worker follows and
    /// is the one that carries packaging metadata.
    pub fn targets(&self) -> Vec<BuildTarget> {
        let mut targets = vec![BuildTarget {
            name: self.app_target.clone(),
            role: TargetRole::PrimaryApp,
            requires_secondary_native_build: false,
        }];
        if let Some(sw) = &self.service_worker_target {
            targets.push(BuildTarget {
                name: sw.clone(),
                role: TargetRole::ServiceWorker,
                requires_secondary_native_build: true,
            });
        }
        targets
    }
}

/// Serve-mode configuration on top of the project config.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Socket address the dev server binds
    pub addr: SocketAddr,
    /// Open the browser after startup
    pub open: bool,
}

impl ServeConfig {
    /// Resolve serve settings, probing for an available port.
    pub fn resolve(args: &ServeArgs) -> Result<Self> {
        Ok(Self {
            addr: find_available_port(args.port)?,
            open: args.open,
        })
    }

    /// The URL clients use to reach the server.
    pub fn server_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.addr.port())
    }
}

/// Find an available port starting from the requested one.
///
/// Tries the requested port first, then the next 10.
fn find_available_port(requested_port: u16) -> Result<SocketAddr> {
    use std::net::TcpListener;

    if requested_port < 1024 {
        ui::warning(&format!(
            "Port {} is in privileged range, may require root access",
            requested_port
        ));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], requested_port));
    if TcpListener::bind(addr).is_ok() {
        return Ok(addr);
    }

    for offset in 1..=10 {
        let port = requested_port.saturating_add(offset);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        if TcpListener::bind(addr).is_ok() {
            ui::warning(&format!(
                "Port {} is busy, using port {} instead",
                requested_port, port
            ));
            return Ok(addr);
        }
    }

    Err(ConfigError::InvalidValue {
        field: "port".to_string(),
        value: requested_port.to_string(),
        hint: format!(
            "Ports {}-{} are all in use. Try a different port range.",
            requested_port,
            requested_port + 10
        ),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProjectConfig {
        ProjectConfig {
            workdir: PathBuf::from("/proj"),
            app_type: AppType::Pwa,
            app_target: "App".to_string(),
            service_worker_target: Some("Service".to_string()),
        }
    }

    #[test]
    fn work_tree_layout() {
        let config = sample();
        assert_eq!(config.work_tree(), PathBuf::from("/proj/.skiff"));
        assert_eq!(
            config.entrypoint(),
            PathBuf::from("/proj/.skiff/entrypoint")
        );
        assert_eq!(config.point_dir(true), PathBuf::from("/proj/.skiff/dev"));
        assert_eq!(
            config.point_dir(false),
            PathBuf::from("/proj/.skiff/release")
        );
    }

    #[test]
    fn pwa_targets_are_ordered_app_first() {
        let targets = sample().targets();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "App");
        assert_eq!(targets[0].role, TargetRole::PrimaryApp);
        assert!(!targets[0].requires_secondary_native_build);
        assert_eq!(targets[1].name, "Service");
        assert_eq!(targets[1].role, TargetRole::ServiceWorker);
        assert!(targets[1].requires_secondary_native_build);
    }

    #[test]
    fn spa_has_single_target() {
        let config = ProjectConfig {
            app_type: AppType::Spa,
            service_worker_target: None,
            ..sample()
        };
        let targets = config.targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "App");
    }

    #[test]
    fn find_available_port_probes_forward() {
        use std::net::TcpListener;

        // Grab an ephemeral port, keep it bound, then ask for it: the probe
        // must land on a nearby free port instead.
        let listener = TcpListener::bind(("0.0.0.0", 0)).unwrap();
        let taken = listener.local_addr().unwrap().port();

        let addr = find_available_port(taken).unwrap();
        assert!(addr.port() >= taken);
    }
}
