//! Swift compiler invocations.
//!
//! Wraps `swift build` (wasm and native), `swift package dump-package` and
//! `swift --version`. Compile failures are parsed into structured
//! diagnostics when the raw output matches the compiler's diagnostic
//! grammar; otherwise the raw text is surfaced as-is.

use crate::error::{BuildError, ToolError};
use crate::pipeline::diagnostics;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The deployment triple targets are compiled for.
const WASM_TRIPLE: &str = "wasm32-unknown-wasi";

/// Swift toolchain handle bound to a project directory.
#[derive(Debug, Clone)]
pub struct Swift {
    launch_path: PathBuf,
    workdir: PathBuf,
}

/// Subset of `swift package dump-package` output this tool needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Package {
    /// Declared products
    pub products: Option<Vec<Product>>,
    /// Declared dependencies
    pub dependencies: Option<Vec<Dependency>>,
}

/// A product entry from the package dump.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    /// Product name
    pub name: String,
    /// Product type map; executables carry an `executable` key
    #[serde(rename = "type")]
    pub product_type: Option<HashMap<String, Option<serde_json::Value>>>,
}

impl Product {
    /// Whether this product builds an executable.
    pub fn is_executable(&self) -> bool {
        self.product_type
            .as_ref()
            .is_some_and(|t| t.contains_key("executable"))
    }
}

/// A dependency entry from the package dump.
#[derive(Debug, Clone, Deserialize)]
pub struct Dependency {
    /// Requirement map; local packages carry a `localPackage` key
    pub requirement: Option<HashMap<String, Option<serde_json::Value>>>,
    /// Path or URL of the dependency
    pub url: Option<String>,
}

impl Swift {
    /// Locate the `swift` binary and bind it to a project directory.
    pub fn new(workdir: impl Into<PathBuf>) -> Result<Self, ToolError> {
        Ok(Self {
            launch_path: super::which("swift")?,
            workdir: workdir.into(),
        })
    }

    /// Create a handle with an explicit binary path (used by tests).
    pub fn with_launch_path(launch_path: PathBuf, workdir: impl Into<PathBuf>) -> Self {
        Self {
            launch_path,
            workdir: workdir.into(),
        }
    }

    /// The bound project directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Reported toolchain version string.
    pub fn version(&self) -> Result<String, ToolError> {
        let output = Command::new(&self.launch_path)
            .current_dir(&self.workdir)
            .arg("--version")
            .output()
            .map_err(|_| ToolError::BrokenOutput("swift".to_string()))?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                program: "swift".to_string(),
                code: super::exit_code(output.status),
            });
        }

        String::from_utf8(output.stdout)
            .map(|s| s.trim().to_string())
            .map_err(|_| ToolError::BrokenOutput("swift".to_string()))
    }

    /// Compile a product for the wasm deployment triple.
    ///
    /// Blocks until the compiler exits. On failure the raw output is parsed
    /// into structured diagnostics, falling back to the raw text.
    pub fn build_wasm(&self, product: &str, release: bool) -> Result<(), BuildError> {
        self.build(product, release, Some(WASM_TRIPLE))
    }

    /// Compile a product for the native architecture, debug configuration.
    ///
    /// Returns the path of the produced executable. Used only to run the
    /// binary and capture packaging metadata.
    pub fn build_native_debug(&self, product: &str) -> Result<PathBuf, BuildError> {
        self.build(product, false, None)?;
        Ok(self.workdir.join(".build").join("debug").join(product))
    }

    /// Path of the wasm binary produced for a product.
    pub fn wasm_artifact(&self, product: &str, release: bool) -> PathBuf {
        self.workdir
            .join(".build")
            .join(if release { "release" } else { "debug" })
            .join(format!("{product}.wasm"))
    }

    fn build(&self, product: &str, release: bool, triple: Option<&str>) -> Result<(), BuildError> {
        let mut cmd = Command::new(&self.launch_path);
        cmd.current_dir(&self.workdir)
            .args(["build", "-c", if release { "release" } else { "debug" }])
            .args(["--product", product]);
        if let Some(triple) = triple {
            cmd.args(["--triple", triple]);
        }

        let output = cmd
            .output()
            .map_err(|e| BuildError::Raw(format!("failed to launch swift: {e}")))?;

        if output.status.success() {
            return Ok(());
        }

        // The compiler writes diagnostics to both streams depending on the
        // failure; combine them before parsing.
        let mut raw = String::from_utf8_lossy(&output.stdout).into_owned();
        raw.push_str(&String::from_utf8_lossy(&output.stderr));
        if raw.trim().is_empty() {
            return Err(BuildError::ProcessFailure(super::exit_code(output.status)));
        }

        match diagnostics::parse(&raw) {
            Some(diags) => Err(BuildError::Diagnostics(diags)),
            None => Err(BuildError::Raw(raw)),
        }
    }

    /// Dump and decode the package manifest.
    pub fn dump_package(&self) -> Result<Package, ToolError> {
        let output = Command::new(&self.launch_path)
            .current_dir(&self.workdir)
            .args(["package", "dump-package"])
            .output()
            .map_err(|_| ToolError::BrokenOutput("swift".to_string()))?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                program: "swift package dump-package".to_string(),
                code: super::exit_code(output.status),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|_| ToolError::BrokenOutput("swift package dump-package".to_string()))
    }

    /// Find the first executable product, excluding the service worker
    /// target when one is set.
    pub fn lookup_executable_name(
        &self,
        excluding: Option<&str>,
    ) -> Result<Option<String>, ToolError> {
        let package = self.dump_package()?;
        Ok(find_executable(&package, excluding))
    }

    /// Whether the named product exists and is executable.
    pub fn has_executable_product(&self, name: &str) -> Result<bool, ToolError> {
        let package = self.dump_package()?;
        Ok(package
            .products
            .unwrap_or_default()
            .iter()
            .any(|p| p.name == name && p.is_executable()))
    }

    /// Source directories of local path dependencies.
    ///
    /// Dependencies referenced with `./` or `../` live inside the watched
    /// workspace already and are skipped.
    pub fn local_dependency_sources(&self) -> Result<Vec<PathBuf>, ToolError> {
        let package = self.dump_package()?;
        Ok(local_dependency_sources(&package))
    }
}

fn find_executable(package: &Package, excluding: Option<&str>) -> Option<String> {
    package
        .products
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|p| p.is_executable() && Some(p.name.as_str()) != excluding)
        .map(|p| p.name.clone())
}

fn local_dependency_sources(package: &Package) -> Vec<PathBuf> {
    package
        .dependencies
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|d| {
            d.requirement
                .as_ref()
                .is_some_and(|r| r.contains_key("localPackage"))
        })
        .filter_map(|d| d.url.as_deref())
        .filter(|url| !url.starts_with("./") && !url.starts_with("../"))
        .map(|url| Path::new(url).join("Sources"))
        .collect()
}
