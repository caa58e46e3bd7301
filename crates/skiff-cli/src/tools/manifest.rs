//! Web-app manifest extraction.
//!
//! The service worker target is additionally compiled for the native
//! architecture, solely so the produced binary can be executed to print its
//! manifest as a single JSON line on stdout.

use crate::error::ToolError;
use std::path::Path;
use std::process::Command;

/// Web-app manifest metadata captured from the service worker binary.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Theme color injected into the HTML head
    pub theme_color: Option<String>,
    /// The decoded manifest object, written to manifest.json verbatim
    raw: serde_json::Value,
}

impl Manifest {
    /// Wrap a decoded manifest object.
    pub fn from_value(raw: serde_json::Value) -> Self {
        let theme_color = raw
            .get("theme_color")
            .or_else(|| raw.get("themeColor"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self { theme_color, raw }
    }

    /// The manifest body for manifest.json.
    pub fn to_json(&self) -> &serde_json::Value {
        &self.raw
    }
}

/// Runs a native service worker binary and parses its manifest line.
pub struct ManifestExtractor;

impl ManifestExtractor {
    /// Execute the binary and decode the first stdout line as a manifest.
    pub fn extract(executable: &Path) -> Result<Manifest, ToolError> {
        let program = executable.display().to_string();
        let output = Command::new(executable)
            .output()
            .map_err(|_| ToolError::BrokenOutput(program.clone()))?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                program,
                code: super::exit_code(output.status),
            });
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| ToolError::BrokenOutput(program.clone()))?;
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| ToolError::BrokenOutput(program.clone()))?;

        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|_| ToolError::BrokenOutput(program))?;
        Ok(Manifest::from_value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_reads_snake_and_camel_case_theme_color() {
        let camel = Manifest::from_value(
            serde_json::json!({"name": "App", "themeColor": "#ffffff"}),
        );
        assert_eq!(camel.theme_color.as_deref(), Some("#ffffff"));

        let snake = Manifest::from_value(
            serde_json::json!({"name": "App", "theme_color": "#aabbcc"}),
        );
        assert_eq!(snake.theme_color.as_deref(), Some("#aabbcc"));
    }

    #[test]
    fn manifest_preserves_raw_body() {
        let manifest = Manifest::from_value(serde_json::json!({"name": "App"}));
        assert_eq!(manifest.to_json()["name"], "App");
        assert!(manifest.theme_color.is_none());
    }

    #[test]
    fn extract_rejects_a_binary_that_is_not_there() {
        let err = ManifestExtractor::extract(Path::new("/no/such/binary")).unwrap_err();
        assert!(matches!(err, ToolError::BrokenOutput(_)));
    }
}
