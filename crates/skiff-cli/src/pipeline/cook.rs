//! Entrypoint cooking.
//!
//! "Cooking" regenerates the served JS/HTML wrapper around the compiled
//! artifacts: npm dependencies, per-target JS entry glue, the HTML shell
//! and the web-app manifest. Generated files are only written when absent
//! so hand edits in the entrypoint directory always win.

use crate::cli::AppType;
use crate::config::ProjectConfig;
use crate::error::{BuildError, Result, ResultExt};
use crate::pipeline::{BuildTarget, TargetRole};
use crate::tools::{Manifest, Npm, Webpack};
use crate::ui;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Instant;

/// Cooks the entrypoint tree and bundles JS entries.
pub struct Cook {
    config: ProjectConfig,
    /// Last manifest extracted by the pipeline, used for manifest.json and
    /// the theme-color meta tag
    manifest: Mutex<Option<Manifest>>,
}

impl Cook {
    /// Create a cook bound to a project.
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            config,
            manifest: Mutex::new(None),
        }
    }

    /// Store the manifest extracted from the service worker binary.
    pub fn set_manifest(&self, manifest: Manifest) {
        *self.manifest.lock() = Some(manifest);
    }

    /// Bootstrap the working tree: `.skiff/` and its package.json.
    pub fn prepare(&self) -> Result<()> {
        let work_tree = self.config.work_tree();
        std::fs::create_dir_all(&work_tree).with_path(&work_tree)?;

        let package_json = work_tree.join("package.json");
        if !package_json.exists() {
            let manifest = serde_json::json!({
                "name": "skiff",
                "version": "1.0.0",
            });
            std::fs::write(&package_json, serde_json::to_vec(&manifest)?)
                .with_path(&package_json)?;
        }
        Ok(())
    }

    /// Cook the whole entrypoint: dependencies, every target's bundle, the
    /// HTML shell and manifest.json.
    pub fn cook(&self, dev: bool) -> Result<()> {
        let started = Instant::now();
        let spinner = ui::Spinner::new("Cooking web files");

        let result = self.cook_inner(dev);
        match &result {
            Ok(()) => spinner.finish(&format!(
                "Cooked web files in {:.2}s",
                started.elapsed().as_secs_f64()
            )),
            Err(_) => spinner.fail("Cooking web files failed"),
        }
        result
    }

    fn cook_inner(&self, dev: bool) -> Result<()> {
        self.prepare()?;
        self.install_dependencies()?;

        for target in self.config.targets() {
            self.package_target(&target, dev)?;
        }

        let point_dir = self.ensure_point_dirs(dev)?;
        let index = self.ensure_index_html(dev)?;

        // The served copy is refreshed on every cook.
        let served_index = point_dir.join("index.html");
        let _ = std::fs::remove_file(&served_index);
        std::fs::copy(&index, &served_index).with_path(&served_index)?;

        if self.config.app_type == AppType::Pwa {
            if let Some(manifest) = self.manifest.lock().as_ref() {
                let manifest_path = point_dir.join("manifest.json");
                std::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest.to_json())?)
                    .with_path(&manifest_path)?;
            }
        }

        Ok(())
    }

    /// Bundle one target's JS entry into the served output tree.
    ///
    /// Generates the entry glue when absent, writes a transient webpack
    /// config, runs the bundler and removes the config again.
    pub fn package_target(&self, target: &BuildTarget, dev: bool) -> std::result::Result<(), BuildError> {
        let point_dir = self
            .ensure_point_dirs(dev)
            .map_err(|e| BuildError::Raw(e.to_string()))?;

        let js_file = format!("{}.js", target.output_name());
        let js_path = self.entrypoint_point(dev).join(&js_file);
        if !js_path.exists() {
            let glue = js_entry(
                dev,
                &target.output_name(),
                target.role == TargetRole::ServiceWorker,
            );
            std::fs::write(&js_path, glue).map_err(|e| BuildError::Raw(e.to_string()))?;
        }

        let config_path = self.config.entrypoint().join("config.js");
        let webpack_config = webpack_config(dev, &js_file, &point_dir);
        std::fs::write(&config_path, webpack_config).map_err(|e| BuildError::Raw(e.to_string()))?;

        let result = Webpack::new(self.config.work_tree())
            .map_err(BuildError::from)
            .and_then(|webpack| webpack.bundle(std::path::Path::new("entrypoint/config.js")));

        // The config is transient either way.
        let _ = std::fs::remove_file(&config_path);
        result
    }

    fn install_dependencies(&self) -> Result<()> {
        let npm = Npm::new(self.config.work_tree())?;
        npm.add_dev_dependencies()?;
        npm.install()?;
        Ok(())
    }

    /// Create the entrypoint point dir and the served point dir.
    fn ensure_point_dirs(&self, dev: bool) -> Result<PathBuf> {
        let entry_point = self.entrypoint_point(dev);
        std::fs::create_dir_all(&entry_point).with_path(&entry_point)?;
        let point_dir = self.config.point_dir(dev);
        std::fs::create_dir_all(&point_dir).with_path(&point_dir)?;
        Ok(point_dir)
    }

    fn entrypoint_point(&self, dev: bool) -> PathBuf {
        self.config.entrypoint().join(ProjectConfig::point(dev))
    }

    fn ensure_index_html(&self, dev: bool) -> Result<PathBuf> {
        let index_path = self.entrypoint_point(dev).join("index.html");
        if !index_path.exists() {
            let app_js = format!("{}.js", self.config.app_target.to_lowercase());
            let theme_color = self
                .manifest
                .lock()
                .as_ref()
                .and_then(|m| m.theme_color.clone());
            let html = index_html(
                &app_js,
                self.config.app_type == AppType::Pwa,
                theme_color.as_deref(),
            );
            std::fs::write(&index_path, html).with_path(&index_path)?;
        }
        Ok(index_path)
    }
}

/// Generate the webpack config for one JS entry.
fn webpack_config(dev: bool, js_file: &str, dest: &std::path::Path) -> String {
    let point = ProjectConfig::point(dev);
    let mode = if dev { "development" } else { "production" };
    format!(
        r#"module.exports = {{
  entry: "./entrypoint/{point}/{js_file}",
  mode: "{mode}",
  output: {{
    filename: "{js_file}",
    path: "{dest}",
  }},
}};
"#,
        dest = dest.display()
    )
}

/// Generate the JS entry glue for a target.
///
/// The glue instantiates the wasm binary through WASI, reports loading
/// progress to the HTML shell, and in dev mode opens the reload channel.
fn js_entry(dev: bool, wasm_filename: &str, service_worker: bool) -> String {
    let mut file = String::new();

    if service_worker {
        file.push_str(
            r#"self.serviceInstallWasCalled = false;
self.serviceInstalled = false;

const serviceWorkerInstallPromise = new Promise((resolve, reject) => {
    function check(resolve) {
        setTimeout(() => {
            if (self.serviceInstalled) {
                resolve();
            } else if (self.serviceInstallationError) {
                reject(self.serviceInstallationError);
            } else {
                check(resolve);
            }
        }, 1000);
    }
    check(resolve);
});

self.addEventListener('install', (event) => {
    self.serviceInstallWasCalled = true;
    event.waitUntil(serviceWorkerInstallPromise);
});
self.addEventListener('activate', (event) => {
    self.activate(event);
});
self.addEventListener('fetch', (event) => {
    self.fetch(event);
});
self.addEventListener('message', (event) => {
    self.message(event);
});
self.addEventListener('push', (event) => {
    self.push(event);
});

"#,
        );
    }

    file.push_str("import { SwiftRuntime } from \"javascript-kit-swift\";\n");
    file.push_str("import { WASI } from \"@wasmer/wasi\";\n");
    file.push_str("import { WasmFs } from \"@wasmer/wasmfs\";\n");
    if dev {
        file.push_str("import ReconnectingWebSocket from \"reconnecting-websocket\";\n");
    }

    file.push_str(
        "\nconst swift = new SwiftRuntime();\n\nconst wasmFs = new WasmFs();\n",
    );

    if dev {
        file.push_str(
            r#"
const wsProtocol = location.protocol === "https:" ? "wss" : "ws";
const socket = new ReconnectingWebSocket(`${wsProtocol}://${location.host}/skiff`);
socket.addEventListener("message", (message) => {
    if (message.data === "wasmRecompiled") {
        location.reload();
    } else if (message.data === "entrypointRecooked") {
        location.reload();
    }
});
"#,
        );
    }

    file.push_str(
        r#"
// Forward stdout and stderr to the console
const originalWriteSync = wasmFs.fs.writeSync;
wasmFs.fs.writeSync = (fd, buffer, offset, length, position) => {
    const text = new TextDecoder("utf-8").decode(buffer);
    if (text !== "\n") {
        switch (fd) {
        case 1:
            console.log(text);
            break;
        case 2:
            console.error(text);
            break;
        }
    }
    return originalWriteSync(fd, buffer, offset, length, position);
};

const wasi = new WASI({
    args: [],
    env: {},
    bindings: {
        ...WASI.defaultBindings,
        fs: wasmFs.fs,
    },
});
"#,
    );

    file.push_str(&format!(
        r#"
const startWasiTask = async () => {{
    const response = await fetch("/{wasm_filename}.wasm");
    const reader = response.body.getReader();
    const contentLength = +response.headers.get('Content-Length');
"#
    ));

    if !service_worker {
        file.push_str(
            r#"
    if (response.status == 200) {
        if (contentLength > 0) {
            document.dispatchEvent(new Event('WASMLoadingStarted'));
            document.dispatchEvent(new CustomEvent('WASMLoadingProgress', { detail: 0 }));
        } else {
            document.dispatchEvent(new Event('WASMLoadingStartedWithoutProgress'));
        }
    } else if (response.status != 304) {
        document.dispatchEvent(new Event('WASMLoadingError'));
    }
"#,
        );
    }

    file.push_str(
        r#"
    let receivedLength = 0;
    let chunks = [];
    while (true) {
        const {done, value} = await reader.read();
        if (done) {
            break;
        }
        chunks.push(value);
        receivedLength += value.length;
"#,
    );

    if !service_worker {
        file.push_str(
            r#"        if (contentLength > 0) {
            document.dispatchEvent(new CustomEvent('WASMLoadingProgress', { detail: Math.trunc(receivedLength / (contentLength / 100)) }));
        }
"#,
        );
    }

    file.push_str(
        r#"    }

    let wasmBytes = new Uint8Array(receivedLength);
    let position = 0;
    for (let chunk of chunks) {
        wasmBytes.set(chunk, position);
        position += chunk.length;
    }

    const { instance } = await WebAssembly.instantiate(wasmBytes.buffer, {
        wasi_snapshot_preview1: wasi.wasiImport,
        javascript_kit: swift.importObjects(),
    });

    swift.setInstance(instance);
    wasi.start(instance);
};

function handleError(e) {
    console.error(e);
    if (e instanceof WebAssembly.RuntimeError) {
        console.log(e.stack);
    }
}

try {
    startWasiTask().catch(handleError);
} catch (e) {
    handleError(e);
}
"#,
    );

    file
}

/// Generate the index.html shell with the loading screen.
fn index_html(app_js: &str, pwa: bool, theme_color: Option<&str>) -> String {
    let mut headlines: Vec<String> = vec![
        "<title>&lrm;</title>".to_string(),
        r#"<meta charset="utf-8" />"#.to_string(),
        r#"<meta name="viewport" content="width=device-width, initial-scale=1" />"#.to_string(),
        r#"<meta name="description" content="An awesome Swift web app">"#.to_string(),
    ];
    if pwa {
        if let Some(color) = theme_color {
            headlines.push(format!(r#"<meta name="theme-color" content="{color}">"#));
        }
        headlines.push(r#"<link rel="manifest" href="./manifest.json">"#.to_string());
    }
    headlines.push(format!(
        r#"<script type="text/javascript" src="{app_js}" async></script>"#
    ));

    format!(
        r#"<!DOCTYPE html>
<html lang="en-US">
    <head>
        {headlines}
    </head>
    <body>
        <style>
        * {{ box-sizing: border-box; }}
        body {{
            background-color: #f4f4f4;
            flex-direction: column;
            font-family: system, 'apple-system', 'San Francisco', 'Roboto', 'Segoe UI', 'Helvetica Neue', sans-serif;
            display: flex;
            align-items: center;
            justify-content: center;
            height: 100vh;
            margin: 0;
        }}
        h3 {{ color: #d5d5d5; }}
        h4 {{ color: #dfdfdf; }}
        .error {{ color: #ff2b2b!important; }}
        .progress {{
            position: fixed;
            left: 0px;
            top: 0px;
            height: 3px;
            width: 100%;
        }}
        .progress-bar {{ color: #fff; height: 100%; }}
        @keyframes bar {{
            0% {{ transform: translateX(0); }}
            100% {{ transform: translateX(100%); }}
        }}
        .progress-bar-indeterminate {{
            animation: bar 1.8s ease infinite;
            width: 100%;
        }}
        .progress-bar-determinate {{
            display: flex;
            align-items: center;
            justify-content: center;
            width: 0;
            background: linear-gradient(to left, #F2709C, #FF9472);
        }}
        </style>
        <h3>Loading</h3>
        <h4></h4>
        <div class="progress">
            <div class="progress-bar"></div>
        </div>
        <script>
        document.addEventListener('WASMLoadingStarted', (event) => {{
            const progress = document.querySelector('.progress-bar');
            progress.classList.add("progress-bar-determinate");
        }});
        document.addEventListener('WASMLoadingStartedWithoutProgress', (event) => {{
            const progress = document.querySelector('.progress-bar');
            progress.classList.add("progress-bar-indeterminate");
        }});
        document.addEventListener('WASMLoadingProgress', (event) => {{
            const bar = document.querySelector('.progress-bar');
            bar.style.width = '' + event.detail + '%';
            const label = document.querySelector('h4');
            label.innerText = event.detail + '%';
        }});
        document.addEventListener('WASMLoadingError', (event) => {{
            const label = document.querySelector('h4');
            label.classList.add("error");
            label.innerText = 'Unable to load application, please try to reload page';
        }});
        </script>
    </body>
</html>
"#,
        headlines = headlines.join("\n        ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_glue_opens_reload_channel() {
        let glue = js_entry(true, "app", false);
        assert!(glue.contains("ReconnectingWebSocket"));
        assert!(glue.contains("/skiff"));
        assert!(glue.contains("wasmRecompiled"));
        assert!(glue.contains("entrypointRecooked"));
        assert!(glue.contains(r#"fetch("/app.wasm")"#));
    }

    #[test]
    fn release_glue_has_no_reload_channel() {
        let glue = js_entry(false, "app", false);
        assert!(!glue.contains("ReconnectingWebSocket"));
        assert!(!glue.contains("wasmRecompiled"));
    }

    #[test]
    fn service_worker_glue_skips_loading_events() {
        let glue = js_entry(true, "service", true);
        assert!(glue.contains("addEventListener('install'"));
        assert!(!glue.contains("WASMLoadingProgress"));
    }

    #[test]
    fn index_html_links_manifest_for_pwa() {
        let html = index_html("app.js", true, Some("#aabbcc"));
        assert!(html.contains(r#"<link rel="manifest" href="./manifest.json">"#));
        assert!(html.contains(r##"<meta name="theme-color" content="#aabbcc">"##));
        assert!(html.contains(r#"src="app.js""#));
    }

    #[test]
    fn index_html_spa_has_no_manifest() {
        let html = index_html("app.js", false, None);
        assert!(!html.contains("manifest.json"));
        assert!(html.contains("WASMLoadingStarted"));
    }

    #[test]
    fn webpack_config_points_at_entry_and_dest() {
        let config = webpack_config(true, "app.js", std::path::Path::new("/proj/.skiff/dev"));
        assert!(config.contains(r#"entry: "./entrypoint/dev/app.js""#));
        assert!(config.contains(r#"mode: "development""#));
        assert!(config.contains(r#"path: "/proj/.skiff/dev""#));

        let release = webpack_config(false, "app.js", std::path::Path::new("/proj/.skiff/release"));
        assert!(release.contains(r#"mode: "production""#));
        assert!(release.contains("entrypoint/release/app.js"));
    }

    #[test]
    fn existing_entry_files_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig {
            workdir: dir.path().to_path_buf(),
            app_type: AppType::Spa,
            app_target: "App".to_string(),
            service_worker_target: None,
        };
        let cook = Cook::new(config);

        // Hand-authored entry survives cooking.
        let entry_dir = cook.entrypoint_point(true);
        std::fs::create_dir_all(&entry_dir).unwrap();
        let custom = entry_dir.join("index.html");
        std::fs::write(&custom, "<html>custom</html>").unwrap();

        let index = cook.ensure_index_html(true).unwrap();
        assert_eq!(std::fs::read_to_string(index).unwrap(), "<html>custom</html>");
    }
}
