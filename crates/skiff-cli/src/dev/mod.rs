//! Development-mode plumbing: rebuild coordination, the notification hub
//! and the dev server.

pub mod coordinator;
pub mod server;
pub mod state;

pub use coordinator::{RebuildCoordinator, RebuildState};
pub use server::DevServer;
pub use state::{DevState, SharedState};

/// Notification pushed to connected clients over the reload channel.
///
/// The wire format is the plain string token; clients reload on either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A wasm rebuild cycle finished successfully
    WasmRecompiled,
    /// The entrypoint assets were re-cooked
    EntrypointRecooked,
}

impl Notification {
    /// The token sent over the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Notification::WasmRecompiled => "wasmRecompiled",
            Notification::EntrypointRecooked => "entrypointRecooked",
        }
    }
}
