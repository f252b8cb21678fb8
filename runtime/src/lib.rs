//! Startup and steady state of the shim.
//!
//! This crate owns the process context, the host functions the module is bound or
//! patched to, and the orchestrator that walks the module through loading, linking,
//! patching and initialization before handing the three long-lived loops (render, input,
//! audio) their threads.

mod config;
pub use config::{Config, ModulePaths, DATA_PATH, MODULE_FILE, ROOT_PATH};

mod context;
pub use context::Context;

pub mod entry;
pub use entry::EntryPoints;

mod errors;
pub use errors::StartupError;

pub mod hooks;

pub mod imports;

mod lifecycle;
pub use lifecycle::{startup, Orchestrator, Running, Stage, AUDIO_THREAD, INPUT_THREAD};

pub mod patches;

/// Simple shorthand for Result types.
pub type Result<T> = std::result::Result<T, StartupError>;
