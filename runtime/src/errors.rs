use thiserror::Error;

use shim_linker::{PatchError, ResolveError};
use shim_loader::LoaderError;

use crate::Stage;

/// Anything that stops the module from reaching `Running`. None of these are retried.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("Cannot move to {attempted:?} while the module is {current:?}")]
    OutOfOrder { current: Stage, attempted: Stage },

    #[error("Module does not export entry point {0}")]
    MissingEntryPoint(&'static str),

    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("The process context is already installed")]
    ContextInstalled,

    #[error("Failed to spawn {name}: {source}")]
    ThreadSpawnFailure {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}
