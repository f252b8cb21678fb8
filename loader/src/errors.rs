use thiserror::Error;

use crate::Address;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Could not load {path} (loader returned {code})")]
    Load { path: String, code: i32 },

    #[error("Could not query the mapped range of {path} (loader returned {code})")]
    ImageRange { path: String, code: i32 },

    #[error("Failed to relocate {path} (loader returned {code})")]
    Relocate { path: String, code: i32 },

    #[error("Failed to bind imports of {path} (loader returned {code})")]
    BindImports { path: String, code: i32 },

    #[error("Static initializers of {path} failed (loader returned {code})")]
    Initialize { path: String, code: i32 },

    #[error("Import #{index} of {path} has no readable name")]
    ImportName { path: String, index: u32 },

    #[error("Name contains an interior NUL byte: {0}")]
    InvalidName(#[from] std::ffi::NulError),

    #[error("Access of {len} bytes at {address} is outside the module image")]
    OutOfBounds { address: Address, len: usize },

    #[error("Unable to write {len} bytes at {address} (loader returned {code})")]
    Write { address: Address, len: usize, code: i32 },
}
