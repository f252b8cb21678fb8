use thiserror::Error;

use shim_loader::{Address, LoaderError};

use crate::Encoding;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Symbol {0} appears more than once in the resolution table")]
    DuplicateSymbol(&'static str),

    #[error("Unresolved imports: {}", .0.join(", "))]
    Unresolved(Vec<String>),
}

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Patch target {0} is not defined by the module")]
    SymbolNotFound(&'static str),

    #[error("{symbol} at {address} is not aligned for a {encoding:?} trampoline")]
    Misaligned { symbol: &'static str, address: Address, encoding: Encoding },

    #[error("Address {0} does not fit in a 32-bit literal")]
    AddressOutOfRange(Address),

    #[error("{symbol} at {address} already holds this trampoline")]
    AlreadyPatched { symbol: &'static str, address: Address },

    #[error("Patches for {first} and {second} overlap")]
    Overlapping { first: &'static str, second: &'static str },

    #[error("{0}")]
    Memory(#[from] LoaderError),
}
