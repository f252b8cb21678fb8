//! The seam between the shim and the external foreign-image loader.
//!
//! Parsing the image, mapping its segments and applying base relocations all happen in a
//! loader library the host links in; the shim never looks inside the image format. What
//! lives here is the narrow surface the rest of the workspace drives that loader through:
//! a handful of traits, the `Address` type shared by everything, and an adapter that
//! implements the traits over the host's `so_util`-style function table.

mod address;
pub use address::{Address, ImageRange};

mod errors;
pub use errors::LoaderError;

mod foreign;
pub use foreign::{DynLibFunction, ForeignLoader, ForeignLoaderFns, ForeignModule};

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

/// Simple shorthand for Result types.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A name the module imports, bound to the host address that implements it.
///
/// Immutable once built; the set handed to [`LoadedModule::bind_imports`] is produced once
/// at startup by the resolution table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolBinding {
    pub name: String,
    pub address: Address,
}

/// Produces modules from image files.
pub trait ModuleLoader {
    type Module: LoadedModule;

    /// Loads the image at `path` into memory. The returned module is mapped but not yet
    /// relocated.
    fn load(&mut self, path: &str) -> Result<Self::Module>;
}

/// Read-only name lookup against a relocated module.
pub trait SymbolLookup {
    /// The address of the symbol the module *defines* under `name`, or `None`.
    fn lookup_symbol(&self, name: &str) -> Option<Address>;
}

/// Raw access to the module's mapped memory, code pages included.
///
/// Accesses that do not fall entirely inside the mapped image fail with
/// [`LoaderError::OutOfBounds`] and touch nothing.
pub trait ImageMemory {
    fn read(&self, address: Address, buf: &mut [u8]) -> Result<()>;

    /// Writes regardless of page protection. Writes to code are not visible to
    /// instruction fetch until [`InstructionCache::flush_instruction_cache`] runs.
    fn write(&mut self, address: Address, bytes: &[u8]) -> Result<()>;
}

pub trait InstructionCache {
    fn flush_instruction_cache(&mut self);
}

/// A loaded module and everything the lifecycle needs to do to it.
pub trait LoadedModule: SymbolLookup + ImageMemory + InstructionCache {
    /// The path the module was loaded from, for diagnostics.
    fn path(&self) -> &str;

    fn relocate(&mut self) -> Result<()>;

    /// Names the module references but does not define.
    fn imports(&self) -> Result<Vec<String>>;

    /// Writes the bound addresses into the module's import slots.
    fn bind_imports(&mut self, bindings: &[SymbolBinding]) -> Result<()>;

    /// Runs the module's own constructors (`.init_array`).
    fn run_static_initializers(&mut self) -> Result<()>;
}
