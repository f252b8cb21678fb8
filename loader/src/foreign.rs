//! Adapters over the host's loader library.
//!
//! The loader is written in C and linked into the host, which hands the shim a table of
//! function pointers at startup. Everything `unsafe` about calling through that table is
//! contained here; the rest of the workspace only sees the traits from the crate root.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::ptr::NonNull;

use shim_logger::Log;

use crate::{
    Address, ImageMemory, ImageRange, InstructionCache, LoadedModule, LoaderError, ModuleLoader, Result, SymbolBinding,
    SymbolLookup,
};

/// One entry of the table passed to the loader's resolver. Mirrors the loader's own
/// `DynLibFunction` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DynLibFunction {
    pub symbol: *const c_char,
    pub func: usize,
}

/// The function table the host passes in. Every pointer must be valid for the lifetime
/// of the process.
///
/// Status-returning functions return a negative value on failure.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ForeignLoaderFns {
    /// Maps the image at `path`; returns an opaque module handle, or null on failure.
    pub load: unsafe extern "C" fn(path: *const c_char) -> *mut c_void,
    /// Writes the base address and size of the mapped image.
    pub image_range: unsafe extern "C" fn(module: *mut c_void, base: *mut usize, size: *mut usize) -> c_int,
    pub relocate: unsafe extern "C" fn(module: *mut c_void) -> c_int,
    pub import_count: unsafe extern "C" fn(module: *mut c_void) -> c_uint,
    /// Returns the name of import `index`, owned by the loader.
    pub import_name: unsafe extern "C" fn(module: *mut c_void, index: c_uint) -> *const c_char,
    pub resolve: unsafe extern "C" fn(module: *mut c_void, table: *const DynLibFunction, count: c_uint) -> c_int,
    /// Returns the address of a defined symbol, or 0.
    pub symbol: unsafe extern "C" fn(module: *mut c_void, name: *const c_char) -> usize,
    /// Copies into memory regardless of page protection (code pages are read-only).
    pub unrestricted_memcpy: unsafe extern "C" fn(dst: *mut c_void, src: *const c_void, len: usize) -> c_int,
    pub flush_caches: unsafe extern "C" fn(module: *mut c_void),
    pub initialize: unsafe extern "C" fn(module: *mut c_void) -> c_int,
}

/// A `ModuleLoader` backed by the host's loader library.
#[derive(Debug, Clone, Copy)]
pub struct ForeignLoader {
    fns: ForeignLoaderFns,
}

impl ForeignLoader {
    pub fn new(fns: ForeignLoaderFns) -> Self {
        Self { fns }
    }
}

impl ModuleLoader for ForeignLoader {
    type Module = ForeignModule;

    fn load(&mut self, path: &str) -> Result<ForeignModule> {
        let c_path = CString::new(path)?;

        // The loader copies the path; it doesn't need to outlive this call.
        let handle = unsafe { (self.fns.load)(c_path.as_ptr()) };

        let handle = NonNull::new(handle).ok_or_else(|| LoaderError::Load { path: path.to_string(), code: -1 })?;

        let mut base = 0usize;
        let mut size = 0usize;
        let code = unsafe { (self.fns.image_range)(handle.as_ptr(), &mut base, &mut size) };

        if code < 0 || base == 0 {
            return Err(LoaderError::ImageRange { path: path.to_string(), code });
        }

        let image = ImageRange::new(Address::new(base), size);

        tracing::info!(target: Log::Loader, path, base = %image.base, size, "Loaded module");

        Ok(ForeignModule { fns: self.fns, handle, image, path: path.to_string() })
    }
}

/// A module living inside the host's loader.
#[derive(Debug)]
pub struct ForeignModule {
    fns: ForeignLoaderFns,
    handle: NonNull<c_void>,
    image: ImageRange,
    path: String,
}

impl ForeignModule {
    fn raw(&self) -> *mut c_void {
        self.handle.as_ptr()
    }

    pub fn image(&self) -> ImageRange {
        self.image
    }

    fn check(&self, address: Address, len: usize) -> Result<()> {
        match self.image.offset_of(address, len) {
            Some(_) => Ok(()),
            None => Err(LoaderError::OutOfBounds { address, len }),
        }
    }
}

impl SymbolLookup for ForeignModule {
    fn lookup_symbol(&self, name: &str) -> Option<Address> {
        let c_name = CString::new(name).ok()?;
        let address = unsafe { (self.fns.symbol)(self.raw(), c_name.as_ptr()) };

        match address {
            0 => None,
            address => Some(Address::new(address)),
        }
    }
}

impl ImageMemory for ForeignModule {
    fn read(&self, address: Address, buf: &mut [u8]) -> Result<()> {
        self.check(address, buf.len())?;

        // Every mapped page of the module is readable, including code.
        unsafe {
            std::ptr::copy_nonoverlapping(address.get() as *const u8, buf.as_mut_ptr(), buf.len());
        }

        Ok(())
    }

    fn write(&mut self, address: Address, bytes: &[u8]) -> Result<()> {
        self.check(address, bytes.len())?;

        let code = unsafe {
            (self.fns.unrestricted_memcpy)(address.get() as *mut c_void, bytes.as_ptr() as *const c_void, bytes.len())
        };

        if code < 0 {
            return Err(LoaderError::Write { address, len: bytes.len(), code });
        }

        Ok(())
    }
}

impl InstructionCache for ForeignModule {
    fn flush_instruction_cache(&mut self) {
        unsafe { (self.fns.flush_caches)(self.raw()) }
    }
}

impl LoadedModule for ForeignModule {
    fn path(&self) -> &str {
        &self.path
    }

    fn relocate(&mut self) -> Result<()> {
        match unsafe { (self.fns.relocate)(self.raw()) } {
            code if code < 0 => Err(LoaderError::Relocate { path: self.path.clone(), code }),
            _ => Ok(()),
        }
    }

    fn imports(&self) -> Result<Vec<String>> {
        let count = unsafe { (self.fns.import_count)(self.raw()) };

        (0..count)
            .map(|index| {
                let name = unsafe { (self.fns.import_name)(self.raw(), index) };

                if name.is_null() {
                    return Err(LoaderError::ImportName { path: self.path.clone(), index });
                }

                // The loader owns the string table and keeps it alive with the module.
                let name = unsafe { CStr::from_ptr(name) };

                name.to_str()
                    .map(str::to_string)
                    .map_err(|_| LoaderError::ImportName { path: self.path.clone(), index })
            })
            .collect()
    }

    fn bind_imports(&mut self, bindings: &[SymbolBinding]) -> Result<()> {
        let names = bindings
            .iter()
            .map(|binding| CString::new(binding.name.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let table = names
            .iter()
            .zip(bindings)
            .map(|(name, binding)| DynLibFunction { symbol: name.as_ptr(), func: binding.address.get() })
            .collect::<Vec<_>>();

        // `names` keeps every symbol string alive until the resolver returns.
        let code = unsafe { (self.fns.resolve)(self.raw(), table.as_ptr(), table.len() as c_uint) };

        if code < 0 {
            return Err(LoaderError::BindImports { path: self.path.clone(), code });
        }

        Ok(())
    }

    fn run_static_initializers(&mut self) -> Result<()> {
        match unsafe { (self.fns.initialize)(self.raw()) } {
            code if code < 0 => Err(LoaderError::Initialize { path: self.path.clone(), code }),
            _ => Ok(()),
        }
    }
}
