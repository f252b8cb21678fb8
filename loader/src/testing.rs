//! An in-memory loader for tests. The "image" is a plain byte buffer mapped at a fixed
//! base address, with symbol and import tables supplied by the test.

use std::collections::HashMap;

use crate::{
    Address, ImageMemory, ImageRange, InstructionCache, LoadedModule, LoaderError, ModuleLoader, Result, SymbolBinding,
    SymbolLookup,
};

#[derive(Debug, Clone)]
pub struct FakeModule {
    path: String,
    image: ImageRange,
    memory: Vec<u8>,
    symbols: HashMap<String, Address>,
    imports: Vec<String>,

    /// Bindings handed over by `bind_imports`, in order.
    pub bound: Vec<SymbolBinding>,

    /// Every loader-facing call, in order (`relocate`, `bind`, `write`, `flush`, `init`).
    pub calls: Vec<&'static str>,
}

impl FakeModule {
    /// A zero-filled image of `size` bytes mapped at `base`.
    pub fn new(base: usize, size: usize) -> Self {
        Self {
            path: "fake.so".to_string(),
            image: ImageRange::new(Address::new(base), size),
            memory: vec![0; size],
            symbols: HashMap::new(),
            imports: Vec::new(),
            bound: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_symbol(mut self, name: &str, address: usize) -> Self {
        self.symbols.insert(name.to_string(), Address::new(address));
        self
    }

    pub fn with_import(mut self, name: &str) -> Self {
        self.imports.push(name.to_string());
        self
    }

    /// A copy of `len` bytes at `address`. Panics if out of bounds.
    pub fn bytes_at(&self, address: usize, len: usize) -> Vec<u8> {
        let start = address - self.image.base.get();
        self.memory[start..start + len].to_vec()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    fn range(&self, address: Address, len: usize) -> Result<std::ops::Range<usize>> {
        let start = self.image.offset_of(address, len).ok_or(LoaderError::OutOfBounds { address, len })?;

        Ok(start..start + len)
    }
}

impl SymbolLookup for FakeModule {
    fn lookup_symbol(&self, name: &str) -> Option<Address> {
        self.symbols.get(name).copied()
    }
}

impl ImageMemory for FakeModule {
    fn read(&self, address: Address, buf: &mut [u8]) -> Result<()> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.memory[range]);
        Ok(())
    }

    fn write(&mut self, address: Address, bytes: &[u8]) -> Result<()> {
        let range = self.range(address, bytes.len())?;
        self.memory[range].copy_from_slice(bytes);
        self.calls.push("write");
        Ok(())
    }
}

impl InstructionCache for FakeModule {
    fn flush_instruction_cache(&mut self) {
        self.calls.push("flush");
    }
}

impl LoadedModule for FakeModule {
    fn path(&self) -> &str {
        &self.path
    }

    fn relocate(&mut self) -> Result<()> {
        self.calls.push("relocate");
        Ok(())
    }

    fn imports(&self) -> Result<Vec<String>> {
        Ok(self.imports.clone())
    }

    fn bind_imports(&mut self, bindings: &[SymbolBinding]) -> Result<()> {
        self.bound.extend_from_slice(bindings);
        self.calls.push("bind");
        Ok(())
    }

    fn run_static_initializers(&mut self) -> Result<()> {
        self.calls.push("init");
        Ok(())
    }
}

/// Hands out one prepared `FakeModule`; a second load fails the way a missing file would.
#[derive(Debug)]
pub struct FakeLoader {
    module: Option<FakeModule>,
}

impl FakeLoader {
    pub fn new(module: FakeModule) -> Self {
        Self { module: Some(module) }
    }
}

impl ModuleLoader for FakeLoader {
    type Module = FakeModule;

    fn load(&mut self, path: &str) -> Result<FakeModule> {
        let mut module = self.module.take().ok_or_else(|| LoaderError::Load { path: path.to_string(), code: -1 })?;
        module.path = path.to_string();
        Ok(module)
    }
}
