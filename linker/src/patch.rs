use shim_loader::{Address, ImageMemory, InstructionCache, SymbolLookup};
use shim_logger::Log;

use crate::arm::{self, EncodeError, Trampoline};
use crate::PatchError;

/// Which instruction set the patched function is compiled for. Always chosen by the
/// caller; the applier never guesses from the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Arm32,
    Thumb16,
}

/// Redirects a function the module defines to a host replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHook {
    pub symbol: &'static str,
    pub replacement: Address,
    pub encoding: Encoding,
}

/// Overwrites a data symbol the module defines with raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPatch {
    pub symbol: &'static str,
    pub bytes: Vec<u8>,
}

/// A set of patches applied together, once, after relocation.
#[derive(Debug, Clone, Default)]
pub struct PatchBatch {
    hooks: Vec<FunctionHook>,
    data: Vec<DataPatch>,
}

/// A write the batch has validated but not yet performed.
#[derive(Debug)]
struct PlannedWrite {
    symbol: &'static str,
    hook: bool,
    trampoline: Trampoline,
}

impl PatchBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hook(mut self, symbol: &'static str, replacement: Address, encoding: Encoding) -> Self {
        self.hooks.push(FunctionHook { symbol, replacement, encoding });
        self
    }

    pub fn data(mut self, symbol: &'static str, bytes: impl Into<Vec<u8>>) -> Self {
        self.data.push(DataPatch { symbol, bytes: bytes.into() });
        self
    }

    /// A data patch holding one little-endian 32-bit integer.
    pub fn data_i32(self, symbol: &'static str, value: i32) -> Self {
        self.data(symbol, value.to_le_bytes())
    }

    pub fn hooks(&self) -> &[FunctionHook] {
        &self.hooks
    }

    pub fn data_patches(&self) -> &[DataPatch] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.hooks.len() + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies every patch in the batch to `module`.
    ///
    /// The whole batch is validated before the first write: every symbol must resolve,
    /// every hook must encode, no two writes may overlap and no hook may already hold
    /// its trampoline. A failing batch leaves the module untouched.
    ///
    /// Nothing patched may run until the returned token is flushed.
    pub fn apply<M>(self, module: &mut M) -> Result<PendingFlush, PatchError>
    where
        M: SymbolLookup + ImageMemory + ?Sized,
    {
        let plan = self.plan(module)?;

        for write in &plan {
            module.write(write.trampoline.address, &write.trampoline.bytes)?;

            if write.hook {
                tracing::debug!(
                    target: Log::Linker,
                    symbol = write.symbol,
                    address = %write.trampoline.address,
                    "Hooked function"
                );
            } else {
                tracing::debug!(
                    target: Log::Linker,
                    symbol = write.symbol,
                    address = %write.trampoline.address,
                    len = write.trampoline.bytes.len(),
                    "Patched data"
                );
            }
        }

        tracing::info!(target: Log::Linker, patches = plan.len(), "Applied patch batch");

        Ok(PendingFlush { writes: plan.len() })
    }

    fn plan<M>(&self, module: &M) -> Result<Vec<PlannedWrite>, PatchError>
    where
        M: SymbolLookup + ImageMemory + ?Sized,
    {
        let mut plan = Vec::with_capacity(self.len());

        for hook in &self.hooks {
            let target = resolve(module, hook.symbol)?;

            let encoded = match hook.encoding {
                Encoding::Arm32 => arm::arm32(target, hook.replacement),
                Encoding::Thumb16 => arm::thumb16(target, hook.replacement),
            };

            let trampoline = encoded.map_err(|e| match e {
                EncodeError::Misaligned => {
                    PatchError::Misaligned { symbol: hook.symbol, address: target, encoding: hook.encoding }
                },
                EncodeError::ReplacementOutOfRange => PatchError::AddressOutOfRange(hook.replacement),
            })?;

            let mut current = vec![0; trampoline.bytes.len()];
            module.read(trampoline.address, &mut current)?;

            if current == trampoline.bytes {
                return Err(PatchError::AlreadyPatched { symbol: hook.symbol, address: target });
            }

            plan.push(PlannedWrite { symbol: hook.symbol, hook: true, trampoline });
        }

        for patch in &self.data {
            let address = resolve(module, patch.symbol)?;

            // Probe the range so an out-of-image target fails before anything is written.
            let mut current = vec![0; patch.bytes.len()];
            module.read(address, &mut current)?;

            let trampoline = Trampoline { address, bytes: patch.bytes.clone() };
            plan.push(PlannedWrite { symbol: patch.symbol, hook: false, trampoline });
        }

        check_overlaps(&plan)?;

        Ok(plan)
    }
}

fn resolve<M: SymbolLookup + ?Sized>(module: &M, symbol: &'static str) -> Result<Address, PatchError> {
    module.lookup_symbol(symbol).ok_or(PatchError::SymbolNotFound(symbol))
}

fn check_overlaps(plan: &[PlannedWrite]) -> Result<(), PatchError> {
    let mut ranges = plan
        .iter()
        .map(|write| (write.trampoline.address.get(), write.trampoline.end(), write.symbol))
        .collect::<Vec<_>>();

    ranges.sort_unstable_by_key(|(start, _, _)| *start);

    for pair in ranges.windows(2) {
        let (_, first_end, first) = pair[0];
        let (second_start, _, second) = pair[1];

        if second_start < first_end {
            return Err(PatchError::Overlapping { first, second });
        }
    }

    Ok(())
}

/// Proof that patches were written and the instruction cache still has to be flushed.
#[must_use = "patched code must not run before the instruction cache is flushed"]
#[derive(Debug)]
pub struct PendingFlush {
    writes: usize,
}

impl PendingFlush {
    /// Number of writes the batch performed.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn flush<C: InstructionCache + ?Sized>(self, cache: &mut C) {
        cache.flush_instruction_cache();
        tracing::debug!(target: Log::Linker, writes = self.writes, "Flushed instruction cache");
    }
}
