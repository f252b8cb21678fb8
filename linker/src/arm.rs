//! Trampoline encodings for the two ARM instruction sets.
//!
//! Both encodings load the replacement address from a literal placed right after the
//! instruction, so a trampoline reaches anywhere in the 32-bit address space and never
//! needs a scratch register.

use shim_loader::Address;

/// `LDR PC, [PC, #-4]`
pub const ARM_LDR_PC: u32 = 0xE51F_F004;

/// Thumb `NOP`, used to pad a trampoline onto a word boundary.
pub const THUMB_NOP: u16 = 0xBF00;

/// `LDR.W PC, [PC]`, as its two halfwords in instruction order.
pub const THUMB_LDR_W_PC: [u16; 2] = [0xF8DF, 0xF000];

/// Size of an encoded trampoline, without padding.
pub const TRAMPOLINE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// The target cannot hold an instruction of this encoding.
    Misaligned,

    /// The replacement address does not fit in the 32-bit literal.
    ReplacementOutOfRange,
}

/// Bytes to write into the module, starting at `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trampoline {
    pub address: Address,
    pub bytes: Vec<u8>,
}

impl Trampoline {
    /// One past the last byte written.
    pub fn end(&self) -> usize {
        self.address.get() + self.bytes.len()
    }
}

/// Encodes an ARM (A32) branch to `replacement` at `target`.
///
/// The target must be word aligned, which also rules out a target carrying the Thumb bit.
pub fn arm32(target: Address, replacement: Address) -> Result<Trampoline, EncodeError> {
    if !target.is_aligned(4) {
        return Err(EncodeError::Misaligned);
    }

    let literal = replacement.to_u32().ok_or(EncodeError::ReplacementOutOfRange)?;

    let mut bytes = Vec::with_capacity(TRAMPOLINE_LEN);
    bytes.extend_from_slice(&ARM_LDR_PC.to_le_bytes());
    bytes.extend_from_slice(&literal.to_le_bytes());

    Ok(Trampoline { address: target, bytes })
}

/// Encodes a Thumb-2 branch to `replacement` at `target`.
///
/// `target` may carry the interworking bit. `LDR.W PC, [PC]` reads its literal from the
/// next word boundary, so a target that is only halfword aligned gets a `NOP` first and
/// the trampoline starts two bytes later.
pub fn thumb16(target: Address, replacement: Address) -> Result<Trampoline, EncodeError> {
    let start = target.code();
    let literal = replacement.to_u32().ok_or(EncodeError::ReplacementOutOfRange)?;

    let mut bytes = Vec::with_capacity(TRAMPOLINE_LEN + 2);

    if start.get() & 2 != 0 {
        bytes.extend_from_slice(&THUMB_NOP.to_le_bytes());
    }

    for halfword in THUMB_LDR_W_PC {
        bytes.extend_from_slice(&halfword.to_le_bytes());
    }

    bytes.extend_from_slice(&literal.to_le_bytes());

    Ok(Trampoline { address: start, bytes })
}
