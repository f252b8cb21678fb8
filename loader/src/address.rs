use std::fmt;

/// An address in the shared address space of the host and the loaded module.
///
/// Function addresses inside the module keep the Thumb interworking bit (bit 0) exactly
/// as the symbol table reports them; use [`Address::code`] to get the address of the
/// first instruction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(usize);

impl Address {
    pub const NULL: Address = Address(0);

    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// The address of a host function, as the module will see it.
    pub fn of_fn(f: *const ()) -> Self {
        Self(f as usize)
    }

    /// The address of a host data object.
    pub fn of<T>(object: *const T) -> Self {
        Self(object as usize)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// The address with the interworking bit cleared.
    pub const fn code(self) -> Self {
        Self(self.0 & !1)
    }

    pub const fn is_aligned(self, align: usize) -> bool {
        self.0 % align == 0
    }

    pub fn checked_add(self, offset: usize) -> Option<Self> {
        self.0.checked_add(offset).map(Self)
    }

    /// The address as it is stored in a 32-bit literal slot of the module.
    pub fn to_u32(self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for Address {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}

/// The span the loader mapped the module into. Every access to module memory has to fall
/// entirely inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRange {
    pub base: Address,
    pub size: usize,
}

impl ImageRange {
    pub const fn new(base: Address, size: usize) -> Self {
        Self { base, size }
    }

    /// The offset of `address` from the base, if all `len` bytes from there lie inside
    /// the image.
    pub fn offset_of(&self, address: Address, len: usize) -> Option<usize> {
        let end = address.checked_add(len)?;
        let image_end = self.base.checked_add(self.size)?;

        (address >= self.base && end <= image_end).then(|| address.get() - self.base.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thumb_bit_is_cleared_for_code_address() {
        assert_eq!(Address::new(0x1001).code(), Address::new(0x1000));
        assert_eq!(Address::new(0x1000).code(), Address::new(0x1000));
    }

    #[test]
    fn image_range_accepts_only_accesses_inside_the_image() {
        let image = ImageRange::new(Address::new(0x1000), 0x100);

        assert_eq!(image.offset_of(Address::new(0x1000), 0x100), Some(0));
        assert_eq!(image.offset_of(Address::new(0x10fc), 4), Some(0xfc));
        assert_eq!(image.offset_of(Address::new(0x10fe), 4), None);
        assert_eq!(image.offset_of(Address::new(0x0ffe), 4), None);
        assert_eq!(image.offset_of(Address::new(usize::MAX - 1), 4), None);
    }

    #[test]
    fn addresses_above_four_gigabytes_do_not_fit_a_literal() {
        assert_eq!(Address::new(0xdead_beef).to_u32(), Some(0xdead_beef));

        if usize::BITS > 32 {
            assert_eq!(Address::new(usize::MAX).to_u32(), None);
        }
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(Address::new(0x98000000).to_string(), "0x98000000");
    }
}
