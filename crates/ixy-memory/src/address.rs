use std::fmt;

/// A virtual address within this process's address space.
///
/// Address 0 is always the invalid/sentinel value; constructing one is not
/// forbidden (it's a plain integer wrapper) but every consumer in this
/// driver treats a zero address as a fatal condition rather than reading
/// through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualAddress(pub usize);

/// A physical (DMA-visible) address, as handed to the NIC's descriptor
/// rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysicalAddress(pub u64);

impl VirtualAddress {
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn as_ptr(self) -> *mut u8 {
        self.0 as *mut u8
    }

    pub fn offset(self, bytes: usize) -> Self {
        Self(self.0 + bytes)
    }
}

impl PhysicalAddress {
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::LowerHex for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// An immutable pair of (virtual, physical) addresses for a single
/// DMA-capable allocation, along with its length in bytes.
#[derive(Debug, Clone, Copy)]
pub struct DmaBuffer {
    pub virt_addr: VirtualAddress,
    pub phys_addr: PhysicalAddress,
    pub size: usize,
}
