//! Huge-page DMA memory allocation, raw volatile memory access, and
//! virtual-to-physical address translation.
//!
//! The reference driver this was modeled on carries three near-identical
//! "memory manager" implementations, a workaround for its host language's
//! lack of raw pointers. A systems language needs exactly one.

mod address;
mod error;
mod hugepage;
mod mmap;
mod pagemap;
pub mod raw;

pub use address::{DmaBuffer, PhysicalAddress, VirtualAddress};
pub use error::MemoryError;
pub use hugepage::DEFAULT_HUGEPAGE_MOUNT;

/// The memory manager: huge-page discovery, allocation, and address
/// translation, scoped to a single configured hugetlbfs mount point.
pub struct MemoryManager {
    hugepage_mount: String,
}

impl MemoryManager {
    pub fn new(hugepage_mount: impl Into<String>) -> Self {
        Self {
            hugepage_mount: hugepage_mount.into(),
        }
    }

    /// The host's base page size.
    pub fn page_size(&self) -> usize {
        mmap::page_size()
    }

    /// The configured huge page size, if huge pages are supported and
    /// discoverable on this host.
    pub fn huge_page_size(&self) -> Result<usize, MemoryError> {
        hugepage::huge_page_size()
    }

    /// Allocates `bytes` of memory. See spec \S4.1 for the exact semantics
    /// of `huge` and `contiguous`.
    pub fn allocate(
        &self,
        bytes: usize,
        huge: bool,
        contiguous: bool,
    ) -> Result<VirtualAddress, MemoryError> {
        mmap::allocate(bytes, huge, contiguous, &self.hugepage_mount).map(|(addr, _size)| addr)
    }

    /// Releases a region previously returned by [`Self::allocate`].
    pub fn free(&self, addr: VirtualAddress, bytes: usize, _huge: bool) -> Result<(), MemoryError> {
        mmap::free(addr, bytes)
    }

    /// Translates a virtual address within this process to its resident
    /// physical address.
    pub fn virt_to_phys(&self, virt: VirtualAddress) -> Result<PhysicalAddress, MemoryError> {
        pagemap::virt_to_phys(self.page_size(), virt)
    }

    /// Allocates a physically contiguous, huge-page-backed DMA buffer of
    /// at least `bytes` bytes, touches its first byte to force population,
    /// and resolves its physical address.
    pub fn dma_allocate(&self, bytes: usize) -> Result<DmaBuffer, MemoryError> {
        let (virt_addr, size) = mmap::allocate(bytes, true, true, &self.hugepage_mount)?;

        // Touch the first byte so the page is actually backed before we
        // ask the kernel where it lives.
        unsafe {
            raw::write_volatile_u8(virt_addr, 0);
        }

        let phys_addr = pagemap::virt_to_phys(self.page_size(), virt_addr)?;
        if phys_addr.is_null() {
            return Err(MemoryError::IoError(
                "virt_to_phys".to_string(),
                std::io::Error::new(std::io::ErrorKind::Other, "page not resident"),
            ));
        }

        log::debug!(
            "dma_allocate({bytes}) -> virt={:#x} phys={:#x} size={size}",
            virt_addr,
            phys_addr
        );

        Ok(DmaBuffer {
            virt_addr,
            phys_addr,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_power_of_two_at_least_four() {
        let mm = MemoryManager::new(DEFAULT_HUGEPAGE_MOUNT);
        let ps = mm.page_size();
        assert!(ps >= 4);
        assert_eq!(ps & (ps - 1), 0, "page size must be a power of two");
    }

    #[test]
    fn standard_allocate_and_free_round_trip() {
        let mm = MemoryManager::new(DEFAULT_HUGEPAGE_MOUNT);
        let addr = mm.allocate(4096, false, false).expect("anonymous mmap should succeed");
        assert!(!addr.is_null());
        unsafe {
            raw::write_volatile_u32(addr, 0x1234_5678);
            assert_eq!(raw::read_volatile_u32(addr), 0x1234_5678);
        }
        mm.free(addr, 4096, false).expect("munmap should succeed");
    }

    #[test]
    fn huge_page_allocation_reports_unsupported_without_mount() {
        let mm = MemoryManager::new("/nonexistent/hugepage/mount/for/tests");
        let result = mm.allocate(4096, true, true);
        assert!(matches!(result, Err(MemoryError::Unsupported(_))));
    }

    #[test]
    fn virt_to_phys_preserves_in_page_offset() {
        let mm = MemoryManager::new(DEFAULT_HUGEPAGE_MOUNT);
        let local = 7u8;
        let addr = VirtualAddress(&local as *const u8 as usize);
        if let Ok(phys) = mm.virt_to_phys(addr) {
            assert_eq!(phys.value() % mm.page_size() as u64, addr.0 as u64 % mm.page_size() as u64);
        }
    }
}
