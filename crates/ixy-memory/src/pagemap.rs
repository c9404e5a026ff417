//! Virtual-to-physical address translation via `/proc/self/pagemap`.
//!
//! Grounded on the reference driver's `virt_to_phys`: seek to
//! `(addr / page_size) * size_of::<usize>()`, read one pagemap entry, mask
//! the low 55 bits for the physical frame number.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::address::{PhysicalAddress, VirtualAddress};
use crate::error::MemoryError;

const PAGEMAP_ENTRY_BYTES: u64 = 8;
const PFN_MASK: u64 = (1 << 55) - 1;

/// Translates a virtual address into this process's resident physical
/// address, by reading `/proc/self/pagemap`.
///
/// Returns `PhysicalAddress(0)` if the page is not present; callers treat
/// that as fatal per spec \S4.9 ("virt→phys returns 0").
pub fn virt_to_phys(page_size: usize, virt: VirtualAddress) -> Result<PhysicalAddress, MemoryError> {
    if virt.is_null() {
        return Err(MemoryError::InvalidArgument(
            "virt_to_phys called with null address".to_string(),
        ));
    }

    let mut file = File::open("/proc/self/pagemap")
        .map_err(|e| MemoryError::IoError("/proc/self/pagemap".to_string(), e))?;

    let offset = (virt.0 as u64 / page_size as u64) * PAGEMAP_ENTRY_BYTES;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| MemoryError::IoError("/proc/self/pagemap seek".to_string(), e))?;

    let mut buf = [0u8; 8];
    file.read_exact(&mut buf)
        .map_err(|e| MemoryError::IoError("/proc/self/pagemap read".to_string(), e))?;
    let entry = u64::from_le_bytes(buf);

    let pfn = entry & PFN_MASK;
    let phys = pfn * page_size as u64 + (virt.0 as u64 % page_size as u64);
    Ok(PhysicalAddress(phys))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_own_stack_address_to_nonzero_phys() {
        let page_size = 4096;
        let local = 0u8;
        let addr = VirtualAddress(&local as *const u8 as usize);
        let phys = virt_to_phys(page_size, addr).expect("pagemap read should succeed under test");
        assert_eq!(phys.value() % page_size as u64, addr.0 as u64 % page_size as u64);
    }

    #[test]
    fn rejects_null_address() {
        assert!(virt_to_phys(4096, VirtualAddress(0)).is_err());
    }
}
