//! Anonymous and huge-page-backed memory mappings.
//!
//! Grounded on the reference driver's `allocate_dma_memory`: open (or
//! create) a uniquely-named file under the hugetlbfs mount, `mmap` it
//! `MAP_SHARED | MAP_HUGETLB`, then `mlock` it so the kernel never swaps
//! out memory the NIC is DMA-ing into.

use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::address::VirtualAddress;
use crate::error::MemoryError;
use crate::hugepage;

static DMA_FILE_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Rounds `bytes` up to the next multiple of `align` (`align` must be a
/// power of two).
fn round_up(bytes: usize, align: usize) -> usize {
    (bytes + align - 1) & !(align - 1)
}

/// Allocates `bytes` of memory, optionally huge-page-backed and/or
/// physically contiguous, per spec \S4.1.
///
/// `contiguous = true` with `huge = true` requires the whole allocation to
/// fit in a single huge page; a larger request fails with `OutOfMemory`
/// rather than silently spanning multiple (non-contiguous) huge pages.
pub fn allocate(
    bytes: usize,
    huge: bool,
    contiguous: bool,
    hugepage_mount: &str,
) -> Result<(VirtualAddress, usize), MemoryError> {
    if bytes == 0 {
        return Err(MemoryError::InvalidArgument("allocate(0)".to_string()));
    }

    if huge {
        allocate_hugepage(bytes, contiguous, hugepage_mount)
    } else {
        allocate_standard(bytes)
    }
}

fn allocate_hugepage(
    bytes: usize,
    contiguous: bool,
    hugepage_mount: &str,
) -> Result<(VirtualAddress, usize), MemoryError> {
    if !hugepage::is_hugetlbfs_mounted(hugepage_mount) {
        return Err(MemoryError::Unsupported(format!(
            "no hugetlbfs mount found at {hugepage_mount}"
        )));
    }
    let huge_page_size = hugepage::huge_page_size()?;

    let size = round_up(bytes, huge_page_size);
    if contiguous && size > huge_page_size {
        return Err(MemoryError::OutOfMemory(format!(
            "requested {bytes} bytes contiguous, exceeds huge page size {huge_page_size}"
        )));
    }

    let id = DMA_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = Path::new(hugepage_mount).join(format!("ixy-{}-{}", process::id(), id));

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)
        .map_err(|e| MemoryError::IoError(path.display().to_string(), e))?;

    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED | libc::MAP_HUGETLB,
            file.as_raw_fd(),
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(MemoryError::IoError(
            format!("mmap({})", path.display()),
            std::io::Error::last_os_error(),
        ));
    }

    if unsafe { libc::mlock(ptr, size) } != 0 {
        let err = std::io::Error::last_os_error();
        unsafe { libc::munmap(ptr, size) };
        return Err(MemoryError::IoError("mlock".to_string(), err));
    }

    log::debug!("allocated {size} bytes of hugepage memory at {:p}", ptr);
    Ok((VirtualAddress(ptr as usize), size))
}

fn allocate_standard(bytes: usize) -> Result<(VirtualAddress, usize), MemoryError> {
    let page_size = page_size();
    let size = round_up(bytes, page_size);

    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(MemoryError::IoError(
            "mmap(anonymous)".to_string(),
            std::io::Error::last_os_error(),
        ));
    }
    Ok((VirtualAddress(ptr as usize), size))
}

/// Unmaps a region previously returned by [`allocate`].
pub fn free(addr: VirtualAddress, size: usize) -> Result<(), MemoryError> {
    if addr.is_null() {
        return Err(MemoryError::InvalidArgument("free(null)".to_string()));
    }
    let result = unsafe { libc::munmap(addr.as_ptr() as *mut libc::c_void, size) };
    if result != 0 {
        return Err(MemoryError::IoError(
            "munmap".to_string(),
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}

/// The host's base page size (usually 4096 on x86_64).
pub fn page_size() -> usize {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
