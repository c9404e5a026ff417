use std::fmt;
use std::io;

/// Errors produced by the memory manager.
///
/// Mirrors the six error kinds used throughout this driver, restricted to
/// the subset the memory layer can actually produce.
#[derive(Debug)]
pub enum MemoryError {
    /// A filesystem or mmap/mlock syscall failed. Carries the path (or a
    /// short description of the operation) and the underlying error.
    IoError(String, io::Error),
    /// A null, zero, or otherwise forbidden argument was passed.
    InvalidArgument(String),
    /// Huge pages are not available on this host (no `Hugepagesize:` entry
    /// in `/proc/meminfo`, or no `hugetlbfs` mount found).
    Unsupported(String),
    /// The requested allocation could not be satisfied, e.g. a contiguous
    /// request larger than one huge page.
    OutOfMemory(String),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(ctx, e) => write!(f, "I/O error ({ctx}): {e}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Self::OutOfMemory(msg) => write!(f, "out of memory: {msg}"),
        }
    }
}

impl std::error::Error for MemoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}
