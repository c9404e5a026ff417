use std::fmt;
use std::io;

/// Errors produced while bringing up or operating an [`crate::IxgbeDevice`].
#[derive(Debug)]
pub enum IxgbeError {
    /// A filesystem or mmap operation on the underlying PCI device failed.
    IoError(String, io::Error),
    /// A null, zero, or otherwise forbidden argument was passed.
    InvalidArgument(String),
    /// The device or host environment doesn't support what was asked of it
    /// (huge pages unavailable, non-Intel or non-network PCI device).
    Unsupported(String),
    /// A hardware handshake the datasheet says must complete never did
    /// (EEPROM auto-read, DMA init done).
    HardwareFault(String),
}

impl fmt::Display for IxgbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoError(what, e) => write!(f, "{what}: {e}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Self::HardwareFault(msg) => write!(f, "hardware fault: {msg}"),
        }
    }
}

impl std::error::Error for IxgbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

impl From<ixy_pci::PciError> for IxgbeError {
    fn from(e: ixy_pci::PciError) -> Self {
        match e {
            ixy_pci::PciError::NotANetworkDevice { addr, class_code } => Self::Unsupported(format!(
                "{addr}: class code {class_code:#04x} is not a network controller"
            )),
            ixy_pci::PciError::UnsupportedVendor { addr, vendor_id } => {
                Self::Unsupported(format!("{addr}: vendor {vendor_id:#06x} is not Intel"))
            }
            ixy_pci::PciError::BarNotMappable { addr } => {
                Self::Unsupported(format!("{addr}: BAR0 is not mappable"))
            }
            ixy_pci::PciError::Io(what, e) => Self::IoError(what, e),
            ixy_pci::PciError::ConfigTooShort { path, needed, found } => {
                Self::IoError(path, io::Error::new(io::ErrorKind::UnexpectedEof, format!("need {needed} bytes, found {found}")))
            }
        }
    }
}

impl From<ixy_memory::MemoryError> for IxgbeError {
    fn from(e: ixy_memory::MemoryError) -> Self {
        match e {
            ixy_memory::MemoryError::IoError(ctx, e) => Self::IoError(ctx, e),
            ixy_memory::MemoryError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            ixy_memory::MemoryError::Unsupported(msg) => Self::Unsupported(msg),
            ixy_memory::MemoryError::OutOfMemory(msg) => Self::Unsupported(msg),
        }
    }
}
