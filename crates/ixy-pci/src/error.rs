use std::fmt;
use std::io;

#[derive(Debug)]
pub enum PciError {
    /// A sysfs pseudo-file could not be opened, read, or written.
    Io(String, io::Error),
    /// `config` was shorter than the offset this driver needed to read.
    ConfigTooShort { path: String, needed: usize, found: usize },
    /// The device's class code is not `0x02` (network controller).
    NotANetworkDevice { addr: String, class_code: u8 },
    /// The device's vendor id is not Intel's (`0x8086`).
    UnsupportedVendor { addr: String, vendor_id: u16 },
    /// `resource0` could not be mmap'ed (legacy, non-mappable device).
    BarNotMappable { addr: String },
}

impl fmt::Display for PciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(what, e) => write!(f, "{what}: {e}"),
            Self::ConfigTooShort { path, needed, found } => {
                write!(f, "{path}: need at least {needed} bytes, found {found}")
            }
            Self::NotANetworkDevice { addr, class_code } => {
                write!(f, "{addr}: class code {class_code:#04x} is not a network controller")
            }
            Self::UnsupportedVendor { addr, vendor_id } => {
                write!(f, "{addr}: vendor {vendor_id:#06x} is not Intel")
            }
            Self::BarNotMappable { addr } => write!(f, "{addr}: BAR0 is not mappable"),
        }
    }
}

impl std::error::Error for PciError {}
