//! PCI device access via Linux sysfs: identification, bus mastering,
//! BAR0 mapping, and kernel driver bind/unbind.

mod device;
mod error;

pub use device::{PciDevice, INTEL_VENDOR_ID, NETWORK_CONTROLLER_CLASS};
pub use error::PciError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_a_nonexistent_device_is_an_io_error() {
        let result = PciDevice::open("0000:99:99.9");
        assert!(matches!(result, Err(PciError::Io(_, _))));
    }
}
