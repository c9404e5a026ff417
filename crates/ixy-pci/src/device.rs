//! A PCI device accessed entirely through Linux sysfs: `config` for
//! identification and command-register writes, `resource0` for the BAR0
//! mmap, and the owning driver's `bind`/`unbind` pseudo-files to take the
//! device away from (and, at shutdown, give it back to) the kernel.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use crate::error::PciError;

pub const INTEL_VENDOR_ID: u16 = 0x8086;
pub const NETWORK_CONTROLLER_CLASS: u8 = 0x02;

const COMMAND_REGISTER_OFFSET: u64 = 0x04;
const CLASS_CODE_OFFSET: u64 = 0x09;
const BUS_MASTER_ENABLE: u16 = 1 << 2;

fn sysfs_device_dir(addr: &str) -> PathBuf {
    PathBuf::from("/sys/bus/pci/devices").join(addr)
}

fn sysfs_driver_dir(driver: &str) -> PathBuf {
    PathBuf::from("/sys/bus/pci/drivers").join(driver)
}

/// A PCI device bound (or about to be bound) to userspace, identified by
/// its sysfs address (`DDDD:BB:DD.F`).
pub struct PciDevice {
    addr: String,
    config: File,
    vendor_id: u16,
    device_id: u16,
    class_code: u8,
    bar0: Option<(*mut u8, usize)>,
}

impl PciDevice {
    /// Opens `config` for `addr` and reads its identification fields.
    /// Does not reject anything by itself — callers that only want
    /// network controllers should check [`Self::class_code`] and
    /// [`Self::vendor_id`] themselves, since some callers (diagnostics)
    /// want to inspect arbitrary devices.
    pub fn open(addr: &str) -> Result<Self, PciError> {
        let config_path = sysfs_device_dir(addr).join("config");
        let mut config = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config_path)
            .map_err(|e| PciError::Io(format!("open {}", config_path.display()), e))?;

        let mut header = [0u8; 16];
        config
            .read_exact(&mut header)
            .map_err(|e| PciError::Io(format!("read {}", config_path.display()), e))?;

        let vendor_id = u16::from_le_bytes([header[0], header[1]]);
        let device_id = u16::from_le_bytes([header[2], header[3]]);
        let class_code = header[CLASS_CODE_OFFSET as usize];

        Ok(Self {
            addr: addr.to_string(),
            config,
            vendor_id,
            device_id,
            class_code,
            bar0: None,
        })
    }

    /// Opens `addr` and rejects it unless it's an Intel network
    /// controller, the only kind this driver can talk to.
    pub fn open_network_device(addr: &str) -> Result<Self, PciError> {
        let dev = Self::open(addr)?;
        if dev.class_code != NETWORK_CONTROLLER_CLASS {
            return Err(PciError::NotANetworkDevice {
                addr: dev.addr.clone(),
                class_code: dev.class_code,
            });
        }
        if dev.vendor_id != INTEL_VENDOR_ID {
            return Err(PciError::UnsupportedVendor {
                addr: dev.addr.clone(),
                vendor_id: dev.vendor_id,
            });
        }
        Ok(dev)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn device_id(&self) -> u16 {
        self.device_id
    }

    pub fn class_code(&self) -> u8 {
        self.class_code
    }

    fn read_command_register(&mut self) -> Result<u16, PciError> {
        let mut buf = [0u8; 2];
        self.config
            .seek(SeekFrom::Start(COMMAND_REGISTER_OFFSET))
            .map_err(|e| PciError::Io("seek PCI command register".to_string(), e))?;
        self.config
            .read_exact(&mut buf)
            .map_err(|e| PciError::Io("read PCI command register".to_string(), e))?;
        Ok(u16::from_le_bytes(buf))
    }

    fn write_command_register(&mut self, value: u16) -> Result<(), PciError> {
        self.config
            .seek(SeekFrom::Start(COMMAND_REGISTER_OFFSET))
            .map_err(|e| PciError::Io("seek PCI command register".to_string(), e))?;
        self.config
            .write_all(&value.to_le_bytes())
            .map_err(|e| PciError::Io("write PCI command register".to_string(), e))?;
        Ok(())
    }

    /// Enables or disables bus mastering (bit 2 of the command register),
    /// a read-modify-write so any other bits the kernel set are preserved.
    pub fn set_dma(&mut self, enabled: bool) -> Result<(), PciError> {
        let cmd = self.read_command_register()?;
        let new_cmd = if enabled { cmd | BUS_MASTER_ENABLE } else { cmd & !BUS_MASTER_ENABLE };
        if new_cmd != cmd {
            self.write_command_register(new_cmd)?;
        }
        log::debug!("{}: PCI command register {cmd:#06x} -> {new_cmd:#06x}", self.addr);
        Ok(())
    }

    /// Maps `resource0` (BAR0) read-write into this process, returning its
    /// virtual base address and size in bytes. Only callable once per
    /// device; the mapping is torn down in `Drop`.
    pub fn map_resource(&mut self) -> Result<(*mut u8, usize), PciError> {
        let resource_path = sysfs_device_dir(&self.addr).join("resource0");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&resource_path)
            .map_err(|e| PciError::Io(format!("open {}", resource_path.display()), e))?;

        let size = file
            .metadata()
            .map_err(|e| PciError::Io(format!("stat {}", resource_path.display()), e))?
            .len() as usize;
        if size == 0 {
            return Err(PciError::BarNotMappable { addr: self.addr.clone() });
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(PciError::BarNotMappable { addr: self.addr.clone() });
        }

        log::debug!("{}: mapped BAR0 ({size} bytes) at {ptr:p}", self.addr);
        self.bar0 = Some((ptr as *mut u8, size));
        Ok((ptr as *mut u8, size))
    }

    pub fn bar0(&self) -> Option<(*mut u8, usize)> {
        self.bar0
    }

    /// Unbinds this device from `driver` by writing its address to the
    /// driver's `unbind` pseudo-file. Devices usually start out bound to
    /// the kernel's own ixgbe module and must be unbound before userspace
    /// can claim their BAR0.
    pub fn unbind(&self, driver: &str) -> Result<(), PciError> {
        self.write_driver_file(driver, "unbind")
    }

    /// Re-binds this device to `driver`, the inverse of [`Self::unbind`].
    /// Used at shutdown to hand the NIC back to the kernel.
    pub fn bind(&self, driver: &str) -> Result<(), PciError> {
        self.write_driver_file(driver, "bind")
    }

    fn write_driver_file(&self, driver: &str, file_name: &str) -> Result<(), PciError> {
        let path = sysfs_driver_dir(driver).join(file_name);
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| PciError::Io(format!("open {}", path.display()), e))?;
        file.write_all(self.addr.as_bytes())
            .map_err(|e| PciError::Io(format!("write {}", path.display()), e))?;
        Ok(())
    }
}

impl Drop for PciDevice {
    fn drop(&mut self) {
        if let Some((ptr, size)) = self.bar0.take() {
            unsafe {
                libc::munmap(ptr as *mut libc::c_void, size);
            }
        }
    }
}

// Raw pointers make `PciDevice` !Send/!Sync by default; the BAR0 mapping
// is only ever touched by the single thread that owns the device.
unsafe impl Send for PciDevice {}
