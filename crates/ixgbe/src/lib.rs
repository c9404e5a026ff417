//! Userspace driver for the Intel 82599 10 GbE controller: PCI bring-up,
//! the 13-step datasheet initialization sequence (\S4.6.3-4.6.8), and the
//! polling-mode RX/TX datapath. The descriptor ring and batching algorithms
//! live in `nic-queues`; this crate supplies the 82599's register layout
//! and the device-level state (BAR0, queues, mempools) that ties them
//! together.

mod error;
mod queue_registers;
mod regs;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub use error::IxgbeError;

use ixy_memory::{DmaBuffer, MemoryManager};
use ixy_pci::PciDevice;
use nic_buffers::{Mempool, PacketBuffer};
use nic_queues::{RxQueue, TxQueue};

use queue_registers::{IxgbeRxQueueRegisters, IxgbeTxQueueRegisters};
use regs::*;

/// Name of the kernel module this device is unbound from at startup and
/// re-bound to at shutdown.
const KERNEL_DRIVER: &str = "ixgbe";

/// Size, in bytes, of every packet buffer this driver allocates. Large
/// enough for any Ethernet frame this driver's single-descriptor RX
/// path supports (no jumbo frames, no header splitting).
const RX_BUFFER_SIZE: usize = 2048;

/// Interval the datasheet's timeout-free busy-waits sleep between polls.
const REGISTER_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound on how long `new()` waits for link before giving up and
/// handing control back to the caller; link genuinely may never come up
/// (no cable), so this is a usability bound, not a hardware requirement.
const LINK_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const LINK_WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration carried into [`IxgbeDevice::new`]. Built once at process
/// startup and never consulted by the datapath.
#[derive(Debug, Clone)]
pub struct IxgbeConfig {
    /// Mount point of the hugetlbfs filesystem backing DMA allocations.
    pub hugepage_mount: String,
    /// Descriptor count per RX ring. Must be a power of two.
    pub rx_ring_entries: usize,
    /// Descriptor count per TX ring. Must be a power of two.
    pub tx_ring_entries: usize,
    /// Whether promiscuous mode is enabled immediately after bring-up.
    pub promiscuous: bool,
}

impl Default for IxgbeConfig {
    fn default() -> Self {
        Self {
            hugepage_mount: ixy_memory::DEFAULT_HUGEPAGE_MOUNT.to_string(),
            rx_ring_entries: 512,
            tx_ring_entries: 512,
            promiscuous: false,
        }
    }
}

/// Decoded `LINKS.LINK_SPEED` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSpeed {
    TenMb,
    HundredMb,
    OneGb,
    TenGb,
    Unknown,
}

impl LinkSpeed {
    fn from_links_reg(links: u32) -> Self {
        if links & LINKS_UP == 0 {
            return Self::Unknown;
        }
        match links & LINKS_SPEED_MASK {
            LINKS_SPEED_100M => Self::HundredMb,
            LINKS_SPEED_1G => Self::OneGb,
            LINKS_SPEED_10G => Self::TenGb,
            _ => Self::Unknown,
        }
    }

    /// Numeric speed in Mbit/s, 0 if the link is down or unrecognized.
    pub fn as_mbps(&self) -> u32 {
        match self {
            Self::TenMb => 10,
            Self::HundredMb => 100,
            Self::OneGb => 1000,
            Self::TenGb => 10_000,
            Self::Unknown => 0,
        }
    }
}

/// The six hardware counters `ixy-stats` accumulates from. `gorcl`/`gorch`
/// and `gotcl`/`gotch` are the low/high halves of 64-bit byte counters; all
/// six reset to zero on read.
pub struct RawStatRegisters {
    pub gprc: u32,
    pub gptc: u32,
    pub gorcl: u32,
    pub gorch: u32,
    pub gotcl: u32,
    pub gotch: u32,
}

/// An initialized 82599 NIC: its PCI handle, BAR0 mapping, and the RX/TX
/// queues configured during [`Self::new`].
pub struct IxgbeDevice {
    pci: PciDevice,
    bar0: *mut u8,
    bar0_len: usize,
    #[allow(dead_code)]
    memory: MemoryManager,
    rx_queues: Vec<RxQueue<IxgbeRxQueueRegisters>>,
    tx_queues: Vec<TxQueue<IxgbeTxQueueRegisters>>,
    // Kept alive for the device's lifetime: queue descriptor rings and
    // mempool regions point into this DMA memory, which (matching the
    // reference driver) is never freed before process exit.
    #[allow(dead_code)]
    mempools: Vec<Arc<Mutex<Mempool>>>,
    #[allow(dead_code)]
    rx_ring_dma: Vec<DmaBuffer>,
    #[allow(dead_code)]
    tx_ring_dma: Vec<DmaBuffer>,
}

unsafe impl Send for IxgbeDevice {}

impl IxgbeDevice {
    /// Brings up the 82599 at `pci_addr` with `num_rx_queues` RX queues and
    /// `num_tx_queues` TX queues, following the datasheet's 13-step
    /// initialization sequence (\S4.6.3-4.6.8).
    pub fn new(
        pci_addr: &str,
        num_rx_queues: u16,
        num_tx_queues: u16,
        config: &IxgbeConfig,
    ) -> Result<Self, IxgbeError> {
        // 1. Open the PCI device, rejecting anything but an Intel NIC.
        let mut pci = PciDevice::open_network_device(pci_addr)?;

        // 2. Unbind the kernel driver and enable bus mastering.
        if let Err(e) = pci.unbind(KERNEL_DRIVER) {
            log::debug!("{pci_addr}: unbind from {KERNEL_DRIVER} failed (already unbound?): {e}");
        }
        pci.set_dma(true)?;

        // 3. Map BAR0.
        let (bar0, bar0_len) = pci.map_resource()?;

        let memory = MemoryManager::new(config.hugepage_mount.clone());

        let mut dev = IxgbeDevice {
            pci,
            bar0,
            bar0_len,
            memory,
            rx_queues: Vec::with_capacity(num_rx_queues as usize),
            tx_queues: Vec::with_capacity(num_tx_queues as usize),
            mempools: Vec::with_capacity(num_rx_queues as usize),
            rx_ring_dma: Vec::with_capacity(num_rx_queues as usize),
            tx_ring_dma: Vec::with_capacity(num_tx_queues as usize),
        };

        dev.reset_and_init(num_rx_queues, num_tx_queues, config)?;
        Ok(dev)
    }

    fn reset_and_init(&mut self, num_rx_queues: u16, num_tx_queues: u16, config: &IxgbeConfig) -> Result<(), IxgbeError> {
        log::info!("resetting device {}", self.pci.addr());

        // 4. Disable all interrupts.
        self.set_reg32(EIMC, DISABLE_INTERRUPTS);

        // 5. Global reset, wait, disable interrupts again.
        self.set_reg32(CTRL, CTRL_RST);
        self.wait_clear_reg32(CTRL, CTRL_RST);
        thread::sleep(Duration::from_millis(10));
        self.set_reg32(EIMC, DISABLE_INTERRUPTS);

        log::info!("initializing device {}", self.pci.addr());

        // 6. Wait for EEPROM auto-read and DMA init done.
        self.wait_set_reg32(EEC, EEC_AUTO_RD);
        self.wait_set_reg32(RDRXCTL, RDRXCTL_DMAIDONE);

        // 7. Link auto-negotiation.
        self.init_link();

        // 8. Initialize RX.
        let rx_rings = self.init_rx(num_rx_queues, config)?;

        // 9. Initialize TX.
        let tx_rings = self.init_tx(num_tx_queues, config)?;

        // 10. Start each RX queue: fill descriptors, arm the tail, enable.
        for (queue_index, (descriptors, num_descriptors, pool)) in rx_rings.into_iter().enumerate() {
            let regs = unsafe { IxgbeRxQueueRegisters::new(self.bar0, queue_index) };
            let queue = unsafe { RxQueue::new(descriptors, num_descriptors, pool, regs) };
            self.rx_queues.push(queue);

            self.set_flags32(rxdctl(queue_index), RXDCTL_ENABLE);
            self.wait_set_reg32(rxdctl(queue_index), RXDCTL_ENABLE);
        }

        // 11. Start each TX queue.
        for (queue_index, (descriptors, num_descriptors)) in tx_rings.into_iter().enumerate() {
            let regs = unsafe { IxgbeTxQueueRegisters::new(self.bar0, queue_index) };
            let queue = unsafe { TxQueue::new(descriptors, num_descriptors, regs) };
            self.tx_queues.push(queue);

            self.set_flags32(txdctl(queue_index), TXDCTL_ENABLE);
            self.wait_set_reg32(txdctl(queue_index), TXDCTL_ENABLE);
        }

        // 12. Promiscuous mode as configured by the caller.
        self.set_promiscuous(config.promiscuous);

        // 13. Bounded wait for link.
        self.wait_for_link();

        Ok(())
    }

    #[allow(clippy::type_complexity)]
    fn init_rx(
        &mut self,
        num_rx_queues: u16,
        config: &IxgbeConfig,
    ) -> Result<Vec<(*mut intel_ethernet::descriptors::AdvancedRxDescriptor, usize, Arc<Mutex<Mempool>>)>, IxgbeError> {
        self.clear_flags32(RXCTRL, RXCTRL_RXEN);

        // Allocate all traffic to packet buffer 0.
        self.set_reg32(RXPBSIZE, RXPBSIZE_512KB);
        for i in 1..8 {
            self.set_reg32(RXPBSIZE + i * 4, 0);
        }

        self.set_flags32(HLREG0, HLREG0_RXCRCSTRP);
        self.set_flags32(RDRXCTL, RDRXCTL_CRC_STRIP);
        self.set_flags32(FCTRL, FCTRL_BAM);

        let mempool_capacity = (config.rx_ring_entries + config.tx_ring_entries).max(4096);
        let mut rings = Vec::with_capacity(num_rx_queues as usize);

        for i in 0..num_rx_queues as usize {
            log::debug!("initializing rx queue {i}");

            let current = self.reg32(srrctl(i));
            self.set_reg32(srrctl(i), (current & !SRRCTL_DESCTYPE_MASK) | SRRCTL_DESCTYPE_ADV_ONEBUF);
            self.set_flags32(srrctl(i), SRRCTL_DROP_EN);

            let ring_bytes = config.rx_ring_entries * std::mem::size_of::<intel_ethernet::descriptors::AdvancedRxDescriptor>();
            let dma = self.memory.dma_allocate(ring_bytes)?;
            unsafe { std::ptr::write_bytes(dma.virt_addr.as_ptr(), 0xff, ring_bytes) };

            self.set_reg32(rdbal(i), (dma.phys_addr.value() & 0xffff_ffff) as u32);
            self.set_reg32(rdbah(i), (dma.phys_addr.value() >> 32) as u32);
            self.set_reg32(rdlen(i), ring_bytes as u32);
            self.set_reg32(rdh(i), 0);
            self.set_reg32(rdt(i), 0);

            let pool_dma = self.memory.dma_allocate(mempool_capacity * RX_BUFFER_SIZE)?;
            let pool = Mempool::allocate(mempool_capacity, RX_BUFFER_SIZE, &pool_dma);

            let descriptors = dma.virt_addr.as_ptr() as *mut intel_ethernet::descriptors::AdvancedRxDescriptor;
            rings.push((descriptors, config.rx_ring_entries, Arc::clone(&pool)));

            self.mempools.push(pool);
            self.rx_ring_dma.push(dma);
            self.rx_ring_dma.push(pool_dma);
        }

        self.set_flags32(RXCTRL, RXCTRL_RXEN);
        Ok(rings)
    }

    fn init_tx(
        &mut self,
        num_tx_queues: u16,
        config: &IxgbeConfig,
    ) -> Result<Vec<(*mut intel_ethernet::descriptors::AdvancedTxDescriptor, usize)>, IxgbeError> {
        self.set_flags32(HLREG0, HLREG0_TXCRCEN | HLREG0_TXPADEN);

        self.set_reg32(TXPBSIZE, TXPBSIZE_160KB);
        for i in 1..8 {
            self.set_reg32(TXPBSIZE + i * 4, 0);
        }

        self.clear_flags32(RTTDCS, RTTDCS_ARBDIS);

        let mut rings = Vec::with_capacity(num_tx_queues as usize);

        for i in 0..num_tx_queues as usize {
            log::debug!("initializing tx queue {i}");

            let ring_bytes = config.tx_ring_entries * std::mem::size_of::<intel_ethernet::descriptors::AdvancedTxDescriptor>();
            let dma = self.memory.dma_allocate(ring_bytes)?;
            unsafe { std::ptr::write_bytes(dma.virt_addr.as_ptr(), 0xff, ring_bytes) };

            self.set_reg32(tdbal(i), (dma.phys_addr.value() & 0xffff_ffff) as u32);
            self.set_reg32(tdbah(i), (dma.phys_addr.value() >> 32) as u32);
            self.set_reg32(tdlen(i), ring_bytes as u32);
            self.set_reg32(tdh(i), 0);
            self.set_reg32(tdt(i), 0);

            let mut txdctl = self.reg32(txdctl(i));
            txdctl &= !(0x3F | (0x3F << 8) | (0x3F << 16));
            txdctl |= TXDCTL_PTHRESH | TXDCTL_HTHRESH | TXDCTL_WTHRESH;
            self.set_reg32(txdctl(i), txdctl);

            let descriptors = dma.virt_addr.as_ptr() as *mut intel_ethernet::descriptors::AdvancedTxDescriptor;
            rings.push((descriptors, config.tx_ring_entries));
            self.tx_ring_dma.push(dma);
        }

        self.set_reg32(DMATXCTL, DMATXCTL_TE);
        Ok(rings)
    }

    fn init_link(&self) {
        let autoc = self.reg32(AUTOC);
        self.set_reg32(AUTOC, (autoc & !(0x7 << 13)) | AUTOC_LMS_10_GBE_S);
        let autoc = self.reg32(AUTOC);
        self.set_reg32(AUTOC, (autoc & !AUTOC_10G_PMA_PMD_CLEAR) | 0);
        self.set_flags32(AUTOC, AUTOC_RESTART_AN);
    }

    fn wait_for_link(&self) {
        log::info!("waiting for link");
        let start = Instant::now();
        let mut speed = self.link_speed();
        while speed == LinkSpeed::Unknown && start.elapsed() < LINK_WAIT_TIMEOUT {
            thread::sleep(LINK_WAIT_POLL_INTERVAL);
            speed = self.link_speed();
        }
        log::info!("link speed is {} Mbit/s", speed.as_mbps());
    }

    /// Enables or disables promiscuous mode (unicast and multicast).
    pub fn set_promiscuous(&self, enabled: bool) {
        if enabled {
            log::info!("enabling promiscuous mode");
            self.set_flags32(FCTRL, FCTRL_MPE | FCTRL_UPE);
        } else {
            log::info!("disabling promiscuous mode");
            self.clear_flags32(FCTRL, FCTRL_MPE | FCTRL_UPE);
        }
    }

    /// Current negotiated link speed.
    pub fn link_speed(&self) -> LinkSpeed {
        LinkSpeed::from_links_reg(self.reg32(LINKS))
    }

    pub fn pci_addr(&self) -> &str {
        self.pci.addr()
    }

    pub fn num_rx_queues(&self) -> usize {
        self.rx_queues.len()
    }

    pub fn num_tx_queues(&self) -> usize {
        self.tx_queues.len()
    }

    /// Drains up to `n` received packets from `queue_id` into
    /// `out[offset..]`. Panics if `queue_id` is out of range, matching the
    /// caller-bug treatment used throughout this driver.
    pub fn rx_batch(&mut self, queue_id: usize, out: &mut [Option<PacketBuffer>], offset: usize, n: usize) -> usize {
        self.rx_queues[queue_id].rx_batch(out, offset, n)
    }

    /// Like [`Self::rx_batch`] but loops until exactly `n` packets have
    /// been received.
    pub fn rx_busy_wait(&mut self, queue_id: usize, out: &mut [Option<PacketBuffer>], offset: usize, n: usize) {
        self.rx_queues[queue_id].rx_busy_wait(out, offset, n)
    }

    /// Posts up to `n` buffers from `in_bufs[offset..]` to `queue_id` for
    /// transmission, returning how many were accepted.
    pub fn tx_batch(&mut self, queue_id: usize, in_bufs: &mut [Option<PacketBuffer>], offset: usize, n: usize) -> usize {
        self.tx_queues[queue_id].tx_batch(in_bufs, offset, n)
    }

    /// Like [`Self::tx_batch`] but loops until exactly `n` buffers have
    /// been accepted.
    pub fn tx_busy_wait(&mut self, queue_id: usize, in_bufs: &mut [Option<PacketBuffer>], offset: usize, n: usize) {
        self.tx_queues[queue_id].tx_busy_wait(in_bufs, offset, n)
    }

    /// Reads the six self-clearing hardware counters `ixy-stats`
    /// accumulates from.
    pub fn raw_stat_registers(&self) -> RawStatRegisters {
        RawStatRegisters {
            gprc: self.reg32(GPRC),
            gptc: self.reg32(GPTC),
            gorcl: self.reg32(GORCL),
            gorch: self.reg32(GORCH),
            gotcl: self.reg32(GOTCL),
            gotch: self.reg32(GOTCH),
        }
    }

    /// One throwaway read of all six counters, so a subsequent
    /// accumulation window starts from zero.
    pub fn reset_raw_stat_registers(&self) {
        let _ = self.raw_stat_registers();
    }

    fn reg32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.bar0_len, "register offset {offset:#x} out of bounds");
        unsafe { std::ptr::read_volatile(self.bar0.add(offset) as *const u32) }
    }

    fn set_reg32(&self, offset: usize, value: u32) {
        assert!(offset + 4 <= self.bar0_len, "register offset {offset:#x} out of bounds");
        unsafe { std::ptr::write_volatile(self.bar0.add(offset) as *mut u32, value) }
    }

    fn set_flags32(&self, offset: usize, flags: u32) {
        self.set_reg32(offset, self.reg32(offset) | flags);
    }

    fn clear_flags32(&self, offset: usize, flags: u32) {
        self.set_reg32(offset, self.reg32(offset) & !flags);
    }

    fn wait_set_reg32(&self, offset: usize, mask: u32) {
        while self.reg32(offset) & mask != mask {
            thread::sleep(REGISTER_POLL_INTERVAL);
        }
    }

    fn wait_clear_reg32(&self, offset: usize, mask: u32) {
        while self.reg32(offset) & mask != 0 {
            thread::sleep(REGISTER_POLL_INTERVAL);
        }
    }
}

impl Drop for IxgbeDevice {
    fn drop(&mut self) {
        self.clear_flags32(DMATXCTL, DMATXCTL_TE);
        self.clear_flags32(RXCTRL, RXCTRL_RXEN);
        if let Err(e) = self.pci.set_dma(false) {
            log::warn!("{}: failed to disable bus mastering at shutdown: {e}", self.pci.addr());
        }
        if let Err(e) = self.pci.bind(KERNEL_DRIVER) {
            log::warn!("{}: failed to re-bind {KERNEL_DRIVER} at shutdown: {e}", self.pci.addr());
        }
    }
}

const fn rdbal(i: usize) -> usize {
    RX_REGS_BASE + i * QUEUE_STRIDE
}
const fn rdbah(i: usize) -> usize {
    RX_REGS_BASE + i * QUEUE_STRIDE + 4
}
const fn rdlen(i: usize) -> usize {
    RX_REGS_BASE + i * QUEUE_STRIDE + 8
}
const fn rdh(i: usize) -> usize {
    RX_REGS_BASE + i * QUEUE_STRIDE + 16
}
const fn srrctl(i: usize) -> usize {
    RX_REGS_BASE + i * QUEUE_STRIDE + 20
}
const fn rdt(i: usize) -> usize {
    RX_REGS_BASE + i * QUEUE_STRIDE + 24
}
const fn rxdctl(i: usize) -> usize {
    RX_REGS_BASE + i * QUEUE_STRIDE + 40
}

const fn tdbal(i: usize) -> usize {
    TX_REGS_BASE + i * QUEUE_STRIDE
}
const fn tdbah(i: usize) -> usize {
    TX_REGS_BASE + i * QUEUE_STRIDE + 4
}
const fn tdlen(i: usize) -> usize {
    TX_REGS_BASE + i * QUEUE_STRIDE + 8
}
const fn tdh(i: usize) -> usize {
    TX_REGS_BASE + i * QUEUE_STRIDE + 16
}
const fn tdt(i: usize) -> usize {
    TX_REGS_BASE + i * QUEUE_STRIDE + 24
}
const fn txdctl(i: usize) -> usize {
    TX_REGS_BASE + i * QUEUE_STRIDE + 40
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_speed_decodes_datasheet_bit_patterns() {
        assert_eq!(LinkSpeed::from_links_reg(0), LinkSpeed::Unknown);
        assert_eq!(LinkSpeed::from_links_reg(LINKS_UP | LINKS_SPEED_10G), LinkSpeed::TenGb);
        assert_eq!(LinkSpeed::from_links_reg(LINKS_UP | LINKS_SPEED_1G), LinkSpeed::OneGb);
        assert_eq!(LinkSpeed::from_links_reg(LINKS_UP | LINKS_SPEED_100M), LinkSpeed::HundredMb);
    }

    #[test]
    fn link_speed_mbps_matches_expectations() {
        assert_eq!(LinkSpeed::TenGb.as_mbps(), 10_000);
        assert_eq!(LinkSpeed::OneGb.as_mbps(), 1000);
        assert_eq!(LinkSpeed::HundredMb.as_mbps(), 100);
        assert_eq!(LinkSpeed::Unknown.as_mbps(), 0);
    }

    #[test]
    fn queue_offsets_stay_within_their_64_byte_block() {
        assert_eq!(rdbal(0), 0x1000);
        assert_eq!(rdt(0), 0x1018);
        assert_eq!(rxdctl(0), 0x1028);
        assert_eq!(rdbal(1), 0x1000 + 0x40);
        assert_eq!(tdbal(0), 0x6000);
        assert_eq!(tdt(0), 0x6018);
        assert_eq!(txdctl(0), 0x6028);
    }
}
