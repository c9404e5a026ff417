//! Register offsets and bit definitions for the 82599 (section 7 of the
//! datasheet). Singleton registers are addressed as flat offsets into the
//! BAR0 mapping; per-queue registers share one 64-byte block repeated once
//! per queue, expressed here as `RegistersRx`/`RegistersTx` and indexed by
//! `RX_REGS_BASE + queue * QUEUE_STRIDE` / `TX_REGS_BASE + queue * QUEUE_STRIDE`.

use volatile::Volatile;

/// Device Control Register
pub const CTRL: usize = 0x00000;
/// Device Status Register
pub const STATUS: usize = 0x00008;
/// Extended Device Control Register
pub const CTRL_EXT: usize = 0x00018;
/// Extended Interrupt Mask Clear Register
pub const EIMC: usize = 0x00888;
/// Receive DMA Control Register
pub const RDRXCTL: usize = 0x02F00;
/// Receive Control Register
pub const RXCTRL: usize = 0x03000;
/// Receive Packet Buffer Size
pub const RXPBSIZE: usize = 0x03C00;
/// Filter Control Register
pub const FCTRL: usize = 0x05080;
/// MAC Core Control 0 Register
pub const HLREG0: usize = 0x04240;
/// Auto-Negotiation Control Register
pub const AUTOC: usize = 0x042A0;
/// Link Status Register
pub const LINKS: usize = 0x042A4;
/// Auto-Negotiation Control 2 Register
pub const AUTOC2: usize = 0x042A8;
/// Good Packets Received Count (self-clearing on read)
pub const GPRC: usize = 0x04074;
/// Good Packets Transmitted Count
pub const GPTC: usize = 0x04080;
/// Good Octets Received Count Low
pub const GORCL: usize = 0x04088;
/// Good Octets Received Count High
pub const GORCH: usize = 0x0408C;
/// Good Octets Transmitted Count Low
pub const GOTCL: usize = 0x04090;
/// Good Octets Transmitted Count High
pub const GOTCH: usize = 0x04094;
/// DCB Transmit Descriptor Plane Control and Status
pub const RTTDCS: usize = 0x04900;
/// DMA Tx Control
pub const DMATXCTL: usize = 0x04A80;
/// Transmit Packet Buffer Size
pub const TXPBSIZE: usize = 0x0CC00;
/// EEPROM/Flash Control Register
pub const EEC: usize = 0x10010;

/// Offset of the first RX queue's 64-byte register block.
pub const RX_REGS_BASE: usize = 0x1000;
/// Offset of the first TX queue's 64-byte register block.
pub const TX_REGS_BASE: usize = 0x6000;
/// Byte distance between consecutive queues' register blocks, for both RX and TX.
pub const QUEUE_STRIDE: usize = 0x40;

/// Set of registers associated with one receive descriptor queue, reused
/// for every queue at `RX_REGS_BASE + queue_index * QUEUE_STRIDE`.
#[repr(C)]
pub struct RegistersRx {
    /// Receive Descriptor Base Address Low
    pub rdbal: Volatile<u32>,
    /// Receive Descriptor Base Address High
    pub rdbah: Volatile<u32>,
    /// Receive Descriptor Length
    pub rdlen: Volatile<u32>,
    /// Rx DCA Control Register
    pub dca_rxctrl: Volatile<u32>,
    /// Receive Descriptor Head
    pub rdh: Volatile<u32>,
    /// Split Receive Control Register (descriptor type, drop-on-full)
    pub srrctl: Volatile<u32>,
    /// Receive Descriptor Tail
    pub rdt: Volatile<u32>,
    _padding1: [u8; 12],
    /// Receive Descriptor Control
    pub rxdctl: Volatile<u32>,
    _padding2: [u8; 20],
}

const _: () = assert!(core::mem::size_of::<RegistersRx>() == 64);

/// Set of registers associated with one transmit descriptor queue, reused
/// for every queue at `TX_REGS_BASE + queue_index * QUEUE_STRIDE`.
#[repr(C)]
pub struct RegistersTx {
    /// Transmit Descriptor Base Address Low
    pub tdbal: Volatile<u32>,
    /// Transmit Descriptor Base Address High
    pub tdbah: Volatile<u32>,
    /// Transmit Descriptor Length
    pub tdlen: Volatile<u32>,
    /// Tx DCA Control Register
    pub dca_txctrl: Volatile<u32>,
    /// Transmit Descriptor Head
    pub tdh: Volatile<u32>,
    _padding0: [u8; 4],
    /// Transmit Descriptor Tail
    pub tdt: Volatile<u32>,
    _padding1: [u8; 12],
    /// Transmit Descriptor Control
    pub txdctl: Volatile<u32>,
    _padding2: [u8; 12],
    /// Transmit Descriptor Completion Write Back Address Low
    pub tdwbal: Volatile<u32>,
    /// Transmit Descriptor Completion Write Back Address High
    pub tdwbah: Volatile<u32>,
}

const _: () = assert!(core::mem::size_of::<RegistersTx>() == 64);

// CTRL
pub const CTRL_RST: u32 = 1 << 26;

// EIMC / interrupts
pub const DISABLE_INTERRUPTS: u32 = 0x7FFF_FFFF;

// EEC: bit 9 indicates the hardware's autonomous EEPROM read completed.
pub const EEC_AUTO_RD: u32 = 1 << 9;

// RDRXCTL
pub const RDRXCTL_DMAIDONE: u32 = 1 << 3;
pub const RDRXCTL_CRC_STRIP: u32 = 1;

// AUTOC / link setup
pub const AUTOC_LMS_10_GBE_S: u32 = 3 << 13;
pub const AUTOC_10G_PMA_PMD_CLEAR: u32 = 0x0000_0180;
pub const AUTOC_RESTART_AN: u32 = 1 << 12;
pub const AUTOC2_10G_PMA_PMD_S_CLEAR: u32 = 0x0003_0000;
pub const AUTOC2_10G_PMA_PMD_S_SFI: u32 = 1 << 17;

// LINKS
pub const LINKS_UP: u32 = 1 << 30;
pub const LINKS_SPEED_MASK: u32 = 0x3 << 28;
pub const LINKS_SPEED_100M: u32 = 1 << 28;
pub const LINKS_SPEED_1G: u32 = 2 << 28;
pub const LINKS_SPEED_10G: u32 = 3 << 28;

// RXCTRL
pub const RXCTRL_RXEN: u32 = 1;

// FCTRL
pub const FCTRL_BAM: u32 = 1 << 10;
pub const FCTRL_MPE: u32 = 1 << 8;
pub const FCTRL_UPE: u32 = 1 << 9;

// HLREG0
pub const HLREG0_TXCRCEN: u32 = 1;
pub const HLREG0_RXCRCSTRP: u32 = 1 << 1;
pub const HLREG0_TXPADEN: u32 = 1 << 10;

// RXPBSIZE / TXPBSIZE: packet buffer size in KB, shifted into bits 10-19
pub const RXPBSIZE_512KB: u32 = 0x200 << 10;
pub const TXPBSIZE_160KB: u32 = 0xA0 << 10;

// RTTDCS
pub const RTTDCS_ARBDIS: u32 = 1 << 6;

// DMATXCTL
pub const DMATXCTL_TE: u32 = 1;

// SRRCTL
pub const SRRCTL_DESCTYPE_MASK: u32 = 0x7 << 25;
pub const SRRCTL_DESCTYPE_ADV_ONEBUF: u32 = 1 << 25;
pub const SRRCTL_DROP_EN: u32 = 1 << 31;

// RXDCTL / TXDCTL
pub const RXDCTL_ENABLE: u32 = 1 << 25;
pub const TXDCTL_ENABLE: u32 = 1 << 25;
/// Tx descriptor pre-fetch/host/write-back thresholds (values taken from DPDK).
pub const TXDCTL_PTHRESH: u32 = 36;
pub const TXDCTL_HTHRESH: u32 = 8 << 8;
pub const TXDCTL_WTHRESH: u32 = 4 << 16;
