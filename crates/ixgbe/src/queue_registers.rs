//! `RxQueueRegisters`/`TxQueueRegisters` implementations over a raw pointer
//! into BAR0. Each queue's 64-byte register block lives at a fixed offset
//! from the queue base (see `regs::{RX_REGS_BASE, TX_REGS_BASE, QUEUE_STRIDE}`);
//! these structs just compute that offset once and deref it as the
//! appropriate `RegistersRx`/`RegistersTx` for the lifetime of the device.

use nic_queues::{RxQueueRegisters, TxQueueRegisters};

use crate::regs::{RegistersRx, RegistersTx, QUEUE_STRIDE, RX_REGS_BASE, TX_REGS_BASE};

/// Registers for one receive queue, as an offset into BAR0.
///
/// # Safety
/// `bar0` must remain a valid mapping of the device's BAR0 for as long as
/// this struct is alive, and `queue_index` must be within the number of
/// queues the device was configured with.
pub struct IxgbeRxQueueRegisters {
    regs: *mut RegistersRx,
}

impl IxgbeRxQueueRegisters {
    /// # Safety
    /// `bar0` must point to a live BAR0 mapping at least
    /// `RX_REGS_BASE + (queue_index + 1) * QUEUE_STRIDE` bytes long.
    pub unsafe fn new(bar0: *mut u8, queue_index: usize) -> Self {
        let offset = RX_REGS_BASE + queue_index * QUEUE_STRIDE;
        Self {
            regs: bar0.add(offset) as *mut RegistersRx,
        }
    }
}

impl RxQueueRegisters for IxgbeRxQueueRegisters {
    fn set_rdt(&mut self, value: u32) {
        unsafe { (*self.regs).rdt.write(value) }
    }
}

unsafe impl Send for IxgbeRxQueueRegisters {}

/// Registers for one transmit queue, as an offset into BAR0.
///
/// # Safety
/// Same requirements as [`IxgbeRxQueueRegisters`].
pub struct IxgbeTxQueueRegisters {
    regs: *mut RegistersTx,
}

impl IxgbeTxQueueRegisters {
    /// # Safety
    /// `bar0` must point to a live BAR0 mapping at least
    /// `TX_REGS_BASE + (queue_index + 1) * QUEUE_STRIDE` bytes long.
    pub unsafe fn new(bar0: *mut u8, queue_index: usize) -> Self {
        let offset = TX_REGS_BASE + queue_index * QUEUE_STRIDE;
        Self {
            regs: bar0.add(offset) as *mut RegistersTx,
        }
    }
}

impl TxQueueRegisters for IxgbeTxQueueRegisters {
    fn set_tdt(&mut self, value: u32) {
        unsafe { (*self.regs).tdt.write(value) }
    }
}

unsafe impl Send for IxgbeTxQueueRegisters {}
