use intel_ethernet::descriptors::{AdvancedTxDescriptor, TxDescriptor};
use ixy_memory::raw::store_fence;
use nic_buffers::{Mempool, PacketBuffer};

use crate::wrap_ring;

/// Number of descriptors looked at in one reclamation pass. Matches the
/// reference driver's batching: checking every descriptor's DD bit is
/// wasteful, so only the descriptor 32 slots ahead of `clean_index` is
/// checked, and if it's done all 32 buffers behind it are too.
const TX_CLEAN_BATCH: usize = 32;

/// The register operation a TX queue needs from its device. Ring base
/// address/length/head are programmed once, directly, during `init_tx`;
/// the tail register is the only one the datapath itself ever touches.
pub trait TxQueueRegisters {
    fn set_tdt(&mut self, value: u32);
}

/// One hardware transmit queue: a descriptor ring in DMA memory, the
/// buffer installed in each ring slot awaiting hardware completion, a
/// `tx_index` of the next free slot, and a `clean_index` of the oldest
/// slot not yet reclaimed.
pub struct TxQueue<R: TxQueueRegisters> {
    descriptors: *mut AdvancedTxDescriptor,
    num_descriptors: usize,
    bufs_in_use: Vec<Option<PacketBuffer>>,
    tx_index: usize,
    clean_index: usize,
    regs: R,
}

impl<R: TxQueueRegisters> TxQueue<R> {
    /// Takes ownership of an already ring-sized descriptor array and
    /// clears every slot.
    ///
    /// # Safety
    /// `descriptors` must point to `num_descriptors` contiguous, writable
    /// `AdvancedTxDescriptor` slots backed by DMA memory whose physical
    /// address the caller has already programmed into the device.
    pub unsafe fn new(descriptors: *mut AdvancedTxDescriptor, num_descriptors: usize, regs: R) -> Self {
        for i in 0..num_descriptors {
            (*descriptors.add(i)).init();
        }
        Self {
            descriptors,
            num_descriptors,
            bufs_in_use: (0..num_descriptors).map(|_| None).collect(),
            tx_index: 0,
            clean_index: 0,
            regs,
        }
    }

    /// Returns completed buffers to their originating mempools, advancing
    /// `clean_index` in batches of [`TX_CLEAN_BATCH`].
    fn reclaim(&mut self) {
        loop {
            if self.clean_index == self.tx_index {
                return;
            }
            let cleanable = (self.tx_index + self.num_descriptors - self.clean_index) % self.num_descriptors;
            if cleanable < TX_CLEAN_BATCH {
                return;
            }
            let lookahead = (self.clean_index + TX_CLEAN_BATCH - 1) % self.num_descriptors;
            let desc = unsafe { &*self.descriptors.add(lookahead) };
            if !desc.descriptor_done() {
                return;
            }

            for _ in 0..TX_CLEAN_BATCH {
                if let Some(buf) = self.bufs_in_use[self.clean_index].take() {
                    if let Some(pool) = Mempool::find_owner(&buf) {
                        pool.lock().unwrap().release(buf);
                    }
                }
                self.clean_index = wrap_ring(self.clean_index, self.num_descriptors);
                if self.clean_index == self.tx_index {
                    break;
                }
            }
        }
    }

    /// Reclaims completed buffers, then posts up to `n` buffers from
    /// `in_bufs[offset..]` for transmission, returning how many were
    /// accepted. Stops early if the ring fills up.
    pub fn tx_batch(&mut self, in_bufs: &mut [Option<PacketBuffer>], offset: usize, n: usize) -> usize {
        self.reclaim();

        let mut sent = 0;
        while sent < n && offset + sent < in_bufs.len() {
            let next_tx_index = wrap_ring(self.tx_index, self.num_descriptors);
            if next_tx_index == self.clean_index {
                break;
            }
            let buf = match in_bufs[offset + sent].take() {
                Some(buf) => buf,
                None => break,
            };

            let desc = unsafe { &mut *self.descriptors.add(self.tx_index) };
            desc.send(buf.physical_address(), buf.packet_size() as u16);
            self.bufs_in_use[self.tx_index] = Some(buf);

            self.tx_index = next_tx_index;
            sent += 1;
        }

        if sent > 0 {
            store_fence();
            self.regs.set_tdt(self.tx_index as u32);
        }
        sent
    }

    /// Like [`Self::tx_batch`] but loops until exactly `n` buffers have
    /// been accepted.
    pub fn tx_busy_wait(&mut self, in_bufs: &mut [Option<PacketBuffer>], offset: usize, n: usize) {
        let mut sent = 0;
        while sent < n {
            sent += self.tx_batch(in_bufs, offset + sent, n - sent);
        }
    }
}

unsafe impl<R: TxQueueRegisters + Send> Send for TxQueue<R> {}
