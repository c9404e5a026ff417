use std::sync::{Arc, Mutex};

use intel_ethernet::descriptors::{AdvancedRxDescriptor, RxDescriptor};
use ixy_memory::raw::store_fence;
use nic_buffers::{Mempool, PacketBuffer};

use crate::wrap_ring;

/// The register operation an RX queue needs from its device. Ring base
/// address/length/head are programmed once, directly, during `init_rx`;
/// the tail register is the only one the datapath itself ever touches.
pub trait RxQueueRegisters {
    fn set_rdt(&mut self, value: u32);
}

/// One hardware receive queue: a descriptor ring in DMA memory, the
/// buffer installed in each ring slot, and the mempool new buffers are
/// drawn from as received ones are handed to the caller.
pub struct RxQueue<R: RxQueueRegisters> {
    descriptors: *mut AdvancedRxDescriptor,
    num_descriptors: usize,
    bufs_in_use: Vec<Option<PacketBuffer>>,
    pool: Arc<Mutex<Mempool>>,
    rx_index: usize,
    regs: R,
}

impl<R: RxQueueRegisters> RxQueue<R> {
    /// Takes ownership of an already ring-sized, already-zeroed descriptor
    /// array, fills every slot with a fresh buffer from `pool`, and
    /// programs the tail register to `num_descriptors - 1`.
    ///
    /// # Safety
    /// `descriptors` must point to `num_descriptors` contiguous, writable
    /// `AdvancedRxDescriptor` slots backed by DMA memory whose physical
    /// address the caller has already programmed into the device (`RDBAL`/
    /// `RDBAH`).
    pub unsafe fn new(
        descriptors: *mut AdvancedRxDescriptor,
        num_descriptors: usize,
        pool: Arc<Mutex<Mempool>>,
        mut regs: R,
    ) -> Self {
        let mut bufs_in_use = Vec::with_capacity(num_descriptors);
        for i in 0..num_descriptors {
            let buf = pool
                .lock()
                .unwrap()
                .acquire()
                .expect("rx queue mempool exhausted during initialization");
            (*descriptors.add(i)).init(buf.physical_address());
            bufs_in_use.push(Some(buf));
        }

        regs.set_rdt((num_descriptors - 1) as u32);

        Self {
            descriptors,
            num_descriptors,
            bufs_in_use,
            pool,
            rx_index: 0,
            regs,
        }
    }

    /// Drains up to `n` received packets into `out[offset..]`, returning
    /// how many were actually received. Stops as soon as a descriptor
    /// isn't done yet; never blocks.
    pub fn rx_batch(&mut self, out: &mut [Option<PacketBuffer>], offset: usize, n: usize) -> usize {
        let mut received = 0;
        let mut last_rx_index = self.rx_index;

        while received < n && offset + received < out.len() {
            let idx = self.rx_index;
            let desc = unsafe { &mut *self.descriptors.add(idx) };
            if !desc.descriptor_done() {
                break;
            }
            assert!(desc.end_of_packet(), "multi-descriptor packets are not supported");

            let length = desc.length();
            let mut buf = self.bufs_in_use[idx]
                .take()
                .expect("rx queue slot had no buffer installed");
            buf.set_packet_size(length as u32);

            let new_buf = self
                .pool
                .lock()
                .unwrap()
                .acquire()
                .expect("rx queue mempool exhausted");
            desc.init(new_buf.physical_address());
            self.bufs_in_use[idx] = Some(new_buf);

            out[offset + received] = Some(buf);

            last_rx_index = idx;
            self.rx_index = wrap_ring(idx, self.num_descriptors);
            received += 1;
        }

        if received > 0 {
            store_fence();
            self.regs.set_rdt(last_rx_index as u32);
        }
        received
    }

    /// Like [`Self::rx_batch`] but loops until exactly `n` packets have
    /// been received.
    pub fn rx_busy_wait(&mut self, out: &mut [Option<PacketBuffer>], offset: usize, n: usize) {
        let mut received = 0;
        while received < n {
            received += self.rx_batch(out, offset + received, n - received);
        }
    }
}

unsafe impl<R: RxQueueRegisters + Send> Send for RxQueue<R> {}
