//! Fixed-capacity packet buffer pool, per spec \S4.2.
//!
//! Grounded on the reference driver's `Mempool` / `allocate_mempool` /
//! `pkt_buf_alloc_batch` / `pkt_buf_free`: one contiguous DMA region is
//! carved into equal-size slots, and a stack of free slot addresses backs
//! O(1) acquire/release. The one thing added here that the reference
//! driver doesn't need is a process-wide pool directory — its buffers
//! carry a live reference to their owning pool, but this crate's
//! `PacketBuffer` header can only hold a plain integer handle, so
//! resolving that handle back to a pool has to go through a registry.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ixy_memory::{DmaBuffer, PhysicalAddress};
use lazy_static::lazy_static;

use crate::packet_buffer::PacketBuffer;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

lazy_static! {
    static ref MEMPOOL_DIRECTORY: Mutex<BTreeMap<u64, Arc<Mutex<Mempool>>>> = Mutex::new(BTreeMap::new());
}

/// A fixed-capacity pool of equal-size packet buffers carved out of a
/// single DMA region. Not thread-safe: the expected usage is one pool per
/// RX queue, touched only by the thread that polls that queue.
pub struct Mempool {
    id: u64,
    entry_size: usize,
    capacity: usize,
    free_stack: Vec<ixy_memory::VirtualAddress>,
}

impl Mempool {
    /// Carves `dma` into `capacity` slots of `entry_size` bytes each,
    /// writes each slot's header, and registers the resulting pool in the
    /// process-wide directory under a freshly allocated id.
    ///
    /// Panics if `dma` is too small to hold `capacity * entry_size` bytes;
    /// that's a caller bug, not a runtime condition.
    pub fn allocate(capacity: usize, entry_size: usize, dma: &DmaBuffer) -> Arc<Mutex<Mempool>> {
        assert!(
            dma.size >= capacity * entry_size,
            "dma region of {} bytes too small for {} slots of {} bytes",
            dma.size,
            capacity,
            entry_size
        );

        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);

        for i in 0..capacity {
            let slot_addr = dma.virt_addr.offset(i * entry_size);
            let slot_phys = PhysicalAddress(dma.phys_addr.value() + (i * entry_size) as u64);
            unsafe {
                PacketBuffer::init_header(slot_addr, slot_phys, id);
            }
        }

        // Push in reverse so that acquire() hands out slot 0 first, matching
        // the reference driver's allocation order.
        let free_stack = (0..capacity).rev().map(|i| dma.virt_addr.offset(i * entry_size)).collect();

        let pool = Arc::new(Mutex::new(Mempool {
            id,
            entry_size,
            capacity,
            free_stack,
        }));

        MEMPOOL_DIRECTORY.lock().unwrap().insert(id, Arc::clone(&pool));
        log::debug!("allocated mempool {id} with {capacity} entries of {entry_size} bytes");
        pool
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    /// Number of buffers currently available to acquire.
    pub fn free_count(&self) -> usize {
        self.free_stack.len()
    }

    /// Pops one buffer off the free stack, or `None` if the pool is
    /// exhausted.
    pub fn acquire(&mut self) -> Option<PacketBuffer> {
        self.free_stack.pop().map(|addr| unsafe { PacketBuffer::from_raw(addr) })
    }

    /// Fills `out[offset..offset+n]` with up to `n` freshly acquired
    /// buffers, stopping early if the pool runs dry. Returns the number of
    /// slots actually filled.
    pub fn acquire_batch(&mut self, out: &mut [Option<PacketBuffer>], offset: usize, n: usize) -> usize {
        let available = out.len().saturating_sub(offset);
        let n = n.min(available).min(self.free_stack.len());
        for slot in out.iter_mut().skip(offset).take(n) {
            *slot = self.acquire();
        }
        n
    }

    /// Returns `buf` to the free stack. In debug builds, asserts that
    /// `buf` actually belongs to this pool — a buffer released to the
    /// wrong pool would silently corrupt both pools' free stacks.
    pub fn release(&mut self, buf: PacketBuffer) {
        debug_assert_eq!(
            buf.mempool_handle(),
            self.id,
            "buffer with mempool_handle {} released to pool {}",
            buf.mempool_handle(),
            self.id
        );
        self.free_stack.push(buf.into_raw());
    }

    /// Releases up to `n` buffers from `bufs[offset..offset+n]`, taking
    /// each `Some` slot and leaving `None` behind. Returns the number of
    /// buffers actually released.
    pub fn release_batch(&mut self, bufs: &mut [Option<PacketBuffer>], offset: usize, n: usize) -> usize {
        let available = bufs.len().saturating_sub(offset);
        let n = n.min(available);
        let mut released = 0;
        for slot in bufs.iter_mut().skip(offset).take(n) {
            if let Some(buf) = slot.take() {
                self.release(buf);
                released += 1;
            }
        }
        released
    }

    /// Looks up a pool by id in the process-wide directory. `O(log N)` in
    /// the number of live pools.
    pub fn find(id: u64) -> Option<Arc<Mutex<Mempool>>> {
        MEMPOOL_DIRECTORY.lock().unwrap().get(&id).cloned()
    }

    /// Looks up the pool that owns `buf`, equivalent to
    /// `Self::find(buf.mempool_handle())`.
    pub fn find_owner(buf: &PacketBuffer) -> Option<Arc<Mutex<Mempool>>> {
        Self::find(buf.mempool_handle())
    }
}

impl Drop for Mempool {
    fn drop(&mut self) {
        MEMPOOL_DIRECTORY.lock().unwrap().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backing_buffer(capacity: usize, entry_size: usize) -> (Vec<u8>, DmaBuffer) {
        let mut backing = vec![0u8; capacity * entry_size];
        let virt_addr = ixy_memory::VirtualAddress(backing.as_mut_ptr() as usize);
        let dma = DmaBuffer {
            virt_addr,
            phys_addr: PhysicalAddress(virt_addr.0 as u64),
            size: backing.len(),
        };
        (backing, dma)
    }

    #[test]
    fn find_resolves_a_buffers_owning_pool() {
        let (_backing, dma) = backing_buffer(4, 2048);
        let pool = Mempool::allocate(4, 2048, &dma);
        let buf = pool.lock().unwrap().acquire().expect("pool should not be empty");

        let found = Mempool::find_owner(&buf).expect("pool should still be registered");
        assert_eq!(found.lock().unwrap().id(), pool.lock().unwrap().id());
    }

    #[test]
    fn release_then_acquire_round_trip_leaves_depth_unchanged() {
        let (_backing, dma) = backing_buffer(4, 2048);
        let pool = Mempool::allocate(4, 2048, &dma);
        let depth_before = pool.lock().unwrap().free_count();

        let buf = pool.lock().unwrap().acquire().unwrap();
        assert_eq!(pool.lock().unwrap().free_count(), depth_before - 1);
        pool.lock().unwrap().release(buf);
        assert_eq!(pool.lock().unwrap().free_count(), depth_before);
    }

    #[test]
    fn exhausting_and_refilling_a_pool() {
        let (_backing, dma) = backing_buffer(2048, 2048);
        let pool = Mempool::allocate(2048, 2048, &dma);

        let mut held: Vec<Option<PacketBuffer>> = (0..2048).map(|_| None).collect();
        let acquired = pool.lock().unwrap().acquire_batch(&mut held, 0, 2048);
        assert_eq!(acquired, 2048);
        assert_eq!(pool.lock().unwrap().free_count(), 0);
        assert!(pool.lock().unwrap().acquire().is_none());

        let released = pool.lock().unwrap().release_batch(&mut held, 0, 2048);
        assert_eq!(released, 2048);
        assert_eq!(pool.lock().unwrap().free_count(), 2048);
        assert!(held.iter().all(|slot| slot.is_none()));
    }
}
