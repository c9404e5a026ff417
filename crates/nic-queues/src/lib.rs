//! Generic RX/TX queue state machines. The ring memory layout and
//! batching algorithms here are NIC-agnostic; only the register accessors
//! (`RxQueueRegisters`/`TxQueueRegisters`) are device-specific, and those
//! are supplied by the caller.

mod rx_queue;
mod tx_queue;

pub use rx_queue::{RxQueue, RxQueueRegisters};
pub use tx_queue::{TxQueue, TxQueueRegisters};

/// Advances `index` by one slot, wrapping at `ring_size` (which must be a
/// power of two for the bitmask in the reference driver to apply, but a
/// plain modulo works for any ring size).
pub(crate) fn wrap_ring(index: usize, ring_size: usize) -> usize {
    (index + 1) % ring_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_ring_rolls_over_at_the_end() {
        assert_eq!(wrap_ring(0, 4), 1);
        assert_eq!(wrap_ring(3, 4), 0);
    }
}
