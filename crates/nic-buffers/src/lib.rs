//! Packet buffers and the fixed-capacity pool they're drawn from.

mod mempool;
mod packet_buffer;

pub use mempool::Mempool;
pub use packet_buffer::{PacketBuffer, HEADER_SIZE};
