//! The packet buffer: a fixed 64-byte header followed by payload, per
//! spec \S3. The reference driver refers to buffers by their virtual
//! address as a bare integer; this models them instead as a strongly-typed
//! handle wrapping a pointer; the header offsets are otherwise unchanged.

use ixy_memory::{PhysicalAddress, VirtualAddress};

pub const HEADER_SIZE: usize = 64;

#[repr(C)]
struct Header {
    physical_address: u64,
    mempool_handle: u64,
    reserved: u32,
    packet_size: u32,
    _padding: [u8; 40],
}

const _: () = assert!(std::mem::size_of::<Header>() == HEADER_SIZE);

/// A handle to one slot of a memory pool's DMA region. Holds no payload
/// data itself — it's a typed pointer into memory the pool owns.
pub struct PacketBuffer {
    addr: VirtualAddress,
}

impl PacketBuffer {
    /// Writes a fresh header into the slot at `addr`. Called once per slot
    /// when a pool is first populated.
    ///
    /// # Safety
    /// `addr` must point to at least `HEADER_SIZE` bytes of writable
    /// memory exclusively owned by the caller.
    pub(crate) unsafe fn init_header(addr: VirtualAddress, physical_address: PhysicalAddress, mempool_handle: u64) {
        let header = addr.as_ptr() as *mut Header;
        (*header).physical_address = physical_address.value();
        (*header).mempool_handle = mempool_handle;
        (*header).reserved = 0;
        (*header).packet_size = 0;
        (*header)._padding = [0u8; 40];
    }

    /// Wraps an already-initialized slot address as a `PacketBuffer`.
    ///
    /// # Safety
    /// `addr` must point to a slot that was previously initialized with
    /// [`Self::init_header`] and is not currently owned by any other
    /// `PacketBuffer`.
    pub(crate) unsafe fn from_raw(addr: VirtualAddress) -> Self {
        Self { addr }
    }

    /// Releases ownership of the underlying slot address, e.g. to push it
    /// back onto a pool's free stack.
    pub(crate) fn into_raw(self) -> VirtualAddress {
        self.addr
    }

    fn header(&self) -> &Header {
        unsafe { &*(self.addr.as_ptr() as *const Header) }
    }

    fn header_mut(&mut self) -> &mut Header {
        unsafe { &mut *(self.addr.as_ptr() as *mut Header) }
    }

    /// The DMA address of byte 0 of this buffer. Written once at
    /// allocation time, never mutated.
    pub fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress(self.header().physical_address)
    }

    /// The id of the pool that owns this buffer's underlying slot.
    pub fn mempool_handle(&self) -> u64 {
        self.header().mempool_handle
    }

    /// Payload length in bytes, as set by the last RX or TX caller.
    pub fn packet_size(&self) -> u32 {
        self.header().packet_size
    }

    pub fn set_packet_size(&mut self, size: u32) {
        self.header_mut().packet_size = size;
    }

    pub fn virtual_address(&self) -> VirtualAddress {
        self.addr
    }

    pub fn payload(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self.addr.as_ptr().add(HEADER_SIZE) as *const u8,
                self.packet_size() as usize,
            )
        }
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let len = self.packet_size() as usize;
        unsafe { std::slice::from_raw_parts_mut(self.addr.as_ptr().add(HEADER_SIZE), len) }
    }
}

impl std::fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("physical_address", &self.physical_address())
            .field("mempool_handle", &self.mempool_handle())
            .field("packet_size", &self.packet_size())
            .finish()
    }
}
