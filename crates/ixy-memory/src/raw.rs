//! Raw typed load/store at arbitrary addresses, and the volatile variants
//! that forbid compile-time reordering — the one primitive every layer
//! above (descriptors, registers) builds on. Spec \S4.1: "a `volatile`
//! family that forbids compiler reordering; it does not need to expose a
//! JIT-safe variant."

use crate::address::VirtualAddress;

macro_rules! define_accessors {
    ($ty:ty, $read_fn:ident, $write_fn:ident, $read_volatile_fn:ident, $write_volatile_fn:ident) => {
        /// # Safety
        /// `addr` must point to a valid, readable `
        #[doc = stringify!($ty)]
        /// ` located within memory owned by the caller for the lifetime of
        /// the read.
        pub unsafe fn $read_fn(addr: VirtualAddress) -> $ty {
            *(addr.as_ptr() as *const $ty)
        }

        /// # Safety
        /// `addr` must point to valid, writable memory of the right size.
        pub unsafe fn $write_fn(addr: VirtualAddress, value: $ty) {
            *(addr.as_ptr() as *mut $ty) = value;
        }

        /// # Safety
        /// Same requirements as
        #[doc = stringify!($read_fn)]
        /// ; additionally forbids the compiler from reordering this read
        /// with respect to other volatile accesses.
        pub unsafe fn $read_volatile_fn(addr: VirtualAddress) -> $ty {
            std::ptr::read_volatile(addr.as_ptr() as *const $ty)
        }

        /// # Safety
        /// Same requirements as
        #[doc = stringify!($write_fn)]
        /// ; additionally forbids the compiler from reordering this write
        /// with respect to other volatile accesses.
        pub unsafe fn $write_volatile_fn(addr: VirtualAddress, value: $ty) {
            std::ptr::write_volatile(addr.as_ptr() as *mut $ty, value);
        }
    };
}

define_accessors!(u8, read_u8, write_u8, read_volatile_u8, write_volatile_u8);
define_accessors!(u16, read_u16, write_u16, read_volatile_u16, write_volatile_u16);
define_accessors!(u32, read_u32, write_u32, read_volatile_u32, write_volatile_u32);
define_accessors!(u64, read_u64, write_u64, read_volatile_u64, write_volatile_u64);

/// A store-store fence. On x86_64 this is a no-op at the hardware level
/// (already strongly store-ordered) but is issued anyway so the ordering
/// requirement in spec \S5 is visible in the code and holds on any target.
#[inline]
pub fn store_fence() {
    std::sync::atomic::fence(std::sync::atomic::Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_local_buffer() {
        let mut buf = [0u8; 16];
        let addr = VirtualAddress(buf.as_mut_ptr() as usize);
        unsafe {
            write_volatile_u32(addr.offset(4), 0xdead_beef);
            assert_eq!(read_volatile_u32(addr.offset(4)), 0xdead_beef);
            write_volatile_u64(addr.offset(8), 0x1122_3344_5566_7788);
            assert_eq!(read_volatile_u64(addr.offset(8)), 0x1122_3344_5566_7788);
        }
    }
}
