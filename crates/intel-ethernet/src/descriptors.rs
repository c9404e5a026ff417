//! The advanced descriptor format used by the 82599 for both its receive
//! and transmit rings. Each ring slot is reused in two modes: "read",
//! which the driver writes to post a buffer, and "write-back", which the
//! hardware overwrites once it's done with the slot. Both modes occupy
//! the same 16 bytes, so drivers always describe them as one struct with
//! accessors for each view, not two distinct layouts.

use bit_field::BitField;
use ixy_memory::PhysicalAddress;
use std::fmt;
use volatile::Volatile;

/// Tx Descriptor Command: End of Packet
pub const TX_CMD_EOP: u32 = 0x0100_0000;
/// Tx Descriptor Command: Insert FCS
pub const TX_CMD_IFCS: u32 = 0x0200_0000;
/// Tx Descriptor Command: Report Status
pub const TX_CMD_RS: u32 = 0x0800_0000;
/// Tx Descriptor Command: Descriptor Extension (set for all advanced descriptors)
pub const TX_CMD_DEXT: u32 = 0x2000_0000;
/// Tx Descriptor Type: advanced data descriptor
pub const TX_DTYP_DATA: u32 = 0x0030_0000;
/// Shift to apply to a payload length before OR-ing it into `olinfo_status`
pub const TX_PAYLEN_SHIFT: u32 = 14;
/// Tx write-back status: Descriptor Done
pub const TX_STATUS_DD: u32 = 1 << 0;

/// Rx write-back status: Descriptor Done
pub const RX_STATUS_DD: u64 = 1 << 0;
/// Rx write-back status: End of Packet
pub const RX_STATUS_EOP: u64 = 1 << 1;

/// The minimum set of operations needed to post a receive buffer and read
/// back what the hardware filled in.
///
/// There is one receive descriptor per receive buffer; the datapath in
/// `nic-queues` expects ring slots to implement this trait rather than
/// depending on the 82599's layout directly.
pub trait RxDescriptor {
    /// Writes a fresh packet buffer address into the slot and clears its
    /// status, equivalent to [`Self::set_packet_address`] followed by
    /// [`Self::reset_status`].
    fn init(&mut self, packet_buffer_address: PhysicalAddress);

    /// Posts a new packet buffer address without touching status bits.
    fn set_packet_address(&mut self, packet_buffer_address: PhysicalAddress);

    /// Clears the status bits the hardware sets on completion, returning
    /// the slot to "read" mode.
    fn reset_status(&mut self);

    /// True once the hardware has copied a packet into this slot's buffer.
    fn descriptor_done(&self) -> bool;

    /// True if this slot holds the last buffer of its packet (always true
    /// here, since header splitting is never enabled).
    fn end_of_packet(&self) -> bool;

    /// Length of the packet copied into this slot's buffer, in bytes.
    fn length(&self) -> u64;
}

/// The minimum set of operations needed to post a transmit buffer and
/// poll for completion.
///
/// There is one transmit descriptor per transmit buffer; one descriptor
/// sends exactly one packet.
pub trait TxDescriptor {
    /// Clears the slot so it reads as empty.
    fn init(&mut self);

    /// Posts `transmit_buffer_addr` for transmission as a single packet of
    /// `transmit_buffer_length` bytes, setting EOP/RS/IFCS.
    fn send(&mut self, transmit_buffer_addr: PhysicalAddress, transmit_buffer_length: u16);

    /// True once the hardware has finished sending this slot's packet.
    fn descriptor_done(&self) -> bool;
}

/// Advanced receive descriptor. Both the "read" fields the driver writes
/// and the "write-back" fields the hardware writes alias the same 16
/// bytes; see the 82599 datasheet \S7.1.6 for the exact bit layout.
#[repr(C)]
pub struct AdvancedRxDescriptor {
    /// Read: physical address of the packet buffer. Write-back: RSS hash
    /// type / packet type / header length / RSS hash, packed per \S7.1.6.2.
    pub packet_buffer_address: Volatile<u64>,
    /// Read: physical address of the header buffer (unused, header
    /// splitting is never enabled). Write-back: extended status / error /
    /// packet length / VLAN tag.
    pub header_buffer_address: Volatile<u64>,
}

impl RxDescriptor for AdvancedRxDescriptor {
    fn init(&mut self, packet_buffer_address: PhysicalAddress) {
        self.set_packet_address(packet_buffer_address);
        self.reset_status();
    }

    fn set_packet_address(&mut self, packet_buffer_address: PhysicalAddress) {
        self.packet_buffer_address.write(packet_buffer_address.value());
    }

    fn reset_status(&mut self) {
        self.header_buffer_address.write(0);
    }

    fn descriptor_done(&self) -> bool {
        self.get_ext_status() & RX_STATUS_DD != 0
    }

    fn end_of_packet(&self) -> bool {
        self.get_ext_status() & RX_STATUS_EOP != 0
    }

    fn length(&self) -> u64 {
        self.get_pkt_len()
    }
}

impl AdvancedRxDescriptor {
    /// Write-back: packet type used for the Receive Side Scaling hash.
    pub fn get_rss_type(&self) -> u64 {
        self.packet_buffer_address.read().get_bits(0..3)
    }

    /// Write-back: packet type as identified by hardware.
    pub fn get_packet_type(&self) -> u64 {
        self.packet_buffer_address.read().get_bits(4..16)
    }

    /// Write-back: size of the packet header in bytes.
    pub fn get_hdr_len(&self) -> u64 {
        self.packet_buffer_address.read().get_bits(21..30)
    }

    /// Write-back: Receive Side Scaling hash.
    pub fn get_rss_hash(&self) -> u64 {
        self.packet_buffer_address.read().get_bits(32..63)
    }

    /// Write-back: status bits (descriptor done, end of packet, VLAN, ...).
    pub fn get_ext_status(&self) -> u64 {
        self.header_buffer_address.read().get_bits(0..19)
    }

    /// Write-back: per-packet-type error bits.
    pub fn get_ext_error(&self) -> u64 {
        self.header_buffer_address.read().get_bits(20..31)
    }

    /// Write-back: number of bytes posted to the packet buffer.
    pub fn get_pkt_len(&self) -> u64 {
        self.header_buffer_address.read().get_bits(32..47)
    }

    /// Write-back: VLAN tag, if the hardware stripped one from the packet.
    pub fn get_vlan_tag(&self) -> u64 {
        self.header_buffer_address.read().get_bits(48..63)
    }
}

impl fmt::Debug for AdvancedRxDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{packet_buffer_address: {:#x}, header_buffer_address: {:#x}}}",
            self.packet_buffer_address.read(),
            self.header_buffer_address.read()
        )
    }
}

/// Advanced transmit descriptor. Read fields are `buffer_address` /
/// `cmd_type_len` / `olinfo_status`; the hardware writes completion status
/// back into the low bit of the same 4 bytes `olinfo_status` occupied, so
/// this struct names that field `status` and only uses it that way.
#[repr(C)]
pub struct AdvancedTxDescriptor {
    pub buffer_address: Volatile<u64>,
    pub cmd_type_len: Volatile<u32>,
    pub status: Volatile<u32>,
}

impl TxDescriptor for AdvancedTxDescriptor {
    fn init(&mut self) {
        self.buffer_address.write(0);
        self.cmd_type_len.write(0);
        self.status.write(0);
    }

    fn send(&mut self, transmit_buffer_addr: PhysicalAddress, transmit_buffer_length: u16) {
        self.buffer_address.write(transmit_buffer_addr.value());
        self.cmd_type_len.write(
            TX_DTYP_DATA | TX_CMD_DEXT | TX_CMD_EOP | TX_CMD_IFCS | TX_CMD_RS | transmit_buffer_length as u32,
        );
        self.status.write((transmit_buffer_length as u32) << TX_PAYLEN_SHIFT);
    }

    fn descriptor_done(&self) -> bool {
        self.status.read() & TX_STATUS_DD != 0
    }
}

impl fmt::Debug for AdvancedTxDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{{buffer_address: {:#x}, cmd_type_len: {:#x}, status: {:#x}}}",
            self.buffer_address.read(),
            self.cmd_type_len.read(),
            self.status.read()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeroed_rx() -> AdvancedRxDescriptor {
        AdvancedRxDescriptor {
            packet_buffer_address: Volatile::new(0),
            header_buffer_address: Volatile::new(0),
        }
    }

    fn zeroed_tx() -> AdvancedTxDescriptor {
        AdvancedTxDescriptor {
            buffer_address: Volatile::new(0),
            cmd_type_len: Volatile::new(0),
            status: Volatile::new(0),
        }
    }

    #[test]
    fn rx_descriptor_not_done_until_hardware_sets_dd() {
        let desc = zeroed_rx();
        assert!(!desc.descriptor_done());
    }

    #[test]
    fn rx_descriptor_reports_done_and_length_from_write_back_fields() {
        let mut desc = zeroed_rx();
        let pkt_len: u64 = 128;
        let status = RX_STATUS_DD | RX_STATUS_EOP | (pkt_len << 32);
        desc.header_buffer_address.write(status);
        assert!(desc.descriptor_done());
        assert!(desc.end_of_packet());
        assert_eq!(desc.length(), pkt_len);
    }

    #[test]
    fn rx_descriptor_init_sets_address_and_clears_status() {
        let mut desc = zeroed_rx();
        desc.header_buffer_address.write(u64::MAX);
        desc.init(PhysicalAddress(0x1000));
        assert_eq!(desc.packet_buffer_address.read(), 0x1000);
        assert!(!desc.descriptor_done());
    }

    #[test]
    fn tx_descriptor_send_sets_eop_rs_ifcs_and_length() {
        let mut desc = zeroed_tx();
        desc.send(PhysicalAddress(0x2000), 64);
        assert_eq!(desc.buffer_address.read(), 0x2000);
        let cmd = desc.cmd_type_len.read();
        assert_eq!(cmd & TX_CMD_EOP, TX_CMD_EOP);
        assert_eq!(cmd & TX_CMD_RS, TX_CMD_RS);
        assert_eq!(cmd & TX_CMD_IFCS, TX_CMD_IFCS);
        assert_eq!(cmd & 0xffff, 64);
        assert!(!desc.descriptor_done());
    }

    #[test]
    fn tx_descriptor_done_once_hardware_sets_dd() {
        let mut desc = zeroed_tx();
        desc.send(PhysicalAddress(0x2000), 64);
        desc.status.write(TX_STATUS_DD);
        assert!(desc.descriptor_done());
    }
}
