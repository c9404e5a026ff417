//! Packet/byte counters accumulated from an [`ixgbe::IxgbeDevice`]'s
//! self-clearing hardware registers (\S4.7).

use ixgbe::IxgbeDevice;

/// Per-device interface counters between frame headers (14 bytes),
/// preamble (7), start-of-frame delimiter (1), and inter-frame gap (12)
/// are not carried by the NIC's register counters, but are real wire time;
/// `print_diff` accounts for them as a flat 20-byte-per-packet overhead.
const PER_PACKET_OVERHEAD_BYTES: u64 = 20;

/// Four saturating counters, accumulated across however many [`read`]
/// calls the caller makes. Never decreases except via [`reset`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

fn combine(low: u32, high: u32) -> u64 {
    low as u64 | ((high as u64) << 32)
}

/// Reads the device's six hardware counters and accumulates them into
/// `stats`. The registers self-clear on read, so calling this repeatedly
/// accumulates a running total rather than re-reading the same values.
pub fn read(device: &IxgbeDevice, stats: &mut Stats) {
    let raw = device.raw_stat_registers();

    stats.rx_packets = stats.rx_packets.saturating_add(raw.gprc as u64);
    stats.tx_packets = stats.tx_packets.saturating_add(raw.gptc as u64);
    stats.rx_bytes = stats.rx_bytes.saturating_add(combine(raw.gorcl, raw.gorch));
    stats.tx_bytes = stats.tx_bytes.saturating_add(combine(raw.gotcl, raw.gotch));
}

/// Throws away one read of all six counters, so a subsequent accumulation
/// window (via repeated [`read`] calls) starts from zero.
pub fn reset(device: &IxgbeDevice) {
    device.reset_raw_stat_registers();
}

/// Logs the packet-rate and bit-rate delta between `old` and `now` over
/// `ns_elapsed` nanoseconds, at `info!` level.
pub fn print_diff(old: &Stats, now: &Stats, ns_elapsed: u64) {
    let seconds = ns_elapsed as f64 / 1_000_000_000.0;

    let rx_packets = now.rx_packets.saturating_sub(old.rx_packets);
    let tx_packets = now.tx_packets.saturating_sub(old.tx_packets);
    let rx_bytes = now.rx_bytes.saturating_sub(old.rx_bytes);
    let tx_bytes = now.tx_bytes.saturating_sub(old.tx_bytes);

    let rx_mpps = rx_packets as f64 / seconds / 1_000_000.0;
    let tx_mpps = tx_packets as f64 / seconds / 1_000_000.0;
    let rx_mbit = (rx_bytes + rx_packets * PER_PACKET_OVERHEAD_BYTES) as f64 * 8.0 / seconds / 1_000_000.0;
    let tx_mbit = (tx_bytes + tx_packets * PER_PACKET_OVERHEAD_BYTES) as f64 * 8.0 / seconds / 1_000_000.0;

    log::info!("RX: {rx_mpps:.2} Mpps, {rx_mbit:.2} Mbit/s");
    log::info!("TX: {tx_mpps:.2} Mpps, {tx_mbit:.2} Mbit/s");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_joins_low_and_high_halves() {
        assert_eq!(combine(0xffff_ffff, 0), 0xffff_ffff);
        assert_eq!(combine(0, 1), 1u64 << 32);
        assert_eq!(combine(1, 1), (1u64 << 32) + 1);
    }

    #[test]
    fn print_diff_handles_zero_elapsed_traffic() {
        let old = Stats::default();
        let now = Stats::default();
        // Must not panic (divide by seconds, not by packet count).
        print_diff(&old, &now, 1_000_000_000);
    }

    #[test]
    fn print_diff_tolerates_counter_regression_without_underflow() {
        let old = Stats {
            rx_packets: 100,
            ..Default::default()
        };
        let now = Stats {
            rx_packets: 50,
            ..Default::default()
        };
        print_diff(&old, &now, 1_000_000_000);
    }
}
