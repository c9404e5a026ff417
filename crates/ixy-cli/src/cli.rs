//! Command-line interface definitions for `ixy-cli`.

use clap::{Parser, Subcommand};

/// Userspace packet generator and forwarder for Intel 82599 NICs.
#[derive(Parser)]
#[command(name = "ixy-cli", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence all log output below error level.
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Synthesize minimum-size frames and transmit them continuously.
    Generator(DeviceArgs),
    /// Receive frames on queue 0 and retransmit them unchanged.
    Forwarder(DeviceArgs),
}

/// Arguments shared by both subcommands.
#[derive(Parser)]
pub struct DeviceArgs {
    /// PCI address of the NIC, e.g. 0000:01:00.0.
    pub pci_addr: String,

    /// Maximum number of packets moved per rx_batch/tx_batch call.
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of packet buffers to allocate for the ring(s) this mode drives.
    #[arg(long, default_value_t = 2048)]
    pub buffer_count: usize,

    /// Hugetlbfs mount point backing DMA allocations.
    #[arg(long, env = "IXY_HUGEPAGE_MOUNT")]
    pub hugepage_mount: Option<String>,
}
