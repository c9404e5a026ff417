//! `ixy-cli`: a thin application around [`ixgbe`] with two modes —
//! `generator` synthesizes traffic and transmits it; `forwarder` echoes
//! whatever it receives back out the same queue. Both report throughput
//! once a second via `ixy-stats`.

mod cli;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use cli::{Cli, Command, DeviceArgs};
use ixgbe::{IxgbeConfig, IxgbeDevice};
use ixy_stats::Stats;
use nic_buffers::{Mempool, PacketBuffer};

/// Minimum Ethernet frame payload this generator fills in (no FCS,
/// matching the reference driver's synthetic traffic generator).
const PACKET_SIZE: usize = 60;
const PACKET_BUFFER_SIZE: usize = 2048;

fn init_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.chain().find_map(|cause| cause.downcast_ref::<ixgbe::IxgbeError>()) {
        Some(ixgbe::IxgbeError::Unsupported(_)) => 3,
        Some(ixgbe::IxgbeError::IoError(_, _)) => 2,
        Some(_) => 4,
        None => 4,
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Command::Generator(args) => run_generator(args),
        Command::Forwarder(args) => run_forwarder(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Installs a `ctrlc` handler that flips `running` to `false`; both modes
/// poll it between batches so the driver's `Drop` impl (disable DMA,
/// re-bind the kernel driver) runs on a clean exit rather than `abort()`.
fn install_shutdown_hook() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    }) {
        log::warn!("failed to install signal handler: {e}");
    }
    running
}

fn device_config(args: &DeviceArgs) -> IxgbeConfig {
    let mut config = IxgbeConfig {
        rx_ring_entries: args.buffer_count.min(4096).max(64).next_power_of_two(),
        tx_ring_entries: args.buffer_count.min(4096).max(64).next_power_of_two(),
        ..IxgbeConfig::default()
    };
    if let Some(mount) = &args.hugepage_mount {
        config.hugepage_mount = mount.clone();
    }
    config
}

fn open_device(args: &DeviceArgs, config: &IxgbeConfig) -> anyhow::Result<IxgbeDevice> {
    IxgbeDevice::new(&args.pci_addr, 1, 1, config)
        .with_context(|| format!("failed to initialize device {}", args.pci_addr))
}

fn synthetic_frame_template() -> [u8; PACKET_SIZE] {
    let mut frame = [0u8; PACKET_SIZE];
    frame[0..6].copy_from_slice(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff]); // broadcast destination
    frame[6..12].copy_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]); // locally administered source
    frame[12..14].copy_from_slice(&[0x08, 0x00]); // EtherType: IPv4
    for (i, byte) in frame[14..].iter_mut().enumerate() {
        *byte = (i % 256) as u8;
    }
    frame
}

fn run_generator(args: DeviceArgs) -> anyhow::Result<()> {
    let config = device_config(&args);
    let mut device = open_device(&args, &config)?;
    let running = install_shutdown_hook();

    let memory = ixy_memory::MemoryManager::new(config.hugepage_mount.clone());
    let dma = memory
        .dma_allocate(args.buffer_count * PACKET_BUFFER_SIZE)
        .context("failed to allocate the generator's packet buffer pool")?;
    let pool = Mempool::allocate(args.buffer_count, PACKET_BUFFER_SIZE, &dma);
    let template = synthetic_frame_template();

    let mut old_stats = Stats::default();
    let mut last_report = Instant::now();
    let mut bufs: Vec<Option<PacketBuffer>> = (0..args.batch_size).map(|_| None).collect();

    while running.load(Ordering::SeqCst) {
        let acquired = pool.lock().unwrap().acquire_batch(&mut bufs, 0, args.batch_size);
        for slot in bufs.iter_mut().take(acquired) {
            if let Some(buf) = slot {
                buf.set_packet_size(PACKET_SIZE as u32);
                buf.payload_mut().copy_from_slice(&template);
            }
        }

        let sent = device.tx_batch(0, &mut bufs, 0, acquired);
        // Buffers tx_batch didn't accept stay in bufs; return them so the
        // pool doesn't run dry under sustained back-pressure.
        pool.lock().unwrap().release_batch(&mut bufs, sent, acquired - sent);

        report_if_due(&device, &mut old_stats, &mut last_report);
    }

    Ok(())
}

fn run_forwarder(args: DeviceArgs) -> anyhow::Result<()> {
    let config = device_config(&args);
    let mut device = open_device(&args, &config)?;
    let running = install_shutdown_hook();

    let mut old_stats = Stats::default();
    let mut last_report = Instant::now();
    let mut bufs: Vec<Option<PacketBuffer>> = (0..args.batch_size).map(|_| None).collect();

    while running.load(Ordering::SeqCst) {
        let received = device.rx_batch(0, &mut bufs, 0, args.batch_size);
        if received == 0 {
            continue;
        }
        let sent = device.tx_batch(0, &mut bufs, 0, received);
        if sent < received {
            log::warn!("tx queue full: dropped {} of {received} forwarded packets", received - sent);
            for slot in bufs.iter_mut().skip(sent).take(received - sent) {
                if let Some(buf) = slot.take() {
                    if let Some(pool) = Mempool::find_owner(&buf) {
                        pool.lock().unwrap().release(buf);
                    }
                }
            }
        }

        report_if_due(&device, &mut old_stats, &mut last_report);
    }

    Ok(())
}

fn report_if_due(device: &IxgbeDevice, old_stats: &mut Stats, last_report: &mut Instant) {
    let elapsed = last_report.elapsed();
    if elapsed.as_secs() < 1 {
        return;
    }
    let mut now_stats = *old_stats;
    ixy_stats::read(device, &mut now_stats);
    ixy_stats::print_diff(old_stats, &now_stats, elapsed.as_nanos() as u64);
    *old_stats = now_stats;
    *last_report = Instant::now();
}
