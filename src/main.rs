use std::fs::File;
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use libwifi::frame::components::MacAddress;
use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;
use radiotap::Radiotap;

use oink_oxide::capture::CaptureEngine;
use oink_oxide::config::{CaptureConfig, EngineConfig, ReconConfig};
use oink_oxide::error::RadioError;
use oink_oxide::hunter::AdaptiveHunter;
use oink_oxide::radio::{Radio, RxInfo};
use oink_oxide::recon::ReconService;
use oink_oxide::status::StatusMessage;
use oink_oxide::storage::FsStore;
use oink_oxide::util::{epoch_to_iso_string, frequency_to_channel};

const EXIT_FAILURE: i32 = 1;
/// Ticks run after the last packet so pending saves and timers settle.
const DRAIN_TICKS: u64 = 20;
const DRAIN_STEP_MS: u64 = 500;

#[derive(Parser, Debug)]
#[command(
    name = "oink_oxide",
    version,
    about = "Replay a monitor-mode capture through the reconnaissance and handshake capture engine"
)]
struct Arguments {
    /// Radiotap (or bare 802.11) pcap file to replay.
    #[arg(short, long)]
    capture: PathBuf,

    /// Directory handshakes and PMKIDs are written to.
    #[arg(short, long, default_value = "oink_captures")]
    output: PathBuf,

    /// Do-not-target list, one hex BSSID per line.
    #[arg(short, long, default_value = "oink_exclude.txt")]
    exclusions: PathBuf,

    /// Plain round-robin hopping instead of the adaptive hunter.
    #[arg(long)]
    passive: bool,

    /// Pick targets and deauth them without input.
    #[arg(long)]
    auto_attack: bool,

    /// Send association requests to provoke PMKIDs.
    #[arg(long)]
    active_pmkid: bool,

    /// Print status messages as they happen.
    #[arg(long)]
    headless: bool,

    /// Frames in a bare 802.11 capture still carry their FCS.
    #[arg(long)]
    fcs: bool,
}

impl Arguments {
    fn engine_config(&self, fcs_included: bool) -> EngineConfig {
        EngineConfig::default()
            .headless(self.headless)
            .adaptive(!self.passive)
            .recon(ReconConfig::default().fcs_included(fcs_included))
            .capture(
                CaptureConfig::default()
                    .auto_attack(self.auto_attack)
                    .active_pmkid(self.active_pmkid),
            )
    }
}

/// Stands in for the radio while a file is replayed. Transmits are counted, never sent.
struct ReplayRadio {
    channel: AtomicU8,
    listening: AtomicBool,
    transmitted: AtomicU64,
    address: MacAddress,
}

impl ReplayRadio {
    fn new() -> Self {
        ReplayRadio {
            channel: AtomicU8::new(1),
            listening: AtomicBool::new(false),
            transmitted: AtomicU64::new(0),
            address: random_local_address(),
        }
    }
}

impl Radio for ReplayRadio {
    fn bring_up(&self) -> Result<(), RadioError> {
        Ok(())
    }

    fn set_channel(&self, channel: u8) -> Result<(), RadioError> {
        self.channel.store(channel, Ordering::SeqCst);
        Ok(())
    }

    fn set_listening(&self, listening: bool) -> Result<(), RadioError> {
        self.listening.store(listening, Ordering::SeqCst);
        Ok(())
    }

    fn transmit(&self, _frame: &[u8]) -> Result<(), RadioError> {
        self.transmitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn mac_address(&self) -> MacAddress {
        self.address
    }
}

/// A random locally administered unicast address.
fn random_local_address() -> MacAddress {
    let mut bytes: [u8; 6] = rand::random();
    bytes[0] = (bytes[0] & 0xfc) | 0x02;
    MacAddress(bytes)
}

/// Strip the radiotap header, pulling signal and channel out of it.
fn split_radiotap(packet: &[u8], timestamp: u64, fallback_channel: u8) -> Option<(&[u8], RxInfo)> {
    let radiotap = Radiotap::from_bytes(packet).ok()?;
    let mut payload = packet.get(radiotap.header.length..)?;
    if radiotap.flags.is_some_and(|flags| flags.fcs) && payload.len() >= 4 {
        payload = &payload[..payload.len() - 4];
    }

    let rx = RxInfo {
        rssi: radiotap.antenna_signal.map_or(0, |signal| signal.value),
        channel: radiotap
            .channel
            .and_then(|channel| frequency_to_channel(channel.freq))
            .unwrap_or(fallback_channel),
        timestamp,
    };
    Some((payload, rx))
}

fn print_messages(messages: Vec<StatusMessage>) {
    for message in messages {
        println!(
            "{} | {:^8} | {}",
            message.timestamp.format("%H:%M:%S"),
            message.message_type,
            message.content
        );
    }
}

fn run(args: Arguments) -> Result<()> {
    let file = File::open(&args.capture)
        .with_context(|| format!("cannot open {}", args.capture.display()))?;
    let mut reader = PcapReader::new(file).context("not a pcap file")?;
    let has_radiotap = match reader.header().datalink {
        DataLink::IEEE802_11_RADIOTAP => true,
        DataLink::IEEE802_11 => false,
        other => bail!("unsupported link type {other:?}"),
    };

    // Radiotap says per packet whether the FCS is there; strip it here instead.
    let config = args.engine_config(!has_radiotap && args.fcs);
    let radio = Arc::new(ReplayRadio::new());
    let mut recon = if config.adaptive {
        ReconService::with_scheduler(
            radio.clone(),
            config.recon.clone(),
            Box::new(AdaptiveHunter::new(config.hunt.clone())),
        )
    } else {
        ReconService::new(radio.clone(), config.recon.clone())
    };
    recon.set_headless(config.headless);

    let store = Arc::new(FsStore::new(&args.output, &args.exclusions));
    let mut engine = CaptureEngine::new(radio.clone(), store, config.capture.clone());
    engine.set_headless(config.headless);
    engine.attach(&mut recon);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let sink = recon.sink();
    let mut first: Option<u64> = None;
    let mut now = 0;
    let mut skipped = 0u64;

    recon.start(now)?;
    while let Some(packet) = reader.next_packet() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let packet = match packet {
            Ok(packet) => packet,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let absolute = packet.timestamp.as_millis() as u64;
        let start = *first.get_or_insert(absolute);
        now = absolute.saturating_sub(start).max(now);

        if has_radiotap {
            match split_radiotap(&packet.data, now, recon.current_channel()) {
                Some((frame, rx)) => sink.deliver(frame, rx),
                None => skipped += 1,
            }
        } else {
            let rx = RxInfo {
                rssi: 0,
                channel: recon.current_channel(),
                timestamp: now,
            };
            sink.deliver(&packet.data, rx);
        }

        recon.update(now);
        engine.update(&mut recon, now);
    }

    for _ in 0..DRAIN_TICKS {
        now += DRAIN_STEP_MS;
        recon.update(now);
        engine.update(&mut recon, now);
    }
    engine.detach(&mut recon, now);
    recon.stop();

    if !config.headless {
        print_messages(recon.log_mut().drain());
        print_messages(engine.log_mut().drain());
    }

    let stats = recon.stats();
    let capture = engine.stats();
    println!();
    if let Some(start) = first {
        println!("Capture started {}", epoch_to_iso_string(start / 1_000));
    }
    println!(
        "Replayed {} packets ({} malformed, {} dropped, {} unreadable) covering {:.1}s",
        stats.packets,
        stats.malformed,
        stats.dropped,
        skipped,
        now as f64 / 1_000.0
    );
    println!("{:<18} {:<32} {:>3} {:>5} {:<10}", "BSSID", "SSID", "CH", "RSSI", "SECURITY");
    for network in recon.networks() {
        println!(
            "{:<18} {:<32} {:>3} {:>5} {:<10}{}",
            network.bssid.to_long_string(),
            network.ssid.to_string(),
            network.channel,
            network.rssi_avg,
            network.security.to_string(),
            if network.has_handshake { " *" } else { "" }
        );
    }
    println!(
        "Handshakes: {} ({} exportable), PMKIDs: {}, saved: {}, save failures: {}, deauth frames: {}",
        engine.handshake_count(),
        engine.exportable_handshake_count(),
        engine.pmkid_count(),
        capture.saved,
        capture.save_failures,
        radio.transmitted.load(Ordering::Relaxed)
    );
    Ok(())
}

fn main() {
    let args = Arguments::parse();
    if let Err(error) = run(args) {
        eprintln!("{error:#}");
        exit(EXIT_FAILURE);
    }
}
