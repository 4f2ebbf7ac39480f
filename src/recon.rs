use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, RwLock};

use libwifi::frame::components::{MacAddress, Security, Ssid};
use libwifi::frame::{Announcement, Frame};
use libwifi::{parse_frame, FrameKind};

use crate::auth::CaptureMask;
use crate::config::ReconConfig;
use crate::devices::{NetworkRecord, NetworkSighting, NetworkTable, Upsert};
use crate::error::{Error, Result};
use crate::hopper::{HopContext, HopScheduler, RoundRobin};
use crate::hunter::HuntState;
use crate::radio::{Radio, RxInfo};
use crate::status::MessageLog;
use crate::util::clamp_channel;

/// The single frame consumer. Runs in the radio's delivery context and gets the frame without FCS.
pub type PacketCallback = Arc<dyn Fn(&[u8], FrameKind, &RxInfo) + Send + Sync>;
pub type NewNetworkCallback = Box<dyn FnMut(&NetworkRecord) + Send>;

/// Names learned for networks that weren't in the table yet.
const MAX_PENDING_REVEALS: usize = 4;
/// Networks whose missing name somebody asked the scheduler to wait for.
const MAX_WANTED_NAMES: usize = 8;

/// What the delivery context tells the main loop about one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconEvent {
    Beacon(NetworkSighting),
    ProbeResponse(NetworkSighting),
    AssociationRequest {
        bssid: MacAddress,
        station: MacAddress,
        ssid: Ssid,
        timestamp: u64,
    },
    Data {
        bssid: MacAddress,
        station: Option<MacAddress>,
        timestamp: u64,
        eapol: bool,
    },
}

impl ReconEvent {
    /// Build the event for a parsed frame. Frames that say nothing about the table give `None`.
    pub fn from_frame(frame: &Frame, rx: &RxInfo) -> Option<ReconEvent> {
        match frame {
            Frame::Beacon(beacon) => Some(ReconEvent::Beacon(sighting(beacon, rx))),
            Frame::ProbeResponse(response) => {
                Some(ReconEvent::ProbeResponse(sighting(response, rx)))
            }
            Frame::AssociationRequest(request) => Some(ReconEvent::AssociationRequest {
                bssid: request.header.address_3,
                station: request.header.address_2,
                ssid: request.station_info.ssid(),
                timestamp: rx.timestamp,
            }),
            Frame::Data(_) | Frame::QosData(_) | Frame::NullData(_) => {
                let header = frame.data_header()?;
                let bssid = header.ap_address()?;
                Some(ReconEvent::Data {
                    bssid,
                    station: header.station_address(),
                    timestamp: rx.timestamp,
                    eapol: frame.eapol_key().is_some(),
                })
            }
            _ => None,
        }
    }

    /// A beacon sighting built from explicit values rather than a frame.
    pub fn network(
        bssid: MacAddress,
        ssid: &str,
        channel: u8,
        security: Security,
        rssi: i8,
        timestamp: u64,
    ) -> ReconEvent {
        ReconEvent::Beacon(NetworkSighting {
            bssid,
            ssid: Ssid::from(ssid),
            channel: clamp_channel(channel),
            security,
            pmf: false,
            rssi,
            timestamp,
        })
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            ReconEvent::Beacon(_) => FrameKind::Beacon,
            ReconEvent::ProbeResponse(_) => FrameKind::ProbeResponse,
            ReconEvent::AssociationRequest { .. } => FrameKind::AssociationRequest,
            ReconEvent::Data { eapol: true, .. } => FrameKind::Eapol,
            ReconEvent::Data { .. } => FrameKind::Data,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            ReconEvent::Beacon(sighting) | ReconEvent::ProbeResponse(sighting) => {
                sighting.timestamp
            }
            ReconEvent::AssociationRequest { timestamp, .. }
            | ReconEvent::Data { timestamp, .. } => *timestamp,
        }
    }
}

fn sighting<A: Announcement>(frame: &A, rx: &RxInfo) -> NetworkSighting {
    NetworkSighting {
        bssid: frame.header().address_3,
        ssid: frame.ssid(),
        channel: clamp_channel(frame.channel().unwrap_or(rx.channel)),
        security: frame.security(),
        pmf: frame.pmf(),
        rssi: rx.rssi,
        timestamp: rx.timestamp,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedEvent {
    pub event: ReconEvent,
    /// Channel the radio was on when the frame arrived.
    pub channel: u8,
}

/// Entry point for the radio driver.
///
/// `deliver` is safe to call from the driver's own thread: it parses, pushes at most one event
/// into a bounded channel without blocking and hands the frame to the registered consumer.
/// Nothing here touches the network table.
pub struct FrameSink {
    sender: SyncSender<QueuedEvent>,
    consumer: RwLock<Option<PacketCallback>>,
    active: AtomicBool,
    fcs_included: bool,
    packets: AtomicU64,
    malformed: AtomicU64,
    dropped: AtomicU64,
}

impl FrameSink {
    fn new(sender: SyncSender<QueuedEvent>, fcs_included: bool) -> Self {
        FrameSink {
            sender,
            consumer: RwLock::new(None),
            active: AtomicBool::new(false),
            fcs_included,
            packets: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn deliver(&self, raw: &[u8], rx: RxInfo) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let rx = RxInfo {
            channel: clamp_channel(rx.channel),
            ..rx
        };
        self.packets.fetch_add(1, Ordering::Relaxed);

        let frame = match parse_frame(raw, self.fcs_included) {
            Ok(frame) => frame,
            Err(error) => {
                if error.is_malformed() {
                    self.malformed.fetch_add(1, Ordering::Relaxed);
                }
                return;
            }
        };
        // A successful parse guarantees the FCS was there.
        let body = if self.fcs_included {
            &raw[..raw.len() - 4]
        } else {
            raw
        };

        if let Some(event) = ReconEvent::from_frame(&frame, &rx) {
            self.enqueue(event, rx.channel);
        }

        let consumer = self
            .consumer
            .read()
            .ok()
            .and_then(|consumer| consumer.clone());
        if let Some(consumer) = consumer {
            consumer(body, frame.kind(), &rx);
        }
    }

    /// Push an event without blocking. Returns false when it had to be dropped.
    pub fn enqueue(&self, event: ReconEvent, channel: u8) -> bool {
        let queued = self.sender.try_send(QueuedEvent { event, channel }).is_ok();
        if !queued {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        queued
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    fn set_consumer(&self, consumer: Option<PacketCallback>) {
        if let Ok(mut slot) = self.consumer.write() {
            *slot = consumer;
        }
    }

    pub fn has_consumer(&self) -> bool {
        self.consumer
            .read()
            .map(|consumer| consumer.is_some())
            .unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconStats {
    pub packets: u64,
    pub malformed: u64,
    /// Events lost to a full ring.
    pub dropped: u64,
    pub evicted: u64,
    pub deferred: u64,
    pub networks: usize,
}

/// Owns the network table and channel control.
pub struct ReconService {
    radio: Arc<dyn Radio>,
    config: ReconConfig,
    scheduler: Box<dyn HopScheduler>,
    sink: Arc<FrameSink>,
    events: Receiver<QueuedEvent>,
    table: NetworkTable,
    initialized: bool,
    running: bool,
    paused: bool,
    settle_until: u64,
    current_channel: u8,
    locked_channel: Option<u8>,
    saved_lock: Option<u8>,
    last_cleanup: u64,
    last_client_reset: u64,
    wanted_names: Vec<(MacAddress, u8)>,
    pending_reveals: Vec<(MacAddress, Ssid)>,
    new_network_callback: Option<NewNetworkCallback>,
    evicted: u64,
    deferred: u64,
    log: MessageLog,
}

impl ReconService {
    pub fn new(radio: Arc<dyn Radio>, config: ReconConfig) -> Self {
        let scheduler = Box::new(RoundRobin::new(config.hop_interval()));
        ReconService::with_scheduler(radio, config, scheduler)
    }

    pub fn with_scheduler(
        radio: Arc<dyn Radio>,
        config: ReconConfig,
        scheduler: Box<dyn HopScheduler>,
    ) -> Self {
        let (sender, events) = sync_channel(config.ring_capacity.max(1));
        let sink = Arc::new(FrameSink::new(sender, config.fcs_included));
        ReconService {
            radio,
            table: NetworkTable::new(config.table_capacity),
            config,
            scheduler,
            sink,
            events,
            initialized: false,
            running: false,
            paused: false,
            settle_until: 0,
            current_channel: 1,
            locked_channel: None,
            saved_lock: None,
            last_cleanup: 0,
            last_client_reset: 0,
            wanted_names: Vec::new(),
            pending_reveals: Vec::new(),
            new_network_callback: None,
            evicted: 0,
            deferred: 0,
            log: MessageLog::default(),
        }
    }

    pub fn set_headless(&mut self, headless: bool) {
        self.log.set_headless(headless);
    }

    /// Handle for the radio driver.
    pub fn sink(&self) -> Arc<FrameSink> {
        self.sink.clone()
    }

    pub fn radio(&self) -> Arc<dyn Radio> {
        self.radio.clone()
    }

    /// Swap the hop policy, e.g. to engage the adaptive hunter.
    pub fn set_scheduler(&mut self, scheduler: Box<dyn HopScheduler>) {
        self.scheduler = scheduler;
    }

    /// Bring the radio up once and start listening on channel 1.
    ///
    /// Hopping is held back for the settle window so large buffers are requested on a quiet
    /// allocator. A failed bring-up is reported and leaves the service uninitialised.
    pub fn init(&mut self, now: u64) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let result = self
            .radio
            .bring_up()
            .and_then(|_| self.radio.set_channel(1))
            .and_then(|_| self.radio.set_listening(true));
        if let Err(error) = result {
            self.log.error(format!("Radio bring-up failed: {error}"));
            return Err(Error::RadioInitFailure(error));
        }

        self.initialized = true;
        self.current_channel = 1;
        self.settle_until = now + self.config.settle_ms;
        self.last_cleanup = now;
        self.last_client_reset = now;
        self.log.info(format!(
            "Radio {} up, listening on channel 1",
            self.radio.mac_address()
        ));
        Ok(())
    }

    pub fn start(&mut self, now: u64) -> Result<()> {
        self.init(now)?;
        if self.paused {
            self.resume();
        }
        if !self.running {
            self.running = true;
            self.scheduler.reset();
            self.log.status("Reconnaissance started");
        }
        self.sink.set_active(true);
        Ok(())
    }

    /// Stop hopping and listening. The table stays queryable.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.paused = false;
        self.sink.set_active(false);
        self.locked_channel = None;
        self.saved_lock = None;
        if let Err(error) = self.radio.set_listening(false) {
            self.log.warning(format!("Could not stop listening: {error}"));
        }
        self.log.status("Reconnaissance stopped");
    }

    /// Suspend delivery. A channel lock is remembered and cleared.
    pub fn pause(&mut self) {
        if !self.running || self.paused {
            return;
        }
        self.paused = true;
        self.sink.set_active(false);
        self.saved_lock = self.locked_channel.take();
    }

    /// Resume delivery. The remembered lock only comes back when a consumer still wants it.
    pub fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;
        let saved = self.saved_lock.take();
        if self.sink.has_consumer() {
            if let Some(channel) = saved {
                self.locked_channel = Some(channel);
                self.switch_channel(channel);
            }
        }
        self.sink.set_active(self.running);
    }

    /// Release the table storage entirely.
    pub fn free_networks(&mut self) {
        let count = self.table.size();
        self.table.free();
        self.pending_reveals.clear();
        self.wanted_names.clear();
        self.log.info(format!("Released {count} networks"));
    }

    /// Register the frame consumer, replacing any previous one. `None` deregisters.
    pub fn set_packet_callback(&mut self, callback: Option<PacketCallback>) {
        self.sink.set_consumer(callback);
    }

    pub fn set_new_network_callback(&mut self, callback: Option<NewNetworkCallback>) {
        self.new_network_callback = callback;
    }

    /// One main-loop tick: apply queued events, housekeeping, then let the scheduler move.
    pub fn update(&mut self, now: u64) {
        self.drain_events();

        if now.saturating_sub(self.last_cleanup) >= self.config.cleanup_interval_ms {
            self.last_cleanup = now;
            let removed = self.table.prune_stale(
                now,
                self.config.stale_after_ms,
                self.config.max_stale_removals,
            );
            if removed > 0 {
                self.log.info(format!("Pruned {removed} stale networks"));
            }
        }

        if now.saturating_sub(self.last_client_reset) >= self.config.client_reset_interval_ms {
            self.last_client_reset = now;
            self.table
                .reset_idle_clients(now, self.config.client_reset_interval_ms);
        }

        if !self.running || self.paused || self.locked_channel.is_some() || !self.is_settled(now)
        {
            return;
        }

        let ctx = HopContext {
            now,
            current: self.current_channel,
            table: &self.table,
            wanted_names: &self.wanted_names,
        };
        if let Some(channel) = self.scheduler.tick(&ctx) {
            self.switch_channel(channel);
        }
    }

    fn drain_events(&mut self) {
        for _ in 0..self.config.events_per_tick {
            match self.events.try_recv() {
                Ok(queued) => self.apply_event(queued),
                Err(_) => break,
            }
        }
    }

    fn apply_event(&mut self, queued: QueuedEvent) {
        let QueuedEvent { event, channel } = queued;
        self.scheduler.observe(channel, event.kind(), event.timestamp());

        match event {
            ReconEvent::Beacon(sighting) | ReconEvent::ProbeResponse(sighting) => {
                self.apply_sighting(&sighting)
            }
            ReconEvent::AssociationRequest {
                bssid,
                station,
                ssid,
                timestamp,
            } => {
                if let Some(record) = self.table.get_mut(&bssid) {
                    record.note_data(Some(&station), timestamp);
                }
                self.learn_name(bssid, ssid);
            }
            ReconEvent::Data {
                bssid,
                station,
                timestamp,
                ..
            } => {
                if let Some(record) = self.table.get_mut(&bssid) {
                    record.note_data(station.as_ref(), timestamp);
                }
            }
        }
    }

    fn apply_sighting(&mut self, sighting: &NetworkSighting) {
        let bssid = sighting.bssid;
        match self.table.upsert(sighting, self.config.stale_after_ms) {
            Ok(Upsert::Updated) => {}
            Ok(outcome) => {
                if let Upsert::Replaced(victim) = outcome {
                    self.evicted += 1;
                    self.log
                        .info(format!("Table full, evicted {}", victim.to_long_string()));
                }
                if let Some(index) = self.pending_reveals.iter().position(|(b, _)| *b == bssid) {
                    let (_, ssid) = self.pending_reveals.swap_remove(index);
                    if let Some(record) = self.table.get_mut(&bssid) {
                        record.reveal(ssid);
                    }
                }
                if let (Some(callback), Some(record)) =
                    (self.new_network_callback.as_mut(), self.table.get(&bssid))
                {
                    callback(record);
                }
            }
            Err(Error::AllocationDeferred) => {
                self.deferred += 1;
                self.log.warning(format!(
                    "Out of memory, dropped {}",
                    bssid.to_long_string()
                ));
                return;
            }
            Err(error) => {
                self.log.warning(format!(
                    "Dropped {}: {error}",
                    bssid.to_long_string()
                ));
                return;
            }
        }

        if !sighting.is_hidden() {
            self.wanted_names.retain(|(wanted, _)| *wanted != bssid);
        }
    }

    /// A name seen outside a beacon. Networks not in the table yet get it when they show up.
    fn learn_name(&mut self, bssid: MacAddress, ssid: Ssid) {
        if ssid.is_hidden() {
            return;
        }
        match self.table.get_mut(&bssid) {
            Some(record) => {
                if record.reveal(ssid) {
                    self.log.info(format!(
                        "Hidden network {} is {}",
                        bssid.to_long_string(),
                        ssid
                    ));
                }
                self.wanted_names.retain(|(wanted, _)| *wanted != bssid);
            }
            None => {
                if let Some(pending) = self.pending_reveals.iter_mut().find(|(b, _)| *b == bssid)
                {
                    pending.1 = ssid;
                    return;
                }
                if self.pending_reveals.len() >= MAX_PENDING_REVEALS {
                    self.pending_reveals.remove(0);
                }
                self.pending_reveals.push((bssid, ssid));
            }
        }
    }

    fn switch_channel(&mut self, channel: u8) {
        let channel = clamp_channel(channel);
        match self.radio.set_channel(channel) {
            Ok(()) => self.current_channel = channel,
            Err(error) => self
                .log
                .warning(format!("Channel change to {channel} failed: {error}")),
        }
    }

    /// Hold the radio on `channel` until unlocked. Only one holder at a time.
    pub fn lock_channel(&mut self, channel: u8) -> Result<()> {
        if let Some(locked) = self.locked_channel {
            return Err(Error::AlreadyLocked(locked));
        }
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        let channel = clamp_channel(channel);
        self.locked_channel = Some(channel);
        self.switch_channel(channel);
        Ok(())
    }

    pub fn unlock_channel(&mut self) {
        self.locked_channel = None;
        self.saved_lock = None;
    }

    /// Ask the scheduler to linger on `channel` for a beacon naming `bssid`.
    pub fn request_name(&mut self, bssid: MacAddress, channel: u8) {
        let channel = clamp_channel(channel);
        if let Some(wanted) = self.wanted_names.iter_mut().find(|(b, _)| *b == bssid) {
            wanted.1 = channel;
            return;
        }
        if self.wanted_names.len() >= MAX_WANTED_NAMES {
            self.wanted_names.remove(0);
        }
        self.wanted_names.push((bssid, channel));
    }

    pub fn note_incomplete(&mut self, bssid: MacAddress, mask: CaptureMask, channel: u8, now: u64) {
        self.scheduler.track_incomplete(bssid, mask, channel, now);
    }

    pub fn mark_handshake(&mut self, bssid: &MacAddress) {
        if let Some(record) = self.table.get_mut(bssid) {
            record.has_handshake = true;
        }
    }

    /// Count an attack against `bssid` and keep it off the target list for `cooldown_ms`.
    pub fn note_attack(&mut self, bssid: &MacAddress, now: u64, cooldown_ms: u64) {
        if let Some(record) = self.table.get_mut(bssid) {
            record.attack_attempts = record.attack_attempts.saturating_add(1);
            record.cooldown_until = now + cooldown_ms;
        }
    }

    pub fn pin_network(&mut self, bssid: Option<MacAddress>) {
        self.table.pin(bssid);
    }

    /// Feed an event through the same queue the radio uses. Applied on the next `update`.
    pub fn inject(&self, event: ReconEvent, channel: u8) -> bool {
        self.sink.enqueue(event, clamp_channel(channel))
    }

    pub fn network_count(&self) -> usize {
        self.table.size()
    }

    /// Snapshot, strongest signal first.
    pub fn networks(&self) -> Vec<NetworkRecord> {
        self.table.sorted_by_signal()
    }

    pub fn network(&self, bssid: &MacAddress) -> Option<NetworkRecord> {
        self.table.get(bssid).cloned()
    }

    pub fn table(&self) -> &NetworkTable {
        &self.table
    }

    pub fn current_channel(&self) -> u8 {
        self.current_channel
    }

    pub fn is_channel_locked(&self) -> bool {
        self.locked_channel.is_some()
    }

    pub fn locked_channel(&self) -> Option<u8> {
        self.locked_channel
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_settled(&self, now: u64) -> bool {
        self.initialized && now >= self.settle_until
    }

    pub fn hunt_state(&self) -> HuntState {
        self.scheduler.state()
    }

    pub fn stats(&self) -> ReconStats {
        ReconStats {
            packets: self.sink.packets.load(Ordering::Relaxed),
            malformed: self.sink.malformed.load(Ordering::Relaxed),
            dropped: self.sink.dropped.load(Ordering::Relaxed),
            evicted: self.evicted,
            deferred: self.deferred,
            networks: self.table.size(),
        }
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut MessageLog {
        &mut self.log
    }
}
