use std::collections::hash_map::Entry;
use std::collections::HashMap;

use libwifi::frame::components::{MacAddress, Security, Ssid};

use crate::error::{Error, Result};
use crate::oui::vendor_for;
use crate::util::{clamp_channel, fnv1a};

/// Beacon gaps longer than this are outages, not intervals.
const BEACON_INTERVAL_MAX_MS: u64 = 5_000;
/// Number of buckets in the approximate client set.
const CLIENT_BUCKETS: u32 = 128;

/// Smooth a signal reading into a running average, weighting history 7:1.
pub fn smooth_rssi(previous: i8, sample: i8) -> i8 {
    if previous == 0 {
        return sample;
    }
    ((previous as i16 * 7 + sample as i16) / 8) as i8
}

/// Approximate set of stations seen talking to a network.
///
/// Each station lands in one of 128 buckets by address hash, so the population count is a
/// lower bound on the real number of clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClientBitset(u128);

impl ClientBitset {
    pub fn insert(&mut self, station: &MacAddress) {
        let bit = fnv1a(station) % CLIENT_BUCKETS;
        self.0 |= 1u128 << bit;
    }

    pub fn estimate(&self) -> u8 {
        self.0.count_ones() as u8
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// What a beacon or probe response told us about an access point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkSighting {
    pub bssid: MacAddress,
    pub ssid: Ssid,
    pub channel: u8,
    pub security: Security,
    pub pmf: bool,
    pub rssi: i8,
    pub timestamp: u64,
}

impl NetworkSighting {
    pub fn is_hidden(&self) -> bool {
        self.ssid.is_hidden()
    }
}

/// One observed access point.
#[derive(Clone, Debug)]
pub struct NetworkRecord {
    pub bssid: MacAddress,
    pub ssid: Ssid,
    pub vendor: &'static str,
    pub rssi: i8,
    pub rssi_avg: i8,
    pub channel: u8,
    pub security: Security,
    pub first_seen: u64,
    pub last_seen: u64,
    pub last_beacon: u64,
    /// Zero until a station has been seen exchanging data.
    pub last_data: u64,
    pub beacon_count: u32,
    pub beacon_interval_ms: u16,
    pub pmf: bool,
    pub has_handshake: bool,
    pub attack_attempts: u8,
    pub is_hidden: bool,
    pub clients: ClientBitset,
    pub cooldown_until: u64,
}

impl NetworkRecord {
    pub fn new(sighting: &NetworkSighting) -> Self {
        NetworkRecord {
            bssid: sighting.bssid,
            ssid: sighting.ssid,
            vendor: vendor_for(&sighting.bssid),
            rssi: sighting.rssi,
            rssi_avg: sighting.rssi,
            channel: clamp_channel(sighting.channel),
            security: sighting.security,
            first_seen: sighting.timestamp,
            last_seen: sighting.timestamp,
            last_beacon: sighting.timestamp,
            last_data: 0,
            beacon_count: 1,
            beacon_interval_ms: 0,
            pmf: sighting.pmf,
            has_handshake: false,
            attack_attempts: 0,
            is_hidden: sighting.is_hidden(),
            clients: ClientBitset::default(),
            cooldown_until: 0,
        }
    }

    pub fn observe_signal(&mut self, rssi: i8, timestamp: u64) {
        self.rssi = rssi;
        self.rssi_avg = smooth_rssi(self.rssi_avg, rssi);
        self.last_seen = self.last_seen.max(timestamp);
    }

    /// Fold a fresh beacon into the record. The address never changes.
    pub fn absorb_beacon(&mut self, sighting: &NetworkSighting) {
        self.observe_signal(sighting.rssi, sighting.timestamp);
        self.beacon_count = self.beacon_count.saturating_add(1);

        if self.last_beacon > 0 {
            let delta = sighting.timestamp.saturating_sub(self.last_beacon);
            if delta > 0 && delta < BEACON_INTERVAL_MAX_MS {
                self.beacon_interval_ms = if self.beacon_interval_ms == 0 {
                    delta as u16
                } else {
                    ((self.beacon_interval_ms as u64 * 7 + delta) / 8) as u16
                };
            }
        }
        self.last_beacon = sighting.timestamp;
        self.pmf |= sighting.pmf;
        self.channel = clamp_channel(sighting.channel);
        if !sighting.security.is_open() {
            self.security = sighting.security;
        }
        if !sighting.is_hidden() && self.is_hidden {
            self.reveal(sighting.ssid);
        }
    }

    /// A name learned from a probe response or association request.
    /// Returns whether the record changed.
    pub fn reveal(&mut self, ssid: Ssid) -> bool {
        if ssid.is_hidden() || !(self.is_hidden || self.ssid.is_empty()) {
            return false;
        }
        self.ssid = ssid;
        self.is_hidden = false;
        true
    }

    pub fn note_data(&mut self, station: Option<&MacAddress>, timestamp: u64) {
        self.last_data = timestamp.max(self.last_data);
        if let Some(station) = station {
            self.clients.insert(station);
        }
    }

    pub fn client_estimate(&self) -> u8 {
        self.clients.estimate()
    }

    pub fn on_cooldown(&self, now: u64) -> bool {
        self.cooldown_until > now
    }

    fn effective_rssi(&self) -> i8 {
        if self.rssi_avg != 0 {
            self.rssi_avg
        } else {
            self.rssi
        }
    }

    /// 0 to 100: signal, recency, data activity and beacon regularity.
    pub fn quality_score(&self, now: u64) -> u8 {
        let mut score = score_rssi(self.effective_rssi())
            + score_recency(now.saturating_sub(self.last_seen));
        if self.last_data > 0 {
            score += score_activity(now.saturating_sub(self.last_data));
        }
        score += score_beacon_stability(self.beacon_interval_ms);
        score.min(100)
    }

    /// How much a full table wants to keep this entry. Captured, protected, open, hidden and
    /// cooling-down networks are worth less.
    pub fn retention_score(&self, now: u64) -> i32 {
        let mut score = score_rssi(self.effective_rssi()) as i32
            + score_recency(now.saturating_sub(self.last_seen)) as i32;
        if self.last_data > 0 {
            score += score_activity(now.saturating_sub(self.last_data)) as i32;
        }
        score += score_beacon_stability(self.beacon_interval_ms) as i32;

        if self.has_handshake {
            score -= 20;
        }
        if self.pmf {
            score -= 15;
        }
        if self.security.is_open() {
            score -= 10;
        }
        if self.is_hidden || self.ssid.is_empty() {
            score -= 10;
        }
        if self.on_cooldown(now) {
            score -= 10;
        }
        score
    }
}

fn score_rssi(rssi: i8) -> u8 {
    match rssi {
        i8::MIN..=-95 => 0,
        -30..=i8::MAX => 60,
        _ => ((rssi as i32 + 95) * 60 / 65) as u8,
    }
}

fn score_recency(age_ms: u64) -> u8 {
    match age_ms {
        0..=2_000 => 20,
        2_001..=5_000 => 12,
        5_001..=15_000 => 5,
        _ => 0,
    }
}

fn score_activity(age_ms: u64) -> u8 {
    match age_ms {
        0..=3_000 => 20,
        3_001..=10_000 => 10,
        10_001..=30_000 => 5,
        _ => 0,
    }
}

fn score_beacon_stability(interval_ms: u16) -> u8 {
    match interval_ms {
        0 => 0,
        1..=150 => 10,
        151..=500 => 6,
        501..=1_000 => 3,
        _ => 0,
    }
}

/// Outcome of offering a sighting to the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    /// Inserted after evicting the named network.
    Replaced(MacAddress),
}

/// The bounded network table.
///
/// Growth is fallible: capacity is reserved with `try_reserve` before anything is inserted, and
/// a failed reservation turns into [Error::AllocationDeferred] instead of an abort.
#[derive(Debug)]
pub struct NetworkTable {
    devices: HashMap<MacAddress, NetworkRecord>,
    capacity: usize,
    pinned: Option<MacAddress>,
}

impl NetworkTable {
    pub fn new(capacity: usize) -> Self {
        NetworkTable {
            devices: HashMap::new(),
            capacity: capacity.max(1),
            pinned: None,
        }
    }

    pub fn size(&self) -> usize {
        self.devices.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, bssid: &MacAddress) -> Option<&NetworkRecord> {
        self.devices.get(bssid)
    }

    pub fn get_mut(&mut self, bssid: &MacAddress) -> Option<&mut NetworkRecord> {
        self.devices.get_mut(bssid)
    }

    pub fn contains(&self, bssid: &MacAddress) -> bool {
        self.devices.contains_key(bssid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkRecord> {
        self.devices.values()
    }

    /// Protect one network (the attack target) from eviction.
    pub fn pin(&mut self, bssid: Option<MacAddress>) {
        self.pinned = bssid;
    }

    pub fn pinned(&self) -> Option<MacAddress> {
        self.pinned
    }

    /// Add or refresh a network.
    ///
    /// A full table evicts the entry with the oldest `last_seen`, ties broken by the lowest
    /// retention score. [Error::TableFull] comes back only when every entry is pinned.
    pub fn upsert(&mut self, sighting: &NetworkSighting, stale_after_ms: u64) -> Result<Upsert> {
        if let Some(record) = self.devices.get_mut(&sighting.bssid) {
            record.absorb_beacon(sighting);
            return Ok(Upsert::Updated);
        }

        let mut evicted = None;
        if self.devices.len() >= self.capacity {
            let victim = self.eviction_candidate(sighting.timestamp).ok_or(Error::TableFull)?;
            self.devices.remove(&victim);
            evicted = Some(victim);
        } else if self.devices.len() == self.devices.capacity() {
            self.grow(sighting.timestamp, stale_after_ms)?;
        }

        match self.devices.entry(sighting.bssid) {
            Entry::Vacant(slot) => {
                slot.insert(NetworkRecord::new(sighting));
            }
            Entry::Occupied(_) => return Ok(Upsert::Updated),
        }

        Ok(match evicted {
            Some(victim) => Upsert::Replaced(victim),
            None => Upsert::Inserted,
        })
    }

    /// Reserve room for more records. When the allocator refuses, stale entries are pruned and
    /// the request retried once before giving up.
    fn grow(&mut self, now: u64, stale_after_ms: u64) -> Result<()> {
        let step = (self.capacity - self.devices.len()).min(20);
        if self.devices.try_reserve(step).is_ok() {
            return Ok(());
        }

        if self.prune_stale(now, stale_after_ms, usize::MAX) > 0
            || self.devices.try_reserve(1).is_ok()
        {
            return Ok(());
        }
        Err(Error::AllocationDeferred)
    }

    fn eviction_candidate(&self, now: u64) -> Option<MacAddress> {
        self.devices
            .values()
            .filter(|record| Some(record.bssid) != self.pinned)
            .min_by_key(|record| (record.last_seen, record.retention_score(now)))
            .map(|record| record.bssid)
    }

    /// Drop up to `limit` networks unseen for longer than `stale_after_ms`, oldest first.
    pub fn prune_stale(&mut self, now: u64, stale_after_ms: u64, limit: usize) -> usize {
        let mut stale: Vec<(u64, MacAddress)> = self
            .devices
            .values()
            .filter(|record| Some(record.bssid) != self.pinned)
            .filter(|record| now.saturating_sub(record.last_seen) > stale_after_ms)
            .map(|record| (record.last_seen, record.bssid))
            .collect();
        stale.sort_unstable();

        stale
            .into_iter()
            .take(limit)
            .filter(|(_, bssid)| self.devices.remove(bssid).is_some())
            .count()
    }

    /// Forget client populations of networks with no data for `idle_ms`.
    pub fn reset_idle_clients(&mut self, now: u64, idle_ms: u64) {
        for record in self.devices.values_mut() {
            if record.last_data > 0 && now.saturating_sub(record.last_data) > idle_ms {
                record.clients.clear();
            }
        }
    }

    pub fn remove(&mut self, bssid: &MacAddress) -> Option<NetworkRecord> {
        self.devices.remove(bssid)
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    /// Release the storage itself, not just the entries.
    pub fn free(&mut self) {
        self.devices = HashMap::new();
    }

    /// Snapshot sorted by signal, strongest first.
    pub fn sorted_by_signal(&self) -> Vec<NetworkRecord> {
        let mut records: Vec<NetworkRecord> = self.devices.values().cloned().collect();
        records.sort_by(|a, b| b.rssi_avg.cmp(&a.rssi_avg).then(a.bssid.cmp(&b.bssid)));
        records
    }
}
