use std::collections::HashMap;
use std::fmt;

use libwifi::frame::components::{MacAddress, Ssid};
use libwifi::frame::{EapolKey, MessageType, Pmkid};

use crate::util::slice_to_hex_string;

/// Message pair selector written when the capture can't be exported.
pub const INVALID_PAIR: u8 = 0xff;

/// Which of the four handshake messages have been seen. Bit `n - 1` is message `n`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CaptureMask(u8);

impl CaptureMask {
    pub fn from_bits(bits: u8) -> Self {
        CaptureMask(bits & 0x0f)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn has_message(&self, message: u8) -> bool {
        (1..=4).contains(&message) && self.0 & (1 << (message - 1)) != 0
    }

    pub fn insert(&mut self, message: u8) {
        if (1..=4).contains(&message) {
            self.0 |= 1 << (message - 1);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Messages 1 and 2, or 2 and 3 when the first was missed.
    pub fn is_exportable(&self) -> bool {
        self.0 & 0b0011 == 0b0011 || self.0 & 0b0110 == 0b0110
    }

    pub fn is_full(&self) -> bool {
        self.0 == 0b1111
    }

    /// 0 for messages {1,2}, 2 for {2,3}, [INVALID_PAIR] otherwise. {1,2} wins when both are present.
    pub fn message_pair(&self) -> u8 {
        if self.0 & 0b0011 == 0b0011 {
            0x00
        } else if self.0 & 0b0110 == 0b0110 {
            0x02
        } else {
            INVALID_PAIR
        }
    }
}

impl fmt::Display for CaptureMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marks: Vec<String> = (1..=4u8)
            .map(|n| {
                if self.has_message(n) {
                    format!("M{n}")
                } else {
                    "--".to_string()
                }
            })
            .collect();
        write!(f, "{}", marks.join(" "))
    }
}

/// Where a capture stands with the persistence layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveState {
    Pending { attempts: u8, next_attempt: u64 },
    Saved,
    /// Every automatic attempt failed. Only an explicit export writes it now.
    Exhausted,
}

impl Default for SaveState {
    fn default() -> Self {
        SaveState::Pending {
            attempts: 0,
            next_attempt: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Retry { attempts: u8 },
    Exhausted,
}

impl SaveState {
    pub fn attempts(&self) -> u8 {
        match self {
            SaveState::Pending { attempts, .. } => *attempts,
            SaveState::Saved | SaveState::Exhausted => 0,
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        matches!(self, SaveState::Pending { next_attempt, .. } if now >= *next_attempt)
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, SaveState::Pending { .. })
    }

    /// Fold the result of one write into the state.
    ///
    /// After a failure the next attempt waits `backoff[attempts]`; once `max_attempts` writes
    /// have failed the capture is exhausted. A settled state is never reopened.
    pub fn record(
        &mut self,
        succeeded: bool,
        now: u64,
        backoff: &[u64],
        max_attempts: u8,
    ) -> SaveOutcome {
        match self {
            SaveState::Saved => return SaveOutcome::Saved,
            SaveState::Exhausted => return SaveOutcome::Exhausted,
            SaveState::Pending { .. } => {}
        }
        if succeeded {
            *self = SaveState::Saved;
            return SaveOutcome::Saved;
        }

        let attempts = self.attempts().saturating_add(1);
        if attempts >= max_attempts {
            *self = SaveState::Exhausted;
            return SaveOutcome::Exhausted;
        }

        let delay = backoff
            .get(attempts as usize)
            .or(backoff.last())
            .copied()
            .unwrap_or(0);
        *self = SaveState::Pending {
            attempts,
            next_attempt: now + delay,
        };
        SaveOutcome::Retry { attempts }
    }
}

/// One stored handshake message.
#[derive(Clone, Debug)]
pub struct EapolSlot {
    pub key: EapolKey,
    /// The whole 802.11 frame, for the pcap export.
    pub frame: Vec<u8>,
    pub timestamp: u64,
    pub rssi: i8,
}

#[derive(Clone, Debug)]
pub struct CapturedHandshake {
    pub ap: MacAddress,
    pub station: MacAddress,
    pub ssid: Ssid,
    pub channel: u8,
    slots: [Option<EapolSlot>; 4],
    mask: CaptureMask,
    pub first_seen: u64,
    pub last_seen: u64,
    pub save_state: SaveState,
    /// A beacon of the network, written ahead of the messages so tools can find the name.
    pub beacon: Option<Vec<u8>>,
}

impl CapturedHandshake {
    pub fn new(ap: MacAddress, station: MacAddress, channel: u8, now: u64) -> Self {
        CapturedHandshake {
            ap,
            station,
            ssid: Ssid::default(),
            channel,
            slots: Default::default(),
            mask: CaptureMask::default(),
            first_seen: now,
            last_seen: now,
            save_state: SaveState::default(),
            beacon: None,
        }
    }

    pub fn mask(&self) -> CaptureMask {
        self.mask
    }

    pub fn is_exportable(&self) -> bool {
        self.mask.is_exportable()
    }

    pub fn slot(&self, message: u8) -> Option<&EapolSlot> {
        if !(1..=4).contains(&message) {
            return None;
        }
        self.slots[(message - 1) as usize].as_ref()
    }

    /// Stored messages in order.
    pub fn slots(&self) -> impl Iterator<Item = &EapolSlot> {
        self.slots.iter().flatten()
    }

    /// Store one key frame. Returns whether the mask changed.
    ///
    /// A message 1 with a new replay counter restarts collection while the capture is still
    /// incomplete. Once exportable the existing pair is kept and later messages only fill gaps.
    pub fn add_key(
        &mut self,
        key: &EapolKey,
        frame: &[u8],
        rssi: i8,
        now: u64,
    ) -> Result<bool, &'static str> {
        let message = key.determine_key_type();
        let Some(number) = message.number() else {
            return Err("not part of the pairwise handshake");
        };

        let mic_present = key.key_mic != [0u8; 16];
        match message {
            MessageType::Message1 if mic_present => {
                return Err("message 1 should not carry a MIC")
            }
            MessageType::Message2 | MessageType::Message3 if !mic_present => {
                return Err("message is missing its MIC")
            }
            _ => {}
        }

        if message == MessageType::Message2 {
            if let Some(m1) = self.slot(1) {
                let counter = m1.key.replay_counter;
                if key.replay_counter < counter || key.replay_counter > counter.saturating_add(3) {
                    return Err("message 2 replay counter doesn't follow message 1");
                }
            }
        }

        if message == MessageType::Message1 && !self.mask.is_exportable() {
            let restarted = self
                .slot(1)
                .is_some_and(|m1| m1.key.replay_counter != key.replay_counter);
            if restarted {
                self.slots = Default::default();
                self.mask = CaptureMask::default();
            }
        }

        let index = (number - 1) as usize;
        if self.slots[index].is_some() && self.mask.is_exportable() {
            self.last_seen = now;
            return Ok(false);
        }

        let before = self.mask;
        self.slots[index] = Some(EapolSlot {
            key: key.clone(),
            frame: frame.to_vec(),
            timestamp: now,
            rssi,
        });
        self.mask.insert(number);
        self.last_seen = now;
        Ok(before != self.mask)
    }

    /// Hashcat 22000 line for the selected message pair.
    pub fn to_hashcat_22000_format(&self) -> Option<String> {
        let pair = self.mask.message_pair();
        let anonce_source = match pair {
            0x00 => self.slot(1)?,
            0x02 => self.slot(3)?,
            _ => return None,
        };
        let m2 = self.slot(2)?;

        let mut zeroed = m2.key.clone();
        zeroed.key_mic = [0u8; 16];
        let mut eapol = zeroed.to_bytes().ok()?;
        let declared = 4 + zeroed.packet_length as usize;
        if declared < eapol.len() {
            eapol.truncate(declared);
        }

        Some(format!(
            "WPA*02*{}*{}*{}*{}*{}*{}*{:02x}",
            slice_to_hex_string(&m2.key.key_mic),
            self.ap,
            self.station,
            self.ssid.to_hex(),
            slice_to_hex_string(&anonce_source.key.key_nonce),
            slice_to_hex_string(&eapol),
            pair
        ))
    }
}

#[derive(Clone, Debug)]
pub struct CapturedPmkid {
    pub ap: MacAddress,
    pub station: MacAddress,
    pub ssid: Ssid,
    pub channel: u8,
    pub pmkid: Pmkid,
    pub timestamp: u64,
    /// The message 1 frame it came from.
    pub frame: Vec<u8>,
    pub rssi: i8,
    pub save_state: SaveState,
    pub beacon: Option<Vec<u8>>,
}

impl CapturedPmkid {
    pub fn to_hashcat_22000_format(&self) -> String {
        format!(
            "WPA*01*{}*{}*{}*{}***01",
            self.pmkid.to_hex(),
            self.ap,
            self.station,
            self.ssid.to_hex()
        )
    }
}

#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy)]
pub struct HandshakeSessionKey {
    pub ap_mac: MacAddress,
    pub client_mac: MacAddress,
}

impl HandshakeSessionKey {
    pub fn new(ap_mac: MacAddress, client_mac: MacAddress) -> Self {
        HandshakeSessionKey { ap_mac, client_mac }
    }
}

/// Result of feeding one key frame into [HandshakeStorage].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeUpdate {
    pub key: HandshakeSessionKey,
    pub mask: CaptureMask,
    pub changed: bool,
    /// This frame is the one that made the pair exportable.
    pub became_exportable: bool,
}

/// Pick the entry to drop when a store is full: the oldest one that is already dealt with.
fn settled_victim<'a, K: Copy + 'a>(
    entries: impl Iterator<Item = (&'a K, SaveState, u64)>,
) -> Option<K> {
    entries
        .filter(|(_, state, _)| state.is_settled())
        .min_by_key(|(_, _, last_seen)| *last_seen)
        .map(|(key, _, _)| *key)
}

/// Collected four-way handshakes, bounded.
#[derive(Debug, Clone)]
pub struct HandshakeStorage {
    handshakes: HashMap<HandshakeSessionKey, CapturedHandshake>,
    capacity: usize,
}

impl HandshakeStorage {
    pub fn new(capacity: usize) -> Self {
        HandshakeStorage {
            handshakes: HashMap::new(),
            capacity,
        }
    }

    pub fn count(&self) -> usize {
        self.handshakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handshakes.is_empty()
    }

    pub fn get(&self, key: &HandshakeSessionKey) -> Option<&CapturedHandshake> {
        self.handshakes.get(key)
    }

    pub fn get_mut(&mut self, key: &HandshakeSessionKey) -> Option<&mut CapturedHandshake> {
        self.handshakes.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapturedHandshake> {
        self.handshakes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CapturedHandshake> {
        self.handshakes.values_mut()
    }

    pub fn keys(&self) -> Vec<HandshakeSessionKey> {
        self.handshakes.keys().copied().collect()
    }

    pub fn exportable_count(&self) -> usize {
        self.handshakes.values().filter(|hs| hs.is_exportable()).count()
    }

    pub fn has_exportable_for_ap(&self, ap_mac: &MacAddress) -> bool {
        self.handshakes
            .values()
            .any(|hs| &hs.ap == ap_mac && hs.is_exportable())
    }

    /// The pair's capture, while it has started but can't be exported yet.
    pub fn in_flight(&self, key: &HandshakeSessionKey) -> Option<&CapturedHandshake> {
        self.handshakes
            .get(key)
            .filter(|hs| !hs.mask().is_empty() && !hs.is_exportable())
    }

    pub fn add_or_update_handshake(
        &mut self,
        ap_mac: &MacAddress,
        client_mac: &MacAddress,
        new_key: &EapolKey,
        frame: &[u8],
        rssi: i8,
        channel: u8,
        now: u64,
    ) -> Result<HandshakeUpdate, &'static str> {
        let session_key = HandshakeSessionKey::new(*ap_mac, *client_mac);

        if let Some(handshake) = self.handshakes.get_mut(&session_key) {
            let was_exportable = handshake.is_exportable();
            let changed = handshake.add_key(new_key, frame, rssi, now)?;
            handshake.channel = channel;
            return Ok(HandshakeUpdate {
                key: session_key,
                mask: handshake.mask(),
                changed,
                became_exportable: !was_exportable && handshake.is_exportable(),
            });
        }

        // The key has to be accepted before anything is evicted to make room for it.
        let mut handshake = CapturedHandshake::new(*ap_mac, *client_mac, channel, now);
        let changed = handshake.add_key(new_key, frame, rssi, now)?;

        if self.handshakes.len() >= self.capacity {
            let victim = settled_victim(
                self.handshakes
                    .iter()
                    .map(|(key, hs)| (key, hs.save_state, hs.last_seen)),
            )
            .ok_or("handshake storage is full")?;
            self.handshakes.remove(&victim);
        }

        let update = HandshakeUpdate {
            key: session_key,
            mask: handshake.mask(),
            changed,
            became_exportable: handshake.is_exportable(),
        };
        self.handshakes.insert(session_key, handshake);
        Ok(update)
    }

    /// Drop a pair that never got a single message stored.
    pub fn discard_empty(&mut self, key: &HandshakeSessionKey) {
        if self.handshakes.get(key).is_some_and(|hs| hs.mask().is_empty()) {
            self.handshakes.remove(key);
        }
    }

    pub fn clear(&mut self) {
        self.handshakes.clear();
    }
}

/// PMKIDs, one per access point, bounded.
#[derive(Debug, Clone)]
pub struct PmkidStorage {
    pmkids: HashMap<MacAddress, CapturedPmkid>,
    capacity: usize,
}

impl PmkidStorage {
    pub fn new(capacity: usize) -> Self {
        PmkidStorage {
            pmkids: HashMap::new(),
            capacity,
        }
    }

    pub fn count(&self) -> usize {
        self.pmkids.len()
    }

    pub fn get(&self, ap: &MacAddress) -> Option<&CapturedPmkid> {
        self.pmkids.get(ap)
    }

    pub fn get_mut(&mut self, ap: &MacAddress) -> Option<&mut CapturedPmkid> {
        self.pmkids.get_mut(ap)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapturedPmkid> {
        self.pmkids.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CapturedPmkid> {
        self.pmkids.values_mut()
    }

    pub fn keys(&self) -> Vec<MacAddress> {
        self.pmkids.keys().copied().collect()
    }

    /// Store or refresh the PMKID for `record.ap`. Returns true when the value is new.
    pub fn insert(&mut self, record: CapturedPmkid) -> Result<bool, &'static str> {
        if let Some(existing) = self.pmkids.get_mut(&record.ap) {
            if existing.pmkid == record.pmkid {
                existing.timestamp = record.timestamp;
                return Ok(false);
            }
            *existing = record;
            return Ok(true);
        }

        if self.pmkids.len() >= self.capacity {
            let victim = settled_victim(
                self.pmkids
                    .iter()
                    .map(|(key, pmkid)| (key, pmkid.save_state, pmkid.timestamp)),
            )
            .ok_or("pmkid storage is full")?;
            self.pmkids.remove(&victim);
        }

        self.pmkids.insert(record.ap, record);
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.pmkids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libwifi::frame::DESCRIPTOR_RSN;

    const AP: MacAddress = MacAddress([0xf8, 0x32, 0xe4, 0xad, 0x47, 0xb8]);
    const STA: MacAddress = MacAddress([0xc0, 0xee, 0xfb, 0x4b, 0xcf, 0x3a]);

    fn key(info: u16, replay_counter: u64) -> EapolKey {
        let mic = if info & libwifi::frame::KEY_MIC != 0 { [0x5a; 16] } else { [0; 16] };
        EapolKey {
            protocol_version: 2,
            packet_type: 3,
            packet_length: 95,
            descriptor_type: DESCRIPTOR_RSN,
            key_information: info,
            key_length: 16,
            replay_counter,
            key_nonce: [0x11; 32],
            key_mic: mic,
            ..Default::default()
        }
    }

    fn m1(rc: u64) -> EapolKey {
        key(0x008a, rc)
    }
    fn m2(rc: u64) -> EapolKey {
        let mut key = key(0x010a, rc);
        key.key_nonce = [0x22; 32];
        key
    }
    fn m3(rc: u64) -> EapolKey {
        key(0x13ca, rc)
    }

    #[test]
    fn test_mask_predicates() {
        assert!(CaptureMask::from_bits(0b0011).is_exportable());
        assert_eq!(CaptureMask::from_bits(0b0011).message_pair(), 0);
        assert!(CaptureMask::from_bits(0b0110).is_exportable());
        assert_eq!(CaptureMask::from_bits(0b0110).message_pair(), 2);
        assert!(!CaptureMask::from_bits(0b0100).is_exportable());
        assert_eq!(CaptureMask::from_bits(0b0100).message_pair(), INVALID_PAIR);
        assert!(!CaptureMask::from_bits(0b1001).is_exportable());
        assert!(CaptureMask::from_bits(0b1111).is_full());
        assert_eq!(CaptureMask::from_bits(0b0101).to_string(), "M1 -- M3 --");
    }

    #[test]
    fn test_pair_selection_prefers_first_message() {
        let mut hs = CapturedHandshake::new(AP, STA, 6, 0);
        hs.add_key(&m1(1), &[], -40, 0).unwrap();
        assert_eq!(hs.mask().bits(), 0b0001);
        assert!(!hs.is_exportable());

        hs.add_key(&m2(1), &[], -40, 10).unwrap();
        assert_eq!(hs.mask().bits(), 0b0011);
        assert!(hs.is_exportable());
        assert_eq!(hs.mask().message_pair(), 0);

        hs.add_key(&m3(2), &[], -40, 20).unwrap();
        assert_eq!(hs.mask().bits(), 0b0111);
        assert_eq!(hs.mask().message_pair(), 0);
    }

    #[test]
    fn test_new_first_message_restarts_incomplete_capture() {
        let mut hs = CapturedHandshake::new(AP, STA, 6, 0);
        hs.add_key(&m1(1), &[], -40, 0).unwrap();
        hs.add_key(&m3(2), &[], -40, 5).unwrap();
        assert_eq!(hs.mask().bits(), 0b0101);

        hs.add_key(&m1(7), &[], -40, 10).unwrap();
        assert_eq!(hs.mask().bits(), 0b0001);
        assert_eq!(hs.slot(1).map(|s| s.key.replay_counter), Some(7));

        // Once exportable the pair is frozen.
        hs.add_key(&m2(7), &[], -40, 20).unwrap();
        assert_eq!(hs.add_key(&m1(9), &[], -40, 30), Ok(false));
        assert_eq!(hs.slot(1).map(|s| s.key.replay_counter), Some(7));
    }

    #[test]
    fn test_rejects_inconsistent_messages() {
        let mut hs = CapturedHandshake::new(AP, STA, 6, 0);
        hs.add_key(&m1(10), &[], -40, 0).unwrap();
        assert!(hs.add_key(&m2(20), &[], -40, 5).is_err());

        let mut no_mic = m2(10);
        no_mic.key_mic = [0; 16];
        assert!(hs.add_key(&no_mic, &[], -40, 5).is_err());
        assert!(hs.add_key(&key(0x1382, 10), &[], -40, 5).is_err());
        assert_eq!(hs.mask().bits(), 0b0001);
    }

    #[test]
    fn test_hashcat_line() {
        let mut hs = CapturedHandshake::new(AP, STA, 6, 0);
        hs.ssid = Ssid::from("test");
        assert_eq!(hs.to_hashcat_22000_format(), None);

        hs.add_key(&m1(1), &[], -40, 0).unwrap();
        hs.add_key(&m2(1), &[], -40, 10).unwrap();
        let line = hs.to_hashcat_22000_format().unwrap();
        let fields: Vec<&str> = line.split('*').collect();

        assert_eq!(fields[0], "WPA");
        assert_eq!(fields[1], "02");
        assert_eq!(fields[2], "5a".repeat(16));
        assert_eq!(fields[3], "f832e4ad47b8");
        assert_eq!(fields[4], "c0eefb4bcf3a");
        assert_eq!(fields[5], "74657374");
        assert_eq!(fields[6], "11".repeat(32));
        // MIC zeroed inside the EAPOL body, length header + 95 bytes.
        assert_eq!(fields[7].len(), 99 * 2);
        assert!(!fields[7].contains(&"5a".repeat(16)));
        assert_eq!(fields[8], "00");
    }

    #[test]
    fn test_pmkid_line() {
        let record = CapturedPmkid {
            ap: AP,
            station: STA,
            ssid: Ssid::from("test"),
            channel: 1,
            pmkid: Pmkid([0x42; 16]),
            timestamp: 0,
            frame: Vec::new(),
            rssi: -50,
            save_state: SaveState::default(),
            beacon: None,
        };
        assert_eq!(
            record.to_hashcat_22000_format(),
            format!("WPA*01*{}*f832e4ad47b8*c0eefb4bcf3a*74657374***01", "42".repeat(16))
        );
    }

    #[test]
    fn test_save_attempts_bounded() {
        let backoff = [0, 2000, 5000];
        let mut state = SaveState::default();
        assert!(state.is_due(0));

        assert_eq!(state.record(false, 0, &backoff, 3), SaveOutcome::Retry { attempts: 1 });
        assert!(!state.is_due(1999));
        assert!(state.is_due(2000));
        assert_eq!(state.record(false, 2000, &backoff, 3), SaveOutcome::Retry { attempts: 2 });
        assert!(!state.is_due(6999));
        assert_eq!(state.record(false, 7000, &backoff, 3), SaveOutcome::Exhausted);
        assert_eq!(state, SaveState::Exhausted);
        assert!(!state.is_due(u64::MAX));

        // Nothing reopens a settled capture.
        assert_eq!(state.record(false, 8000, &backoff, 3), SaveOutcome::Exhausted);
        assert_eq!(state, SaveState::Exhausted);
        assert_eq!(state.record(true, 9000, &backoff, 3), SaveOutcome::Exhausted);
        assert_eq!(state, SaveState::Exhausted);

        let mut saved = SaveState::Saved;
        assert_eq!(saved.record(false, 0, &backoff, 3), SaveOutcome::Saved);
        assert_eq!(saved, SaveState::Saved);
    }

    #[test]
    fn test_rejected_key_evicts_nothing() {
        let mut storage = HandshakeStorage::new(1);
        storage
            .add_or_update_handshake(&AP, &STA, &m1(1), &[], -40, 1, 0)
            .unwrap();
        storage
            .add_or_update_handshake(&AP, &STA, &m2(1), &[], -40, 1, 10)
            .unwrap();
        let saved = HandshakeSessionKey::new(AP, STA);
        if let Some(hs) = storage.get_mut(&saved) {
            hs.save_state = SaveState::Saved;
        }

        let other = MacAddress([2, 0, 0, 0, 0, 7]);
        let mut no_mic = m2(1);
        no_mic.key_mic = [0; 16];
        assert!(storage
            .add_or_update_handshake(&AP, &other, &no_mic, &[], -40, 1, 20)
            .is_err());
        assert_eq!(storage.count(), 1);
        assert!(storage.get(&saved).is_some());
        assert!(storage.get(&HandshakeSessionKey::new(AP, other)).is_none());
    }

    #[test]
    fn test_storage_bounded() {
        let mut storage = HandshakeStorage::new(2);
        for i in 0..2u8 {
            let station = MacAddress([2, 0, 0, 0, 0, i]);
            storage
                .add_or_update_handshake(&AP, &station, &m1(1), &[], -40, 1, i as u64)
                .unwrap();
        }
        let extra = MacAddress([2, 0, 0, 0, 0, 9]);
        assert!(storage
            .add_or_update_handshake(&AP, &extra, &m1(1), &[], -40, 1, 5)
            .is_err());

        // A saved capture makes room.
        let first = HandshakeSessionKey::new(AP, MacAddress([2, 0, 0, 0, 0, 0]));
        if let Some(hs) = storage.get_mut(&first) {
            hs.save_state = SaveState::Saved;
        }
        let update = storage
            .add_or_update_handshake(&AP, &extra, &m1(1), &[], -40, 1, 6)
            .unwrap();
        assert_eq!(storage.count(), 2);
        assert!(storage.get(&first).is_none());
        assert_eq!(update.mask.bits(), 0b0001);
        assert!(!update.became_exportable);

        let update = storage
            .add_or_update_handshake(&AP, &extra, &m2(1), &[], -40, 1, 7)
            .unwrap();
        assert!(update.became_exportable);
        assert!(storage.has_exportable_for_ap(&AP));
    }
}
