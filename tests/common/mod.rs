#![allow(dead_code)]

use std::sync::Arc;

use libwifi::frame::components::{MacAddress, Security};
use libwifi::frame::{DESCRIPTOR_RSN, EAPOL_LLC_SNAP, KEY_MIC};

use oink_oxide::capture::CaptureEngine;
use oink_oxide::config::{CaptureConfig, ReconConfig};
use oink_oxide::radio::{MockRadio, RxInfo};
use oink_oxide::recon::{ReconEvent, ReconService};
use oink_oxide::storage::MemoryStore;

pub const AP: MacAddress = MacAddress([0xf8, 0x32, 0xe4, 0xad, 0x47, 0xb8]);
pub const STA: MacAddress = MacAddress([0xc0, 0xee, 0xfb, 0x4b, 0xcf, 0x3a]);

pub const M1: u16 = 0x008a;
pub const M2: u16 = 0x010a;
pub const M3: u16 = 0x13ca;

pub fn rx(channel: u8, timestamp: u64) -> RxInfo {
    RxInfo {
        rssi: -50,
        channel,
        timestamp,
    }
}

pub fn beacon_bytes(bssid: &MacAddress, ssid: &[u8], channel: u8) -> Vec<u8> {
    let mut frame = vec![0x80, 0x00, 0x00, 0x00];
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&bssid.0);
    frame.extend_from_slice(&bssid.0);
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&[0; 8]);
    frame.extend_from_slice(&[0x64, 0x00, 0x01, 0x04]);
    frame.push(0);
    frame.push(ssid.len() as u8);
    frame.extend_from_slice(ssid);
    frame.extend_from_slice(&[3, 1, channel]);
    frame
}

/// A data frame carrying one EAPOL-Key message, without FCS.
pub fn eapol_frame(
    ap: &MacAddress,
    sta: &MacAddress,
    from_ap: bool,
    info: u16,
    counter: u64,
    key_data: &[u8],
) -> Vec<u8> {
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
    frame.extend_from_slice(&(95 + key_data.len() as u16).to_be_bytes());
    frame.push(DESCRIPTOR_RSN);
    frame.extend_from_slice(&info.to_be_bytes());
    frame.extend_from_slice(&16u16.to_be_bytes());
    frame.extend_from_slice(&counter.to_be_bytes());
    frame.extend_from_slice(&[if from_ap { 0xab } else { 0xcd }; 32]);
    frame.extend_from_slice(&[0; 32]);
    let mic = if info & KEY_MIC != 0 { 0x5a } else { 0 };
    frame.extend_from_slice(&[mic; 16]);
    frame.extend_from_slice(&(key_data.len() as u16).to_be_bytes());
    frame.extend_from_slice(key_data);
    frame
}

pub fn pmkid_kde(pmkid: [u8; 16]) -> Vec<u8> {
    let mut kde = vec![0xdd, 0x14, 0x00, 0x0f, 0xac, 0x04];
    kde.extend_from_slice(&pmkid);
    kde
}

pub struct Rig {
    pub radio: Arc<MockRadio>,
    pub store: Arc<MemoryStore>,
    pub recon: ReconService,
    pub engine: CaptureEngine,
}

impl Rig {
    pub fn new(config: CaptureConfig) -> Rig {
        Rig::with_store(config, MemoryStore::new())
    }

    pub fn with_store(config: CaptureConfig, store: MemoryStore) -> Rig {
        let radio = Arc::new(MockRadio::new());
        let store = Arc::new(store);
        let mut recon = ReconService::new(radio.clone(), ReconConfig::default());
        recon.start(0).unwrap();
        let engine = CaptureEngine::new(radio.clone(), store.clone(), config);
        engine.attach(&mut recon);
        Rig {
            radio,
            store,
            recon,
            engine,
        }
    }

    pub fn add_network(&mut self, bssid: MacAddress, ssid: &str, channel: u8, now: u64) {
        self.recon.inject(
            ReconEvent::network(bssid, ssid, channel, Security::WPA2, -50, now),
            channel,
        );
        self.recon.update(now);
    }

    pub fn deliver(&self, frame: &[u8], channel: u8, now: u64) {
        self.recon.sink().deliver(frame, rx(channel, now));
    }

    pub fn tick(&mut self, now: u64) {
        self.recon.update(now);
        self.engine.update(&mut self.recon, now);
    }
}
