use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;

use libwifi::frame::components::MacAddress;

use crate::error::RadioError;

/// Receive metadata the radio hands over with every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RxInfo {
    pub rssi: i8,
    pub channel: u8,
    /// Milliseconds on the same clock the main loop passes to `update`.
    pub timestamp: u64,
}

/// The radio driver seam.
///
/// Implementations are shared between the reconnaissance service, which owns channel control,
/// and the capture engine, which only transmits. All methods take `&self`; the driver is
/// expected to serialise access internally.
pub trait Radio: Send + Sync {
    /// One-time hardware bring-up into monitor mode.
    fn bring_up(&self) -> Result<(), RadioError>;

    fn set_channel(&self, channel: u8) -> Result<(), RadioError>;

    /// Enable or disable frame delivery.
    fn set_listening(&self, listening: bool) -> Result<(), RadioError>;

    /// Inject a raw 802.11 frame (no FCS) on the current channel.
    fn transmit(&self, frame: &[u8]) -> Result<(), RadioError>;

    fn mac_address(&self) -> MacAddress;
}

/// In-memory radio for tests and dry runs. Records every call.
#[derive(Debug, Default)]
pub struct MockRadio {
    fail_bring_up: AtomicBool,
    fail_transmit: AtomicBool,
    channel: AtomicU8,
    listening: AtomicBool,
    bring_ups: Mutex<u32>,
    channel_history: Mutex<Vec<u8>>,
    transmitted: Mutex<Vec<Vec<u8>>>,
    address: MacAddress,
}

impl MockRadio {
    pub fn new() -> Self {
        MockRadio {
            address: MacAddress([0x02, 0x4f, 0x49, 0x4e, 0x4b, 0x01]),
            ..Default::default()
        }
    }

    /// A radio whose bring-up always fails.
    pub fn broken() -> Self {
        let radio = MockRadio::new();
        radio.fail_bring_up.store(true, Ordering::SeqCst);
        radio
    }

    pub fn set_fail_transmit(&self, fail: bool) {
        self.fail_transmit.store(fail, Ordering::SeqCst);
    }

    pub fn channel(&self) -> u8 {
        self.channel.load(Ordering::SeqCst)
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn bring_up_count(&self) -> u32 {
        self.bring_ups.lock().map(|count| *count).unwrap_or(0)
    }

    pub fn channel_history(&self) -> Vec<u8> {
        self.channel_history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }

    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.transmitted
            .lock()
            .map(|frames| frames.clone())
            .unwrap_or_default()
    }

    pub fn clear_transmitted(&self) {
        if let Ok(mut frames) = self.transmitted.lock() {
            frames.clear();
        }
    }
}

impl Radio for MockRadio {
    fn bring_up(&self) -> Result<(), RadioError> {
        if self.fail_bring_up.load(Ordering::SeqCst) {
            return Err(RadioError::BringUp("mock radio refused".to_string()));
        }
        if let Ok(mut count) = self.bring_ups.lock() {
            *count += 1;
        }
        Ok(())
    }

    fn set_channel(&self, channel: u8) -> Result<(), RadioError> {
        if !(1..=14).contains(&channel) {
            return Err(RadioError::Channel(channel));
        }
        self.channel.store(channel, Ordering::SeqCst);
        if let Ok(mut history) = self.channel_history.lock() {
            history.push(channel);
        }
        Ok(())
    }

    fn set_listening(&self, listening: bool) -> Result<(), RadioError> {
        self.listening.store(listening, Ordering::SeqCst);
        Ok(())
    }

    fn transmit(&self, frame: &[u8]) -> Result<(), RadioError> {
        if self.fail_transmit.load(Ordering::SeqCst) {
            return Err(RadioError::Transmit("mock radio refused".to_string()));
        }
        if let Ok(mut frames) = self.transmitted.lock() {
            frames.push(frame.to_vec());
        }
        Ok(())
    }

    fn mac_address(&self) -> MacAddress {
        self.address
    }
}
