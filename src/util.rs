use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use libwifi::frame::components::MacAddress;

pub const MIN_CHANNEL: u8 = 1;
pub const MAX_CHANNEL: u8 = 13;
pub const PRIMARY_CHANNELS: [u8; 3] = [1, 6, 11];

pub fn clamp_channel(channel: u8) -> u8 {
    channel.clamp(MIN_CHANNEL, MAX_CHANNEL)
}

pub fn is_primary(channel: u8) -> bool {
    PRIMARY_CHANNELS.contains(&channel)
}

/// Centre frequency in MHz. Out-of-band values are clamped first.
pub fn channel_to_frequency(channel: u8) -> u16 {
    2407 + 5 * clamp_channel(channel) as u16
}

/// Channel for a 2.4 GHz centre frequency, within 1..=13. Channel 14 and other bands are `None`.
pub fn frequency_to_channel(frequency: u16) -> Option<u8> {
    match frequency {
        2412..=2472 if (frequency - 2407) % 5 == 0 => Some(((frequency - 2407) / 5) as u8),
        _ => None,
    }
}

pub fn slice_to_hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// FNV-1a over an address, used to spread stations over the client bitset.
pub fn fnv1a(address: &MacAddress) -> u32 {
    address.0.iter().fold(0x811c9dc5u32, |hash, byte| {
        (hash ^ *byte as u32).wrapping_mul(0x01000193)
    })
}

/// A network name turned into something safe to use in a file name.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "hidden".to_string()
    } else {
        cleaned
    }
}

/// Seconds since the Unix epoch as an RFC 3339 timestamp.
pub fn epoch_to_iso_string(epoch: u64) -> String {
    match UNIX_EPOCH.checked_add(Duration::from_secs(epoch)) {
        Some(epoch_time) => DateTime::<Utc>::from(epoch_time).format("%+").to_string(),
        None => "Invalid timestamp".to_string(),
    }
}
