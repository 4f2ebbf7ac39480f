use std::time::Duration;

use byteorder::{LittleEndian, WriteBytesExt};
use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};
use pcap_file::{DataLink, PcapError};

use crate::auth::{CapturedHandshake, CapturedPmkid};

/// Radiotap header length: 8 byte fixed part plus one signal byte.
const RADIOTAP_LEN: u16 = 9;
/// Present bit for the dBm antenna signal field.
const RADIOTAP_ANTENNA_SIGNAL: u32 = 1 << 5;

/// Minimal radiotap header carrying only the signal strength the frame was received with.
pub fn radiotap_prefix(rssi: i8) -> Vec<u8> {
    let mut header = Vec::with_capacity(RADIOTAP_LEN as usize);
    // Writes into a Vec can't fail.
    let _ = header.write_u8(0);
    let _ = header.write_u8(0);
    let _ = header.write_u16::<LittleEndian>(RADIOTAP_LEN);
    let _ = header.write_u32::<LittleEndian>(RADIOTAP_ANTENNA_SIGNAL);
    let _ = header.write_i8(rssi);
    header
}

/// An in-memory pcap file with radiotap link type.
pub struct CaptureFile {
    writer: PcapWriter<Vec<u8>>,
    packets: usize,
}

impl CaptureFile {
    pub fn new() -> Result<Self, PcapError> {
        let header = PcapHeader {
            datalink: DataLink::IEEE802_11_RADIOTAP,
            snaplen: 65535,
            ..Default::default()
        };
        Ok(CaptureFile {
            writer: PcapWriter::with_header(Vec::new(), header)?,
            packets: 0,
        })
    }

    /// Append one 802.11 frame. `timestamp` is in milliseconds.
    pub fn write_frame(&mut self, timestamp: u64, rssi: i8, frame: &[u8]) -> Result<(), PcapError> {
        if frame.is_empty() {
            return Ok(());
        }
        let mut data = radiotap_prefix(rssi);
        data.extend_from_slice(frame);

        let packet = PcapPacket::new(
            Duration::from_millis(timestamp),
            data.len() as u32,
            &data,
        );
        self.writer.write_packet(&packet)?;
        self.packets += 1;
        Ok(())
    }

    pub fn packet_count(&self) -> usize {
        self.packets
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_writer()
    }
}

/// Beacon first, then every stored message in order.
pub fn handshake_to_pcap(handshake: &CapturedHandshake) -> Result<Vec<u8>, PcapError> {
    let mut file = CaptureFile::new()?;
    let first = handshake.slots().next();

    if let Some(beacon) = &handshake.beacon {
        let timestamp = first.map_or(handshake.first_seen, |slot| slot.timestamp);
        let rssi = first.map_or(0, |slot| slot.rssi);
        file.write_frame(timestamp, rssi, beacon)?;
    }
    for slot in handshake.slots() {
        file.write_frame(slot.timestamp, slot.rssi, &slot.frame)?;
    }
    Ok(file.into_bytes())
}

pub fn pmkid_to_pcap(pmkid: &CapturedPmkid) -> Result<Vec<u8>, PcapError> {
    let mut file = CaptureFile::new()?;
    if let Some(beacon) = &pmkid.beacon {
        file.write_frame(pmkid.timestamp, pmkid.rssi, beacon)?;
    }
    file.write_frame(pmkid.timestamp, pmkid.rssi, &pmkid.frame)?;
    Ok(file.into_bytes())
}
