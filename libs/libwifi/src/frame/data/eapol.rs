use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

/// LLC/SNAP header announcing an 802.1X (EAPOL) payload.
pub const EAPOL_LLC_SNAP: [u8; 8] = [0xaa, 0xaa, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8e];

/// Offset of the MIC inside the EAPOL payload (header + key fields before it).
pub const EAPOL_MIC_OFFSET: usize = 81;
/// Offset of the key nonce inside the EAPOL payload.
pub const EAPOL_NONCE_OFFSET: usize = 17;
/// EAPOL header plus the fixed EAPOL-Key fields.
pub const EAPOL_KEY_MIN_LEN: usize = 99;

/// Descriptor type of an RSN (WPA2/WPA3) key frame. WPA1 uses 0xfe and never carries a PMKID.
pub const DESCRIPTOR_RSN: u8 = 0x02;

/// Length of a PMKID key data encapsulation: tag, length, OUI, type, 16 byte value.
pub const PMKID_KDE_LEN: usize = 22;
const PMKID_KDE_PREFIX: [u8; 6] = [0xdd, 0x14, 0x00, 0x0f, 0xac, 0x04];

pub const KEY_TYPE: u16 = 1 << 3;
pub const INSTALL: u16 = 1 << 6;
pub const KEY_ACK: u16 = 1 << 7;
pub const KEY_MIC: u16 = 1 << 8;
pub const SECURE: u16 = 1 << 9;

/// An EAPOL-Key frame. All multi-byte fields are big-endian on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EapolKey {
    pub protocol_version: u8,
    pub packet_type: u8,
    pub packet_length: u16,
    pub descriptor_type: u8,
    pub key_information: u16,
    pub key_length: u16,
    pub replay_counter: u64,
    pub key_nonce: [u8; 32],
    pub key_iv: [u8; 16],
    pub key_rsc: u64,
    pub key_id: u64,
    pub key_mic: [u8; 16],
    pub key_data_length: u16,
    pub key_data: Vec<u8>,
}

/// Which message of the four-way handshake a key frame is.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum MessageType {
    Message1,
    Message2,
    Message3,
    Message4,
    /// Group key handshake, not part of the pairwise exchange.
    Gtk,
    Unknown,
}

impl MessageType {
    /// 1 to 4 for pairwise messages.
    pub fn number(&self) -> Option<u8> {
        match self {
            MessageType::Message1 => Some(1),
            MessageType::Message2 => Some(2),
            MessageType::Message3 => Some(3),
            MessageType::Message4 => Some(4),
            MessageType::Gtk | MessageType::Unknown => None,
        }
    }

    /// Messages 1 and 3 travel from the access point to the station.
    pub fn from_ap(&self) -> bool {
        matches!(self, MessageType::Message1 | MessageType::Message3)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.number() {
            Some(number) => write!(f, "Message {number}"),
            None if *self == MessageType::Gtk => write!(f, "Group Temporal Key"),
            None => write!(f, "Unknown key message"),
        }
    }
}

/// A 16 byte pairwise master key identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pmkid(pub [u8; 16]);

impl Pmkid {
    pub fn to_hex(&self) -> String {
        self.0.iter().fold(String::new(), |mut acc, byte| {
            acc.push_str(&format!("{:02x}", byte));
            acc
        })
    }
}

impl EapolKey {
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(EAPOL_KEY_MIN_LEN + self.key_data.len());

        bytes.write_u8(self.protocol_version)?;
        bytes.write_u8(self.packet_type)?;
        bytes.write_u16::<BigEndian>(self.packet_length)?;
        bytes.write_u8(self.descriptor_type)?;
        bytes.write_u16::<BigEndian>(self.key_information)?;
        bytes.write_u16::<BigEndian>(self.key_length)?;
        bytes.write_u64::<BigEndian>(self.replay_counter)?;
        bytes.write_all(&self.key_nonce)?;
        bytes.write_all(&self.key_iv)?;
        bytes.write_u64::<BigEndian>(self.key_rsc)?;
        bytes.write_u64::<BigEndian>(self.key_id)?;
        bytes.write_all(&self.key_mic)?;
        bytes.write_u16::<BigEndian>(self.key_data_length)?;
        bytes.write_all(&self.key_data)?;

        Ok(bytes)
    }

    fn has(&self, flag: u16) -> bool {
        self.key_information & flag != 0
    }

    /// Classify the frame from its key information bits.
    ///
    /// Message 4 normally has the secure bit set; some WPA1 stacks leave it clear, in which case
    /// the all-zero nonce gives it away.
    pub fn determine_key_type(&self) -> MessageType {
        if !self.has(KEY_TYPE) {
            return MessageType::Gtk;
        }

        let ack = self.has(KEY_ACK);
        let mic = self.has(KEY_MIC);
        let secure = self.has(SECURE);
        let install = self.has(INSTALL);

        match (ack, mic) {
            (true, false) => MessageType::Message1,
            (true, true) if install => MessageType::Message3,
            (false, true) if secure => MessageType::Message4,
            (false, true) if self.key_nonce.iter().all(|b| *b == 0) => MessageType::Message4,
            (false, true) => MessageType::Message2,
            _ => MessageType::Unknown,
        }
    }

    /// Extract a PMKID from the key data of an RSN message 1.
    ///
    /// The KDE may sit anywhere in the key data. All-zero values, which some access points send
    /// as a placeholder, are rejected.
    pub fn pmkid(&self) -> Option<Pmkid> {
        if self.determine_key_type() != MessageType::Message1
            || self.descriptor_type != DESCRIPTOR_RSN
        {
            return None;
        }

        self.key_data
            .windows(PMKID_KDE_LEN)
            .find(|window| window[..6] == PMKID_KDE_PREFIX)
            .and_then(|kde| {
                let value: [u8; 16] = kde[6..].try_into().ok()?;
                value.iter().any(|b| *b != 0).then_some(Pmkid(value))
            })
    }
}
