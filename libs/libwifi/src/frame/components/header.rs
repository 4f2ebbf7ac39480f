use super::{FrameControl, MacAddress};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequenceControl {
    pub fragment_number: u8,
    pub sequence_number: u16,
}

impl SequenceControl {
    pub fn encode(&self) -> [u8; 2] {
        let raw = (self.sequence_number << 4) | (self.fragment_number as u16 & 0x0f);
        raw.to_le_bytes()
    }
}

/// The 24 byte header shared by all management frames.
///
/// - `address_1`: destination
/// - `address_2`: source
/// - `address_3`: BSSID
#[derive(Clone, Copy, Debug)]
pub struct ManagementHeader {
    pub frame_control: FrameControl,
    pub duration: [u8; 2],
    pub address_1: MacAddress,
    pub address_2: MacAddress,
    pub address_3: MacAddress,
    pub sequence_control: SequenceControl,
}

impl ManagementHeader {
    pub fn encode(&self) -> [u8; 24] {
        let mut bytes = [0u8; 24];
        bytes[0..2].copy_from_slice(&self.frame_control.encode());
        bytes[2..4].copy_from_slice(&self.duration);
        bytes[4..10].copy_from_slice(&self.address_1.0);
        bytes[10..16].copy_from_slice(&self.address_2.0);
        bytes[16..22].copy_from_slice(&self.address_3.0);
        bytes[22..24].copy_from_slice(&self.sequence_control.encode());
        bytes
    }
}

/// Header of data frames. The meaning of the addresses depends on the DS bits:
///
/// | to_ds | from_ds | address_1 | address_2 | address_3 |
/// |-------|---------|-----------|-----------|-----------|
/// | 0     | 0       | DA        | SA        | BSSID     |
/// | 1     | 0       | BSSID     | SA        | DA        |
/// | 0     | 1       | DA        | BSSID     | SA        |
/// | 1     | 1       | RA        | TA        | DA        |
#[derive(Clone, Copy, Debug)]
pub struct DataHeader {
    pub frame_control: FrameControl,
    pub duration: [u8; 2],
    pub address_1: MacAddress,
    pub address_2: MacAddress,
    pub address_3: MacAddress,
    pub sequence_control: SequenceControl,
    pub address_4: Option<MacAddress>,
    pub qos: Option<[u8; 2]>,
}

impl DataHeader {
    /// The access point side of the exchange. Bridged (WDS) frames have none.
    pub fn ap_address(&self) -> Option<MacAddress> {
        match (self.frame_control.to_ds(), self.frame_control.from_ds()) {
            (false, false) => Some(self.address_3),
            (true, false) => Some(self.address_1),
            (false, true) => Some(self.address_2),
            (true, true) => None,
        }
    }

    /// The client side of the exchange.
    pub fn station_address(&self) -> Option<MacAddress> {
        match (self.frame_control.to_ds(), self.frame_control.from_ds()) {
            (false, false) => {
                if self.address_2 == self.address_3 {
                    Some(self.address_1)
                } else {
                    Some(self.address_2)
                }
            }
            (true, false) => Some(self.address_2),
            (false, true) => Some(self.address_1),
            (true, true) => None,
        }
    }

    /// Whether the transmitter is the access point.
    pub fn sent_by_ap(&self) -> bool {
        self.ap_address() == Some(self.address_2)
    }
}
