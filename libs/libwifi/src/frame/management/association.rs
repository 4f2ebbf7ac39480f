use crate::frame::components::*;
use crate::frame_types::{FrameSubType, FrameType};

#[derive(Clone, Debug)]
pub struct AssociationRequest {
    pub header: ManagementHeader,
    pub capability_info: u16,
    pub listen_interval: u16,
    pub station_info: StationInfo,
}

impl AssociationRequest {
    /// A WPA2-PSK association request a station would send to `bssid`.
    ///
    /// Access points that cache PMKs answer this with a first handshake message carrying a PMKID.
    pub fn new(bssid: MacAddress, station: MacAddress, ssid: Ssid, channel: u8) -> Self {
        AssociationRequest {
            header: ManagementHeader {
                frame_control: FrameControl::new(
                    FrameType::Management,
                    FrameSubType::AssociationRequest,
                    0,
                ),
                duration: [0x3a, 0x01],
                address_1: bssid,
                address_2: station,
                address_3: bssid,
                sequence_control: SequenceControl::default(),
            },
            capability_info: 0x0431,
            listen_interval: 10,
            station_info: StationInfo {
                ssid: Some(ssid.as_bytes().to_vec()),
                supported_rates: vec![0x82, 0x84, 0x8b, 0x96, 0x0c, 0x12, 0x18, 0x24],
                ds_parameter_set: Some(channel),
                rsn_information: Some(RsnInformation {
                    version: 1,
                    group_cipher_suite: Some(RsnCipherSuite::Ccmp),
                    pairwise_cipher_suites: vec![RsnCipherSuite::Ccmp],
                    akm_suites: vec![RsnAkmSuite::Psk],
                    ..Default::default()
                }),
                ..Default::default()
            },
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(96);
        bytes.extend_from_slice(&self.header.encode());
        bytes.extend_from_slice(&self.capability_info.to_le_bytes());
        bytes.extend_from_slice(&self.listen_interval.to_le_bytes());
        bytes.extend_from_slice(&self.station_info.encode());
        bytes
    }
}
