use libwifi::frame::components::MacAddress;
use libwifi::frame::*;
use libwifi::{parse_frame, Addresses, FrameKind};

const AP: [u8; 6] = [248, 50, 228, 173, 71, 184];
const STATION: [u8; 6] = [192, 238, 251, 75, 207, 58];

/// Build an unprotected data frame carrying an EAPOL-Key body.
fn eapol_frame(from_ap: bool, key_information: u16, key_data: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x08, if from_ap { 0x02 } else { 0x01 }, 0, 0];
    if from_ap {
        frame.extend_from_slice(&STATION);
        frame.extend_from_slice(&AP);
        frame.extend_from_slice(&AP);
    } else {
        frame.extend_from_slice(&AP);
        frame.extend_from_slice(&STATION);
        frame.extend_from_slice(&AP);
    }
    frame.extend_from_slice(&[0x10, 0x00]);
    frame.extend_from_slice(&EAPOL_LLC_SNAP);

    let body_length = (95 + key_data.len()) as u16;
    frame.extend_from_slice(&[2, 3]);
    frame.extend_from_slice(&body_length.to_be_bytes());
    frame.push(DESCRIPTOR_RSN);
    frame.extend_from_slice(&key_information.to_be_bytes());
    frame.extend_from_slice(&16u16.to_be_bytes());
    frame.extend_from_slice(&1u64.to_be_bytes()); // replay counter
    frame.extend_from_slice(&[0xab; 32]); // nonce
    frame.extend_from_slice(&[0; 16]); // iv
    frame.extend_from_slice(&[0; 8]); // rsc
    frame.extend_from_slice(&[0; 8]); // id
    let mic = if key_information & KEY_MIC != 0 { 0x5a } else { 0 };
    frame.extend_from_slice(&[mic; 16]);
    frame.extend_from_slice(&(key_data.len() as u16).to_be_bytes());
    frame.extend_from_slice(key_data);
    frame
}

#[test]
fn test_data() {
    let payload = [
        8, 98, // FrameControl
        0, 0, // Duration id
        51, 51, 255, 75, 207, 58, // First address
        248, 50, 228, 173, 71, 184, // Second address
        192, 238, 251, 75, 207, 58, // Third address
        80, 2, // SequencControl
        // The rest is data
        90, 7, 0, 96, 0, 0, 0, 0, 239, 46, 109, 235, 61, 58, 89, 37, 181, 238, 23, 98, 108, 29, 99,
        170, 28, 132, 136, 248, 109, 194, 64, 139, 35, 219, 22, 195, 40, 100, 32, 6, 7, 230, 5,
        102, 8, 116, 33, 165, 132, 177, 44, 2, 247, 88, 213, 77, 12, 122, 49, 105, 29, 74, 55, 207,
    ];

    let frame = parse_frame(&payload, false).expect("Payload should be valid");
    assert!(matches!(frame, Frame::Data(_)));
    assert_eq!(frame.kind(), FrameKind::Data);
    assert_eq!(frame.bssid(), Some(&MacAddress(AP)));
}

#[test]
fn test_qos_data() {
    let payload = [
        136, 66, // Frame Control
        44, 0, // Duration Id
        192, 238, 251, 75, 207, 58, // Address 1
        248, 50, 228, 173, 71, 184, // Address 2
        248, 50, 228, 173, 71, 184, // Address 3
        64, 119, // SequencControl
        0, 0, // QoS
        // The rest is data
        163, 23, 0, 32, 2, 0, 0, 0, 210, 141, 170, 200, 6, 91, 65, 22, 251, 155, 224, 22, 110, 76,
    ];
    let frame = parse_frame(&payload, false).expect("Payload should be valid");
    let header = frame.data_header().expect("data frames have a data header");
    assert_eq!(header.qos, Some([0, 0]));
    assert_eq!(header.station_address(), Some(MacAddress(STATION)));
    assert!(matches!(frame, Frame::QosData(_)));
}

#[test]
fn test_qos_null() {
    let payload = [
        200, 1, // FrameControl
        58, 1, // Duration id
        248, 50, 228, 173, 71, 184, // First Address
        192, 238, 251, 75, 207, 58, // Second Address
        248, 50, 228, 173, 71, 184, // Third Address
        80, 106, // Sequence Control
        0, 0, // QoS Header
    ];

    let frame = parse_frame(&payload, false).expect("Payload should be valid");
    assert!(matches!(frame, Frame::NullData(_)));
    let header = frame.data_header().expect("null frames have a data header");
    assert_eq!(header.station_address(), Some(MacAddress(STATION)));
    assert!(!header.sent_by_ap());
}

#[test]
fn test_eapol_message_one_with_pmkid() {
    let mut kde = vec![0xdd, 0x14, 0x00, 0x0f, 0xac, 0x04];
    kde.extend_from_slice(&[0x42; 16]);
    let payload = eapol_frame(true, 0x008a, &kde);

    let frame = parse_frame(&payload, false).expect("Payload should be valid");
    assert_eq!(frame.kind(), FrameKind::Eapol);

    let key = frame.eapol_key().expect("EAPOL key present");
    assert_eq!(key.determine_key_type(), MessageType::Message1);
    assert_eq!(key.replay_counter, 1);
    assert_eq!(key.key_nonce, [0xab; 32]);
    assert_eq!(key.pmkid().map(|p| p.0), Some([0x42; 16]));

    let header = frame.data_header().expect("data header");
    assert!(header.sent_by_ap());
    assert_eq!(header.ap_address(), Some(MacAddress(AP)));
}

#[test]
fn test_eapol_message_two_serializes_back() {
    let payload = eapol_frame(false, 0x010a, &[0x30, 0x02, 0x01, 0x00]);
    let frame = parse_frame(&payload, false).expect("Payload should be valid");
    let key = frame.eapol_key().expect("EAPOL key present");
    assert_eq!(key.determine_key_type(), MessageType::Message2);

    // The serialized key must be identical to the bytes after the LLC/SNAP header.
    let body = &payload[24 + EAPOL_LLC_SNAP.len()..];
    assert_eq!(key.to_bytes().expect("in-memory write"), body);
    assert_eq!(&body[EAPOL_MIC_OFFSET..EAPOL_MIC_OFFSET + 16], &[0x5a; 16]);
}

#[test]
fn test_truncated_eapol_is_malformed() {
    let payload = eapol_frame(true, 0x008a, &[]);
    let error = parse_frame(&payload[..payload.len() - 20], false).expect_err("cut short");
    assert!(error.is_malformed());
}
