use nom::number::complete::u8 as byte;
use nom::sequence::pair;
use nom::IResult;

use crate::frame::components::FrameControl;
use crate::frame_types::{FrameSubType, FrameType};

use FrameSubType::*;

/// Management subtypes indexed by their four wire bits.
const MANAGEMENT_SUBTYPES: [FrameSubType; 16] = [
    AssociationRequest,
    AssociationResponse,
    ReassociationRequest,
    ReassociationResponse,
    ProbeRequest,
    ProbeResponse,
    TimingAdvertisement,
    Reserved,
    Beacon,
    Atim,
    Disassociation,
    Authentication,
    Deauthentication,
    Action,
    ActionNoAck,
    Reserved,
];

/// Data subtypes indexed by their four wire bits.
const DATA_SUBTYPES: [FrameSubType; 16] = [
    Data,
    DataCfAck,
    DataCfPoll,
    DataCfAckCfPoll,
    NullData,
    CfAck,
    CfPoll,
    CfAckCfPoll,
    QosData,
    QosDataCfAck,
    QosDataCfPoll,
    QosDataCfAckCfPoll,
    QosNull,
    Reserved,
    QosCfPoll,
    QosCfAckCfPoll,
];

/// The two frame control bytes every frame starts with.
///
/// First byte, most significant bits first: subtype (4), type (2), protocol version (2).
/// The second byte holds the flags.
pub fn parse_frame_control(input: &[u8]) -> IResult<&[u8], FrameControl> {
    let (remaining, (first, flags)) = pair(byte, byte)(input)?;

    let frame_type = match (first >> 2) & 0b11 {
        0 => FrameType::Management,
        1 => FrameType::Control,
        2 => FrameType::Data,
        _ => FrameType::Unknown,
    };
    let subtype = (first >> 4) as usize;
    let frame_subtype = match frame_type {
        FrameType::Management => MANAGEMENT_SUBTYPES[subtype],
        FrameType::Data => DATA_SUBTYPES[subtype],
        FrameType::Control => Control,
        FrameType::Unknown => Unhandled,
    };

    Ok((
        remaining,
        FrameControl {
            protocol_version: first & 0b11,
            frame_type,
            frame_subtype,
            flags,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtypes_follow_the_type() {
        let (_, beacon) = parse_frame_control(&[0x80, 0x00]).unwrap();
        assert_eq!(beacon.frame_type, FrameType::Management);
        assert_eq!(beacon.frame_subtype, Beacon);

        let (_, qos) = parse_frame_control(&[0x88, 0x02]).unwrap();
        assert_eq!(qos.frame_type, FrameType::Data);
        assert_eq!(qos.frame_subtype, QosData);
        assert_eq!(qos.flags, 0x02);

        let (_, ack) = parse_frame_control(&[0xd4, 0x00]).unwrap();
        assert_eq!(ack.frame_subtype, Control);

        assert!(parse_frame_control(&[0x80]).is_err());
    }

    #[test]
    fn test_wire_bits_roundtrip() {
        for subtype in MANAGEMENT_SUBTYPES.iter().chain(DATA_SUBTYPES.iter()) {
            if *subtype == Reserved {
                continue;
            }
            let frame_type = if MANAGEMENT_SUBTYPES.contains(subtype) { 0 } else { 2 };
            let first = (subtype.to_bits() << 4) | (frame_type << 2);
            let (_, control) = parse_frame_control(&[first, 0]).unwrap();
            assert_eq!(control.frame_subtype, *subtype);
        }
    }
}
