use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u64, u8 as get_u8};
use nom::sequence::tuple;
use nom::IResult;

use crate::error::Error;
use crate::frame::components::FrameControl;
use crate::frame::*;
use crate::parsers::{clone_slice, parse_data_header};

/// Parse a plain [Data] frame.
///
/// Unprotected frames whose body opens with the 802.1X LLC/SNAP header are decoded as EAPOL-Key
/// frames. Anything else is kept as raw body bytes.
pub fn parse_data(frame_control: FrameControl, input: &[u8]) -> Result<Frame, Error> {
    let (remaining, header) = parse_data_header(frame_control, input)?;
    let eapol_key = parse_eapol_body(&frame_control, remaining)?;

    Ok(Frame::Data(Data {
        header,
        eapol_key,
        data: remaining.to_vec(),
    }))
}

/// Parse a [QosData] frame. The QoS control field is consumed by the header parser.
pub fn parse_qos_data(frame_control: FrameControl, input: &[u8]) -> Result<Frame, Error> {
    let (remaining, header) = parse_data_header(frame_control, input)?;
    let eapol_key = parse_eapol_body(&frame_control, remaining)?;

    Ok(Frame::QosData(QosData {
        header,
        eapol_key,
        data: remaining.to_vec(),
    }))
}

/// Parse a [NullData] frame (plain or QoS null). Only the header matters.
pub fn parse_null_data(frame_control: FrameControl, input: &[u8]) -> Result<Frame, Error> {
    let (_, header) = parse_data_header(frame_control, input)?;
    Ok(Frame::NullData(NullData { header }))
}

/// A body announcing EAPOL that then fails to parse as a key frame is damaged, so the error
/// is propagated instead of silently demoting the frame to plain data.
fn parse_eapol_body(
    frame_control: &FrameControl,
    body: &[u8],
) -> Result<Option<EapolKey>, Error> {
    if frame_control.protected() || !body.starts_with(&EAPOL_LLC_SNAP) {
        return Ok(None);
    }

    let payload = &body[EAPOL_LLC_SNAP.len()..];
    // 3 is EAPOL-Key; start, logoff and EAP packets are not interesting here.
    if payload.len() < 2 || payload[1] != 3 {
        return Ok(None);
    }

    let (_, key) = parse_eapol_key(payload)?;
    Ok(Some(key))
}

/// Parse an EAPOL-Key frame starting at the EAPOL header. All fields are big-endian.
pub fn parse_eapol_key(input: &[u8]) -> IResult<&[u8], EapolKey> {
    let (input, (protocol_version, packet_type, packet_length, descriptor_type)) =
        tuple((get_u8, get_u8, be_u16, get_u8))(input)?;
    let (input, (key_information, key_length, replay_counter, key_nonce, key_iv)) =
        tuple((be_u16, be_u16, be_u64, take(32usize), take(16usize)))(input)?;
    let (input, (key_rsc, key_id, key_mic, key_data_length)) =
        tuple((be_u64, be_u64, take(16usize), be_u16))(input)?;
    let (input, key_data) = take(key_data_length)(input)?;

    Ok((
        input,
        EapolKey {
            protocol_version,
            packet_type,
            packet_length,
            descriptor_type,
            key_information,
            key_length,
            replay_counter,
            key_nonce: clone_slice::<32>(key_nonce),
            key_iv: clone_slice::<16>(key_iv),
            key_rsc,
            key_id,
            key_mic: clone_slice::<16>(key_mic),
            key_data_length,
            key_data: key_data.to_vec(),
        },
    ))
}
