/// Libwifi's own [Error](error::Error) implementation
pub mod error;
/// The [Frame](frame::Frame) enum and all frame structs.
pub mod frame;
/// Enums representing frame types and frame subtypes.
mod frame_types;
/// [nom] parsers for internal usage.
pub mod parsers;
/// All traits used or provided by this library.
mod traits;

use crate::error::Error;
use crate::parsers::*;

// Re-exports for user convenience
pub use crate::frame::{Frame, FrameKind};
pub use crate::frame_types::*;
pub use crate::traits::*;

use crc::{Crc, CRC_32_ISO_HDLC};

// CRC algorithm for FCS calculation
const CRC_32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Parse IEEE 802.11 frames from raw bytes.
///
/// When `fcs_included` is set the trailing four bytes are treated as the frame check sequence
/// and verified before anything else is looked at.
///
/// Only the subtypes the capture engine cares about are parsed. Everything else is reported as
/// [Error::UnhandledFrameSubtype], which callers are expected to ignore rather than count as
/// damage.
pub fn parse_frame(input: &[u8], fcs_included: bool) -> Result<Frame, Error> {
    let input = if fcs_included {
        strip_fcs(input)?
    } else {
        input
    };

    let (input, frame_control) = parse_frame_control(input)?;

    match frame_control.frame_subtype {
        // Management
        FrameSubType::Beacon => parse_beacon(frame_control, input),
        FrameSubType::ProbeRequest => parse_probe_request(frame_control, input),
        FrameSubType::ProbeResponse => parse_probe_response(frame_control, input),
        FrameSubType::AssociationRequest => parse_association_request(frame_control, input),
        FrameSubType::Deauthentication => parse_deauthentication(frame_control, input),
        FrameSubType::Disassociation => parse_disassociation(frame_control, input),

        // Data
        FrameSubType::Data => parse_data(frame_control, input),
        FrameSubType::QosData => parse_qos_data(frame_control, input),
        FrameSubType::NullData | FrameSubType::QosNull => parse_null_data(frame_control, input),
        _ => {
            log::trace!("skipping {} frame", frame_control.frame_subtype);
            Err(Error::UnhandledFrameSubtype(frame_control))
        }
    }
}

/// Verify and cut off the trailing FCS.
fn strip_fcs(input: &[u8]) -> Result<&[u8], Error> {
    if input.len() < 4 {
        return Err(Error::Incomplete("frame shorter than its FCS".to_string()));
    }

    let (frame_data, fcs_bytes) = input.split_at(input.len() - 4);
    let crc = CRC_32.checksum(frame_data);
    let fcs = u32::from_le_bytes([fcs_bytes[0], fcs_bytes[1], fcs_bytes[2], fcs_bytes[3]]);

    if crc != fcs {
        return Err(Error::FcsMismatch {
            computed: crc,
            received: fcs,
        });
    }
    Ok(frame_data)
}

/// Compute the FCS the radio would append to `frame`.
pub fn frame_check_sequence(frame: &[u8]) -> [u8; 4] {
    CRC_32.checksum(frame).to_le_bytes()
}
