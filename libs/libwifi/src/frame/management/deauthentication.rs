use strum_macros::Display;

use crate::frame::components::*;
use crate::frame_types::{FrameSubType, FrameType};

/// Encoded length of a deauthentication or disassociation frame, without FCS.
pub const DEAUTH_FRAME_LEN: usize = 26;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum ReasonCode {
    Unspecified,
    PreviousAuthenticationNoLongerValid,
    DeauthenticatedBecauseStaLeaving,
    Inactivity,
    ApUnableToHandleAllStations,
    Class2FrameFromNonAuthenticatedStation,
    Class3FrameFromNonAssociatedStation,
    DisassociatedBecauseStaLeaving,
    Other(u16),
}

impl ReasonCode {
    pub fn from_code(code: u16) -> ReasonCode {
        match code {
            1 => ReasonCode::Unspecified,
            2 => ReasonCode::PreviousAuthenticationNoLongerValid,
            3 => ReasonCode::DeauthenticatedBecauseStaLeaving,
            4 => ReasonCode::Inactivity,
            5 => ReasonCode::ApUnableToHandleAllStations,
            6 => ReasonCode::Class2FrameFromNonAuthenticatedStation,
            7 => ReasonCode::Class3FrameFromNonAssociatedStation,
            8 => ReasonCode::DisassociatedBecauseStaLeaving,
            other => ReasonCode::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            ReasonCode::Unspecified => 1,
            ReasonCode::PreviousAuthenticationNoLongerValid => 2,
            ReasonCode::DeauthenticatedBecauseStaLeaving => 3,
            ReasonCode::Inactivity => 4,
            ReasonCode::ApUnableToHandleAllStations => 5,
            ReasonCode::Class2FrameFromNonAuthenticatedStation => 6,
            ReasonCode::Class3FrameFromNonAssociatedStation => 7,
            ReasonCode::DisassociatedBecauseStaLeaving => 8,
            ReasonCode::Other(code) => *code,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Deauthentication {
    pub header: ManagementHeader,
    pub reason_code: ReasonCode,
}

#[derive(Clone, Debug)]
pub struct Disassociation {
    pub header: ManagementHeader,
    pub reason_code: ReasonCode,
}

fn notification_header(
    subtype: FrameSubType,
    destination: MacAddress,
    source: MacAddress,
    bssid: MacAddress,
) -> ManagementHeader {
    ManagementHeader {
        frame_control: FrameControl::new(FrameType::Management, subtype, 0),
        duration: [0x3a, 0x01],
        address_1: destination,
        address_2: source,
        address_3: bssid,
        sequence_control: SequenceControl::default(),
    }
}

fn encode_notification(header: &ManagementHeader, reason: ReasonCode) -> [u8; DEAUTH_FRAME_LEN] {
    let mut bytes = [0u8; DEAUTH_FRAME_LEN];
    bytes[..24].copy_from_slice(&header.encode());
    bytes[24..].copy_from_slice(&reason.code().to_le_bytes());
    bytes
}

impl Deauthentication {
    pub fn new(
        destination: MacAddress,
        source: MacAddress,
        bssid: MacAddress,
        reason_code: ReasonCode,
    ) -> Self {
        Deauthentication {
            header: notification_header(
                FrameSubType::Deauthentication,
                destination,
                source,
                bssid,
            ),
            reason_code,
        }
    }

    pub fn encode(&self) -> [u8; DEAUTH_FRAME_LEN] {
        encode_notification(&self.header, self.reason_code)
    }
}

impl Disassociation {
    pub fn new(
        destination: MacAddress,
        source: MacAddress,
        bssid: MacAddress,
        reason_code: ReasonCode,
    ) -> Self {
        Disassociation {
            header: notification_header(FrameSubType::Disassociation, destination, source, bssid),
            reason_code,
        }
    }

    pub fn encode(&self) -> [u8; DEAUTH_FRAME_LEN] {
        encode_notification(&self.header, self.reason_code)
    }
}
