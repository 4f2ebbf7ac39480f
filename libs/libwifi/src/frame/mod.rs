use enum_dispatch::enum_dispatch;
use strum_macros::Display;

/// Contains structs representing recurring sets of structured data.
/// For instance, MAC-Addresses, default headers, etc.
pub mod components;

/// Data frames structs
mod data;
/// Management frame structs
mod management;

pub use data::*;
pub use management::*;

use crate::Addresses;

#[enum_dispatch(Addresses)]
#[derive(Clone, Debug)]
/// All frame subtypes this crate parses.
/// Each variant is represented by its own struct.
pub enum Frame {
    // Management frames
    Beacon(Beacon),
    ProbeRequest(ProbeRequest),
    ProbeResponse(ProbeResponse),
    AssociationRequest(AssociationRequest),
    Deauthentication(Deauthentication),
    Disassociation(Disassociation),

    // Data Frames
    Data(Data),
    QosData(QosData),
    NullData(NullData),
}

/// Coarse classification handed to frame consumers alongside the raw bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum FrameKind {
    Beacon,
    ProbeRequest,
    ProbeResponse,
    AssociationRequest,
    Deauthentication,
    Disassociation,
    Data,
    Eapol,
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Beacon(_) => FrameKind::Beacon,
            Frame::ProbeRequest(_) => FrameKind::ProbeRequest,
            Frame::ProbeResponse(_) => FrameKind::ProbeResponse,
            Frame::AssociationRequest(_) => FrameKind::AssociationRequest,
            Frame::Deauthentication(_) => FrameKind::Deauthentication,
            Frame::Disassociation(_) => FrameKind::Disassociation,
            Frame::Data(data) if data.eapol_key.is_some() => FrameKind::Eapol,
            Frame::QosData(data) if data.eapol_key.is_some() => FrameKind::Eapol,
            Frame::Data(_) | Frame::QosData(_) | Frame::NullData(_) => FrameKind::Data,
        }
    }

    /// The EAPOL-Key carried by this frame, if any.
    pub fn eapol_key(&self) -> Option<&EapolKey> {
        match self {
            Frame::Data(data) => data.eapol_key.as_ref(),
            Frame::QosData(data) => data.eapol_key.as_ref(),
            _ => None,
        }
    }

    /// The data header for any data subtype.
    pub fn data_header(&self) -> Option<&components::DataHeader> {
        match self {
            Frame::Data(data) => Some(&data.header),
            Frame::QosData(data) => Some(&data.header),
            Frame::NullData(data) => Some(&data.header),
            _ => None,
        }
    }
}
