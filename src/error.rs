use std::io;

use libwifi::frame::components::MacAddress;

/// Failures reported by a [Radio](crate::radio::Radio) implementation.
#[derive(thiserror::Error, Debug)]
pub enum RadioError {
    #[error("radio bring-up failed: {0}")]
    BringUp(String),
    #[error("channel {0} rejected by the radio")]
    Channel(u8),
    #[error("transmit failed: {0}")]
    Transmit(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures reported by a [CaptureStore](crate::storage::CaptureStore).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable")]
    Unavailable,
    #[error("storage write failed: {0}")]
    Io(#[from] io::Error),
    #[error("capture encoding failed: {0}")]
    Encode(#[from] pcap_file::PcapError),
    #[error("nothing exportable in this capture")]
    NotExportable,
}

/// Errors surfaced by the reconnaissance service and the capture engine.
///
/// Frame-level problems never come back through here; they are counted and dropped at the
/// delivery point.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("radio init failed: {0}")]
    RadioInitFailure(#[source] RadioError),
    #[error("network table is full")]
    TableFull,
    #[error("not enough memory to grow the network table, record dropped")]
    AllocationDeferred,
    #[error("persisting capture failed: {0}")]
    PersistenceFailure(#[from] StoreError),
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] libwifi::error::Error),
    #[error("channel is already locked on {0}")]
    AlreadyLocked(u8),
    #[error("no such target: {0}")]
    InvalidTarget(String),
    #[error("reconnaissance service has not been initialised")]
    NotInitialized,
}

impl Error {
    pub fn invalid_index(index: usize) -> Self {
        Error::InvalidTarget(format!("index {index}"))
    }

    pub fn invalid_address(address: &MacAddress) -> Self {
        Error::InvalidTarget(address.to_long_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
