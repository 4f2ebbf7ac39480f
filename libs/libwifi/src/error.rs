use nom::Needed;

use crate::frame::components::FrameControl;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Only the subtypes needed for reconnaissance and capture are parsed.
    /// The [FrameControl] header is always parsed successfully and is handed back for debugging.
    #[error("This frame subtype isn't handled: {:?} ({:?})", .0.frame_subtype, .0.frame_type)]
    UnhandledFrameSubtype(FrameControl),
    #[error("A parsing failure occurred: {}", .0)]
    Failure(String),
    #[error("There wasn't enough data. {}", .0)]
    Incomplete(String),
    #[error("FCS mismatch: computed {computed:08x}, received {received:08x}")]
    FcsMismatch { computed: u32, received: u32 },
}

impl Error {
    /// Whether this error means the bytes were damaged or truncated, as opposed to
    /// a well-formed frame of a kind nobody asked for.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Error::UnhandledFrameSubtype(_))
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    /// nom errors borrow the input slice, so they are flattened into an owned message here.
    fn from(error: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match error {
            nom::Err::Incomplete(needed) => match needed {
                Needed::Size(size) => {
                    Error::Incomplete(format!("At least {size} bytes are missing"))
                }
                Needed::Unknown => Error::Incomplete(String::new()),
            },
            nom::Err::Failure(error) | nom::Err::Error(error) => Error::Failure(format!(
                "nom::ErrorKind is {:?} with {} bytes left",
                error.code,
                error.input.len()
            )),
        }
    }
}
