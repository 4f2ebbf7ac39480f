mod data;
mod eapol;

pub use data::*;
pub use eapol::*;
