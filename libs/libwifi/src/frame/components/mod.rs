mod frame_control;
mod header;
mod mac_address;
mod security;
mod ssid;
mod station_info;

pub use frame_control::FrameControl;
pub use header::*;
pub use mac_address::*;
pub use security::*;
pub use ssid::*;
pub use station_info::*;
