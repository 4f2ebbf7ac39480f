//! OinkOxide library components
//!
//! The reconnaissance service, hop schedulers, capture and attack engine and their
//! persistence and radio seams. The binary replays a capture file through them.

pub mod attack;
pub mod auth;
pub mod capture;
pub mod config;
pub mod devices;
pub mod error;
pub mod exclusion;
pub mod hopper;
pub mod hunter;
pub mod oui;
pub mod pcap;
pub mod radio;
pub mod recon;
pub mod status;
pub mod storage;
pub mod targets;
pub mod tx;
pub mod util;
