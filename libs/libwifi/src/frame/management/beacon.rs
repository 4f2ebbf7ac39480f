use crate::frame::components::*;

#[derive(Clone, Debug)]
pub struct Beacon {
    pub header: ManagementHeader,
    pub timestamp: u64,
    pub beacon_interval: u16,
    pub capability_info: u16,
    pub station_info: StationInfo,
}

#[derive(Clone, Debug)]
pub struct ProbeRequest {
    pub header: ManagementHeader,
    pub station_info: StationInfo,
}

#[derive(Clone, Debug)]
pub struct ProbeResponse {
    pub header: ManagementHeader,
    pub timestamp: u64,
    pub beacon_interval: u16,
    pub capability_info: u16,
    pub station_info: StationInfo,
}

/// Accessors shared by frames an access point uses to announce itself.
pub trait Announcement {
    fn header(&self) -> &ManagementHeader;
    fn capability_info(&self) -> u16;
    fn station_info(&self) -> &StationInfo;

    fn ssid(&self) -> Ssid {
        self.station_info().ssid()
    }

    fn channel(&self) -> Option<u8> {
        self.station_info().channel()
    }

    fn security(&self) -> Security {
        self.station_info().security(self.capability_info())
    }

    fn pmf(&self) -> bool {
        self.station_info().pmf()
    }
}

impl Announcement for Beacon {
    fn header(&self) -> &ManagementHeader {
        &self.header
    }

    fn capability_info(&self) -> u16 {
        self.capability_info
    }

    fn station_info(&self) -> &StationInfo {
        &self.station_info
    }
}

impl Announcement for ProbeResponse {
    fn header(&self) -> &ManagementHeader {
        &self.header
    }

    fn capability_info(&self) -> u16 {
        self.capability_info
    }

    fn station_info(&self) -> &StationInfo {
        &self.station_info
    }
}
