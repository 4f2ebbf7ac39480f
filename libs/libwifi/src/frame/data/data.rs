use crate::frame::components::*;
use crate::Addresses;

use super::EapolKey;

/// Common accessors for data subtypes.
pub trait DataFrame {
    fn header(&self) -> &DataHeader;
    fn eapol_key(&self) -> Option<&EapolKey>;
    fn data(&self) -> &[u8];
}

#[derive(Clone, Debug)]
pub struct Data {
    pub header: DataHeader,
    pub eapol_key: Option<EapolKey>,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct QosData {
    pub header: DataHeader,
    pub eapol_key: Option<EapolKey>,
    pub data: Vec<u8>,
}

/// Null and QoS-null frames carry no body but still prove a client is present.
#[derive(Clone, Debug)]
pub struct NullData {
    pub header: DataHeader,
}

impl DataFrame for Data {
    fn header(&self) -> &DataHeader {
        &self.header
    }
    fn eapol_key(&self) -> Option<&EapolKey> {
        self.eapol_key.as_ref()
    }
    fn data(&self) -> &[u8] {
        &self.data
    }
}

impl DataFrame for QosData {
    fn header(&self) -> &DataHeader {
        &self.header
    }
    fn eapol_key(&self) -> Option<&EapolKey> {
        self.eapol_key.as_ref()
    }
    fn data(&self) -> &[u8] {
        &self.data
    }
}

impl DataFrame for NullData {
    fn header(&self) -> &DataHeader {
        &self.header
    }
    fn eapol_key(&self) -> Option<&EapolKey> {
        None
    }
    fn data(&self) -> &[u8] {
        &[]
    }
}

macro_rules! data_addresses {
    ($($frame:ty),+) => {
        $(
            impl Addresses for $frame {
                fn src(&self) -> Option<&MacAddress> {
                    Some(&self.header.address_2)
                }

                fn dest(&self) -> &MacAddress {
                    &self.header.address_1
                }

                fn bssid(&self) -> Option<&MacAddress> {
                    let fc = &self.header.frame_control;
                    match (fc.to_ds(), fc.from_ds()) {
                        (false, false) => Some(&self.header.address_3),
                        (true, false) => Some(&self.header.address_1),
                        (false, true) => Some(&self.header.address_2),
                        (true, true) => None,
                    }
                }
            }
        )+
    };
}

data_addresses!(Data, QosData, NullData);
