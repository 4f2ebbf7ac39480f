use super::{Security, Ssid};

/// Capability bit announcing that the network requires encryption.
pub const CAPABILITY_PRIVACY: u16 = 1 << 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RsnAkmSuite {
    Eap,
    Psk,
    FtEap,
    FtPsk,
    EapSha256,
    PskSha256,
    Sae,
    FtSae,
    Owe,
    Unknown(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RsnCipherSuite {
    Wep,
    Tkip,
    Ccmp,
    Wep104,
    Gcmp,
    None,
    Unknown(Vec<u8>),
}

/// The parsed RSN element (id 48).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RsnInformation {
    pub version: u16,
    pub group_cipher_suite: Option<RsnCipherSuite>,
    pub pairwise_cipher_suites: Vec<RsnCipherSuite>,
    pub akm_suites: Vec<RsnAkmSuite>,
    pub pre_auth: bool,
    pub mfp_required: bool,
    pub mfp_capable: bool,
}

/// The Microsoft WPA vendor element (`00:50:f2`, type 1).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WpaInformation {
    pub version: u16,
    pub akm_psk: bool,
    pub akm_eap: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VendorSpecificInfo {
    pub oui: [u8; 3],
    pub oui_type: u8,
    pub data: Vec<u8>,
}

/// The tagged information elements of a management frame.
#[derive(Clone, Debug, Default)]
pub struct StationInfo {
    pub ssid: Option<Vec<u8>>,
    pub supported_rates: Vec<u8>,
    pub ds_parameter_set: Option<u8>,
    pub ht_primary_channel: Option<u8>,
    pub rsn_information: Option<RsnInformation>,
    pub wpa_info: Option<WpaInformation>,
    pub vendor_specific: Vec<VendorSpecificInfo>,
    pub data: Vec<(u8, Vec<u8>)>,
}

impl StationInfo {
    /// The advertised name, empty when the element is missing.
    pub fn ssid(&self) -> Ssid {
        self.ssid
            .as_deref()
            .map(Ssid::truncated)
            .unwrap_or_default()
    }

    /// The operating channel. The DS element wins over the HT operation element.
    pub fn channel(&self) -> Option<u8> {
        self.ds_parameter_set.or(self.ht_primary_channel)
    }

    /// Derive the security suite set from the RSN/WPA elements and the privacy capability.
    pub fn security(&self, capability_info: u16) -> Security {
        let mut security = Security::OPEN;

        if let Some(rsn) = &self.rsn_information {
            for akm in &rsn.akm_suites {
                match akm {
                    RsnAkmSuite::Psk | RsnAkmSuite::FtPsk | RsnAkmSuite::PskSha256 => {
                        security.insert(Security::WPA2)
                    }
                    RsnAkmSuite::Sae | RsnAkmSuite::FtSae => security.insert(Security::WPA3),
                    RsnAkmSuite::Eap | RsnAkmSuite::FtEap | RsnAkmSuite::EapSha256 => {
                        security.insert(Security::WPA2 | Security::ENTERPRISE)
                    }
                    RsnAkmSuite::Owe | RsnAkmSuite::Unknown(_) => {}
                }
            }
            if security.is_open() {
                security.insert(if rsn.mfp_required {
                    Security::WPA3
                } else {
                    Security::WPA2
                });
            }
        }

        if let Some(wpa) = &self.wpa_info {
            security.insert(Security::WPA);
            if wpa.akm_eap {
                security.insert(Security::ENTERPRISE);
            }
        }

        if security.is_open() && capability_info & CAPABILITY_PRIVACY != 0 {
            security.insert(Security::WEP);
        }
        security
    }

    /// Management frame protection is advertised in the RSN capabilities.
    pub fn pmf(&self) -> bool {
        self.rsn_information
            .as_ref()
            .map(|rsn| rsn.mfp_capable || rsn.mfp_required)
            .unwrap_or(false)
    }

    /// Encode the name, rates and RSN elements the way a station would send them.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        let ssid = self.ssid.clone().unwrap_or_default();
        bytes.push(0);
        bytes.push(ssid.len().min(32) as u8);
        bytes.extend_from_slice(&ssid[..ssid.len().min(32)]);

        if !self.supported_rates.is_empty() {
            let rates = &self.supported_rates[..self.supported_rates.len().min(8)];
            bytes.push(1);
            bytes.push(rates.len() as u8);
            bytes.extend_from_slice(rates);
        }

        if let Some(channel) = self.ds_parameter_set {
            bytes.extend_from_slice(&[3, 1, channel]);
        }

        if let Some(rsn) = &self.rsn_information {
            let encoded = rsn.encode();
            bytes.push(48);
            bytes.push(encoded.len() as u8);
            bytes.extend_from_slice(&encoded);
        }

        bytes
    }
}

const RSN_OUI: [u8; 3] = [0x00, 0x0f, 0xac];

impl RsnCipherSuite {
    fn selector(&self) -> u8 {
        match self {
            RsnCipherSuite::None => 0,
            RsnCipherSuite::Wep => 1,
            RsnCipherSuite::Tkip => 2,
            RsnCipherSuite::Ccmp => 4,
            RsnCipherSuite::Wep104 => 5,
            RsnCipherSuite::Gcmp => 8,
            RsnCipherSuite::Unknown(_) => 4,
        }
    }
}

impl RsnAkmSuite {
    fn selector(&self) -> u8 {
        match self {
            RsnAkmSuite::Eap => 1,
            RsnAkmSuite::Psk => 2,
            RsnAkmSuite::FtEap => 3,
            RsnAkmSuite::FtPsk => 4,
            RsnAkmSuite::EapSha256 => 5,
            RsnAkmSuite::PskSha256 => 6,
            RsnAkmSuite::Sae => 8,
            RsnAkmSuite::FtSae => 9,
            RsnAkmSuite::Owe => 18,
            RsnAkmSuite::Unknown(_) => 2,
        }
    }
}

impl RsnInformation {
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.version.to_le_bytes());

        let group = self
            .group_cipher_suite
            .as_ref()
            .unwrap_or(&RsnCipherSuite::Ccmp);
        bytes.extend_from_slice(&RSN_OUI);
        bytes.push(group.selector());

        bytes.extend_from_slice(&(self.pairwise_cipher_suites.len() as u16).to_le_bytes());
        for suite in &self.pairwise_cipher_suites {
            bytes.extend_from_slice(&RSN_OUI);
            bytes.push(suite.selector());
        }

        bytes.extend_from_slice(&(self.akm_suites.len() as u16).to_le_bytes());
        for suite in &self.akm_suites {
            bytes.extend_from_slice(&RSN_OUI);
            bytes.push(suite.selector());
        }

        let mut capabilities: u16 = 0;
        if self.pre_auth {
            capabilities |= 1;
        }
        if self.mfp_required {
            capabilities |= 1 << 6;
        }
        if self.mfp_capable {
            capabilities |= 1 << 7;
        }
        bytes.extend_from_slice(&capabilities.to_le_bytes());
        bytes
    }
}
