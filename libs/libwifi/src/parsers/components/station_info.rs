use nom::bytes::complete::take;
use nom::number::complete::{le_u16, u8 as get_u8};
use nom::sequence::tuple;
use nom::IResult;

use crate::frame::components::{
    RsnAkmSuite, RsnCipherSuite, RsnInformation, StationInfo, VendorSpecificInfo, WpaInformation,
};

const WPA_OUI: [u8; 3] = [0x00, 0x50, 0xf2];
const RSN_OUI: [u8; 3] = [0x00, 0x0f, 0xac];

/// Parse variable length and variable field information.
/// The general structure of the data looks like this:
///
/// 1 byte: Element id
/// 1 byte: Element length (up to 255 bytes)
/// $element_length bytes: Element data
///
/// A trailing fragment of four bytes or less that doesn't form a complete element is tolerated,
/// since that's what an FCS the radio didn't strip looks like. Any other truncation is an error.
pub fn parse_station_info(mut input: &[u8]) -> IResult<&[u8], StationInfo> {
    let mut station_info = StationInfo::default();

    while input.len() >= 2 {
        let declared = input[1] as usize;
        if input.len() - 2 < declared && input.len() <= 4 {
            break;
        }

        let (rest, (element_id, length)) = tuple((get_u8, get_u8))(input)?;
        let (rest, data) = take(length)(rest)?;
        input = rest;

        match element_id {
            0 => station_info.ssid = Some(data.to_vec()),
            1 => station_info.supported_rates = data.to_vec(),
            3 if !data.is_empty() => station_info.ds_parameter_set = Some(data[0]),
            48 => {
                if let Ok((_, rsn_info)) = parse_rsn_information(data) {
                    station_info.rsn_information = Some(rsn_info)
                }
            }
            61 if !data.is_empty() => station_info.ht_primary_channel = Some(data[0]),
            221 if data.len() >= 4 => {
                let oui = [data[0], data[1], data[2]];
                let oui_type = data[3];
                let vendor_data = &data[4..];

                if oui == WPA_OUI && oui_type == 1 {
                    if let Ok((_, wpa)) = parse_wpa_information(vendor_data) {
                        station_info.wpa_info = Some(wpa);
                    }
                } else {
                    station_info.vendor_specific.push(VendorSpecificInfo {
                        oui,
                        oui_type,
                        data: vendor_data.to_vec(),
                    });
                }
            }
            _ => station_info.data.push((element_id, data.to_vec())),
        }
    }

    Ok((input, station_info))
}

/// Parse the body of an RSN element.
///
/// Every field after the version is optional; the element simply stops early when the
/// remaining fields take their default values.
pub fn parse_rsn_information(input: &[u8]) -> IResult<&[u8], RsnInformation> {
    let (mut input, version) = le_u16(input)?;
    let mut rsn = RsnInformation {
        version,
        ..Default::default()
    };

    if input.len() >= 4 {
        let suite;
        (input, suite) = take(4usize)(input)?;
        rsn.group_cipher_suite = Some(cipher_suite(suite));
    }

    if input.len() >= 2 {
        let count;
        (input, count) = le_u16(input)?;
        for _ in 0..count {
            let suite;
            (input, suite) = take(4usize)(input)?;
            rsn.pairwise_cipher_suites.push(cipher_suite(suite));
        }
    }

    if input.len() >= 2 {
        let count;
        (input, count) = le_u16(input)?;
        for _ in 0..count {
            let suite;
            (input, suite) = take(4usize)(input)?;
            rsn.akm_suites.push(akm_suite(suite));
        }
    }

    if input.len() >= 2 {
        let capabilities;
        (input, capabilities) = le_u16(input)?;
        rsn.pre_auth = capabilities & 0x0001 != 0;
        rsn.mfp_required = capabilities & (1 << 6) != 0;
        rsn.mfp_capable = capabilities & (1 << 7) != 0;
    }

    Ok((input, rsn))
}

fn parse_wpa_information(input: &[u8]) -> IResult<&[u8], WpaInformation> {
    let (input, (version, _multicast)) = tuple((le_u16, take(4usize)))(input)?;
    let (mut input, unicast_count) = le_u16(input)?;
    (input, _) = take(4 * unicast_count as usize)(input)?;

    let mut wpa = WpaInformation {
        version,
        ..Default::default()
    };

    let akm_count;
    (input, akm_count) = le_u16(input)?;
    for _ in 0..akm_count {
        let suite;
        (input, suite) = take(4usize)(input)?;
        if suite[..3] == WPA_OUI {
            match suite[3] {
                1 => wpa.akm_eap = true,
                2 => wpa.akm_psk = true,
                _ => {}
            }
        }
    }

    Ok((input, wpa))
}

fn cipher_suite(suite: &[u8]) -> RsnCipherSuite {
    if suite[..3] != RSN_OUI {
        return RsnCipherSuite::Unknown(suite.to_vec());
    }
    match suite[3] {
        0 => RsnCipherSuite::None,
        1 => RsnCipherSuite::Wep,
        2 => RsnCipherSuite::Tkip,
        4 => RsnCipherSuite::Ccmp,
        5 => RsnCipherSuite::Wep104,
        8 => RsnCipherSuite::Gcmp,
        _ => RsnCipherSuite::Unknown(suite.to_vec()),
    }
}

fn akm_suite(suite: &[u8]) -> RsnAkmSuite {
    if suite[..3] != RSN_OUI {
        return RsnAkmSuite::Unknown(suite.to_vec());
    }
    match suite[3] {
        1 => RsnAkmSuite::Eap,
        2 => RsnAkmSuite::Psk,
        3 => RsnAkmSuite::FtEap,
        4 => RsnAkmSuite::FtPsk,
        5 => RsnAkmSuite::EapSha256,
        6 => RsnAkmSuite::PskSha256,
        8 => RsnAkmSuite::Sae,
        9 => RsnAkmSuite::FtSae,
        18 => RsnAkmSuite::Owe,
        _ => RsnAkmSuite::Unknown(suite.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::components::Security;

    #[test]
    fn test_rsn_with_pmf_bits() {
        // version 1, CCMP group, 1x CCMP pairwise, 1x PSK akm, capabilities 0x00c0
        let data = [
            1, 0, 0, 0x0f, 0xac, 4, 1, 0, 0, 0x0f, 0xac, 4, 1, 0, 0, 0x0f, 0xac, 2, 0xc0, 0x00,
        ];
        let (_, rsn) = parse_rsn_information(&data).expect("valid rsn");
        assert_eq!(rsn.akm_suites, vec![RsnAkmSuite::Psk]);
        assert!(rsn.mfp_required);
        assert!(rsn.mfp_capable);
    }

    #[test]
    fn test_tolerates_trailing_fcs() {
        let data = [0, 3, b'a', b'b', b'c', 3, 1, 6, 0xde, 0xad, 0xbe, 0xef];
        let (_, info) = parse_station_info(&data).expect("fcs tail is ignored");
        assert_eq!(info.ssid.as_deref(), Some(&b"abc"[..]));
        assert_eq!(info.channel(), Some(6));
    }

    #[test]
    fn test_truncated_element_is_an_error() {
        let data = [0, 3, b'a', b'b', b'c', 48, 20, 1, 0, 0, 0x0f, 0xac, 4, 1];
        assert!(parse_station_info(&data).is_err());
    }

    #[test]
    fn test_wpa_vendor_element() {
        let data = [
            221, 22, 0x00, 0x50, 0xf2, 1, 1, 0, 0x00, 0x50, 0xf2, 2, 1, 0, 0x00, 0x50, 0xf2, 2, 1,
            0, 0x00, 0x50, 0xf2, 2,
        ];
        let (_, info) = parse_station_info(&data).expect("valid wpa element");
        assert!(info.wpa_info.as_ref().map(|w| w.akm_psk).unwrap_or(false));
        assert_eq!(info.security(0x0011), Security::WPA);
    }
}
