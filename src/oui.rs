use std::sync::OnceLock;

use libwifi::frame::components::MacAddress;

/// Label returned when no prefix matches.
pub const UNKNOWN_VENDOR: &str = "Unknown";

// Masks over the 48 bit address for each registered prefix length
const OUI_24_BIT_MASK: u64 = 0x0000FFFFFF000000;
const OUI_28_BIT_MASK: u64 = 0x0000FFFFFFF00000;
const OUI_36_BIT_MASK: u64 = 0x0000FFFFFFFFF000;

#[derive(Debug, Clone)]
pub struct OuiRecord {
    oui: u64,
    oui_length: u32,
    short_name: String,
    long_name: String,
}

impl OuiRecord {
    fn mask(&self) -> u64 {
        match self.oui_length {
            28 => OUI_28_BIT_MASK,
            36 => OUI_36_BIT_MASK,
            _ => OUI_24_BIT_MASK,
        }
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn long_name(&self) -> &str {
        &self.long_name
    }

    pub fn oui(&self) -> String {
        format!("{:012X}/{}", self.oui, self.oui_length)
    }
}

/// Prefix table loaded from the bundled manuf file.
///
/// Records are kept sorted longest prefix first, so the first match is the most specific one.
#[derive(Debug, Default)]
pub struct OuiDatabase {
    records: Vec<OuiRecord>,
}

impl OuiDatabase {
    pub fn new() -> OuiDatabase {
        OuiDatabase::from_table(include_str!("../assets/manuf"))
    }

    /// Build a database from manuf-formatted text. Lines that don't parse are skipped.
    pub fn from_table(data: &str) -> OuiDatabase {
        let mut records: Vec<OuiRecord> = data.lines().filter_map(parse_line).collect();
        records.sort_by(|a, b| b.oui_length.cmp(&a.oui_length));
        OuiDatabase { records }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn search(&self, mac_address: &MacAddress) -> Option<&OuiRecord> {
        let mac_int = mac_address.to_u64();
        self.records
            .iter()
            .find(|record| mac_int & record.mask() == record.oui)
    }

    /// The full organisation name, or [UNKNOWN_VENDOR].
    pub fn vendor(&self, mac_address: &MacAddress) -> &str {
        self.search(mac_address)
            .map(|record| record.long_name())
            .unwrap_or(UNKNOWN_VENDOR)
    }

    /// Table integrity: no prefix registered twice at the same length.
    pub fn self_test(&self) -> bool {
        let mut seen: Vec<(u64, u32)> = self
            .records
            .iter()
            .map(|record| (record.oui, record.oui_length))
            .collect();
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        total > 0 && seen.len() == total
    }
}

fn parse_line(line: &str) -> Option<OuiRecord> {
    if line.starts_with('#') || line.trim().is_empty() {
        return None;
    }

    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 3 {
        return None;
    }

    let mut prefix = parts[0].trim().split('/');
    let oui_str = prefix.next()?.replace([':', '-'], "");
    let oui_length: u32 = match prefix.next() {
        Some(length) => length.trim().parse().ok()?,
        None => 24,
    };

    // The written prefix is rounded up to whole bytes: 3, 4 or 5 of them.
    let digits = match oui_length {
        24 => 6,
        28 => 8,
        36 => 10,
        _ => return None,
    };
    if oui_str.len() != digits {
        return None;
    }
    let raw = u64::from_str_radix(&oui_str, 16).ok()?;
    let oui = raw << (48 - digits * 4);

    let mut record = OuiRecord {
        oui,
        oui_length,
        short_name: parts[1].trim().to_string(),
        long_name: parts[2].trim().to_string(),
    };
    record.oui &= record.mask();
    Some(record)
}

static DATABASE: OnceLock<OuiDatabase> = OnceLock::new();

/// Manufacturer label for an address, [UNKNOWN_VENDOR] when the prefix isn't registered.
pub fn vendor_for(mac_address: &MacAddress) -> &'static str {
    DATABASE.get_or_init(OuiDatabase::new).vendor(mac_address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_table_loads() {
        let db = OuiDatabase::new();
        assert!(db.record_count() > 50);
        assert!(db.self_test());
    }

    #[test]
    fn test_lookup() {
        let mac: MacAddress = "b8:27:eb:12:34:56".parse().unwrap();
        assert_eq!(vendor_for(&mac), "Raspberry Pi Foundation");

        let unknown: MacAddress = "02:00:00:00:00:01".parse().unwrap();
        assert_eq!(vendor_for(&unknown), UNKNOWN_VENDOR);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let db = OuiDatabase::new();

        let inside: MacAddress = "00:50:c2:ff:f1:23".parse().unwrap();
        assert_eq!(db.vendor(&inside), "MSR-Solutions GmbH");

        let block: MacAddress = "00:69:67:e5:00:01".parse().unwrap();
        assert_eq!(db.vendor(&block), "Tianjin Lianwu Technology Co., Ltd.");

        let outside: MacAddress = "00:50:c2:00:00:01".parse().unwrap();
        assert_eq!(db.vendor(&outside), "IEEE Registration Authority");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let db = OuiDatabase::from_table("zz:zz:zz\tBad\tBad\n00:11:22\tOnly two\n00:11:22/99\tX\tY\n");
        assert_eq!(db.record_count(), 0);
        assert!(!db.self_test());
    }
}
