use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use libwifi::frame::components::MacAddress;

use crate::auth::{CapturedHandshake, CapturedPmkid};
use crate::error::StoreError;
use crate::pcap::{handshake_to_pcap, pmkid_to_pcap};
use crate::util::sanitize_name;

/// Where captures and the exclusion list end up.
///
/// Every call may fail; the engine counts and retries failed saves, and treats a failed
/// exclusion load as an empty list.
pub trait CaptureStore: Send + Sync {
    fn save_handshake(&self, handshake: &CapturedHandshake) -> Result<(), StoreError>;

    fn save_pmkid(&self, pmkid: &CapturedPmkid) -> Result<(), StoreError>;

    fn load_exclusions(&self) -> Result<String, StoreError>;

    fn save_exclusions(&self, text: &str) -> Result<(), StoreError>;
}

/// `<name>_<bssid>`, shared by the pcap and hashcat files of one capture.
pub fn capture_basename(ssid: &str, bssid: &MacAddress) -> String {
    format!("{}_{}", sanitize_name(ssid), bssid)
}

/// Writes captures as files under one directory.
pub struct FsStore {
    directory: PathBuf,
    exclusion_file: PathBuf,
}

impl FsStore {
    pub fn new(directory: impl Into<PathBuf>, exclusion_file: impl Into<PathBuf>) -> Self {
        FsStore {
            directory: directory.into(),
            exclusion_file: exclusion_file.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.directory)?;
        let mut file = File::create(self.directory.join(name))?;
        file.write_all(contents)?;
        file.flush()?;
        Ok(())
    }

    fn write_pair(&self, base: &str, pcap: &[u8], hashcat: &str) -> Result<(), StoreError> {
        self.write(&format!("{base}.pcap"), pcap)?;
        self.write(&format!("{base}.22000"), format!("{hashcat}\n").as_bytes())
    }
}

impl CaptureStore for FsStore {
    fn save_handshake(&self, handshake: &CapturedHandshake) -> Result<(), StoreError> {
        let hashcat = handshake
            .to_hashcat_22000_format()
            .ok_or(StoreError::NotExportable)?;
        let pcap = handshake_to_pcap(handshake)?;
        let base = capture_basename(&handshake.ssid.to_string(), &handshake.ap);
        self.write_pair(&base, &pcap, &hashcat)
    }

    fn save_pmkid(&self, pmkid: &CapturedPmkid) -> Result<(), StoreError> {
        let pcap = pmkid_to_pcap(pmkid)?;
        let base = format!("{}_pmkid", capture_basename(&pmkid.ssid.to_string(), &pmkid.ap));
        self.write_pair(&base, &pcap, &pmkid.to_hashcat_22000_format())
    }

    fn load_exclusions(&self) -> Result<String, StoreError> {
        Ok(fs::read_to_string(&self.exclusion_file)?)
    }

    fn save_exclusions(&self, text: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.exclusion_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.exclusion_file, text)?;
        Ok(())
    }
}

/// A save the [MemoryStore] accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedCapture {
    pub ap: MacAddress,
    pub station: MacAddress,
    pub hashcat: String,
    pub pcap_len: usize,
}

#[derive(Default)]
struct MemoryInner {
    failing: bool,
    attempts: u32,
    handshakes: Vec<SavedCapture>,
    pmkids: Vec<SavedCapture>,
    exclusions: Option<String>,
}

/// In-memory store for tests and dry runs. Can be told to fail every call.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_exclusions(text: &str) -> Self {
        let store = MemoryStore::new();
        if let Ok(mut inner) = store.inner.lock() {
            inner.exclusions = Some(text.to_string());
        }
        store
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing = failing;
        }
    }

    /// Every save call so far, failed or not.
    pub fn attempts(&self) -> u32 {
        self.inner.lock().map(|inner| inner.attempts).unwrap_or(0)
    }

    pub fn handshakes(&self) -> Vec<SavedCapture> {
        self.inner
            .lock()
            .map(|inner| inner.handshakes.clone())
            .unwrap_or_default()
    }

    pub fn pmkids(&self) -> Vec<SavedCapture> {
        self.inner
            .lock()
            .map(|inner| inner.pmkids.clone())
            .unwrap_or_default()
    }

    pub fn exclusions(&self) -> Option<String> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.exclusions.clone())
    }

    fn record(&self, save: impl FnOnce(&mut MemoryInner) -> Result<(), StoreError>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Unavailable)?;
        inner.attempts += 1;
        if inner.failing {
            return Err(StoreError::Unavailable);
        }
        save(&mut *inner)
    }
}

impl CaptureStore for MemoryStore {
    fn save_handshake(&self, handshake: &CapturedHandshake) -> Result<(), StoreError> {
        self.record(|inner| {
            let hashcat = handshake
                .to_hashcat_22000_format()
                .ok_or(StoreError::NotExportable)?;
            let pcap = handshake_to_pcap(handshake)?;
            inner.handshakes.push(SavedCapture {
                ap: handshake.ap,
                station: handshake.station,
                hashcat,
                pcap_len: pcap.len(),
            });
            Ok(())
        })
    }

    fn save_pmkid(&self, pmkid: &CapturedPmkid) -> Result<(), StoreError> {
        self.record(|inner| {
            let pcap = pmkid_to_pcap(pmkid)?;
            inner.pmkids.push(SavedCapture {
                ap: pmkid.ap,
                station: pmkid.station,
                hashcat: pmkid.to_hashcat_22000_format(),
                pcap_len: pcap.len(),
            });
            Ok(())
        })
    }

    fn load_exclusions(&self) -> Result<String, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Unavailable)?;
        if inner.failing {
            return Err(StoreError::Unavailable);
        }
        inner.exclusions.clone().ok_or(StoreError::Unavailable)
    }

    fn save_exclusions(&self, text: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Unavailable)?;
        if inner.failing {
            return Err(StoreError::Unavailable);
        }
        inner.exclusions = Some(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn scratch_dir() -> PathBuf {
        let suffix: u64 = rand::thread_rng().gen();
        std::env::temp_dir().join(format!("oink_oxide_store_{suffix:016x}"))
    }

    #[test]
    fn test_basename() {
        let bssid = MacAddress([0xf8, 0x32, 0xe4, 0xad, 0x47, 0xb8]);
        assert_eq!(capture_basename("Home Net!", &bssid), "Home_Net__f832e4ad47b8");
        assert_eq!(capture_basename("", &bssid), "hidden_f832e4ad47b8");
    }

    #[test]
    fn test_fs_exclusions_roundtrip() {
        let dir = scratch_dir();
        let store = FsStore::new(&dir, dir.join("exclude.txt"));
        assert!(store.load_exclusions().is_err());

        store.save_exclusions("AABBCC000001 lab\n").unwrap();
        assert_eq!(store.load_exclusions().unwrap(), "AABBCC000001 lab\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_memory_store_failing() {
        let store = MemoryStore::with_exclusions("# none\n");
        assert_eq!(store.load_exclusions().unwrap(), "# none\n");

        store.set_failing(true);
        assert!(matches!(store.load_exclusions(), Err(StoreError::Unavailable)));
        assert!(store.save_exclusions("x").is_err());
        assert_eq!(store.exclusions().as_deref(), Some("# none\n"));
    }
}
