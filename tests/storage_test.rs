mod common;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use libwifi::frame::components::Security;
use rand::Rng;

use oink_oxide::capture::CaptureEngine;
use oink_oxide::config::{CaptureConfig, ReconConfig};
use oink_oxide::radio::MockRadio;
use oink_oxide::recon::{ReconEvent, ReconService};
use oink_oxide::storage::{capture_basename, FsStore};

use common::{eapol_frame, pmkid_kde, rx, AP, M1, M2, STA};

fn scratch_dir() -> PathBuf {
    let suffix: u64 = rand::thread_rng().gen();
    std::env::temp_dir().join(format!("oink_oxide_it_{suffix:016x}"))
}

#[test]
fn test_captures_written_to_disk() {
    let dir = scratch_dir();
    let radio = Arc::new(MockRadio::new());
    let store = Arc::new(FsStore::new(dir.join("captures"), dir.join("exclude.txt")));
    let mut recon = ReconService::new(radio.clone(), ReconConfig::default());
    recon.start(0).unwrap();
    let mut engine = CaptureEngine::new(radio, store, CaptureConfig::default());
    engine.attach(&mut recon);

    recon.inject(
        ReconEvent::network(AP, "Home Net", 6, Security::WPA2, -50, 1_000),
        6,
    );
    recon.update(1_000);

    let sink = recon.sink();
    sink.deliver(
        &eapol_frame(&AP, &STA, true, M1, 1, &pmkid_kde([0x42; 16])),
        rx(6, 1_100),
    );
    sink.deliver(&eapol_frame(&AP, &STA, false, M2, 1, &[]), rx(6, 1_120));
    engine.update(&mut recon, 1_200);
    assert_eq!(engine.stats().saved, 2);

    let base = capture_basename("Home Net", &AP);
    let captures = dir.join("captures");
    let hashcat = fs::read_to_string(captures.join(format!("{base}.22000"))).unwrap();
    assert!(hashcat.starts_with("WPA*02*"));
    assert!(captures.join(format!("{base}.pcap")).exists());

    let pmkid = fs::read_to_string(captures.join(format!("{base}_pmkid.22000"))).unwrap();
    assert!(pmkid.starts_with("WPA*01*42424242"));
    assert!(captures.join(format!("{base}_pmkid.pcap")).exists());

    // Exclusions go to their own file and come back on reload.
    engine.exclude(&mut recon, AP, 1_300);
    let text = fs::read_to_string(dir.join("exclude.txt")).unwrap();
    assert!(text.contains("F832E4AD47B8 Home Net"));
    engine.unexclude(&AP);
    fs::write(dir.join("exclude.txt"), "F832E4AD47B8\n").unwrap();
    engine.reload_exclusions();
    assert!(engine.is_excluded(&AP));

    let _ = fs::remove_dir_all(&dir);
}
