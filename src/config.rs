use derive_setters::Setters;

/// Settings for the reconnaissance service and its network table.
#[derive(Clone, Debug, Setters)]
pub struct ReconConfig {
    pub table_capacity: usize,
    /// Networks unseen for this long are pruned.
    pub stale_after_ms: u64,
    pub cleanup_interval_ms: u64,
    pub max_stale_removals: usize,
    pub client_reset_interval_ms: u64,
    /// Passive listen window after bring-up before any mode may hop.
    pub settle_ms: u64,
    pub hop_interval_ms: u64,
    pub ring_capacity: usize,
    pub events_per_tick: usize,
    /// Whether the radio leaves the FCS on delivered frames.
    pub fcs_included: bool,
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            table_capacity: 200,
            stale_after_ms: 60_000,
            cleanup_interval_ms: 5_000,
            max_stale_removals: 20,
            client_reset_interval_ms: 30_000,
            settle_ms: 500,
            hop_interval_ms: 150,
            ring_capacity: 64,
            events_per_tick: 64,
            fcs_included: false,
        }
    }
}

impl ReconConfig {
    pub const MIN_HOP_INTERVAL_MS: u64 = 50;
    pub const MAX_HOP_INTERVAL_MS: u64 = 2_000;

    pub fn hop_interval(&self) -> u64 {
        self.hop_interval_ms
            .clamp(Self::MIN_HOP_INTERVAL_MS, Self::MAX_HOP_INTERVAL_MS)
    }
}

/// Tuning of the adaptive hunting scheduler.
#[derive(Clone, Debug, Setters)]
pub struct HuntConfig {
    pub primary_dwell_ms: u64,
    pub secondary_dwell_ms: u64,
    pub min_dwell_ms: u64,
    /// Beacons in one visit that make a channel busy.
    pub busy_beacons: u32,
    pub busy_multiplier: f32,
    pub light_multiplier: f32,
    /// Fewer beacons than this across a whole cycle is a quiet spectrum.
    pub quiet_cycle_beacons: u32,
    pub quiet_multiplier: f32,
    /// More beacons than this across a whole cycle is a busy spectrum.
    pub busy_cycle_beacons: u32,
    pub busy_cycle_multiplier: f32,
    pub dead_streak_limit: u8,
    pub idle_sweep_dwell_ms: u64,
    pub dwell_window_ms: u64,
    pub hunt_duration_ms: u64,
    pub hunt_cooldown_ms: u64,
    pub hunt_eapol_threshold: u32,
    pub decay_interval_ms: u64,
    pub incomplete_capacity: usize,
    pub incomplete_max_age_ms: u64,
    pub incomplete_revisit_ms: u64,
}

impl Default for HuntConfig {
    fn default() -> Self {
        HuntConfig {
            primary_dwell_ms: 250,
            secondary_dwell_ms: 150,
            min_dwell_ms: 120,
            busy_beacons: 5,
            busy_multiplier: 1.5,
            light_multiplier: 0.7,
            quiet_cycle_beacons: 5,
            quiet_multiplier: 0.6,
            busy_cycle_beacons: 40,
            busy_cycle_multiplier: 1.2,
            dead_streak_limit: 3,
            idle_sweep_dwell_ms: 80,
            dwell_window_ms: 300,
            hunt_duration_ms: 600,
            hunt_cooldown_ms: 10_000,
            hunt_eapol_threshold: 5,
            decay_interval_ms: 120_000,
            incomplete_capacity: 20,
            incomplete_max_age_ms: 60_000,
            incomplete_revisit_ms: 3_000,
        }
    }
}

/// Settings for the capture and attack engine.
#[derive(Clone, Debug, Setters)]
pub struct CaptureConfig {
    pub handshake_capacity: usize,
    pub pmkid_capacity: usize,
    pub exclusion_capacity: usize,
    pub max_clients: usize,
    pub frame_ring_capacity: usize,
    pub deauth_burst_count: u8,
    pub deauth_interval_ms: u64,
    /// Delay before each save attempt, indexed by attempts already made.
    pub save_backoff_ms: [u64; 3],
    pub max_save_attempts: u8,
    pub min_attack_rssi: i8,
    pub max_attack_attempts: u8,
    pub target_cooldown_ms: u64,
    pub client_recent_ms: u64,
    /// Longest the automatic cycle holds a target's channel before attacking.
    pub lock_time_ms: u64,
    /// Attack early once a client has shown up and this much of the lock has passed.
    pub lock_fast_track_ms: u64,
    /// Give up on a target that shows no clients for this long.
    pub lock_early_exit_ms: u64,
    pub attack_window_ms: u64,
    /// Channel stays locked this long after an attack for late handshake messages.
    pub wait_ms: u64,
    pub beacon_cache_len: usize,
    /// Run the select, lock, deauth, cool down cycle without user input.
    pub auto_attack: bool,
    /// Probe PMKIDs with association requests as well as waiting for them.
    pub active_pmkid: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            handshake_capacity: 50,
            pmkid_capacity: 50,
            exclusion_capacity: 50,
            max_clients: 20,
            frame_ring_capacity: 32,
            deauth_burst_count: 5,
            deauth_interval_ms: 180,
            save_backoff_ms: [0, 2_000, 5_000],
            max_save_attempts: 3,
            min_attack_rssi: -85,
            max_attack_attempts: 4,
            target_cooldown_ms: 60_000,
            client_recent_ms: 10_000,
            lock_time_ms: 12_000,
            lock_fast_track_ms: 2_500,
            lock_early_exit_ms: 4_000,
            attack_window_ms: 15_000,
            wait_ms: 4_500,
            beacon_cache_len: 1_500,
            auto_attack: false,
            active_pmkid: false,
        }
    }
}

/// Everything needed to stand up the engine.
#[derive(Clone, Debug, Default, Setters)]
pub struct EngineConfig {
    pub recon: ReconConfig,
    pub hunt: HuntConfig,
    pub capture: CaptureConfig,
    /// Print status messages as they arrive.
    pub headless: bool,
    /// Use the adaptive hunting scheduler instead of plain round-robin hopping.
    pub adaptive: bool,
}
