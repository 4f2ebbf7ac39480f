use libwifi::frame::components::MacAddress;
use libwifi::FrameKind;
use strum_macros::Display;

use crate::auth::CaptureMask;
use crate::config::HuntConfig;
use crate::hopper::{interleaved_order, HopContext, HopScheduler};
use crate::util::{clamp_channel, is_primary, MAX_CHANNEL};

const CHANNEL_COUNT: usize = MAX_CHANNEL as usize;
const BASELINE_PRIORITY: u16 = 100;
const MAX_PRIORITY: u16 = 250;
const MIN_PRIORITY: u16 = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum HuntState {
    Hopping,
    /// Holding briefly for a beacon that fills in a missing name.
    Dwelling,
    /// Holding long on a channel with handshake traffic.
    Hunting,
    /// Nothing heard anywhere recently; sweep fast until something shows up.
    IdleSweep,
}

/// Per-channel activity model.
#[derive(Clone, Debug)]
pub struct ChannelStat {
    /// Counts for the visit in progress.
    pub beacons: u32,
    pub eapols: u32,
    /// Counts of the last completed visit.
    pub last_beacons: u32,
    pub last_eapols: u32,
    pub last_activity: u64,
    pub priority: u16,
    pub dead_streak: u8,
    pub lifetime_beacons: u32,
    pub hunt_cooldown_until: u64,
}

impl Default for ChannelStat {
    fn default() -> Self {
        ChannelStat {
            beacons: 0,
            eapols: 0,
            last_beacons: 0,
            last_eapols: 0,
            last_activity: 0,
            priority: BASELINE_PRIORITY,
            dead_streak: 0,
            lifetime_beacons: 0,
            hunt_cooldown_until: 0,
        }
    }
}

/// A handshake worth returning to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncompleteHandshake {
    pub bssid: MacAddress,
    pub mask: CaptureMask,
    pub channel: u8,
    pub last_seen: u64,
    pub last_visit: u64,
}

/// Activity-driven channel scheduler.
///
/// Dwell time per channel scales with how much was heard there last time, how busy the whole
/// band is and a slowly decaying priority. Channels with a burst of EAPOL traffic are hunted,
/// channels with hidden networks get a short dwell for a naming beacon, and channels holding a
/// partial handshake are revisited.
pub struct AdaptiveHunter {
    config: HuntConfig,
    stats: [ChannelStat; CHANNEL_COUNT],
    state: HuntState,
    order: Vec<u8>,
    cursor: usize,
    current: u8,
    arrived_at: u64,
    leave_at: u64,
    cycle_beacons: u32,
    cycle_visits: usize,
    last_cycle_beacons: Option<u32>,
    last_decay: u64,
    incomplete: Vec<IncompleteHandshake>,
    started: bool,
}

impl AdaptiveHunter {
    pub fn new(config: HuntConfig) -> Self {
        AdaptiveHunter {
            config,
            stats: Default::default(),
            state: HuntState::Hopping,
            order: interleaved_order(),
            cursor: 0,
            current: 1,
            arrived_at: 0,
            leave_at: 0,
            cycle_beacons: 0,
            cycle_visits: 0,
            last_cycle_beacons: None,
            last_decay: 0,
            incomplete: Vec::new(),
            started: false,
        }
    }

    pub fn channel_stat(&self, channel: u8) -> &ChannelStat {
        &self.stats[index(channel)]
    }

    pub fn incomplete(&self) -> &[IncompleteHandshake] {
        &self.incomplete
    }

    pub fn current_channel(&self) -> u8 {
        self.current
    }

    fn stat_mut(&mut self, channel: u8) -> &mut ChannelStat {
        &mut self.stats[index(channel)]
    }

    fn all_dead(&self) -> bool {
        self.stats
            .iter()
            .all(|stat| stat.dead_streak >= self.config.dead_streak_limit)
    }

    /// Normal hopping dwell for `channel`, never below the configured floor.
    pub fn hop_dwell(&self, channel: u8) -> u64 {
        let config = &self.config;
        let stat = self.channel_stat(channel);

        if stat.dead_streak >= config.dead_streak_limit {
            return config.min_dwell_ms;
        }

        let base = if is_primary(channel) {
            config.primary_dwell_ms
        } else {
            config.secondary_dwell_ms
        } as f32;

        let activity = if stat.last_beacons >= config.busy_beacons {
            config.busy_multiplier
        } else if stat.last_beacons >= 2 {
            1.0
        } else {
            config.light_multiplier
        };

        let spectrum = match self.last_cycle_beacons {
            Some(beacons) if beacons < config.quiet_cycle_beacons => config.quiet_multiplier,
            Some(beacons) if beacons > config.busy_cycle_beacons => config.busy_cycle_multiplier,
            _ => 1.0,
        };

        let priority = stat.priority as f32 / BASELINE_PRIORITY as f32;
        let dwell = (base * activity * spectrum * priority).round() as u64;
        dwell.max(config.min_dwell_ms)
    }

    /// Close the visit to the current channel and fold its counts into the model.
    fn finish_visit(&mut self) {
        let channel = self.current;
        let limit = self.config.dead_streak_limit;
        let stat = self.stat_mut(channel);

        let active = stat.beacons > 0 || stat.eapols > 0;
        if active {
            stat.dead_streak = 0;
            let boost = 10 + 5 * stat.eapols.min(10) as u16;
            stat.priority = (stat.priority + boost).min(MAX_PRIORITY);
        } else {
            stat.dead_streak = stat.dead_streak.saturating_add(1).min(limit);
            stat.priority = stat.priority.saturating_sub(10).max(MIN_PRIORITY);
        }
        stat.last_beacons = stat.beacons;
        stat.last_eapols = stat.eapols;
        stat.beacons = 0;
        stat.eapols = 0;
        let heard = stat.last_beacons;

        self.cycle_beacons += heard;
        self.cycle_visits += 1;
        if self.cycle_visits >= self.order.len() {
            self.last_cycle_beacons = Some(self.cycle_beacons);
            self.cycle_beacons = 0;
            self.cycle_visits = 0;
        }

        if self.state == HuntState::IdleSweep && active {
            self.state = HuntState::Hopping;
        }
    }

    fn next_channel(&mut self, now: u64) -> u8 {
        let revisit_ms = self.config.incomplete_revisit_ms;
        let current = self.current;
        let due = self
            .incomplete
            .iter_mut()
            .filter(|entry| entry.channel != current)
            .filter(|entry| now.saturating_sub(entry.last_visit) >= revisit_ms)
            .min_by_key(|entry| entry.last_visit);

        if let Some(entry) = due {
            entry.last_visit = now;
            return entry.channel;
        }

        if self.state == HuntState::IdleSweep {
            return current % MAX_CHANNEL + 1;
        }

        self.cursor = (self.cursor + 1) % self.order.len();
        self.order[self.cursor]
    }

    fn arrive(&mut self, channel: u8, ctx: &HopContext) {
        let now = ctx.now;
        self.current = clamp_channel(channel);
        self.arrived_at = now;

        if self.all_dead() {
            self.state = HuntState::IdleSweep;
            self.leave_at = now + self.config.idle_sweep_dwell_ms;
            return;
        }
        if self.state == HuntState::IdleSweep {
            self.state = HuntState::Hopping;
        }

        let threshold = self.config.hunt_eapol_threshold;
        let cooldown = self.config.hunt_cooldown_ms;
        let stat = self.stat_mut(channel);
        if stat.last_eapols >= threshold && now >= stat.hunt_cooldown_until {
            stat.hunt_cooldown_until = now + cooldown;
            self.state = HuntState::Hunting;
            self.leave_at = now + self.config.hunt_duration_ms;
            return;
        }

        if ctx.name_wanted_on(self.current) {
            self.state = HuntState::Dwelling;
            self.leave_at = now + self.config.dwell_window_ms;
            return;
        }

        self.state = HuntState::Hopping;
        self.leave_at = now + self.hop_dwell(self.current);
    }

    /// Pull priorities halfway back to baseline and forget the per-visit history.
    fn decay(&mut self) {
        for stat in self.stats.iter_mut() {
            let priority = stat.priority as i32;
            stat.priority = (BASELINE_PRIORITY as i32 + (priority - BASELINE_PRIORITY as i32) / 2) as u16;
            stat.last_beacons = 0;
            stat.last_eapols = 0;
            stat.dead_streak = 0;
        }
        if self.state == HuntState::IdleSweep {
            self.state = HuntState::Hopping;
        }
    }

    fn expire_incomplete(&mut self, now: u64) {
        let max_age = self.config.incomplete_max_age_ms;
        self.incomplete
            .retain(|entry| now.saturating_sub(entry.last_seen) <= max_age);
    }
}

impl HopScheduler for AdaptiveHunter {
    fn observe(&mut self, channel: u8, kind: FrameKind, now: u64) {
        if !(1..=MAX_CHANNEL).contains(&channel) {
            return;
        }
        let stat = self.stat_mut(channel);
        match kind {
            FrameKind::Beacon | FrameKind::ProbeResponse => {
                stat.beacons += 1;
                stat.lifetime_beacons = stat.lifetime_beacons.saturating_add(1);
                stat.last_activity = now;
            }
            FrameKind::Eapol => {
                stat.eapols += 1;
                stat.last_activity = now;
            }
            _ => {}
        }
    }

    fn tick(&mut self, ctx: &HopContext) -> Option<u8> {
        let now = ctx.now;

        if !self.started {
            self.started = true;
            self.last_decay = now;
            self.arrive(ctx.current, ctx);
            return None;
        }

        // Someone else moved the radio (a lock came and went); start a fresh visit there.
        if ctx.current != self.current {
            self.arrive(ctx.current, ctx);
            return None;
        }

        if now.saturating_sub(self.last_decay) >= self.config.decay_interval_ms {
            self.last_decay = now;
            self.decay();
        }
        self.expire_incomplete(now);

        if self.state == HuntState::Dwelling {
            if self.channel_stat(self.current).beacons > 0 {
                self.state = HuntState::Hopping;
                self.leave_at = self.arrived_at + self.hop_dwell(self.current);
            } else if now >= self.leave_at {
                self.state = HuntState::Hopping;
            }
        }

        if now < self.leave_at {
            return None;
        }

        self.finish_visit();
        let next = self.next_channel(now);
        self.arrive(next, ctx);
        Some(self.current)
    }

    fn track_incomplete(&mut self, bssid: MacAddress, mask: CaptureMask, channel: u8, now: u64) {
        if mask.is_exportable() {
            self.incomplete.retain(|entry| entry.bssid != bssid);
            return;
        }

        let channel = clamp_channel(channel);
        if let Some(entry) = self.incomplete.iter_mut().find(|entry| entry.bssid == bssid) {
            entry.mask = mask;
            entry.channel = channel;
            entry.last_seen = now;
            return;
        }

        if self.incomplete.len() >= self.config.incomplete_capacity {
            if let Some(oldest) = self
                .incomplete
                .iter()
                .enumerate()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(i, _)| i)
            {
                self.incomplete.swap_remove(oldest);
            }
        }

        self.incomplete.push(IncompleteHandshake {
            bssid,
            mask,
            channel,
            last_seen: now,
            last_visit: now,
        });
    }

    fn state(&self) -> HuntState {
        self.state
    }

    fn reset(&mut self) {
        *self = AdaptiveHunter::new(self.config.clone());
    }
}

fn index(channel: u8) -> usize {
    (clamp_channel(channel) - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::NetworkTable;

    fn ctx<'a>(now: u64, current: u8, table: &'a NetworkTable) -> HopContext<'a> {
        HopContext {
            now,
            current,
            table,
            wanted_names: &[],
        }
    }

    /// Tick until the hunter moves and return the new channel and time.
    fn step(hunter: &mut AdaptiveHunter, table: &NetworkTable, mut now: u64) -> (u8, u64) {
        loop {
            now += 10;
            let current = hunter.current_channel();
            if let Some(channel) = hunter.tick(&ctx(now, current, table)) {
                return (channel, now);
            }
        }
    }

    #[test]
    fn test_eapol_burst_triggers_hunting_on_next_visit() {
        let table = NetworkTable::new(8);
        let mut hunter = AdaptiveHunter::new(HuntConfig::default());
        assert_eq!(hunter.tick(&ctx(0, 1, &table)), None);

        // Channel 1 stays silent; move on to 6.
        let (channel, now) = step(&mut hunter, &table, 0);
        assert_eq!(channel, 6);
        assert_eq!(hunter.channel_stat(1).dead_streak, 1);

        for _ in 0..5 {
            hunter.observe(6, FrameKind::Eapol, now);
        }
        hunter.observe(6, FrameKind::Beacon, now);
        assert_eq!(hunter.state(), HuntState::Hopping);

        // Walk the cycle until channel 6 comes round again.
        let mut now = now;
        loop {
            let (channel, at) = step(&mut hunter, &table, now);
            now = at;
            if channel == 6 {
                break;
            }
        }
        assert_eq!(hunter.state(), HuntState::Hunting);
        assert_eq!(hunter.channel_stat(6).dead_streak, 0);
        assert!(hunter.channel_stat(1).dead_streak >= 1);

        // The hunt holds for its full duration before hopping on.
        let arrived = now;
        let (_, left) = step(&mut hunter, &table, now);
        assert!(left - arrived >= 600);
    }

    #[test]
    fn test_hunt_cooldown_blocks_immediate_rehunt() {
        let table = NetworkTable::new(8);
        let mut hunter = AdaptiveHunter::new(HuntConfig::default());
        hunter.tick(&ctx(0, 1, &table));

        let mut now = 0;
        let mut hunts = 0;
        // Several cycles fit inside one cooldown.
        while now < 8_000 {
            let (channel, at) = step(&mut hunter, &table, now);
            now = at;
            if hunter.state() == HuntState::Hunting {
                hunts += 1;
            }
            if channel == 6 {
                for _ in 0..5 {
                    hunter.observe(6, FrameKind::Eapol, now);
                }
            }
        }
        assert_eq!(hunts, 1);
    }

    #[test]
    fn test_dead_band_goes_idle_sweep() {
        let table = NetworkTable::new(8);
        let mut hunter = AdaptiveHunter::new(HuntConfig::default());
        hunter.tick(&ctx(0, 1, &table));

        let mut now = 0;
        for _ in 0..200 {
            let (_, at) = step(&mut hunter, &table, now);
            now = at;
            if hunter.state() == HuntState::IdleSweep {
                break;
            }
        }
        assert_eq!(hunter.state(), HuntState::IdleSweep);

        // Idle sweep dwells are the shortest of all.
        let (channel, at) = step(&mut hunter, &table, now);
        assert!(at - now <= 80 + 10);

        // Any beacon brings normal hopping back.
        hunter.observe(channel, FrameKind::Beacon, at);
        step(&mut hunter, &table, at);
        assert_eq!(hunter.state(), HuntState::Hopping);
    }

    #[test]
    fn test_dwell_for_hidden_name() {
        let table = NetworkTable::new(8);
        let wanted = [(MacAddress([2, 0, 0, 0, 0, 9]), 6)];
        let mut hunter = AdaptiveHunter::new(HuntConfig::default());
        hunter.tick(&ctx(0, 1, &table));

        let mut now = 0;
        loop {
            now += 10;
            let current = hunter.current_channel();
            let context = HopContext {
                now,
                current,
                table: &table,
                wanted_names: &wanted,
            };
            if hunter.tick(&context) == Some(6) {
                break;
            }
        }
        assert_eq!(hunter.state(), HuntState::Dwelling);
    }

    #[test]
    fn test_incomplete_handshake_revisited() {
        let table = NetworkTable::new(8);
        let mut hunter = AdaptiveHunter::new(HuntConfig::default());
        hunter.tick(&ctx(0, 1, &table));

        let bssid = MacAddress([0x10, 0, 0, 0, 0, 1]);
        hunter.track_incomplete(bssid, CaptureMask::from_bits(0b0001), 9, 0);

        // After the revisit interval the next hop goes straight to channel 9.
        let mut now = 0;
        let mut visited_nine = false;
        while now < 4_000 {
            let (channel, at) = step(&mut hunter, &table, now);
            now = at;
            if channel == 9 && now >= 3_000 {
                visited_nine = true;
                break;
            }
        }
        assert!(visited_nine);

        // An exportable mask clears the entry.
        hunter.track_incomplete(bssid, CaptureMask::from_bits(0b0011), 9, now);
        assert!(hunter.incomplete().is_empty());
    }

    #[test]
    fn test_incomplete_queue_bounded_and_aged() {
        let mut hunter = AdaptiveHunter::new(HuntConfig::default());
        for i in 0..30u8 {
            hunter.track_incomplete(
                MacAddress([0x10, 0, 0, 0, 0, i]),
                CaptureMask::from_bits(0b0001),
                1,
                i as u64,
            );
        }
        assert_eq!(hunter.incomplete().len(), 20);
        hunter.expire_incomplete(70_000);
        assert!(hunter.incomplete().is_empty());
    }

    #[test]
    fn test_dwell_scaling() {
        let mut hunter = AdaptiveHunter::new(HuntConfig::default());
        assert_eq!(hunter.hop_dwell(1), 175);
        hunter.stat_mut(1).last_beacons = 8;
        assert_eq!(hunter.hop_dwell(1), 375);
        hunter.stat_mut(1).dead_streak = 3;
        assert_eq!(hunter.hop_dwell(1), 120);

        hunter.last_cycle_beacons = Some(2);
        hunter.stat_mut(2).last_beacons = 3;
        assert_eq!(hunter.hop_dwell(2), 120);
    }
}
