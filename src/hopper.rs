use libwifi::frame::components::MacAddress;
use libwifi::FrameKind;

use crate::auth::CaptureMask;
use crate::devices::NetworkTable;
use crate::hunter::HuntState;
use crate::util::{clamp_channel, MAX_CHANNEL, PRIMARY_CHANNELS};

/// What a scheduler gets to look at when deciding whether to move.
pub struct HopContext<'a> {
    pub now: u64,
    /// The channel the radio is on right now.
    pub current: u8,
    pub table: &'a NetworkTable,
    /// Channels of networks whose name somebody asked to have filled in.
    pub wanted_names: &'a [(MacAddress, u8)],
}

impl HopContext<'_> {
    /// Whether sitting on `channel` for a beacon could fill in a missing name.
    pub fn name_wanted_on(&self, channel: u8) -> bool {
        self.wanted_names.iter().any(|(_, ch)| *ch == channel)
            || self
                .table
                .iter()
                .any(|record| record.channel == channel && record.is_hidden)
    }
}

/// Decides when the reconnaissance service changes channel.
///
/// The service only consults the scheduler while it is running, settled and not locked, so
/// implementations never have to reason about manual channel control.
pub trait HopScheduler: Send {
    /// A frame of `kind` arrived on `channel`.
    fn observe(&mut self, channel: u8, kind: FrameKind, now: u64);

    /// Returns the channel to switch to, if it is time to move.
    fn tick(&mut self, ctx: &HopContext) -> Option<u8>;

    /// A handshake on `bssid` is partially captured and worth coming back for.
    fn track_incomplete(&mut self, _bssid: MacAddress, _mask: CaptureMask, _channel: u8, _now: u64) {
    }

    fn state(&self) -> HuntState {
        HuntState::Hopping
    }

    fn reset(&mut self);
}

/// Visit order that passes the primary channels once for every two secondary channels.
pub fn interleaved_order() -> Vec<u8> {
    let secondary: Vec<u8> = (1..=MAX_CHANNEL)
        .filter(|ch| !PRIMARY_CHANNELS.contains(ch))
        .collect();

    let mut order = Vec::with_capacity(secondary.len() / 2 * 5 + 5);
    for pair in secondary.chunks(2) {
        order.extend_from_slice(&PRIMARY_CHANNELS);
        order.extend_from_slice(pair);
    }
    order
}

/// Fixed-interval hopping over [interleaved_order].
#[derive(Debug)]
pub struct RoundRobin {
    order: Vec<u8>,
    cursor: usize,
    interval_ms: u64,
    last_hop: Option<u64>,
}

impl RoundRobin {
    pub fn new(interval_ms: u64) -> Self {
        RoundRobin {
            order: interleaved_order(),
            cursor: 0,
            interval_ms,
            last_hop: None,
        }
    }
}

impl HopScheduler for RoundRobin {
    fn observe(&mut self, _channel: u8, _kind: FrameKind, _now: u64) {}

    fn tick(&mut self, ctx: &HopContext) -> Option<u8> {
        let Some(last_hop) = self.last_hop else {
            self.last_hop = Some(ctx.now);
            return None;
        };

        if ctx.now.saturating_sub(last_hop) < self.interval_ms {
            return None;
        }

        self.cursor = (self.cursor + 1) % self.order.len();
        self.last_hop = Some(ctx.now);
        Some(clamp_channel(self.order[self.cursor]))
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.last_hop = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primaries_visited_more_often() {
        let order = interleaved_order();
        assert_eq!(&order[..5], &[1, 6, 11, 2, 3]);
        assert_eq!(order.iter().filter(|ch| **ch == 6).count(), 5);
        assert_eq!(order.iter().filter(|ch| **ch == 13).count(), 1);
        for channel in 1..=13u8 {
            assert!(order.contains(&channel));
        }
    }

    #[test]
    fn test_round_robin_waits_for_interval() {
        let table = NetworkTable::new(4);
        let mut hopper = RoundRobin::new(150);
        let ctx = |now| HopContext {
            now,
            current: 1,
            table: &table,
            wanted_names: &[],
        };

        assert_eq!(hopper.tick(&ctx(0)), None);
        assert_eq!(hopper.tick(&ctx(100)), None);
        assert_eq!(hopper.tick(&ctx(150)), Some(6));
        assert_eq!(hopper.tick(&ctx(200)), None);
        assert_eq!(hopper.tick(&ctx(300)), Some(11));
    }
}
