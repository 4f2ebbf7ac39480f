use itertools::Itertools;
use libwifi::frame::components::{MacAddress, Security};
use strum_macros::Display;

use crate::config::CaptureConfig;
use crate::devices::NetworkRecord;
use crate::exclusion::ExclusionList;

/// Why a network can't be picked automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Ineligible {
    Excluded,
    Hidden,
    Cooldown,
    Protected,
    Captured,
    Open,
    Attempts,
    Weak,
}

/// Eligibility and scoring for automatic target selection.
#[derive(Clone, Debug)]
pub struct TargetPolicy {
    pub min_rssi: i8,
    pub max_attempts: u8,
    pub client_recent_ms: u64,
}

impl TargetPolicy {
    pub fn new(config: &CaptureConfig) -> Self {
        TargetPolicy {
            min_rssi: config.min_attack_rssi,
            max_attempts: config.max_attack_attempts,
            client_recent_ms: config.client_recent_ms,
        }
    }

    pub fn check(
        &self,
        network: &NetworkRecord,
        now: u64,
        exclusions: &ExclusionList,
    ) -> Result<(), Ineligible> {
        if exclusions.contains(&network.bssid) {
            return Err(Ineligible::Excluded);
        }
        if network.is_hidden || network.ssid.is_hidden() {
            return Err(Ineligible::Hidden);
        }
        if network.on_cooldown(now) {
            return Err(Ineligible::Cooldown);
        }
        if network.pmf {
            return Err(Ineligible::Protected);
        }
        if network.has_handshake {
            return Err(Ineligible::Captured);
        }
        if network.security.is_open() {
            return Err(Ineligible::Open);
        }
        if network.attack_attempts >= self.max_attempts {
            return Err(Ineligible::Attempts);
        }
        if network.rssi < self.min_rssi {
            return Err(Ineligible::Weak);
        }
        Ok(())
    }

    pub fn is_eligible(&self, network: &NetworkRecord, now: u64, exclusions: &ExclusionList) -> bool {
        self.check(network, now, exclusions).is_ok()
    }

    /// Higher is better. Strong, busy, weakly secured networks float to the top.
    pub fn score(&self, network: &NetworkRecord, now: u64) -> i32 {
        let mut score = network.quality_score(now) as i32;

        score += match network.rssi {
            r if r >= -40 => 25,
            r if r >= -50 => 15,
            _ => 0,
        };

        score += if network.last_data == 0 {
            -5
        } else {
            match now.saturating_sub(network.last_data) {
                age if age <= self.client_recent_ms => 30,
                age if age <= self.client_recent_ms * 3 => 10,
                _ => -5,
            }
        };

        score += 6 + 2 * network.client_estimate().min(5) as i32;
        score += security_bonus(network.security);
        score -= 8 * network.attack_attempts as i32;
        score
    }

    /// Eligible networks, best first.
    pub fn rank<'a>(
        &self,
        networks: impl IntoIterator<Item = &'a NetworkRecord>,
        now: u64,
        exclusions: &ExclusionList,
    ) -> Vec<(MacAddress, i32)> {
        networks
            .into_iter()
            .filter(|network| self.is_eligible(network, now, exclusions))
            .map(|network| (network.bssid, self.score(network, now)))
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .collect()
    }

    pub fn best<'a>(
        &self,
        networks: impl IntoIterator<Item = &'a NetworkRecord>,
        now: u64,
        exclusions: &ExclusionList,
    ) -> Option<MacAddress> {
        self.rank(networks, now, exclusions)
            .first()
            .map(|(bssid, _)| *bssid)
    }
}

fn security_bonus(security: Security) -> i32 {
    if security.contains(Security::WEP) {
        15
    } else if security.is_wpa3_only() {
        -10
    } else if security.contains(Security::WPA2) && security.contains(Security::WPA3) {
        -5
    } else if security.contains(Security::WPA) && security.contains(Security::WPA2) {
        5
    } else if security.contains(Security::WPA) {
        10
    } else {
        0
    }
}

/// Listing used for explicit selection: everything except excluded networks, in display order.
pub fn targetable(networks: Vec<NetworkRecord>, exclusions: &ExclusionList) -> Vec<NetworkRecord> {
    networks
        .into_iter()
        .filter(|network| !exclusions.contains(&network.bssid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::NetworkSighting;
    use libwifi::frame::components::Ssid;

    fn network(last: u8, rssi: i8, security: Security) -> NetworkRecord {
        NetworkRecord::new(&NetworkSighting {
            bssid: MacAddress([0x10, 0, 0, 0, 0, last]),
            ssid: Ssid::from("lab"),
            channel: 6,
            security,
            pmf: false,
            rssi,
            timestamp: 1_000,
        })
    }

    fn policy() -> TargetPolicy {
        TargetPolicy::new(&CaptureConfig::default())
    }

    #[test]
    fn test_eligibility_filter() {
        let policy = policy();
        let exclusions = ExclusionList::new(50);
        let mut net = network(1, -60, Security::WPA2);
        assert_eq!(policy.check(&net, 1_000, &exclusions), Ok(()));

        net.pmf = true;
        assert_eq!(policy.check(&net, 1_000, &exclusions), Err(Ineligible::Protected));
        net.pmf = false;

        net.cooldown_until = 5_000;
        assert_eq!(policy.check(&net, 1_000, &exclusions), Err(Ineligible::Cooldown));
        assert!(policy.is_eligible(&net, 5_000, &exclusions));

        net.attack_attempts = 4;
        assert_eq!(policy.check(&net, 5_000, &exclusions), Err(Ineligible::Attempts));

        let weak = network(2, -90, Security::WPA2);
        assert_eq!(policy.check(&weak, 1_000, &exclusions), Err(Ineligible::Weak));

        let open = network(3, -50, Security::OPEN);
        assert_eq!(policy.check(&open, 1_000, &exclusions), Err(Ineligible::Open));
    }

    #[test]
    fn test_excluded_never_picked() {
        let policy = policy();
        let strong = network(1, -35, Security::WPA2);
        let weaker = network(2, -70, Security::WPA2);
        let mut exclusions = ExclusionList::new(50);
        assert_eq!(policy.best([&strong, &weaker], 1_000, &exclusions), Some(strong.bssid));

        exclusions.add(strong.bssid, "lab");
        assert_eq!(policy.best([&strong, &weaker], 1_000, &exclusions), Some(weaker.bssid));

        let listing = targetable(vec![strong, weaker.clone()], &exclusions);
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].bssid, weaker.bssid);
    }

    #[test]
    fn test_clients_and_security_raise_score() {
        let policy = policy();
        let quiet = network(1, -60, Security::WPA2);
        let mut busy = network(2, -60, Security::WPA2);
        busy.note_data(Some(&MacAddress([0x20, 0, 0, 0, 0, 1])), 1_000);
        assert!(policy.score(&busy, 2_000) > policy.score(&quiet, 2_000));

        let wep = network(3, -60, Security::WEP);
        let wpa3 = network(4, -60, Security::WPA3);
        assert!(policy.score(&wep, 1_000) > policy.score(&quiet, 1_000));
        assert!(policy.score(&wpa3, 1_000) < policy.score(&quiet, 1_000));

        let mut tried = network(5, -60, Security::WPA2);
        tried.attack_attempts = 2;
        assert_eq!(policy.score(&quiet, 1_000) - policy.score(&tried, 1_000), 16);
    }
}
