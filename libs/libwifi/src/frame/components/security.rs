use std::fmt;

/// Security suites advertised by a network. An empty set means open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Security(u8);

impl Security {
    pub const OPEN: Security = Security(0);
    pub const WEP: Security = Security(1 << 0);
    pub const WPA: Security = Security(1 << 1);
    pub const WPA2: Security = Security(1 << 2);
    pub const WPA3: Security = Security(1 << 3);
    pub const ENTERPRISE: Security = Security(1 << 4);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Security {
        Security(bits & 0x1f)
    }

    pub fn contains(&self, other: Security) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Security) {
        self.0 |= other.0;
    }

    pub fn is_open(&self) -> bool {
        self.0 == 0
    }

    /// WPA3-only networks are the hardest to attack; mixed mode still allows WPA2 captures.
    pub fn is_wpa3_only(&self) -> bool {
        self.contains(Security::WPA3) && !self.contains(Security::WPA2) && !self.contains(Security::WPA)
    }
}

impl std::ops::BitOr for Security {
    type Output = Security;

    fn bitor(self, rhs: Security) -> Security {
        Security(self.0 | rhs.0)
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open() {
            return write!(f, "OPEN");
        }
        let names = [
            (Security::WEP, "WEP"),
            (Security::WPA, "WPA"),
            (Security::WPA2, "WPA2"),
            (Security::WPA3, "WPA3"),
            (Security::ENTERPRISE, "EAP"),
        ];
        let parts: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", parts.join("/"))
    }
}
