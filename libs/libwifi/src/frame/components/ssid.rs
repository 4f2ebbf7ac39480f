use std::fmt;

pub const MAX_SSID_LEN: usize = 32;

/// A network name, at most 32 bytes, stored inline.
///
/// Names are raw bytes on the air and are not guaranteed to be UTF-8.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ssid {
    len: u8,
    bytes: [u8; MAX_SSID_LEN],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("ssid is {0} bytes, the limit is 32")]
pub struct SsidTooLong(pub usize);

impl Ssid {
    pub fn new(name: &[u8]) -> Result<Ssid, SsidTooLong> {
        if name.len() > MAX_SSID_LEN {
            return Err(SsidTooLong(name.len()));
        }
        Ok(Self::truncated(name))
    }

    /// Build from possibly oversized input, keeping the first 32 bytes.
    pub fn truncated(name: &[u8]) -> Ssid {
        let len = name.len().min(MAX_SSID_LEN);
        let mut bytes = [0u8; MAX_SSID_LEN];
        bytes[..len].copy_from_slice(&name[..len]);
        Ssid {
            len: len as u8,
            bytes,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cloaked networks announce either nothing or a run of NUL bytes.
    pub fn is_hidden(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }

    pub fn to_hex(&self) -> String {
        self.as_bytes().iter().fold(String::new(), |mut acc, byte| {
            acc.push_str(&format!("{:02x}", byte));
            acc
        })
    }
}

impl From<&str> for Ssid {
    fn from(value: &str) -> Self {
        Ssid::truncated(value.as_bytes())
    }
}

impl fmt::Display for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Debug for Ssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ssid({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_is_validated() {
        assert!(Ssid::new(&[b'a'; 32]).is_ok());
        assert_eq!(Ssid::new(&[b'a'; 33]), Err(SsidTooLong(33)));
        assert_eq!(Ssid::truncated(&[b'a'; 40]).len(), 32);
    }

    #[test]
    fn test_hidden() {
        assert!(Ssid::default().is_hidden());
        assert!(Ssid::truncated(&[0, 0, 0, 0]).is_hidden());
        assert!(!Ssid::from("HomeNet").is_hidden());
    }

    #[test]
    fn test_hex() {
        assert_eq!(Ssid::from("ab").to_hex(), "6162");
    }
}
