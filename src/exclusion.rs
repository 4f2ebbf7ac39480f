use libwifi::frame::components::MacAddress;

/// A network that must never be attacked.
#[derive(Eq, PartialEq, Hash, Clone, Debug)]
pub struct ExclusionEntry {
    pub bssid: MacAddress,
    /// Cached name, only for display.
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    Full,
}

/// Bounded, deduplicated do-not-target list.
#[derive(Clone, Debug)]
pub struct ExclusionList {
    entries: Vec<ExclusionEntry>,
    capacity: usize,
}

impl ExclusionList {
    pub fn new(capacity: usize) -> Self {
        ExclusionList {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Parse the line format: 12 hex digits, then optionally a space and a name.
    /// Blank lines, `#` comments and lines that don't parse are skipped; entries past the
    /// capacity are dropped.
    pub fn parse(text: &str, capacity: usize) -> Self {
        let mut list = ExclusionList::new(capacity);
        for line in text.lines() {
            if let Some((bssid, name)) = parse_line(line) {
                list.add(bssid, name);
            }
        }
        list
    }

    pub fn to_text(&self) -> String {
        let mut text = String::from("# Networks excluded from attacks\n# BSSID NAME\n");
        for entry in &self.entries {
            text.push_str(&hex::encode_upper(entry.bssid.0));
            if !entry.name.is_empty() {
                text.push(' ');
                text.push_str(&entry.name);
            }
            text.push('\n');
        }
        text
    }

    pub fn add(&mut self, bssid: MacAddress, name: &str) -> AddOutcome {
        let name = sanitize(name);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.bssid == bssid) {
            if entry.name.is_empty() && !name.is_empty() {
                entry.name = name;
            }
            return AddOutcome::AlreadyPresent;
        }
        if self.is_full() {
            return AddOutcome::Full;
        }
        self.entries.push(ExclusionEntry { bssid, name });
        AddOutcome::Added
    }

    pub fn remove(&mut self, bssid: &MacAddress) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.bssid != bssid);
        before != self.entries.len()
    }

    pub fn contains(&self, bssid: &MacAddress) -> bool {
        self.entries.iter().any(|e| &e.bssid == bssid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExclusionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn parse_line(line: &str) -> Option<(MacAddress, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (address, name) = match line.split_once(char::is_whitespace) {
        Some((address, name)) => (address, name.trim()),
        None => (line, ""),
    };
    if address.len() != 12 {
        return None;
    }

    let mut bytes = [0u8; 6];
    hex::decode_to_slice(address, &mut bytes).ok()?;
    Some((MacAddress(bytes), name))
}

/// Names go into a line-oriented file; keep them on one line.
fn sanitize(name: &str) -> String {
    name.chars().filter(|c| !c.is_control()).collect()
}
