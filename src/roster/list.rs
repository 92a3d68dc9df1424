//! In-memory channel list
//!
//! Case-insensitive membership, case-preserving storage. Serializes to the
//! tab-indented JSON array format of the roster file.

use serde::Serialize;

/// Sorted, duplicate-free list of channel names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelList {
    channels: Vec<String>,
}

impl ChannelList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from names, dropping case-insensitive duplicates
    ///
    /// The first spelling of a duplicated name is kept.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for name in names {
            list.add(name);
        }
        list.sort();
        list
    }

    /// Case-insensitive membership test
    pub fn contains(&self, name: &str) -> bool {
        self.channels.iter().any(|c| same_channel(c, name))
    }

    /// Append a channel if absent
    ///
    /// Returns `false` if a case-insensitive match was already present.
    pub fn add(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.channels.push(name);
        true
    }

    /// Remove the case-insensitive match, reporting whether one existed
    pub fn remove(&mut self, name: &str) -> bool {
        match self.channels.iter().position(|c| same_channel(c, name)) {
            Some(idx) => {
                self.channels.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Sort lexicographically (byte order)
    pub fn sort(&mut self) {
        self.channels.sort();
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.channels.clone()
    }

    /// Serialize as a JSON array indented with tabs
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::with_capacity(16 * (self.channels.len() + 1));
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.channels.serialize(&mut ser)?;
        Ok(buf)
    }

    /// Parse a JSON array of channel names
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        let names: Vec<String> = serde_json::from_slice(data)?;
        Ok(Self::from_names(names))
    }
}

/// Unicode case-insensitive name comparison
fn same_channel(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
