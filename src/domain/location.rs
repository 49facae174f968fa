//! Storage slots: rack / layer / space

use serde::{Deserialize, Serialize};
use std::fmt;

use super::serial::SerialNumber;

/// Address of one storage slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotAddress {
    pub rack: String,
    pub layer: u32,
    pub space: u32,
}

impl SlotAddress {
    pub fn new(rack: impl Into<String>, layer: u32, space: u32) -> Self {
        Self {
            rack: rack.into(),
            layer,
            space,
        }
    }

    /// Same slot with surrounding whitespace stripped from the rack name
    pub fn normalized(&self) -> Self {
        Self::new(self.rack.trim(), self.layer, self.space)
    }
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - Layer {} - Space {}",
            self.rack, self.layer, self.space
        )
    }
}

/// A slot and its occupant, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    #[serde(flatten)]
    pub address: SlotAddress,
    pub occupant: Option<SerialNumber>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_reads_like_a_label() {
        let addr = SlotAddress::new("A", 2, 7);
        assert_eq!(addr.to_string(), "A - Layer 2 - Space 7");
    }
}
