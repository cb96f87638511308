use std::fmt;

use serde::{Deserialize, Serialize};

/// Internal identifier of a property row.
///
/// Ids are assigned as contiguous indices at ingest and are stable within a
/// store generation; they are never the county parcel code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub u32);

impl PropertyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

/// Internal identifier of a subdivision row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubdivisionId(pub u32);

impl SubdivisionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SubdivisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubdivisionId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_index() {
        assert!(PropertyId(0) < PropertyId(1));
        assert!(SubdivisionId(3) > SubdivisionId(2));
    }

    #[test]
    fn display() {
        assert_eq!(PropertyId(42).to_string(), "PropertyId(42)");
    }
}
