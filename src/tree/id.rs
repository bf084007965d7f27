//! Identity type for tree entries.
//!
//! An `EntryId` is a direct index into the tree's entry storage. Slots are
//! never reused, so a stale id resolves to nothing rather than to another
//! entry.

use std::fmt;

/// Index into `ResourceTree::entries`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct EntryId(pub u32);

impl EntryId {
    pub const INVALID: EntryId = EntryId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "EntryId(INVALID)")
        } else {
            write!(f, "EntryId({})", self.0)
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid() {
        assert!(!EntryId::INVALID.is_valid());
        assert!(EntryId(0).is_valid());
        assert_eq!(format!("{:?}", EntryId::INVALID), "EntryId(INVALID)");
        assert_eq!(EntryId(7).index(), 7);
    }
}
