use std::fmt;

use serde::{Deserialize, Serialize};

/// Arena index of a match inside a mapping.
///
/// Only meaningful for the mapping that issued it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(usize);

impl MatchId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Arena index of a difference inside a difference set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DifferenceId(usize);

impl DifferenceId {
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for DifferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

impl fmt::Display for DifferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_indices() {
        assert_eq!(MatchId::from_index(5).index(), 5);
        assert_eq!(DifferenceId::from_index(9).index(), 9);
        assert_eq!(MatchId::from_index(usize::MAX).index(), usize::MAX);
        assert_eq!(DifferenceId::from_index(usize::MAX).index(), usize::MAX);
    }

    #[test]
    fn ids_display_short_form() {
        assert_eq!(MatchId::from_index(3).to_string(), "m3");
        assert_eq!(format!("{:?}", DifferenceId::from_index(1)), "d1");
    }
}
