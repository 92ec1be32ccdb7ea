use std::str::FromStr;

use crate::badges::BadgeSet;

/// What happens to a badge whose threshold is no longer met on re-evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BadgePolicy {
    /// Earned badges are kept forever.
    #[default]
    Retain,
    /// The stored set always equals the freshly evaluated set.
    Recompute,
}

impl BadgePolicy {
    /// Combines the currently stored badges with a fresh evaluation.
    pub fn apply(&self, existing: &BadgeSet, earned: BadgeSet) -> BadgeSet {
        match self {
            BadgePolicy::Retain => existing.union(&earned).copied().collect(),
            BadgePolicy::Recompute => earned,
        }
    }
}

impl FromStr for BadgePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(BadgePolicy::Retain),
            "recompute" => Ok(BadgePolicy::Recompute),
            other => Err(format!(
                "unknown badge policy '{other}' (expected 'retain' or 'recompute')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badges::BadgeId;

    #[test]
    fn test_retain_keeps_badges_when_stats_drop() {
        let existing = BadgeSet::from([BadgeId::MemoryStreak7]);
        let earned = BadgeSet::from([BadgeId::MemoryCount20]);
        let next = BadgePolicy::Retain.apply(&existing, earned);
        assert_eq!(
            next,
            BadgeSet::from([BadgeId::MemoryCount20, BadgeId::MemoryStreak7])
        );
    }

    #[test]
    fn test_recompute_drops_lapsed_badges() {
        let existing = BadgeSet::from([BadgeId::MemoryStreak7]);
        let earned = BadgeSet::from([BadgeId::MemoryCount20]);
        let next = BadgePolicy::Recompute.apply(&existing, earned);
        assert_eq!(next, BadgeSet::from([BadgeId::MemoryCount20]));
    }

    #[test]
    fn test_retain_has_no_duplicates() {
        let existing = BadgeSet::from([BadgeId::LikeCount10000]);
        let earned = BadgeSet::from([BadgeId::LikeCount10000]);
        assert_eq!(BadgePolicy::Retain.apply(&existing, earned).len(), 1);
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("retain".parse::<BadgePolicy>(), Ok(BadgePolicy::Retain));
        assert_eq!(" Recompute ".parse::<BadgePolicy>(), Ok(BadgePolicy::Recompute));
        assert!("revoke".parse::<BadgePolicy>().is_err());
    }
}
