use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Achievement markers a group can hold.
///
/// Variants are declared in rule-table order, so a `BadgeSet` iterates in the
/// same order the rules are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BadgeId {
    #[serde(rename = "memory-count-20")]
    MemoryCount20,
    #[serde(rename = "memory-streak-7")]
    MemoryStreak7,
    #[serde(rename = "space-received-10000")]
    SpaceReceived10000,
    #[serde(rename = "like-count-10000")]
    LikeCount10000,
}

impl BadgeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeId::MemoryCount20 => "memory-count-20",
            BadgeId::MemoryStreak7 => "memory-streak-7",
            BadgeId::SpaceReceived10000 => "space-received-10000",
            BadgeId::LikeCount10000 => "like-count-10000",
        }
    }
}

impl fmt::Display for BadgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BADGE_RULES
            .iter()
            .map(|rule| rule.badge)
            .find(|badge| badge.as_str() == s)
            .ok_or_else(|| format!("unknown badge '{s}'"))
    }
}

pub type BadgeSet = BTreeSet<BadgeId>;

/// Aggregate activity of a group, computed fresh before each evaluation.
/// Missing fields deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupStats {
    pub memory_count: u64,
    pub memory_streak_days: u64,
    pub space_received_bytes: u64,
    pub like_count: u64,
}

impl GroupStats {
    /// Reads stats from an untyped record. Anything that is not a JSON object
    /// with non-negative integer fields yields `None`.
    #[allow(dead_code)]
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// One row of the badge table: the badge is earned once `measure(stats)`
/// reaches `threshold`.
pub struct BadgeRule {
    pub badge: BadgeId,
    pub threshold: u64,
    measure: fn(&GroupStats) -> u64,
}

impl BadgeRule {
    pub fn is_met(&self, stats: &GroupStats) -> bool {
        (self.measure)(stats) >= self.threshold
    }
}

fn memory_count(stats: &GroupStats) -> u64 {
    stats.memory_count
}

fn memory_streak_days(stats: &GroupStats) -> u64 {
    stats.memory_streak_days
}

fn space_received_bytes(stats: &GroupStats) -> u64 {
    stats.space_received_bytes
}

fn like_count(stats: &GroupStats) -> u64 {
    stats.like_count
}

/// Adding a badge means adding a variant above and a row here.
pub const BADGE_RULES: [BadgeRule; 4] = [
    BadgeRule {
        badge: BadgeId::MemoryCount20,
        threshold: 20,
        measure: memory_count,
    },
    BadgeRule {
        badge: BadgeId::MemoryStreak7,
        threshold: 7,
        measure: memory_streak_days,
    },
    BadgeRule {
        badge: BadgeId::SpaceReceived10000,
        threshold: 10_000,
        measure: space_received_bytes,
    },
    BadgeRule {
        badge: BadgeId::LikeCount10000,
        threshold: 10_000,
        measure: like_count,
    },
];

/// Returns every badge whose rule is met by `stats`. Pure; all rules are checked.
pub fn evaluate_badges(stats: &GroupStats) -> BadgeSet {
    BADGE_RULES
        .iter()
        .filter(|rule| rule.is_met(stats))
        .map(|rule| rule.badge)
        .collect()
}

/// Evaluates an untyped stats record, degrading to the empty set when the
/// record is absent or malformed. Both stores hand `refresh_badges` typed
/// `GroupStats`, so this is only the entry point for stats that arrive as JSON.
#[allow(dead_code)]
pub(crate) fn evaluate_badges_value(value: &Value) -> BadgeSet {
    match GroupStats::from_value(value) {
        Some(stats) => evaluate_badges(&stats),
        None => {
            warn!("Ignoring malformed group stats for badge evaluation");
            BadgeSet::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(memory: u64, streak: u64, space: u64, likes: u64) -> GroupStats {
        GroupStats {
            memory_count: memory,
            memory_streak_days: streak,
            space_received_bytes: space,
            like_count: likes,
        }
    }

    #[test]
    fn test_zero_stats_earn_nothing() {
        assert!(evaluate_badges(&GroupStats::default()).is_empty());
    }

    #[test]
    fn test_memory_count_threshold_exact() {
        let badges = evaluate_badges(&stats(20, 0, 0, 0));
        assert_eq!(badges, BadgeSet::from([BadgeId::MemoryCount20]));
    }

    #[test]
    fn test_just_below_every_threshold() {
        assert!(evaluate_badges(&stats(19, 6, 9_999, 9_999)).is_empty());
    }

    #[test]
    fn test_all_badges_each_once() {
        let badges = evaluate_badges(&stats(25, 10, 15_000, 12_000));
        assert_eq!(badges.len(), 4);
        let ordered: Vec<&str> = badges.iter().map(|b| b.as_str()).collect();
        assert_eq!(
            ordered,
            vec![
                "memory-count-20",
                "memory-streak-7",
                "space-received-10000",
                "like-count-10000"
            ]
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let s = stats(30, 7, 0, 10_000);
        assert_eq!(evaluate_badges(&s), evaluate_badges(&s));
    }

    #[test]
    fn test_badge_id_round_trips_through_str() {
        for rule in &BADGE_RULES {
            assert_eq!(rule.badge.as_str().parse::<BadgeId>(), Ok(rule.badge));
        }
        assert!("memory-count-50".parse::<BadgeId>().is_err());
    }

    #[test]
    fn test_badge_id_serializes_as_token() {
        let encoded = serde_json::to_string(&BadgeId::SpaceReceived10000).unwrap();
        assert_eq!(encoded, "\"space-received-10000\"");
    }

    #[test]
    fn test_value_missing_fields_default_to_zero() {
        let badges = evaluate_badges_value(&json!({ "likeCount": 10_000 }));
        assert_eq!(badges, BadgeSet::from([BadgeId::LikeCount10000]));
    }

    #[test]
    fn test_value_absent_or_malformed_is_empty() {
        assert!(evaluate_badges_value(&Value::Null).is_empty());
        assert!(evaluate_badges_value(&json!([1, 2, 3])).is_empty());
        assert!(evaluate_badges_value(&json!("stats")).is_empty());
        assert!(evaluate_badges_value(&json!({ "memoryCount": "lots" })).is_empty());
        assert!(evaluate_badges_value(&json!({ "memoryCount": -4 })).is_empty());
    }
}
