//! Group achievements: a data-driven rule table evaluated against aggregate
//! group activity, plus the policy deciding whether lapsed badges are kept.

pub mod policy;
pub mod rules;
pub mod streak;

pub use policy::BadgePolicy;
pub use rules::{evaluate_badges, BadgeId, BadgeSet, GroupStats};
