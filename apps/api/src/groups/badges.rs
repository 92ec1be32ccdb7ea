use tracing::{info, warn};

use crate::badges::{evaluate_badges, BadgePolicy, BadgeSet};
use crate::models::group::GroupRow;
use crate::store::{GroupRepo, StoreError};

/// Re-evaluates a group's badges from its current stats and persists the
/// result when it differs from what is stored. Returns the group as it now
/// stands. Failing to read stats leaves the stored badges untouched.
pub async fn refresh_badges(
    groups: &dyn GroupRepo,
    mut group: GroupRow,
    policy: BadgePolicy,
) -> Result<GroupRow, StoreError> {
    let stats = match groups.stats(group.id).await {
        Ok(Some(stats)) => stats,
        Ok(None) => return Ok(group),
        Err(err) => {
            warn!(group_id = group.id, error = %err, "Skipping badge evaluation");
            return Ok(group);
        }
    };
    let stored = group.badge_set();
    let next: BadgeSet = policy.apply(&stored, evaluate_badges(&stats));
    if next == stored {
        return Ok(group);
    }

    // `group` may be stale, so retained badges are merged in the store rather
    // than written over whatever another request stored meanwhile.
    let persisted = match policy {
        BadgePolicy::Retain => match groups.merge_badges(group.id, &next).await? {
            Some(merged) => merged,
            None => return Ok(group),
        },
        BadgePolicy::Recompute => {
            groups.set_badges(group.id, &next).await?;
            next
        }
    };
    info!(
        group_id = group.id,
        badges = ?persisted,
        "Updated group badges"
    );
    group.badges = persisted.iter().map(|b| b.as_str().to_string()).collect();
    Ok(group)
}

/// Same as [`refresh_badges`] for callers that only hold the id.
pub async fn refresh_badges_by_id(
    groups: &dyn GroupRepo,
    group_id: i64,
    policy: BadgePolicy,
) -> Result<Option<GroupRow>, StoreError> {
    match groups.get(group_id).await? {
        Some(group) => Ok(Some(refresh_badges(groups, group, policy).await?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badges::BadgeId;
    use crate::models::group::NewGroup;
    use crate::store::MemoryStore;

    async fn group_with_likes(store: &MemoryStore, likes: usize) -> GroupRow {
        let group = GroupRepo::insert(
            store,
            NewGroup {
                name: "g".to_string(),
                password_hash: "hash".to_string(),
                image_url: None,
                is_public: true,
                introduction: String::new(),
            },
        )
        .await
        .unwrap();
        for _ in 0..likes {
            GroupRepo::increment_likes(store, group.id).await.unwrap();
        }
        GroupRepo::get(store, group.id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_refresh_persists_earned_badges() {
        let store = MemoryStore::new();
        let group = group_with_likes(&store, 10_000).await;

        let refreshed = refresh_badges(&store, group, BadgePolicy::Retain).await.unwrap();
        assert_eq!(refreshed.badges, vec!["like-count-10000".to_string()]);

        let stored = GroupRepo::get(&store, refreshed.id).await.unwrap().unwrap();
        assert_eq!(stored.badge_set(), BadgeSet::from([BadgeId::LikeCount10000]));
    }

    #[tokio::test]
    async fn test_retain_keeps_stored_badge_without_stats() {
        let store = MemoryStore::new();
        let group = group_with_likes(&store, 0).await;
        GroupRepo::set_badges(&store, group.id, &BadgeSet::from([BadgeId::MemoryStreak7]))
            .await
            .unwrap();

        let kept = refresh_badges_by_id(&store, group.id, BadgePolicy::Retain)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.badges, vec!["memory-streak-7".to_string()]);

        let dropped = refresh_badges_by_id(&store, group.id, BadgePolicy::Recompute)
            .await
            .unwrap()
            .unwrap();
        assert!(dropped.badges.is_empty());
    }

    #[tokio::test]
    async fn test_retain_refresh_from_stale_row_keeps_concurrent_badge() {
        let store = MemoryStore::new();
        let stale = group_with_likes(&store, 10_000).await;
        assert!(stale.badges.is_empty());
        // Another request stores a badge after `stale` was read.
        GroupRepo::set_badges(&store, stale.id, &BadgeSet::from([BadgeId::MemoryStreak7]))
            .await
            .unwrap();

        let refreshed = refresh_badges(&store, stale, BadgePolicy::Retain).await.unwrap();
        let expected = BadgeSet::from([BadgeId::MemoryStreak7, BadgeId::LikeCount10000]);
        assert_eq!(refreshed.badge_set(), expected);

        let stored = GroupRepo::get(&store, refreshed.id).await.unwrap().unwrap();
        assert_eq!(stored.badge_set(), expected);
    }

    #[tokio::test]
    async fn test_missing_group_is_none() {
        let store = MemoryStore::new();
        assert!(refresh_badges_by_id(&store, 42, BadgePolicy::Retain)
            .await
            .unwrap()
            .is_none());
    }
}
