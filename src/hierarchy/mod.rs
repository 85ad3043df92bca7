//! Hierarchy walker: transitive subordinate enumeration, cascading
//! deletion, and the orphan-reconciliation sweep.
//!
//! Cascading deletion is deliberately not transactional. A crash
//! mid-walk leaves a partially deleted subtree; the orphan sweep is the
//! repair path. Storage cleanup is best-effort, record deletion is
//! authoritative.

use std::collections::VecDeque;

use serde::Serialize;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::User;
use crate::storage::ObjectStore;

/// IDs of every transitive subordinate of `user_id`, in breadth-first
/// order (parents before their reports). Edges are created only
/// top-down, so the walk needs no cycle guard.
pub async fn all_subordinate_ids(
    repo: &Repository,
    user_id: &str,
) -> Result<Vec<String>, AppError> {
    let mut ids = Vec::new();
    let mut frontier = VecDeque::from([user_id.to_string()]);

    while let Some(current) = frontier.pop_front() {
        for report in repo.list_direct_reports(&current).await? {
            ids.push(report.id.clone());
            frontier.push_back(report.id);
        }
    }

    Ok(ids)
}

/// Delete a user together with their entire subtree: every subordinate,
/// all their activities (releasing attached photos), all their daily
/// plans, and their profile pictures. Children are removed before their
/// parents.
pub async fn delete_user_recursively(
    repo: &Repository,
    store: &dyn ObjectStore,
    user_id: &str,
) -> Result<(), AppError> {
    let Some(user) = repo.get_user(user_id).await? else {
        return Ok(());
    };

    let subtree = all_subordinate_ids(repo, user_id).await?;
    for id in subtree.iter().rev() {
        if let Some(subordinate) = repo.get_user(id).await? {
            delete_one(repo, store, &subordinate).await?;
        }
    }

    delete_one(repo, store, &user).await
}

/// Remove one user and everything they own. The user row goes last so a
/// crash leaves the record discoverable by the orphan sweep.
async fn delete_one(
    repo: &Repository,
    store: &dyn ObjectStore,
    user: &User,
) -> Result<(), AppError> {
    let activities = repo
        .list_activities_for_creators(std::slice::from_ref(&user.id))
        .await?;
    for activity in &activities {
        for key in &activity.photo_keys {
            store.release(key).await;
        }
    }
    repo.delete_activities_by_creator(&user.id).await?;

    repo.delete_plans_by_user(&user.id).await?;

    if let Some(key) = &user.profile_pic_key {
        store.release(key).await;
    }

    repo.delete_user(&user.id).await?;
    tracing::info!(
        "Deleted user {} ({}) and their data",
        user.name,
        user.role.as_str()
    );
    Ok(())
}

/// Result of an orphan-reconciliation sweep.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanReport {
    pub orphans_found: usize,
    pub deleted_count: usize,
}

/// Delete every user whose manager no longer exists, along with their
/// subtrees.
pub async fn cleanup_orphans(
    repo: &Repository,
    store: &dyn ObjectStore,
) -> Result<OrphanReport, AppError> {
    let orphans = repo.find_orphans().await?;
    let orphans_found = orphans.len();
    if orphans_found > 0 {
        tracing::info!("Found {} orphaned users", orphans_found);
    }

    let mut deleted_count = 0;
    for orphan in orphans {
        // An orphan may already be gone if it sat inside another
        // orphan's subtree; delete_user_recursively tolerates that.
        delete_user_recursively(repo, store, &orphan.id).await?;
        deleted_count += 1;
    }

    Ok(OrphanReport {
        orphans_found,
        deleted_count,
    })
}
