//! Centralized authorization rules.
//!
//! Every mutating or scoped-read handler funnels through these
//! predicates. They are evaluated per request against freshly loaded
//! users, never cached: the hierarchy can change between requests.

use crate::models::{DailyPlan, Role, User};

/// A manager may create exactly the next role down the fixed chain
/// RBM -> AreaManager -> TerritoryManager -> MDO.
pub fn can_create_role(creator: Role, target: Role) -> bool {
    creator.child() == Some(target)
}

/// Whether `requester` may read resources scoped to `target`: self,
/// any RBM, or the target's direct manager.
pub fn can_view_user_scoped(requester: &User, target: &User) -> bool {
    if requester.id == target.id || requester.role == Role::RBM {
        return true;
    }
    target.manager_id.as_deref() == Some(requester.id.as_str())
}

/// Whether `requester` sees an activity's tentative expense. Only the
/// creator and RBMs do; everyone else gets the field stripped.
pub fn can_see_expense(requester: &User, creator_id: &str) -> bool {
    requester.role == Role::RBM || requester.id == creator_id
}

/// Role-gated mutation: activities, portfolios, and user deletion are
/// RBM-only operations.
pub fn can_manage_content(role: Role) -> bool {
    role == Role::RBM
}

/// Plans are deletable only by their owner, regardless of role.
pub fn can_delete_plan(requester: &User, plan: &DailyPlan) -> bool {
    plan.user_id == requester.id
}
