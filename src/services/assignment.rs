//! Assigning users to tasks.

use serde_json::Value;
use tracing::info;

use crate::auth::permissions::can_assign_task;
use crate::db::Database;
use crate::db::assignments::AssignOutcome;
use crate::error::{ApiError, ApiResult};
use crate::types::User;

/// Assign `target` to `task_id` on behalf of `caller`.
///
/// Checks run in a fixed order: the task must exist, the caller must be its
/// creator or staff, a target id must be supplied and resolve to an active
/// user. An existing assignment is returned as `AlreadyAssigned`.
pub fn assign_task(
    db: &Database,
    caller: &User,
    task_id: i64,
    target: Option<&Value>,
) -> ApiResult<AssignOutcome> {
    let task = db
        .get_task(task_id)?
        .ok_or_else(|| ApiError::task_not_found(task_id))?;

    if !can_assign_task(caller, &task) {
        return Err(ApiError::forbidden(
            "Only the task creator or staff can assign this task",
        ));
    }

    let user_id = parse_user_id(target)?;

    if db.get_user(user_id)?.is_none() {
        return Err(ApiError::user_not_found(user_id));
    }

    // Fast path; the unique constraint is the real guard
    if let Some(existing) = db.find_assignment(user_id, task_id)? {
        return Ok(AssignOutcome::AlreadyAssigned(existing));
    }

    let outcome = db.assign_user(user_id, task_id, caller.id)?;
    if outcome.created() {
        info!(
            task_id,
            user_id,
            assigned_by = caller.id,
            "Assigned user to task"
        );
    }
    Ok(outcome)
}

/// Accept an integer or a numeric string.
fn parse_user_id(value: Option<&Value>) -> ApiResult<i64> {
    match value {
        None | Some(Value::Null) => Err(ApiError::missing_field("user_id")),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ApiError::invalid_value("user_id", "user_id must be an integer")),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ApiError::missing_field("user_id")),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| ApiError::invalid_value("user_id", "user_id must be an integer")),
        Some(_) => Err(ApiError::invalid_value(
            "user_id",
            "user_id must be an integer",
        )),
    }
}
