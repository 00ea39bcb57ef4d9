//! Object-level access rules.

use crate::types::{Task, User};

/// Staff read any profile; everyone else reads non-privileged profiles and their own.
pub fn can_view_profile(caller: &User, target: &User) -> bool {
    caller.is_staff || caller.id == target.id || !target.is_privileged()
}

pub fn can_update_profile(caller: &User, target_id: i64) -> bool {
    caller.is_staff || caller.id == target_id
}

/// Creator, assignees and staff see a task.
pub fn can_view_task(caller: &User, task: &Task) -> bool {
    caller.is_staff || task.created_by == caller.id || task.assigned_to.contains(&caller.id)
}

pub fn can_edit_task(caller: &User, task: &Task) -> bool {
    can_view_task(caller, task)
}

pub fn can_delete_task(caller: &User, task: &Task) -> bool {
    caller.is_staff || task.created_by == caller.id
}

/// Only the creator or staff may assign people to a task.
pub fn can_assign_task(caller: &User, task: &Task) -> bool {
    caller.is_staff || task.created_by == caller.id
}

pub fn can_list_users(caller: &User) -> bool {
    caller.is_staff
}
