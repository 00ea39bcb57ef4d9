//! Task endpoints: listing with filters, CRUD, and assignment.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::info;

use super::blocking;
use super::pagination::{Page, PageRequest};
use super::validation::{parse_task_fields, require_full};
use crate::auth::AuthUser;
use crate::auth::permissions::{can_delete_task, can_edit_task, can_view_task};
use crate::db::assignments::AssignOutcome;
use crate::error::{ApiError, ApiResult};
use crate::services::assign_task;
use crate::state::AppState;
use crate::types::{
    Assignment, Task, TaskFilter, TaskPatch, TaskPriority, TaskStatus, TagRef, User, format_ms,
};

/// Wire form of a task.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: String,
    pub estimated_hours: f64,
    pub actual_hours: Option<f64>,
    pub created_by: i64,
    pub assigned_to: Vec<i64>,
    pub tags: Vec<String>,
    pub parent_task: Option<i64>,
    pub metadata: Value,
    pub created_at: String,
    pub updated_at: String,
    pub is_archived: bool,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: format_ms(task.due_date),
            estimated_hours: task.estimated_hours,
            actual_hours: task.actual_hours,
            created_by: task.created_by,
            assigned_to: task.assigned_to,
            tags: task.tags,
            parent_task: task.parent_task,
            metadata: task.metadata,
            created_at: format_ms(task.created_at),
            updated_at: format_ms(task.updated_at),
            is_archived: task.is_archived,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
    pub created_by: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
}

impl TaskListQuery {
    /// Build the store filter. Empty parameters are ignored.
    fn to_filter(&self, caller: &User, page: PageRequest) -> ApiResult<TaskFilter> {
        let status = non_empty(&self.status)
            .map(|raw| {
                raw.parse::<TaskStatus>()
                    .map_err(|e| ApiError::invalid_value("status", e))
            })
            .transpose()?;
        let priority = non_empty(&self.priority)
            .map(|raw| {
                raw.parse::<TaskPriority>()
                    .map_err(|e| ApiError::invalid_value("priority", e))
            })
            .transpose()?;
        let assigned_to = non_empty(&self.assigned_to)
            .map(|raw| parse_user_filter("assigned_to", raw))
            .transpose()?;
        let created_by = non_empty(&self.created_by)
            .map(|raw| parse_user_filter("created_by", raw))
            .transpose()?;
        let tag = non_empty(&self.tags).map(|raw| match raw.parse::<i64>() {
            Ok(id) => TagRef::Id(id),
            Err(_) => TagRef::Name(raw.to_string()),
        });
        let search = self
            .search
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(TaskFilter {
            status,
            priority,
            assigned_to,
            created_by,
            tag,
            search,
            visible_to: (!caller.is_staff).then_some(caller.id),
            page: page.page,
            page_size: page.page_size,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_user_filter(field: &str, raw: &str) -> ApiResult<i64> {
    raw.parse()
        .map_err(|_| ApiError::invalid_value(field, "Select a valid choice."))
}

/// `GET /api/tasks/`
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    uri: Uri,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Json<Page<TaskView>>> {
    let limits = state.pagination();
    let request = PageRequest::resolve(
        query.page.as_deref(),
        query.page_size.as_deref(),
        limits.task_page_size,
        limits.task_max_page_size,
    )?;
    let filter = query.to_filter(&caller, request)?;

    let db = state.db().clone();
    let (tasks, count) = blocking(move || db.list_tasks(&filter)).await?;
    let page = Page::new(&uri, request, count, tasks)?;

    Ok(Json(page.map(TaskView::from)))
}

/// `POST /api/tasks/`
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    let body = object_body(payload)?;
    let patch = parse_task_fields(&body)?;
    reject_overdue(&patch, None)?;
    let new_task = require_full(patch)?;

    let db = state.db().clone();
    let created_by = caller.id;
    let task = blocking(move || db.create_task(created_by, &new_task)).await?;
    info!(task_id = task.id, created_by, "Created task");

    Ok((StatusCode::CREATED, Json(TaskView::from(task))))
}

/// `GET /api/tasks/{id}/`
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<TaskView>> {
    let task = load_visible(&state, &caller, task_id)?;
    Ok(Json(TaskView::from(task)))
}

/// `PUT /api/tasks/{id}/`: every required field must be present.
pub async fn replace_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<TaskView>> {
    let task = load_visible(&state, &caller, task_id)?;
    let body = object_body(payload)?;
    let patch = parse_task_fields(&body)?;
    require_full(patch.clone())?;
    write_task(&state, &caller, task, patch).await
}

/// `PATCH /api/tasks/{id}/`
pub async fn patch_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<TaskView>> {
    let task = load_visible(&state, &caller, task_id)?;
    let body = object_body(payload)?;
    let patch = parse_task_fields(&body)?;
    write_task(&state, &caller, task, patch).await
}

async fn write_task(
    state: &AppState,
    caller: &User,
    task: Task,
    patch: TaskPatch,
) -> ApiResult<Json<TaskView>> {
    if !can_edit_task(caller, &task) {
        return Err(ApiError::forbidden(
            "You do not have permission to edit this task",
        ));
    }
    reject_overdue(&patch, Some(task.status))?;

    let db = state.db().clone();
    let task_id = task.id;
    let updated = blocking(move || db.update_task(task_id, &patch)).await?;
    Ok(Json(TaskView::from(updated)))
}

/// `DELETE /api/tasks/{id}/`: soft delete.
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let task = load_visible(&state, &caller, task_id)?;
    if !can_delete_task(&caller, &task) {
        return Err(ApiError::forbidden(
            "Only the task creator or staff can delete this task",
        ));
    }

    if !state.db().soft_delete_task(task_id)? {
        return Err(ApiError::task_not_found(task_id));
    }
    info!(task_id, deleted_by = caller.id, "Deleted task");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/tasks/{id}/assign`
///
/// The body is read leniently: anything that is not a JSON object carrying
/// `user_id` counts as a missing target.
pub async fn assign(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<i64>,
    body: Bytes,
) -> ApiResult<Response> {
    let target = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("user_id").cloned());

    let db = state.db().clone();
    let outcome = tokio::task::spawn_blocking(move || {
        assign_task(&db, &caller, task_id, target.as_ref())
    })
    .await
    .map_err(ApiError::internal)??;

    let record = outcome.assignment();
    let response = match &outcome {
        AssignOutcome::Created(_) => (
            StatusCode::CREATED,
            Json(json!({
                "assigned": true,
                "created": true,
                "id": record.id,
                "task": record.task_id,
                "user": record.user_id,
                "assigned_by": record.assigned_by,
                "assigned_at": format_ms(record.assigned_at),
            })),
        ),
        AssignOutcome::AlreadyAssigned(_) => (
            StatusCode::OK,
            Json(json!({
                "assigned": true,
                "created": false,
                "id": record.id,
                "task": record.task_id,
                "user": record.user_id,
                "message": "User is already assigned to this task",
            })),
        ),
    };
    Ok(response.into_response())
}

/// Wire form of an assignment record.
#[derive(Debug, Serialize)]
pub struct AssignmentView {
    pub id: i64,
    pub task: i64,
    pub user: i64,
    pub assigned_by: Option<i64>,
    pub assigned_at: String,
}

impl From<Assignment> for AssignmentView {
    fn from(a: Assignment) -> Self {
        Self {
            id: a.id,
            task: a.task_id,
            user: a.user_id,
            assigned_by: a.assigned_by,
            assigned_at: format_ms(a.assigned_at),
        }
    }
}

/// `GET /api/tasks/{id}/assignments/`: who was assigned, by whom and when.
pub async fn list_assignments(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(task_id): Path<i64>,
) -> ApiResult<Json<Vec<AssignmentView>>> {
    load_visible(&state, &caller, task_id)?;
    let db = state.db().clone();
    let records = blocking(move || db.list_assignments(task_id)).await?;
    Ok(Json(records.into_iter().map(AssignmentView::from).collect()))
}

/// A live task the caller can see. Anything else is a 404.
fn load_visible(state: &AppState, caller: &User, task_id: i64) -> ApiResult<Task> {
    match state.db().get_task(task_id)? {
        Some(task) if can_view_task(caller, &task) => Ok(task),
        _ => Err(ApiError::task_not_found(task_id)),
    }
}

fn object_body(payload: Result<Json<Value>, JsonRejection>) -> ApiResult<Map<String, Value>> {
    match payload? {
        Json(Value::Object(map)) => Ok(map),
        Json(_) => Err(ApiError::malformed_body("expected a JSON object")),
    }
}

/// Clients may not move a task into `overdue`; keeping it there is fine.
fn reject_overdue(patch: &TaskPatch, current: Option<TaskStatus>) -> ApiResult<()> {
    match patch.status {
        Some(status) if !status.is_client_settable() && Some(status) != current => {
            Err(ApiError::invalid_value(
                "status",
                format!("\"{}\" is not a valid choice.", status),
            ))
        }
        _ => Ok(()),
    }
}
