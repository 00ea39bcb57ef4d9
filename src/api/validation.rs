//! Field validators and request-body parsing for accounts and tasks.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::db::tags::TAG_NAME_MAX;
use crate::error::{ApiError, ApiResult};
use crate::types::{NewTask, TaskPatch, TaskPriority, TaskStatus, parse_timestamp};

pub const USERNAME_MAX: usize = 150;
pub const NICKNAME_MAX: usize = 20;
pub const TITLE_MAX: usize = 200;
/// Hours are stored with two decimals and at most five digits.
pub const HOURS_LIMIT: f64 = 1000.0;

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.@+\-]+$").expect("username pattern is valid")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

pub fn validate_username(username: &str) -> ApiResult<()> {
    if username.is_empty() {
        return Err(ApiError::missing_field("username"));
    }
    if username.chars().count() > USERNAME_MAX {
        return Err(ApiError::invalid_value(
            "username",
            format!("Ensure this field has no more than {} characters.", USERNAME_MAX),
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ApiError::invalid_value(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ApiResult<()> {
    if email.is_empty() {
        return Err(ApiError::missing_field("email"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ApiError::invalid_value("email", "Enter a valid email address."));
    }
    Ok(())
}

pub fn validate_nickname(nickname: &str) -> ApiResult<()> {
    if nickname.chars().count() > NICKNAME_MAX {
        return Err(ApiError::invalid_value(
            "nickname",
            format!("Ensure this field has no more than {} characters.", NICKNAME_MAX),
        ));
    }
    Ok(())
}

/// Parse the writable task fields present in `body`.
///
/// Read-only fields (`id`, `created_by`, `assigned_to`, timestamps) are ignored.
/// Presence checks for required fields are left to [`require_full`].
pub fn parse_task_fields(body: &Map<String, Value>) -> ApiResult<TaskPatch> {
    let mut patch = TaskPatch::default();

    if let Some(v) = body.get("title") {
        let title = non_empty_string("title", v)?;
        if title.chars().count() > TITLE_MAX {
            return Err(ApiError::invalid_value(
                "title",
                format!("Ensure this field has no more than {} characters.", TITLE_MAX),
            ));
        }
        patch.title = Some(title);
    }

    if let Some(v) = body.get("description") {
        patch.description = Some(non_empty_string("description", v)?);
    }

    if let Some(v) = body.get("status") {
        let raw = non_empty_string("status", v)?;
        let status: TaskStatus = raw
            .parse()
            .map_err(|e: String| ApiError::invalid_value("status", e))?;
        patch.status = Some(status);
    }

    if let Some(v) = body.get("priority") {
        let raw = non_empty_string("priority", v)?;
        let priority: TaskPriority = raw
            .parse()
            .map_err(|e: String| ApiError::invalid_value("priority", e))?;
        patch.priority = Some(priority);
    }

    if let Some(v) = body.get("due_date") {
        let raw = non_empty_string("due_date", v)?;
        let due = parse_timestamp(&raw).ok_or_else(|| {
            ApiError::invalid_value(
                "due_date",
                "Datetime has wrong format. Use RFC 3339, e.g. 2024-01-01T00:00:00Z.",
            )
        })?;
        patch.due_date = Some(due);
    }

    if let Some(v) = body.get("estimated_hours") {
        if v.is_null() {
            return Err(ApiError::invalid_value("estimated_hours", "This field may not be null."));
        }
        patch.estimated_hours = Some(parse_hours("estimated_hours", v)?);
    }

    if let Some(v) = body.get("actual_hours") {
        patch.actual_hours = Some(match v {
            Value::Null => None,
            other => Some(parse_hours("actual_hours", other)?),
        });
    }

    if let Some(v) = body.get("parent_task") {
        patch.parent_task = Some(match v {
            Value::Null => None,
            other => Some(parse_id("parent_task", other)?),
        });
    }

    if let Some(v) = body.get("tags") {
        patch.tags = Some(parse_tags(v)?);
    }

    if let Some(v) = body.get("metadata") {
        patch.metadata = Some(match v {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => v.clone(),
            _ => {
                return Err(ApiError::invalid_value(
                    "metadata",
                    "metadata must be a JSON object",
                ));
            }
        });
    }

    if let Some(v) = body.get("is_archived") {
        patch.is_archived = Some(
            v.as_bool()
                .ok_or_else(|| ApiError::invalid_value("is_archived", "Must be a valid boolean."))?,
        );
    }

    Ok(patch)
}

/// Turn a parsed body into a complete task, failing on the first missing required field.
pub fn require_full(patch: TaskPatch) -> ApiResult<NewTask> {
    Ok(NewTask {
        title: patch.title.ok_or_else(|| ApiError::missing_field("title"))?,
        description: patch
            .description
            .ok_or_else(|| ApiError::missing_field("description"))?,
        status: patch.status.ok_or_else(|| ApiError::missing_field("status"))?,
        priority: patch
            .priority
            .ok_or_else(|| ApiError::missing_field("priority"))?,
        due_date: patch
            .due_date
            .ok_or_else(|| ApiError::missing_field("due_date"))?,
        estimated_hours: patch
            .estimated_hours
            .ok_or_else(|| ApiError::missing_field("estimated_hours"))?,
        actual_hours: patch.actual_hours.flatten(),
        parent_task: patch.parent_task.flatten(),
        tags: patch.tags.unwrap_or_default(),
        metadata: patch
            .metadata
            .unwrap_or_else(|| Value::Object(Map::new())),
        is_archived: patch.is_archived.unwrap_or(false),
    })
}

fn non_empty_string(field: &str, value: &Value) -> ApiResult<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::String(_) => Err(ApiError::invalid_value(field, "This field may not be blank.")),
        Value::Null => Err(ApiError::invalid_value(field, "This field may not be null.")),
        _ => Err(ApiError::invalid_value(field, "Not a valid string.")),
    }
}

fn parse_hours(field: &str, value: &Value) -> ApiResult<f64> {
    let hours = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|h| h.is_finite())
    .ok_or_else(|| ApiError::invalid_value(field, "A valid number is required."))?;

    let rounded = (hours * 100.0).round() / 100.0;
    if !(0.0..HOURS_LIMIT).contains(&rounded) {
        return Err(ApiError::invalid_value(
            field,
            "Ensure this value is between 0 and 999.99.",
        ));
    }
    Ok(rounded)
}

fn parse_id(field: &str, value: &Value) -> ApiResult<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ApiError::invalid_value(field, "Incorrect type. Expected pk value."))
}

fn parse_tags(value: &Value) -> ApiResult<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| ApiError::invalid_value("tags", "Expected a list of tag names."))?;

    let mut names: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let name = item
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::invalid_value("tags", "Tag names must be non-empty strings."))?;
        if name.chars().count() > TAG_NAME_MAX {
            return Err(ApiError::invalid_value(
                "tags",
                format!("Tag names are limited to {} characters.", TAG_NAME_MAX),
            ));
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn usernames_and_emails() {
        assert!(validate_username("alice.smith+tasks@corp").is_ok());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username(&"x".repeat(151)).is_err());
        assert!(validate_email("a@example.com").is_ok());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_nickname(&"n".repeat(21)).is_err());
    }

    #[test]
    fn full_task_body_parses() {
        let patch = parse_task_fields(&body(json!({
            "title": "Write report",
            "description": "Quarterly numbers",
            "status": "pending",
            "priority": "high",
            "due_date": "2024-01-01T00:00:00Z",
            "estimated_hours": "2.50",
            "tags": ["bug", "bug", "ops"],
            "id": 99,
            "created_by": 5
        })))
        .unwrap();

        let task = require_full(patch).unwrap();
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.due_date, 1_704_067_200_000);
        assert_eq!(task.estimated_hours, 2.5);
        assert_eq!(task.tags, vec!["bug", "ops"]);
        assert_eq!(task.metadata, json!({}));
        assert!(!task.is_archived);
    }

    #[test]
    fn missing_required_field_is_reported() {
        let patch = parse_task_fields(&body(json!({
            "title": "t",
            "description": "d",
            "status": "pending",
            "priority": "low",
            "due_date": "2024-01-01T00:00:00Z"
        })))
        .unwrap();
        let err = require_full(patch).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRequiredField);
        assert_eq!(err.field.as_deref(), Some("estimated_hours"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for bad in [
            json!({"status": "done"}),
            json!({"priority": "urgent"}),
            json!({"due_date": "tomorrow"}),
            json!({"estimated_hours": -1}),
            json!({"estimated_hours": 1000}),
            json!({"title": ""}),
            json!({"tags": "bug"}),
            json!({"metadata": [1, 2]}),
            json!({"parent_task": "abc"}),
        ] {
            assert!(parse_task_fields(&body(bad.clone())).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn nullable_fields_clear() {
        let patch = parse_task_fields(&body(json!({
            "actual_hours": null,
            "parent_task": null
        })))
        .unwrap();
        assert_eq!(patch.actual_hours, Some(None));
        assert_eq!(patch.parent_task, Some(None));
        assert!(patch.title.is_none());
    }
}
