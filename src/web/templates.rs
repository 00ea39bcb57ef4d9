//! HTML pages for the browser front end.
//!
//! Templates are embedded at compile time using `include_str!` and filled by
//! plain `{{name}}` substitution. Every interpolated value is escaped.

use serde_json::Value;

use crate::types::{TaskPriority, TaskStatus};

const BASE_TEMPLATE: &str = include_str!("templates/base.html");
const HOME_TEMPLATE: &str = include_str!("templates/home.html");
const LOGIN_TEMPLATE: &str = include_str!("templates/login.html");
const REGISTER_TEMPLATE: &str = include_str!("templates/register.html");
const TASK_FORM_TEMPLATE: &str = include_str!("templates/task_form.html");
const TASK_LIST_TEMPLATE: &str = include_str!("templates/task_list.html");

/// Escape text for HTML bodies and attribute values. Braces are escaped too so
/// user text can never form a placeholder.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
        .replace('{', "&#123;")
        .replace('}', "&#125;")
}

/// Messages shown above the page body.
#[derive(Debug, Default)]
pub struct Notices<'a> {
    pub flash: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// Wrap `content` (already rendered) in the site layout.
pub fn page(title: &str, logged_in: bool, notices: &Notices<'_>, content: &str) -> String {
    let nav = if logged_in {
        r#"<a href="/tasks/view/">Tasks</a>
        <a href="/tasks/add/">New task</a>
        <form method="post" action="/auth/logout/"><button type="submit">Log out</button></form>"#
    } else {
        r#"<a href="/auth/login/">Log in</a>
        <a href="/auth/register/">Register</a>"#
    };

    let mut messages = String::new();
    if let Some(flash) = notices.flash {
        messages.push_str(&format!(r#"<div class="flash">{}</div>"#, html_escape(flash)));
    }
    if let Some(error) = notices.error {
        messages.push_str(&format!(r#"<div class="error">{}</div>"#, html_escape(error)));
    }

    BASE_TEMPLATE
        .replace("{{title}}", &html_escape(title))
        .replace("{{nav}}", nav)
        .replace("{{messages}}", &messages)
        .replace("{{content}}", content)
}

pub fn home(logged_in: bool) -> String {
    let status = if logged_in {
        "You are logged in."
    } else {
        "You are not logged in."
    };
    HOME_TEMPLATE.replace("{{status}}", status)
}

pub fn login_form(username: &str) -> String {
    LOGIN_TEMPLATE.replace("{{username}}", &html_escape(username))
}

pub fn register_form(username: &str, email: &str, nickname: &str) -> String {
    REGISTER_TEMPLATE
        .replace("{{username}}", &html_escape(username))
        .replace("{{email}}", &html_escape(email))
        .replace("{{nickname}}", &html_escape(nickname))
}

/// Values echoed back into the task form.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TaskForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub estimated_hours: String,
    #[serde(default)]
    pub tags: String,
}

pub fn task_form(form: &TaskForm) -> String {
    let status_options = options(
        TaskStatus::CLIENT_CHOICES.iter().map(|s| s.as_str()),
        &form.status,
    );
    let priority_options = options(TaskPriority::ALL.iter().map(|p| p.as_str()), &form.priority);

    TASK_FORM_TEMPLATE
        .replace("{{status_options}}", &status_options)
        .replace("{{priority_options}}", &priority_options)
        .replace("{{title}}", &html_escape(&form.title))
        .replace("{{description}}", &html_escape(&form.description))
        .replace("{{due_date}}", &html_escape(&form.due_date))
        .replace("{{estimated_hours}}", &html_escape(&form.estimated_hours))
        .replace("{{tags}}", &html_escape(&form.tags))
}

fn options<'a>(values: impl Iterator<Item = &'a str>, selected: &str) -> String {
    values
        .map(|v| {
            let sel = if v == selected { " selected" } else { "" };
            format!(r#"<option value="{v}"{sel}>{}</option>"#, v.replace('_', " "))
        })
        .collect()
}

/// Render one page of the API's `{count, next, previous, results}` envelope.
pub fn task_list(envelope: &Value, page: u64) -> String {
    let results = envelope["results"].as_array().map(Vec::as_slice).unwrap_or(&[]);

    let rows: String = if results.is_empty() {
        r#"<tr><td colspan="7">No tasks yet.</td></tr>"#.to_string()
    } else {
        results.iter().map(task_row).collect()
    };

    let previous = if envelope["previous"].is_string() {
        format!(r#"<a href="/tasks/view/?page={}">&larr; Previous</a>"#, page.saturating_sub(1).max(1))
    } else {
        String::new()
    };
    let next = if envelope["next"].is_string() {
        format!(r#"<a href="/tasks/view/?page={}">Next &rarr;</a>"#, page + 1)
    } else {
        String::new()
    };

    TASK_LIST_TEMPLATE
        .replace("{{count}}", &envelope["count"].as_u64().unwrap_or(0).to_string())
        .replace("{{previous}}", &previous)
        .replace("{{next}}", &next)
        .replace("{{page}}", &page.to_string())
        .replace("{{rows}}", &rows)
}

fn task_row(task: &Value) -> String {
    let id = task["id"].as_i64().unwrap_or_default();
    let assignees = task["assigned_to"]
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_i64)
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    format!(
        r#"<tr><td>{id}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>
<td><form class="inline" method="post" action="/tasks/{id}/assign/"><input name="user_id" placeholder="user id"><button type="submit">Assign</button></form></td></tr>"#,
        html_escape(task["title"].as_str().unwrap_or_default()),
        html_escape(task["status"].as_str().unwrap_or_default()),
        html_escape(task["priority"].as_str().unwrap_or_default()),
        html_escape(task["due_date"].as_str().unwrap_or_default()),
        html_escape(&assignees),
    )
}
