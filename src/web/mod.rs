//! Browser front end. Renders HTML forms and relays them to the API, keeping
//! the user's tokens in a server-side session.

pub mod client;
pub mod session;
pub mod templates;

use axum::Router;
use axum::extract::{Form, Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tower_cookies::{CookieManagerLayer, Cookies};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::WebConfig;
use client::{ApiClient, ClientError};
use session::{Session, SessionStore};
use templates::{Notices, TaskForm};

/// State shared by the front end handlers.
#[derive(Clone)]
pub struct WebState {
    client: ApiClient,
    sessions: SessionStore,
}

impl WebState {
    pub fn new(config: &WebConfig) -> Result<Self, ClientError> {
        let client = ApiClient::new(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self {
            client,
            sessions: SessionStore::new(
                config.session_cookie.clone(),
                Duration::from_secs(config.session_idle_secs),
            ),
        })
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// Build the front end router.
pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/auth/register/", get(register_page).post(register_submit))
        .route("/auth/login/", get(login_page).post(login_submit))
        .route("/auth/logout/", post(logout))
        .route("/tasks/add/", get(add_task_page).post(add_task_submit))
        .route("/tasks/view/", get(view_tasks))
        .route("/tasks/{id}/assign/", post(assign_task))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn render(title: &str, session: &Session, notices: &Notices<'_>, content: &str) -> Response {
    Html(templates::page(title, session.access.is_some(), notices, content)).into_response()
}

/// Drop the session and send the browser to the login form.
fn expire_session(state: &WebState, cookies: &Cookies) -> Response {
    state.sessions.clear(cookies);
    state
        .sessions
        .set_flash(cookies, ClientError::Unauthorized.user_message());
    Redirect::to("/auth/login/").into_response()
}

async fn home(State(state): State<WebState>, cookies: Cookies) -> Response {
    let session = state.sessions.load(&cookies);
    let flash = state.sessions.take_flash(&cookies);
    let notices = Notices {
        flash: flash.as_deref(),
        error: None,
    };
    render("Home", &session, &notices, &templates::home(session.access.is_some()))
}

#[derive(Debug, Default, Deserialize)]
struct RegisterForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    password: String,
}

async fn register_page(State(state): State<WebState>, cookies: Cookies) -> Response {
    let session = state.sessions.load(&cookies);
    render(
        "Register",
        &session,
        &Notices::default(),
        &templates::register_form("", "", ""),
    )
}

async fn register_submit(
    State(state): State<WebState>,
    cookies: Cookies,
    Form(form): Form<RegisterForm>,
) -> Response {
    let body = json!({
        "username": form.username,
        "email": form.email,
        "nickname": form.nickname,
        "password": form.password,
    });

    match state.client.register(&body).await {
        Ok(()) => {
            info!(username = %form.username, "Registered through the front end");
            state
                .sessions
                .set_flash(&cookies, "Account created, please log in.");
            Redirect::to("/auth/login/").into_response()
        }
        Err(e) => {
            let session = state.sessions.load(&cookies);
            let message = e.user_message();
            render(
                "Register",
                &session,
                &Notices {
                    flash: None,
                    error: Some(&message),
                },
                &templates::register_form(&form.username, &form.email, &form.nickname),
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login_page(State(state): State<WebState>, cookies: Cookies) -> Response {
    let session = state.sessions.load(&cookies);
    let flash = state.sessions.take_flash(&cookies);
    render(
        "Log in",
        &session,
        &Notices {
            flash: flash.as_deref(),
            error: None,
        },
        &templates::login_form(""),
    )
}

async fn login_submit(
    State(state): State<WebState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.client.login(&form.username, &form.password).await {
        Ok(tokens) => {
            state.sessions.rotate(
                &cookies,
                Session {
                    access: Some(tokens.access),
                    refresh: Some(tokens.refresh),
                    flash: None,
                },
            );
            Redirect::to("/tasks/view/").into_response()
        }
        Err(e) => {
            let session = state.sessions.load(&cookies);
            let message = e.user_message();
            render(
                "Log in",
                &session,
                &Notices {
                    flash: None,
                    error: Some(&message),
                },
                &templates::login_form(&form.username),
            )
        }
    }
}

async fn logout(State(state): State<WebState>, cookies: Cookies) -> Response {
    let session = state.sessions.load(&cookies);
    if let Some(refresh) = session.refresh.as_deref()
        && let Err(e) = state.client.logout(refresh).await
    {
        warn!("Token revocation failed during logout: {}", e);
    }
    state.sessions.clear(&cookies);
    Redirect::to("/").into_response()
}

async fn add_task_page(State(state): State<WebState>, cookies: Cookies) -> Response {
    let session = state.sessions.load(&cookies);
    if session.access.is_none() {
        return Redirect::to("/auth/login/").into_response();
    }
    let form = TaskForm {
        status: "pending".to_string(),
        priority: "medium".to_string(),
        ..TaskForm::default()
    };
    render("New task", &session, &Notices::default(), &templates::task_form(&form))
}

/// The API body for a submitted task form.
fn task_body(form: &TaskForm) -> Value {
    let tags: Vec<&str> = form
        .tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();
    json!({
        "title": form.title,
        "description": form.description,
        "status": form.status,
        "priority": form.priority,
        "due_date": form.due_date,
        "estimated_hours": form.estimated_hours,
        "tags": tags,
    })
}

async fn add_task_submit(
    State(state): State<WebState>,
    cookies: Cookies,
    Form(form): Form<TaskForm>,
) -> Response {
    let session = state.sessions.load(&cookies);
    let Some(access) = session.access.as_deref() else {
        return Redirect::to("/auth/login/").into_response();
    };

    match state.client.create_task(access, &task_body(&form)).await {
        Ok(task) => {
            let id = task["id"].as_i64().unwrap_or_default();
            state
                .sessions
                .set_flash(&cookies, format!("Task #{} created.", id));
            Redirect::to("/tasks/view/").into_response()
        }
        Err(ClientError::Unauthorized) => expire_session(&state, &cookies),
        Err(e) => {
            let message = e.user_message();
            render(
                "New task",
                &session,
                &Notices {
                    flash: None,
                    error: Some(&message),
                },
                &templates::task_form(&form),
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    page: Option<u64>,
}

async fn view_tasks(
    State(state): State<WebState>,
    cookies: Cookies,
    Query(query): Query<ViewQuery>,
) -> Response {
    let session = state.sessions.load(&cookies);
    let Some(access) = session.access.as_deref() else {
        return Redirect::to("/auth/login/").into_response();
    };
    let page = query.page.unwrap_or(1).max(1);

    match state.client.list_tasks(access, page).await {
        Ok(envelope) => {
            let flash = state.sessions.take_flash(&cookies);
            render(
                "Tasks",
                &session,
                &Notices {
                    flash: flash.as_deref(),
                    error: None,
                },
                &templates::task_list(&envelope, page),
            )
        }
        Err(ClientError::Unauthorized) => expire_session(&state, &cookies),
        Err(e) => {
            let message = e.user_message();
            render(
                "Tasks",
                &session,
                &Notices {
                    flash: None,
                    error: Some(&message),
                },
                "",
            )
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AssignForm {
    #[serde(default)]
    user_id: String,
}

async fn assign_task(
    State(state): State<WebState>,
    cookies: Cookies,
    Path(task_id): Path<i64>,
    Form(form): Form<AssignForm>,
) -> Response {
    let session = state.sessions.load(&cookies);
    let Some(access) = session.access.as_deref() else {
        return Redirect::to("/auth/login/").into_response();
    };

    let message = match state.client.assign(access, task_id, &form.user_id).await {
        Ok(result) if result.created => format!("User assigned to task #{}.", task_id),
        Ok(_) => format!("User was already assigned to task #{}.", task_id),
        Err(ClientError::Unauthorized) => return expire_session(&state, &cookies),
        Err(e) => e.user_message(),
    };
    state.sessions.set_flash(&cookies, message);
    Redirect::to("/tasks/view/").into_response()
}
