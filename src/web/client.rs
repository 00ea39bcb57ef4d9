//! Thin HTTP client for the task API.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, DNS failure or timeout.
    #[error("could not reach the task service: {0}")]
    Unreachable(#[source] reqwest::Error),
    /// The API rejected the session's token.
    #[error("session expired")]
    Unauthorized,
    /// Any other non-success answer, with the API's error body.
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    #[error("unexpected response from the task service: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ClientError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Unreachable(_) => "could not reach the task service".to_string(),
            ClientError::Unauthorized => "Your session has expired, please log in again.".to_string(),
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Decode(_) => "unexpected response from the task service".to_string(),
        }
    }

    fn from_send(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err)
        } else {
            ClientError::Unreachable(err)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tokens {
    pub access: String,
    pub refresh: String,
}

/// Outcome of an assign request that the API accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignResult {
    pub created: bool,
    pub id: i64,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Unreachable)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn register(&self, form: &Value) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/api/auth/register/"))
            .json(form)
            .send()
            .await
            .map_err(ClientError::from_send)?;
        check(response).await.map(|_| ())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Tokens, ClientError> {
        let response = self
            .http
            .post(self.url("/api/auth/login/"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(ClientError::from_send)?;

        // Bad credentials are a form error here, not an expired session
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Api {
                status: StatusCode::UNAUTHORIZED,
                message: error_message(response).await,
            });
        }
        check(response)
            .await?
            .json::<Tokens>()
            .await
            .map_err(ClientError::Decode)
    }

    pub async fn logout(&self, refresh: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/api/auth/logout/"))
            .json(&json!({ "refresh": refresh }))
            .send()
            .await
            .map_err(ClientError::from_send)?;
        check(response).await.map(|_| ())
    }

    pub async fn create_task(&self, access: &str, task: &Value) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(self.url("/api/tasks/"))
            .bearer_auth(access)
            .json(task)
            .send()
            .await
            .map_err(ClientError::from_send)?;
        check(response)
            .await?
            .json()
            .await
            .map_err(ClientError::Decode)
    }

    /// One page of the caller's task list, as the API's page envelope.
    pub async fn list_tasks(&self, access: &str, page: u64) -> Result<Value, ClientError> {
        let response = self
            .http
            .get(self.url("/api/tasks/"))
            .bearer_auth(access)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(ClientError::from_send)?;
        check(response)
            .await?
            .json()
            .await
            .map_err(ClientError::Decode)
    }

    pub async fn assign(
        &self,
        access: &str,
        task_id: i64,
        user_id: &str,
    ) -> Result<AssignResult, ClientError> {
        let user_id: Value = match user_id.trim().parse::<i64>() {
            Ok(id) => json!(id),
            Err(_) => json!(user_id.trim()),
        };
        let response = self
            .http
            .post(self.url(&format!("/api/tasks/{}/assign", task_id)))
            .bearer_auth(access)
            .json(&json!({ "user_id": user_id }))
            .send()
            .await
            .map_err(ClientError::from_send)?;
        let body: Value = check(response)
            .await?
            .json()
            .await
            .map_err(ClientError::Decode)?;

        Ok(AssignResult {
            created: body["created"].as_bool().unwrap_or(false),
            id: body["id"].as_i64().unwrap_or_default(),
        })
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    Err(ClientError::Api {
        status,
        message: error_message(response).await,
    })
}

/// Pull a readable message out of an API error body.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<Value>().await {
        Ok(body) => describe_error(&body).unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    }
}

fn describe_error(body: &Value) -> Option<String> {
    let message = body.get("message")?.as_str()?;
    Some(match body.get("field").and_then(Value::as_str) {
        Some(field) => format!("{}: {}", field, message),
        None => message.to_string(),
    })
}
