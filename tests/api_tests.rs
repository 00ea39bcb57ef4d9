//! End-to-end tests of the HTTP API against an in-memory database.

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use taskhub::api;
use taskhub::auth::{TokenService, TokenType};
use taskhub::config::PaginationConfig;
use taskhub::db::Database;
use taskhub::state::AppState;
use taskhub::types::{NewUser, User};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    db: Database,
    tokens: TokenService,
}

impl TestApp {
    fn new() -> Self {
        let db = Database::open_in_memory().expect("Failed to create in-memory database");
        let tokens = TokenService::new("api-test-secret", 300, 86_400);
        let state = AppState::new(db.clone(), tokens.clone(), PaginationConfig::default());
        Self {
            router: api::router(state),
            db,
            tokens,
        }
    }

    /// Create an account with a placeholder hash; these users log in by minted token.
    fn user(&self, username: &str, staff: bool) -> User {
        self.db
            .create_user(&NewUser {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                nickname: String::new(),
                password_hash: "unused".to_string(),
                is_staff: staff,
                is_superuser: false,
            })
            .unwrap()
    }

    fn token(&self, user: &User) -> String {
        self.tokens.issue(user.id, TokenType::Access).unwrap()
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_task(&self, token: &str, title: &str) -> i64 {
        let (status, body) = self
            .send(Method::POST, "/api/tasks/", Some(token), Some(task_body(title)))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

fn task_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "something to do",
        "status": "pending",
        "priority": "medium",
        "due_date": "2030-01-01T00:00:00Z",
        "estimated_hours": 3
    })
}

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn health_is_ok_without_auth() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/health/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn unknown_routes_are_json_404s() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/api/nope/", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn requests_without_a_valid_token_are_rejected() {
        let app = TestApp::new();

        let (status, body) = app.send(Method::GET, "/api/tasks/", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "NOT_AUTHENTICATED");

        let (status, body) = app
            .send(Method::GET, "/api/tasks/", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "TOKEN_INVALID");

        let user = app.user("alice", false);
        let refresh = app.tokens.issue(user.id, TokenType::Refresh).unwrap();
        let (status, _) = app
            .send(Method::GET, "/api/tasks/", Some(&refresh), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inactive_users_cannot_authenticate() {
        let app = TestApp::new();
        let user = app.user("alice", false);
        let token = app.token(&user);
        app.db.deactivate_user("alice").unwrap();

        let (status, _) = app.send(Method::GET, "/api/users/me/", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_refresh_logout() {
        let app = TestApp::new();

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/register/",
                None,
                Some(json!({
                    "username": "carol",
                    "email": "carol@example.com",
                    "password": "violet-harbor-77",
                    "nickname": "Caz"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["username"], "carol");
        assert!(body.get("password").is_none());

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login/",
                None,
                Some(json!({"username": "carol", "password": "wrong-password-1"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_CREDENTIALS");

        let (status, tokens) = app
            .send(
                Method::POST,
                "/api/auth/login/",
                None,
                Some(json!({"username": "carol", "password": "violet-harbor-77"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let refresh = tokens["refresh"].as_str().unwrap().to_string();
        let access = tokens["access"].as_str().unwrap().to_string();

        let (status, me) = app.send(Method::GET, "/api/users/me/", Some(&access), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["nickname"], "Caz");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/refresh/",
                None,
                Some(json!({"refresh": refresh})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["access"].is_string());

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/logout/",
                None,
                Some(json!({"refresh": refresh})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({}));

        let (status, _) = app
            .send(
                Method::POST,
                "/api/auth/refresh/",
                None,
                Some(json!({"refresh": refresh})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn registration_validates_fields() {
        let app = TestApp::new();
        app.user("taken", false);

        for (body, field) in [
            (json!({"email": "a@example.com", "password": "violet-harbor-77"}), "username"),
            (json!({"username": "x y", "email": "a@example.com", "password": "violet-harbor-77"}), "username"),
            (json!({"username": "taken", "email": "a@example.com", "password": "violet-harbor-77"}), "username"),
            (json!({"username": "new", "email": "nope", "password": "violet-harbor-77"}), "email"),
            (json!({"username": "new", "email": "a@example.com", "password": "short"}), "password"),
        ] {
            let (status, err) = app
                .send(Method::POST, "/api/auth/register/", None, Some(body.clone()))
                .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(err["field"], field, "{body}");
        }
    }
}

mod assign_tests {
    use super::*;

    #[tokio::test]
    async fn creator_assigns_then_repeat_is_acknowledged() {
        let app = TestApp::new();
        let owner = app.user("owner", false);
        let worker = app.user("worker", false);
        let token = app.token(&owner);
        let task_id = app.create_task(&token, "Assign me").await;

        let uri = format!("/api/tasks/{}/assign", task_id);
        let (status, body) = app
            .send(Method::POST, &uri, Some(&token), Some(json!({"user_id": worker.id})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["assigned"], true);
        assert_eq!(body["created"], true);
        assert_eq!(body["task"], task_id);
        assert_eq!(body["user"], worker.id);
        let id = body["id"].as_i64().unwrap();

        let (status, body) = app
            .send(Method::POST, &uri, Some(&token), Some(json!({"user_id": worker.id})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assigned"], true);
        assert_eq!(body["created"], false);
        assert_eq!(body["id"], id);

        let (status, records) = app
            .send(
                Method::GET,
                &format!("/api/tasks/{}/assignments/", task_id),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(records.as_array().unwrap().len(), 1);
        assert_eq!(records[0]["id"], id);
        assert_eq!(records[0]["user"], worker.id);
        assert_eq!(records[0]["assigned_by"], owner.id);

        let outsider = app.user("outsider", false);
        let (status, _) = app
            .send(
                Method::GET,
                &format!("/api/tasks/{}/assignments/", task_id),
                Some(&app.token(&outsider)),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn trailing_slash_route_and_string_ids_work() {
        let app = TestApp::new();
        let owner = app.user("owner", false);
        let worker = app.user("worker", false);
        let token = app.token(&owner);
        let task_id = app.create_task(&token, "Assign me").await;

        let (status, _) = app
            .send(
                Method::POST,
                &format!("/api/tasks/{}/assign/", task_id),
                Some(&token),
                Some(json!({"user_id": worker.id.to_string()})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn only_creator_or_staff_may_assign() {
        let app = TestApp::new();
        let owner = app.user("owner", false);
        let outsider = app.user("outsider", false);
        let staff = app.user("staff", true);
        let task_id = app.create_task(&app.token(&owner), "Guarded").await;
        let uri = format!("/api/tasks/{}/assign", task_id);

        let (status, body) = app
            .send(
                Method::POST,
                &uri,
                Some(&app.token(&outsider)),
                Some(json!({"user_id": outsider.id})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "PERMISSION_DENIED");

        let (status, body) = app
            .send(
                Method::POST,
                &uri,
                Some(&app.token(&staff)),
                Some(json!({"user_id": outsider.id})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], true);
    }

    #[tokio::test]
    async fn missing_targets_and_tasks() {
        let app = TestApp::new();
        let owner = app.user("owner", false);
        let token = app.token(&owner);
        let task_id = app.create_task(&token, "Targets").await;
        let uri = format!("/api/tasks/{}/assign", task_id);

        let (status, body) = app.send(Method::POST, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "user_id");

        let (status, _) = app
            .send(Method::POST, &uri, Some(&token), Some(json!({"user_id": "abc"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(Method::POST, &uri, Some(&token), Some(json!({"user_id": 4242})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "USER_NOT_FOUND");

        let (status, body) = app
            .send(
                Method::POST,
                "/api/tasks/999/assign",
                Some(&token),
                Some(json!({"user_id": owner.id})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn non_json_body_counts_as_missing_target() {
        let app = TestApp::new();
        let owner = app.user("owner", false);
        let token = app.token(&owner);
        let task_id = app.create_task(&token, "Raw").await;

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/tasks/{}/assign", task_id))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from("user_id=1"))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

mod task_tests {
    use super::*;

    #[tokio::test]
    async fn create_returns_the_task_representation() {
        let app = TestApp::new();
        let owner = app.user("owner", false);
        let token = app.token(&owner);

        let mut body = task_body("Ship release");
        body["tags"] = json!(["release", "bug"]);
        body["metadata"] = json!({"sprint": 4});
        body["estimated_hours"] = json!("2.5");
        let (status, task) = app
            .send(Method::POST, "/api/tasks/", Some(&token), Some(body))
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task["created_by"], owner.id);
        assert_eq!(task["status"], "pending");
        assert_eq!(task["due_date"], "2030-01-01T00:00:00Z");
        assert_eq!(task["estimated_hours"], 2.5);
        assert_eq!(task["actual_hours"], Value::Null);
        assert_eq!(task["tags"], json!(["bug", "release"]));
        assert_eq!(task["assigned_to"], json!([]));
        assert_eq!(task["metadata"]["sprint"], 4);
        assert!(task.get("deleted_at").is_none());
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let app = TestApp::new();
        let token = app.token(&app.user("owner", false));

        let mut overdue = task_body("Late");
        overdue["status"] = json!("overdue");
        let (status, body) = app
            .send(Method::POST, "/api/tasks/", Some(&token), Some(overdue))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "status");

        let mut missing = task_body("Incomplete");
        missing.as_object_mut().unwrap().remove("due_date");
        let (status, body) = app
            .send(Method::POST, "/api/tasks/", Some(&token), Some(missing))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_REQUIRED_FIELD");
        assert_eq!(body["field"], "due_date");

        let (status, body) = app
            .send(Method::POST, "/api/tasks/", Some(&token), Some(json!([1, 2])))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MALFORMED_BODY");
    }

    #[tokio::test]
    async fn invisible_tasks_are_not_found() {
        let app = TestApp::new();
        let owner = app.user("owner", false);
        let other = app.user("other", false);
        let task_id = app.create_task(&app.token(&owner), "Private").await;
        let uri = format!("/api/tasks/{}/", task_id);
        let other_token = app.token(&other);

        let (status, _) = app.send(Method::GET, &uri, Some(&other_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .send(Method::PATCH, &uri, Some(&other_token), Some(json!({"title": "mine"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.send(Method::DELETE, &uri, Some(&other_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let staff = app.user("staff", true);
        let (status, _) = app.send(Method::GET, &uri, Some(&app.token(&staff)), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn assignees_edit_but_only_creators_delete() {
        let app = TestApp::new();
        let owner = app.user("owner", false);
        let worker = app.user("worker", false);
        let owner_token = app.token(&owner);
        let worker_token = app.token(&worker);
        let task_id = app.create_task(&owner_token, "Shared").await;
        app.db.assign_user(worker.id, task_id, owner.id).unwrap();
        let uri = format!("/api/tasks/{}/", task_id);

        let (status, task) = app
            .send(
                Method::PATCH,
                &uri,
                Some(&worker_token),
                Some(json!({"status": "in_progress", "actual_hours": 1.5})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["status"], "in_progress");
        assert_eq!(task["actual_hours"], 1.5);
        assert_eq!(task["title"], "Shared");

        let (status, _) = app.send(Method::DELETE, &uri, Some(&worker_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app.send(Method::DELETE, &uri, Some(&owner_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _) = app.send(Method::GET, &uri, Some(&owner_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_requires_every_field() {
        let app = TestApp::new();
        let token = app.token(&app.user("owner", false));
        let task_id = app.create_task(&token, "Replace me").await;
        let uri = format!("/api/tasks/{}/", task_id);

        let (status, body) = app
            .send(Method::PUT, &uri, Some(&token), Some(json!({"title": "Only title"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_REQUIRED_FIELD");

        let mut full = task_body("Replaced");
        full["priority"] = json!("extreme");
        let (status, task) = app.send(Method::PUT, &uri, Some(&token), Some(full)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["title"], "Replaced");
        assert_eq!(task["priority"], "extreme");
    }

    #[tokio::test]
    async fn parent_cycles_are_rejected() {
        let app = TestApp::new();
        let token = app.token(&app.user("owner", false));
        let parent = app.create_task(&token, "Parent").await;

        let mut child = task_body("Child");
        child["parent_task"] = json!(parent);
        let (status, child) = app
            .send(Method::POST, "/api/tasks/", Some(&token), Some(child))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(child["parent_task"], parent);

        let (status, body) = app
            .send(
                Method::PATCH,
                &format!("/api/tasks/{}/", parent),
                Some(&token),
                Some(json!({"parent_task": child["id"]})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "PARENT_CYCLE");
    }
}

mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn pages_link_and_clamp() {
        let app = TestApp::new();
        let token = app.token(&app.user("owner", false));
        for i in 0..12 {
            app.create_task(&token, &format!("Task {}", i)).await;
        }

        let (status, page) = app
            .send(Method::GET, "/api/tasks/?page_size=5", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 12);
        assert_eq!(page["results"].as_array().unwrap().len(), 5);
        assert_eq!(page["next"], "/api/tasks/?page_size=5&page=2");
        assert_eq!(page["previous"], Value::Null);

        let (_, last) = app
            .send(Method::GET, "/api/tasks/?page_size=5&page=3", Some(&token), None)
            .await;
        assert_eq!(last["results"].as_array().unwrap().len(), 2);
        assert_eq!(last["next"], Value::Null);

        let (status, _) = app
            .send(Method::GET, "/api/tasks/?page=9", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, clamped) = app
            .send(Method::GET, "/api/tasks/?page_size=500", Some(&token), None)
            .await;
        assert_eq!(clamped["results"].as_array().unwrap().len(), 12);
        assert_eq!(clamped["next"], Value::Null);
    }

    #[tokio::test]
    async fn huge_page_numbers_are_404_and_leave_the_store_usable() {
        let app = TestApp::new();
        let staff = app.user("boss", true);
        let token = app.token(&staff);
        app.create_task(&token, "Only task").await;

        for uri in [
            "/api/tasks/?page=2000000000000000000",
            "/api/tasks/?page=1000000000000000000",
            "/api/tasks/?page=18446744073709551615&page_size=30",
            "/api/users/?page=2000000000000000000",
        ] {
            let (status, body) = app.send(Method::GET, uri, Some(&token), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["code"], "INVALID_PAGE", "{uri}");
        }

        let (status, page) = app.send(Method::GET, "/api/tasks/", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 1);
    }

    #[tokio::test]
    async fn listing_shows_own_and_assigned_tasks_only() {
        let app = TestApp::new();
        let alice = app.user("alice", false);
        let bob = app.user("bob", false);
        let alice_token = app.token(&alice);
        let bob_token = app.token(&bob);

        app.create_task(&alice_token, "Alice's").await;
        let shared = app.create_task(&bob_token, "Bob's, shared").await;
        app.create_task(&bob_token, "Bob's, private").await;
        app.db.assign_user(alice.id, shared, bob.id).unwrap();

        let (_, page) = app.send(Method::GET, "/api/tasks/", Some(&alice_token), None).await;
        assert_eq!(page["count"], 2);

        let (_, page) = app
            .send(
                Method::GET,
                &format!("/api/tasks/?assigned_to={}", alice.id),
                Some(&alice_token),
                None,
            )
            .await;
        assert_eq!(page["count"], 1);
        assert_eq!(page["results"][0]["id"], shared);

        let (_, page) = app
            .send(Method::GET, "/api/tasks/?search=private", Some(&alice_token), None)
            .await;
        assert_eq!(page["count"], 0);

        let (status, _) = app
            .send(Method::GET, "/api/tasks/?status=bogus", Some(&alice_token), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod user_tests {
    use super::*;

    #[tokio::test]
    async fn only_staff_list_users() {
        let app = TestApp::new();
        let user = app.user("plain", false);
        let staff = app.user("boss", true);

        let (status, _) = app
            .send(Method::GET, "/api/users/", Some(&app.token(&user)), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, page) = app
            .send(Method::GET, "/api/users/", Some(&app.token(&staff)), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["count"], 2);
        assert_eq!(page["results"][0]["username"], "plain");
        assert!(page["results"][0].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn profile_visibility_and_updates() {
        let app = TestApp::new();
        let alice = app.user("alice", false);
        let bob = app.user("bob", false);
        let staff = app.user("boss", true);
        let alice_token = app.token(&alice);

        let (status, body) = app
            .send(Method::GET, &format!("/api/users/{}/", bob.id), Some(&alice_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "bob");

        let (status, _) = app
            .send(Method::GET, &format!("/api/users/{}/", staff.id), Some(&alice_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send(Method::GET, "/api/users/4242/", Some(&alice_token), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .send(
                Method::PUT,
                &format!("/api/users/{}/", bob.id),
                Some(&alice_token),
                Some(json!({"username": "bobby", "email": "b@example.com"})),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/users/{}/", alice.id),
                Some(&alice_token),
                Some(json!({"username": "alice", "email": "new@example.com", "nickname": "Al"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "new@example.com");
        assert_eq!(body["nickname"], "Al");

        let (status, body) = app
            .send(
                Method::PUT,
                &format!("/api/users/{}/", alice.id),
                Some(&alice_token),
                Some(json!({"username": "alice"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "email");

        let (status, _) = app
            .send(
                Method::PUT,
                &format!("/api/users/{}/", bob.id),
                Some(&app.token(&staff)),
                Some(json!({"username": "bob", "email": "bob@corp.example"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn tags_need_auth() {
        let app = TestApp::new();
        let (status, _) = app.send(Method::GET, "/api/tags/", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = app.token(&app.user("alice", false));
        let (status, tags) = app.send(Method::GET, "/api/tags/", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = tags
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["bug", "documentation", "feature", "testing"]);
    }
}
