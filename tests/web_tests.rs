//! Browser front end tests: the web router relaying to a live API server or to
//! an address where nothing listens.

use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use taskhub::api;
use taskhub::auth::TokenService;
use taskhub::auth::password::hash_password;
use taskhub::config::{PaginationConfig, WebConfig};
use taskhub::db::Database;
use taskhub::server::{ServerHandle, start_server};
use taskhub::state::AppState;
use taskhub::types::NewUser;
use taskhub::web::session::Session;
use taskhub::web::{self, WebState};
use tower::ServiceExt;

const COOKIE_NAME: &str = "sessionid";

struct Front {
    router: Router,
    state: WebState,
}

impl Front {
    fn new(api_base_url: String) -> Self {
        let config = WebConfig {
            api_base_url,
            request_timeout_secs: 5,
            ..WebConfig::default()
        };
        let state = WebState::new(&config).unwrap();
        Self {
            router: web::router(state.clone()),
            state,
        }
    }

    /// Seed a session the store issued, holding `access`.
    fn session(&self, id: &str, access: &str) {
        self.state.sessions().insert(
            id,
            Session {
                access: Some(access.to_string()),
                refresh: Some("refresh".to_string()),
                flash: None,
            },
        );
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        form: Option<&str>,
    ) -> (StatusCode, HeaderMap, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = cookie {
            builder = builder.header(COOKIE, format!("{}={}", COOKIE_NAME, id));
        }
        let body = match form {
            Some(form) => {
                builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
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
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn location(headers: &HeaderMap) -> &str {
    headers.get(LOCATION).unwrap().to_str().unwrap()
}

/// The session id set by the response, if any.
fn issued_session(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.strip_prefix(&format!("{}=", COOKIE_NAME)))
        .map(|v| v.split(';').next().unwrap_or_default().to_string())
        .rfind(|id| !id.is_empty())
}

/// An address nothing listens on.
fn closed_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn start_api(db: &Database) -> ServerHandle {
    let state = AppState::new(
        db.clone(),
        TokenService::new("web-test-secret", 300, 86_400),
        PaginationConfig::default(),
    );
    start_server(api::router(state), "127.0.0.1:0", "API server")
        .await
        .unwrap()
}

mod redirects {
    use super::*;

    #[tokio::test]
    async fn task_pages_without_a_token_go_to_login() {
        let front = Front::new(closed_address());

        for (method, uri, form) in [
            (Method::GET, "/tasks/view/", None),
            (Method::GET, "/tasks/add/", None),
            (Method::POST, "/tasks/add/", Some("title=x")),
            (Method::POST, "/tasks/3/assign/", Some("user_id=2")),
        ] {
            let (status, headers, _) = front.send(method, uri, None, form).await;
            assert_eq!(status, StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location(&headers), "/auth/login/", "{uri}");
        }
    }

    #[tokio::test]
    async fn unknown_cookie_ids_are_not_sessions() {
        let front = Front::new(closed_address());

        let (status, headers, _) = front
            .send(Method::GET, "/tasks/view/", Some("forged-id"), None)
            .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location(&headers), "/auth/login/");
        assert!(front.state.sessions().is_empty());
    }
}

mod relay {
    use super::*;

    #[tokio::test]
    async fn unreachable_api_is_reported_on_the_page() {
        let front = Front::new(closed_address());
        front.session("known", "some-access-token");

        let (status, _, body) = front
            .send(Method::GET, "/tasks/view/", Some("known"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("could not reach the task service"), "{body}");
        assert!(front.state.sessions().get("known").is_some());
    }

    #[tokio::test]
    async fn api_401_clears_the_session_and_redirects_to_login() {
        let db = Database::open_in_memory().unwrap();
        let api = start_api(&db).await;
        let front = Front::new(format!("http://{}", api.addr));
        front.session("known", "not-a-valid-token");

        let (status, headers, _) = front
            .send(Method::GET, "/tasks/view/", Some("known"), None)
            .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location(&headers), "/auth/login/");
        assert!(front.state.sessions().get("known").is_none());

        // The flash travels on a fresh session id
        let fresh = issued_session(&headers).unwrap();
        assert_ne!(fresh, "known");
        let (status, _, body) = front
            .send(Method::GET, "/auth/login/", Some(&fresh), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("session has expired"), "{body}");
        assert!(front.state.sessions().get(&fresh).unwrap().access.is_none());

        api.shutdown().await;
    }

    #[tokio::test]
    async fn login_rotates_the_session_id() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&NewUser {
            username: "dave".to_string(),
            email: "dave@example.com".to_string(),
            nickname: String::new(),
            password_hash: hash_password("amber-lantern-42").unwrap(),
            is_staff: false,
            is_superuser: false,
        })
        .unwrap();
        let api = start_api(&db).await;
        let front = Front::new(format!("http://{}", api.addr));
        front.state.sessions().insert("pre-login", Session::default());

        let (status, headers, _) = front
            .send(
                Method::POST,
                "/auth/login/",
                Some("pre-login"),
                Some("username=dave&password=amber-lantern-42"),
            )
            .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location(&headers), "/tasks/view/");

        let rotated = issued_session(&headers).unwrap();
        assert_ne!(rotated, "pre-login");
        assert!(front.state.sessions().get("pre-login").is_none());
        assert!(front.state.sessions().get(&rotated).unwrap().access.is_some());

        let (status, _, body) = front
            .send(Method::GET, "/tasks/view/", Some(&rotated), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        api.shutdown().await;
    }
}
