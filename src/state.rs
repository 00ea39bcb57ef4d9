use std::sync::Arc;

use crate::auth::tokens::TokenService;
use crate::config::PaginationConfig;
use crate::db::Database;

/// State shared by every API handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    db: Database,
    tokens: TokenService,
    pagination: PaginationConfig,
}

impl AppState {
    pub fn new(db: Database, tokens: TokenService, pagination: PaginationConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                db,
                tokens,
                pagination,
            }),
        }
    }

    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn tokens(&self) -> &TokenService {
        &self.inner.tokens
    }

    pub fn pagination(&self) -> &PaginationConfig {
        &self.inner.pagination
    }
}
