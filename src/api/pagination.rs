//! Page-number pagination with `{count, next, previous, results}` envelopes.

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};

/// Raw `page` / `page_size` query values.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// A missing page means 1; a non-numeric or zero page is a 404.
    /// A bad or missing `page_size` falls back to the default; large ones are clamped.
    pub fn resolve(
        page: Option<&str>,
        page_size: Option<&str>,
        default_size: u64,
        max_size: u64,
    ) -> ApiResult<Self> {
        let page = match page.map(str::trim).filter(|p| !p.is_empty()) {
            None => 1,
            Some(raw) => match raw.parse::<u64>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(ApiError::invalid_page()),
            },
        };

        let page_size = page_size
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(max_size))
            .unwrap_or(default_size);

        Ok(Self { page, page_size })
    }

    pub fn from_query(query: &PageQuery, default_size: u64, max_size: u64) -> ApiResult<Self> {
        Self::resolve(
            query.page.as_deref(),
            query.page_size.as_deref(),
            default_size,
            max_size,
        )
    }
}

/// Paginated response body.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap one page of results. Pages past the end (other than page 1) are a 404.
    pub fn new(uri: &Uri, request: PageRequest, count: u64, results: Vec<T>) -> ApiResult<Self> {
        let pages = count.div_ceil(request.page_size).max(1);
        if request.page > pages {
            return Err(ApiError::invalid_page());
        }

        let next = (request.page < pages).then(|| page_link(uri, Some(request.page + 1)));
        let previous = match request.page {
            1 => None,
            2 => Some(page_link(uri, None)),
            n => Some(page_link(uri, Some(n - 1))),
        };

        Ok(Self {
            count,
            next,
            previous,
            results,
        })
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// The request path with its query, `page` replaced (or removed for `None`).
fn page_link(uri: &Uri, page: Option<u64>) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("page"))
        .map(str::to_string)
        .collect();
    if let Some(page) = page {
        pairs.push(format!("page={}", page));
    }

    if pairs.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), pairs.join("&"))
    }
}
