//! HTTP-shaped adapter over an injected transport.
//!
//! The adapter owns URL building, JSON encoding and the mapping of response
//! statuses onto [`SyncError`]. Moving bytes is left to a [`Transport`]
//! supplied by the embedding application.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use tracing::{debug, trace};
use url::Url;

use super::api::CatalogApi;
use super::model::{
    CategoriesResponse, HealthResponse, ItemViewRequest, ItemViewResponse,
    ItemsByCategoryResponse, ResetResponse, StorePage,
};
use crate::error::SyncError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        })
    }
}

/// A request ready to be sent. `body` is JSON when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        ApiResponse {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        ApiResponse::new(200, body)
    }
}

/// Sends one request and returns the raw response.
///
/// Failures to get any response at all (refused connection, timeout) are
/// reported as [`SyncError::Network`]. Any status, including errors, is a
/// successful send.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SyncError>;
}

/// [`CatalogApi`] speaking the catalog's JSON-over-HTTP protocol.
pub struct HttpCatalogApi<T> {
    base_url: Url,
    transport: T,
}

impl<T: Transport> HttpCatalogApi<T> {
    pub fn new(base_url: &str, transport: T) -> Result<Self, SyncError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| SyncError::validation(format!("invalid base url {}: {}", base_url, err)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::validation(format!(
                "base url {} cannot carry a path",
                base_url
            )));
        }
        Ok(HttpCatalogApi {
            base_url,
            transport,
        })
    }

    /// Adapter against [`DEFAULT_BASE_URL`].
    pub fn localhost(transport: T) -> Result<Self, SyncError> {
        Self::new(DEFAULT_BASE_URL, transport)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join `segments` onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn call<R>(&self, method: Method, segments: &[&str], body: Option<String>) -> Result<R, SyncError>
    where
        R: DeserializeOwned,
    {
        let request = ApiRequest {
            method,
            url: self.endpoint(segments),
            body,
        };
        let target = format!("{} {}", request.method, request.url.path());
        trace!(request = %target, "sending request");

        let response = self.transport.send(request).await?;
        if !(200..300).contains(&response.status) {
            let error = status_error(&target, &response);
            debug!(request = %target, status = response.status, error = %error, "request failed");
            return Err(error);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    async fn get<R: DeserializeOwned>(&self, segments: &[&str]) -> Result<R, SyncError> {
        self.call(Method::Get, segments, None).await
    }

    async fn post<B, R>(&self, segments: &[&str], body: &B) -> Result<R, SyncError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let body = serde_json::to_string(body)?;
        self.call(Method::Post, segments, Some(body)).await
    }
}

#[async_trait]
impl<T: Transport> CatalogApi for HttpCatalogApi<T> {
    async fn store_page(&self) -> Result<StorePage, SyncError> {
        self.get(&["api", "store"]).await
    }

    async fn item(&self, id: &str) -> Result<ItemViewResponse, SyncError> {
        self.get(&["api", "item", id]).await
    }

    async fn categories(&self) -> Result<CategoriesResponse, SyncError> {
        self.get(&["api", "categories"]).await
    }

    async fn items_by_category(&self, category: &str) -> Result<ItemsByCategoryResponse, SyncError> {
        self.get(&["api", "items", "category", category]).await
    }

    async fn health(&self) -> Result<HealthResponse, SyncError> {
        self.get(&[]).await
    }

    async fn track_item_view(&self, request: &ItemViewRequest) -> Result<ItemViewResponse, SyncError> {
        self.post(&["api", "item", "view"], request).await
    }

    async fn reset(&self) -> Result<ResetResponse, SyncError> {
        self.call(Method::Delete, &["api", "reset"], None).await
    }
}

/// Map a non-2xx response onto the error taxonomy.
///
/// The server's `detail` field is the message when present.
fn status_error(target: &str, response: &ApiResponse) -> SyncError {
    let message = serde_json::from_str::<serde_json::Value>(&response.body)
        .ok()
        .and_then(|body| body.get("detail")?.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    match response.status {
        404 => SyncError::not_found(format!("{}: {}", target, message)),
        400..=499 => SyncError::validation(message),
        _ => SyncError::network(message),
    }
}
