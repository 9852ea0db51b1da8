//! Authenticated API pipeline.
//!
//! Wraps a reqwest client with two concerns the backend expects of every
//! call: attaching the current session's access token as a bearer header,
//! and classifying failures into a small error taxonomy callers can match
//! on. Validation failures carry the backend's field messages and are left
//! for the caller to present; every other category is logged once here.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::SessionStore;

/// Classified failure of an API call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    /// Field-level validation messages from the backend, flattened in
    /// field order.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Auth,

    #[error("no permission")]
    Permission,

    #[error("server error")]
    Server,

    #[error("unexpected response status {0}")]
    Unclassified(u16),
}

/// Problem body the backend returns for 4xx responses.
#[derive(Debug, Deserialize)]
struct ProblemBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

/// Maps a non-2xx response status and body to an `ApiError`.
///
/// A 400 with field errors becomes `Validation` with the messages flattened;
/// a 400 without becomes `BadRequest` with the problem title.
fn classify(status: u16, body: &str) -> ApiError {
    match status {
        400 => {
            let problem: ProblemBody = serde_json::from_str(body).unwrap_or(ProblemBody {
                title: None,
                errors: None,
            });
            match problem.errors {
                Some(errors) if !errors.is_empty() => {
                    ApiError::Validation(errors.into_values().flatten().collect())
                }
                _ => ApiError::BadRequest(
                    problem.title.unwrap_or_else(|| "Bad Request".to_string()),
                ),
            }
        }
        401 => ApiError::Auth,
        403 => ApiError::Permission,
        500 => ApiError::Server,
        other => ApiError::Unclassified(other),
    }
}

/// Client for the protected backend API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: SessionStore,
}

impl ApiClient {
    pub fn new(base_url: &str, store: SessionStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends a GET to the given path and returns the response body as JSON.
    pub async fn get(&self, path: &str) -> Result<serde_json::Value, ApiError> {
        let mut request = self.http.get(self.url_for(path));

        // Expired or absent sessions send the request unauthenticated and
        // let the backend's 401 drive the outcome.
        if let Some(session) = self.store.current_session() {
            debug!(path, "attaching bearer token");
            request = request.bearer_auth(&session.id_token);
        }

        let response = request.send().await.map_err(|e| {
            let err = ApiError::Network(e.to_string());
            warn!("api call failed: {err}");
            err
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| ApiError::Network(e.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify(status.as_u16(), &body);
        // Validation messages are the caller's to present.
        if !matches!(err, ApiError::Validation(_)) {
            warn!("api call failed: {err}");
        }
        Err(err)
    }
}
