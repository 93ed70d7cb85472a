//! Outgoing request description and credential attachment.

use std::borrow::Cow;

use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::credentials::CredentialStore;
use crate::error::ApiError;

/// How a request takes part in the refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// A `401` triggers refresh-and-retry.
    #[default]
    Session,
    /// The bearer token is still attached when one exists, but a `401` is
    /// returned to the caller as is. Used by login and logout.
    Public,
}

/// A replayable API call.
///
/// The pipeline rebuilds the HTTP request from this description for the
/// retry, so the retried call is identical to the original apart from the
/// credential.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    auth: AuthMode,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            auth: AuthMode::Session,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("unserializable body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Opt out of refresh-and-retry.
    pub fn public(mut self) -> Self {
        self.auth = AuthMode::Public;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth
    }

    pub(crate) fn to_builder(&self, http: &reqwest::Client, url: Url) -> RequestBuilder {
        let mut builder = http.request(self.method.clone(), url);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(body) = &self.body {
            builder = builder.json(body);
        }
        builder
    }
}

/// Percent-encode a caller-supplied id for use as one path segment.
///
/// Empty and dot segments are refused because URL resolution would drop or
/// collapse them.
pub(crate) fn path_segment(value: &str) -> Result<Cow<'_, str>, ApiError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(ApiError::InvalidRequest(format!(
            "invalid path segment `{value}`"
        )));
    }
    Ok(urlencoding::encode(value))
}

/// Attach the stored access token as a bearer header.
///
/// Returns whether a token was attached. Never fails and never awaits: a
/// missing credential is not an error here because some endpoints (login)
/// are meant to be reached unauthenticated.
pub(crate) fn authorize(
    builder: RequestBuilder,
    store: &dyn CredentialStore,
) -> (RequestBuilder, bool) {
    match store.read() {
        Some(record) => (builder.bearer_auth(&record.access_token), true),
        None => {
            debug!("No stored credential, sending request without authorization");
            (builder, false)
        }
    }
}
