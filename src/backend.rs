//! Blocking HTTP client for the hosted backend.
//!
//! Two surfaces, both under the project base URL:
//!
//! ```text
//! /functions/v1/<name>   remote functions, JSON in and out
//! /rest/v1/<table>       table endpoints, PostgREST-style query parameters
//! /rest/v1/rpc/<name>    stored procedures
//! ```
//!
//! Table and RPC access present the service-role key as both `apikey` and
//! bearer token. Function calls carry a bearer token only when one is configured.

use std::io;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::{Client, ClientBuilder, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{Config, ConfigError};

/// How much of an unexpected body to keep for diagnostics.
pub const EXCERPT_LEN: usize = 500;

/// Timeout for table reads, patches, and RPC calls.
pub const TABLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request timed out after {}s; remote work may still be running", after.as_secs())]
    Timeout { after: Duration },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("invalid JSON in response: {source}\n{excerpt}")]
    Decode {
        source: serde_json::Error,
        excerpt: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BackendError {
    /// The HTTP status code, for errors that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn from_reqwest(e: reqwest::Error, after: Duration) -> Self {
        if e.is_timeout() {
            Self::Timeout { after }
        } else {
            Self::Transport(e)
        }
    }
}

pub type Result<T> = core::result::Result<T, BackendError>;

/// A fully-read response: status plus body text.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
}

impl Reply {
    /// Keep the reply only if its status is one of `accepted`.
    pub fn accept(self, accepted: &[u16]) -> Result<Self> {
        if accepted.contains(&self.status.as_u16()) {
            Ok(self)
        } else {
            Err(self.into_status_error())
        }
    }

    /// Keep the reply only if its status is 2xx.
    pub fn accept_success(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(self.into_status_error())
        }
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|source| BackendError::Decode {
            source,
            excerpt: excerpt(&self.body),
        })
    }

    fn into_status_error(self) -> BackendError {
        BackendError::Status {
            status: self.status.as_u16(),
            body: excerpt(&self.body),
        }
    }
}

/// Handle to one backend project.
#[derive(Debug, Clone)]
pub struct Backend {
    http: Client,
    base_url: String,
    function_token: Option<String>,
    service_role_key: Option<String>,
}

impl Backend {
    pub fn new(
        base_url: impl Into<String>,
        function_token: Option<String>,
        service_role_key: Option<String>,
    ) -> Result<Self> {
        let http = client_builder()
            .timeout(None::<Duration>)
            .build()
            .map_err(BackendError::Transport)?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            function_token,
            service_role_key,
        })
    }

    /// Build a backend from resolved configuration. Fails if the base URL is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.require_base_url()?;
        Self::new(
            base_url,
            config.function_token().map(String::from),
            config.service_role_key.clone(),
        )
    }

    pub fn function_url(&self, name: &str) -> String {
        format!("{}/functions/v1/{name}", self.base_url)
    }

    // ── Remote functions ──

    /// POST a JSON body to a remote function and read the whole reply.
    ///
    /// Any status is returned as `Ok`; callers decide which ones count as success.
    pub fn call_function(
        &self,
        name: &str,
        body: &impl Serialize,
        timeout: Duration,
    ) -> Result<Reply> {
        let request = self.function_request(name, body, timeout);
        send(request, "POST", name, timeout)
    }

    /// POST to a remote function and hand back the open response for streaming.
    ///
    /// `timeout` bounds the wait for headers and each read of the body, so a
    /// stream that keeps sending survives any total duration. Anything but 200
    /// is read to completion and returned as a status error.
    pub fn stream_function(
        &self,
        name: &str,
        body: &impl Serialize,
        timeout: Duration,
    ) -> Result<Response> {
        // A blocking client's own timeout applies per read; a request timeout
        // would cover the whole body.
        let http = client_builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Transport)?;

        let started = Instant::now();
        let mut request = http.post(self.function_url(name)).json(body);
        if let Some(token) = &self.function_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| BackendError::from_reqwest(e, timeout))?;

        let status = response.status();
        debug!(
            path = name,
            status = status.as_u16(),
            elapsed_ms = elapsed_ms(started),
            "stream opened"
        );

        if status == StatusCode::OK {
            return Ok(response);
        }
        let body = response
            .text()
            .map_err(|e| BackendError::from_reqwest(e, timeout))?;
        Err(Reply { status, body }.into_status_error())
    }

    fn function_request(
        &self,
        name: &str,
        body: &impl Serialize,
        timeout: Duration,
    ) -> RequestBuilder {
        let mut request = self
            .http
            .post(self.function_url(name))
            .json(body)
            .timeout(timeout);
        if let Some(token) = &self.function_token {
            request = request.bearer_auth(token);
        }
        request
    }

    // ── Tables ──

    /// GET rows from a table. `query` holds PostgREST parameters (`id=eq.…`, `order`, `limit`).
    pub fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let request = self
            .table_request(self.http.get(self.rest_url(table)))?
            .query(query);
        send(request, "GET", table, TABLE_TIMEOUT)?
            .accept(&[200])?
            .json()
    }

    /// PATCH rows matching `filter` with the given fields.
    pub fn update(
        &self,
        table: &str,
        filter: &[(&str, String)],
        fields: &impl Serialize,
    ) -> Result<()> {
        let request = self
            .table_request(self.http.patch(self.rest_url(table)))?
            .query(filter)
            .json(fields);
        send(request, "PATCH", table, TABLE_TIMEOUT)?
            .accept_success()?;
        Ok(())
    }

    /// Invoke a stored procedure and decode its result.
    pub fn rpc<T: DeserializeOwned>(&self, name: &str, args: &impl Serialize) -> Result<T> {
        let url = self.rest_url(&format!("rpc/{name}"));
        let request = self.table_request(self.http.post(url))?.json(args);
        send(request, "POST", name, TABLE_TIMEOUT)?
            .accept(&[200])?
            .json()
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{path}", self.base_url)
    }

    fn table_request(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let key = self
            .service_role_key
            .as_deref()
            .ok_or(ConfigError::Missing {
                var: crate::config::SERVICE_ROLE_KEY_VAR,
            })?;
        Ok(request
            .header("apikey", key)
            .bearer_auth(key)
            .timeout(TABLE_TIMEOUT))
    }
}

/// Send a request and read the whole body, whatever the status.
fn send(request: RequestBuilder, method: &str, path: &str, timeout: Duration) -> Result<Reply> {
    let started = Instant::now();
    let response = request
        .send()
        .map_err(|e| BackendError::from_reqwest(e, timeout))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| BackendError::from_reqwest(e, timeout))?;
    debug!(
        method,
        path,
        status = status.as_u16(),
        elapsed_ms = elapsed_ms(started),
        "backend call"
    );
    Ok(Reply { status, body })
}

fn client_builder() -> ClientBuilder {
    Client::builder().user_agent(concat!("pipectl/", env!("CARGO_PKG_VERSION")))
}

/// Whether a failed read of a streamed body was the client's timeout.
///
/// The blocking body reader wraps its `reqwest::Error` in an `Other` I/O error.
pub fn read_timed_out(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::TimedOut
        || e.get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout)
}

/// PostgREST equality filter value: `eq.<value>`.
pub fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// The first [`EXCERPT_LEN`] characters of `text`.
pub fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_LEN) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::testing::{MockReply, MockServer};

    #[test]
    fn non_success_status_is_an_error_with_the_code() {
        let server = MockServer::start(|_| MockReply::text(503, "upstream down"));
        let backend = server.backend();

        let reply = backend
            .call_function("anything", &json!({}), Duration::from_secs(5))
            .unwrap();
        let err = reply.accept(&[200]).unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn status_error_body_is_truncated() {
        let long = "x".repeat(2_000);
        let server = MockServer::start(move |_| MockReply::text(500, &long));
        let err = server
            .backend()
            .call_function("f", &json!({}), Duration::from_secs(5))
            .unwrap()
            .accept_success()
            .unwrap_err();

        match err {
            BackendError::Status { body, .. } => assert_eq!(body.len(), EXCERPT_LEN),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn timeout_is_reported_distinctly() {
        let server = MockServer::start(|_| {
            MockReply::json(200, json!({})).delayed(Duration::from_millis(1_500))
        });
        let err = server
            .backend()
            .call_function("slow", &json!({}), Duration::from_millis(200))
            .unwrap_err();

        assert!(err.is_timeout(), "got {err:?}");
        assert!(err.to_string().contains("may still be running"));
    }

    #[test]
    fn function_call_posts_json_with_bearer() {
        let server = MockServer::start(|_| MockReply::json(200, json!({ "ok": true })));
        let reply = server
            .backend()
            .call_function("content-intake", &json!({ "a": 1 }), Duration::from_secs(5))
            .unwrap();
        assert_eq!(reply.json::<serde_json::Value>().unwrap(), json!({ "ok": true }));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path(), "/functions/v1/content-intake");
        assert_eq!(requests[0].json(), json!({ "a": 1 }));
        assert_eq!(
            requests[0].header("authorization"),
            Some("Bearer service-key")
        );
    }

    #[test]
    fn function_call_without_token_sends_no_authorization() {
        let server = MockServer::start(|_| MockReply::json(200, json!({})));
        let backend = Backend::new(server.url(), None, None).unwrap();
        backend
            .call_function("open", &json!({}), Duration::from_secs(5))
            .unwrap();
        assert_eq!(server.requests()[0].header("authorization"), None);
    }

    #[test]
    fn select_sends_key_pair_and_filters() {
        let server = MockServer::start(|_| MockReply::json(200, json!([{ "n": 1 }])));
        let rows: Vec<serde_json::Value> = server
            .backend()
            .select(
                "content_jobs",
                &[("id", eq("abc")), ("select", "*".to_string())],
            )
            .unwrap();
        assert_eq!(rows, vec![json!({ "n": 1 })]);

        let request = &server.requests()[0];
        assert_eq!(request.method, "GET");
        assert_eq!(request.path(), "/rest/v1/content_jobs");
        assert_eq!(request.query_param("id").as_deref(), Some("eq.abc"));
        assert_eq!(request.query_param("select").as_deref(), Some("*"));
        assert_eq!(request.header("apikey"), Some("service-key"));
        assert_eq!(request.header("authorization"), Some("Bearer service-key"));
    }

    #[test]
    fn table_access_requires_service_role_key() {
        let backend = Backend::new("http://127.0.0.1:9", Some("anon".into()), None).unwrap();
        let err = backend
            .select::<serde_json::Value>("content_jobs", &[])
            .unwrap_err();
        assert!(matches!(err, BackendError::Config(_)));
        assert!(err.to_string().contains("SUPABASE_SERVICE_ROLE_KEY"));
    }

    #[test]
    fn update_accepts_no_content() {
        let server = MockServer::start(|_| MockReply::text(204, ""));
        server
            .backend()
            .update("tasks", &[("task_id", eq("t"))], &json!({ "status": "x" }))
            .unwrap();
        let request = &server.requests()[0];
        assert_eq!(request.method, "PATCH");
        assert_eq!(request.json(), json!({ "status": "x" }));
    }

    #[test]
    fn rpc_posts_to_rpc_path() {
        let server = MockServer::start(|_| MockReply::json(200, json!([])));
        let rows: Vec<serde_json::Value> = server
            .backend()
            .rpc("get_content_stage_backlog", &json!({}))
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(
            server.requests()[0].path(),
            "/rest/v1/rpc/get_content_stage_backlog"
        );
    }

    #[test]
    fn malformed_json_keeps_an_excerpt() {
        let server = MockServer::start(|_| MockReply::text(200, "<html>gateway</html>"));
        let err = server
            .backend()
            .select::<serde_json::Value>("tasks", &[])
            .unwrap_err();
        match err {
            BackendError::Decode { excerpt, .. } => assert_eq!(excerpt, "<html>gateway</html>"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let text = "é".repeat(EXCERPT_LEN + 10);
        assert_eq!(excerpt(&text).chars().count(), EXCERPT_LEN);
        assert_eq!(excerpt("short"), "short");
    }
}
