//! In-process HTTP server for exercising backend calls in tests.
//!
//! An axum app served from its own runtime thread, so the blocking client
//! can call it. Every request goes through a routing closure and is recorded.

use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::Backend;

type Route = dyn Fn(&Recorded) -> MockReply + Send + Sync;

/// A request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Recorded {
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// A decoded query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// What the server answers with.
#[derive(Debug, Clone)]
pub struct MockReply {
    status: u16,
    chunks: Vec<String>,
    chunked: bool,
    delay: Duration,
    gap: Duration,
    hold: Duration,
}

impl MockReply {
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            chunks: vec![body.to_string()],
            chunked: false,
            delay: Duration::ZERO,
            gap: Duration::from_millis(5),
            hold: Duration::ZERO,
        }
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::text(status, &body.to_string())
    }

    /// A streamed body, sent piece by piece.
    pub fn chunked(status: u16, chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| (*c).to_string()).collect(),
            chunked: true,
            ..Self::text(status, "")
        }
    }

    /// Wait before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Pause between streamed pieces.
    pub fn paced(mut self, gap: Duration) -> Self {
        self.gap = gap;
        self
    }

    /// Keep the stream open, silent, after the last piece.
    pub fn stalled(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }
}

impl IntoResponse for MockReply {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = if self.chunked {
            let Self {
                chunks, gap, hold, ..
            } = self;
            let (tx, rx) = mpsc::channel::<Result<String, Infallible>>(chunks.len().max(1));
            tokio::spawn(async move {
                for chunk in chunks {
                    if tx.send(Ok(chunk)).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(gap).await;
                }
                tokio::time::sleep(hold).await;
            });
            Body::from_stream(ReceiverStream::new(rx))
        } else {
            Body::from(self.chunks.concat())
        };
        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

#[derive(Clone)]
struct Shared {
    route: Arc<Route>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    pub fn start(route: impl Fn(&Recorded) -> MockReply + Send + Sync + 'static) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(handle).with_state(Shared {
            route: Arc::new(route),
            requests: Arc::clone(&requests),
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let _ = axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
            });
        });

        Self {
            addr,
            requests,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A backend pointed at this server with both keys set to `service-key`.
    pub fn backend(&self) -> Backend {
        Backend::new(
            self.url(),
            Some("service-key".into()),
            Some("service-key".into()),
        )
        .unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose path matches exactly.
    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path() == path)
            .collect()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = Recorded {
        method: method.to_string(),
        url: Url::parse(&format!("http://mock{uri}")).unwrap(),
        headers: headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    shared.requests.lock().unwrap().push(request.clone());

    let reply = (shared.route)(&request);
    tokio::time::sleep(reply.delay).await;
    reply.into_response()
}
