//! Localhost origin for exercising `HttpTransport` over real sockets.

use axum::{
    Router,
    http::{HeaderMap, HeaderValue, StatusCode, header::RANGE},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use bytes::Bytes;
use tokio::{net::TcpListener, sync::oneshot};
use url::Url;

/// Response header echoing the `Range` a [`ranged`] handler was asked for.
pub const REQUESTED_RANGE: &str = "x-requested-range";

/// Segment origin bound to a random port; shuts down when dropped.
pub struct TestHttpServer {
    base_url: Url,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestHttpServer {
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn new(router: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind origin listener");
        let addr = listener.local_addr().expect("origin local addr");

        let (shutdown, stop) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    stop.await.ok();
                })
                .await
                .expect("serve origin");
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("origin base URL"),
            shutdown: Some(shutdown),
        }
    }

    /// # Panics
    ///
    /// Panics if `path` does not join onto the origin URL.
    #[must_use]
    pub fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("segment URL")
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// GET handler serving `body`, honouring a single `bytes=a-b` or `bytes=a-`
/// range with `206` and answering unsatisfiable ranges with `416`.
pub fn ranged(body: Bytes) -> MethodRouter {
    get(move |headers: HeaderMap| {
        let body = body.clone();
        async move { serve_range(&body, &headers) }
    })
}

fn serve_range(body: &Bytes, headers: &HeaderMap) -> Response {
    let Some(range) = headers.get(RANGE).and_then(|v| v.to_str().ok()) else {
        return (StatusCode::OK, body.clone()).into_response();
    };
    let Some((start, end)) = parse_range(range, body.len()) else {
        return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
    };

    let mut response = (StatusCode::PARTIAL_CONTENT, body.slice(start..=end)).into_response();
    if let Ok(value) = HeaderValue::from_str(range) {
        response.headers_mut().insert(REQUESTED_RANGE, value);
    }
    response
}

/// Inclusive byte bounds of `value` within a body of `len` bytes.
fn parse_range(value: &str, len: usize) -> Option<(usize, usize)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let last = len.checked_sub(1)?;
    let start: usize = start.parse().ok()?;
    let end = if end.is_empty() {
        last
    } else {
        end.parse::<usize>().ok()?.min(last)
    };
    (start <= end).then_some((start, end))
}
