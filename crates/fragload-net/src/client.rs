use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::{Client, header::RANGE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    error::{NetError, NetResult},
    stats::LoadStats,
    traits::{LoadOutcome, OnProgress, Transport, TransportFactory},
    types::{Headers, LoaderResponse, NetOptions, NetworkDetails, RequestContext, TransportConfig},
};

/// Default [`Transport`]: a single ranged GET over `reqwest`.
pub struct HttpTransport {
    client: Client,
    headers: Option<Headers>,
    cancel: CancellationToken,
    stats: Mutex<LoadStats>,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns [`NetError::Client`] if the `reqwest::Client` cannot be built.
    pub fn new(options: &NetOptions) -> NetResult<Self> {
        let client = build_client(options)?;
        Ok(Self::with_client(client, options.headers.clone()))
    }

    /// Wrap an existing client; connections are shared with its other users.
    #[must_use]
    pub fn with_client(client: Client, headers: Option<Headers>) -> Self {
        Self {
            client,
            headers,
            cancel: CancellationToken::new(),
            stats: Mutex::new(LoadStats::default()),
        }
    }

    /// Factory handing out one transport per load, all sharing one client.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Client`] if the `reqwest::Client` cannot be built.
    pub fn factory(options: &NetOptions) -> NetResult<TransportFactory> {
        let client = build_client(options)?;
        let headers = options.headers.clone();
        Ok(Arc::new(move || {
            Arc::new(Self::with_client(client.clone(), headers.clone())) as Arc<dyn Transport>
        }))
    }

    fn apply_headers(
        mut req: reqwest::RequestBuilder,
        headers: Option<&Headers>,
    ) -> reqwest::RequestBuilder {
        if let Some(headers) = headers {
            for (k, v) in headers.iter() {
                req = req.header(k, v);
            }
        }
        req
    }

    async fn fetch(
        &self,
        context: &RequestContext,
        config: &TransportConfig,
        mut on_progress: Option<&mut OnProgress<'_>>,
        details: &mut NetworkDetails,
    ) -> NetResult<Bytes> {
        let mut req = self.client.get(context.url.clone());
        if let Some(range) = &context.range {
            req = req.header(RANGE, range.to_header_value());
        }
        let req = Self::apply_headers(req, self.headers.as_ref());

        let resp = req.send().await?;
        let status = resp.status();
        details.status = Some(status.as_u16());
        for (name, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                details.headers.insert(name.as_str(), v);
            }
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NetError::HttpError {
                url: context.url.clone(),
                status: status.as_u16(),
                body: Some(body),
            });
        }

        self.stats.lock().total = resp.content_length().unwrap_or(0);

        let mut body = resp.bytes_stream();
        let mut pending = BytesMut::new();
        let mut full = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            let snapshot = {
                let mut stats = self.stats.lock();
                stats.record_chunk(chunk.len());
                *stats
            };
            trace!(url = %context.url, bytes = chunk.len(), loaded = snapshot.loaded, "fragload-net: chunk");

            match on_progress.as_deref_mut() {
                Some(on_progress) => {
                    pending.extend_from_slice(&chunk);
                    if pending.len() >= config.high_water_mark {
                        on_progress(&snapshot, pending.split().freeze(), details);
                    }
                }
                None => full.extend_from_slice(&chunk),
            }
        }

        let snapshot = {
            let mut stats = self.stats.lock();
            stats.finish();
            *stats
        };
        if let Some(on_progress) = on_progress.as_deref_mut() {
            if !pending.is_empty() {
                on_progress(&snapshot, pending.split().freeze(), details);
            }
        }

        Ok(full.freeze())
    }

    fn aborted(&self, details: NetworkDetails) -> LoadOutcome {
        let stats = {
            let mut stats = self.stats.lock();
            stats.aborted = true;
            *stats
        };
        LoadOutcome::Aborted { stats, details }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn load(
        &self,
        context: &RequestContext,
        config: &TransportConfig,
        on_progress: Option<&mut OnProgress<'_>>,
    ) -> LoadOutcome {
        *self.stats.lock() = LoadStats::started();
        let mut details = NetworkDetails::for_url(&context.url);

        if self.cancel.is_cancelled() {
            return self.aborted(details);
        }

        debug!(
            url = %context.url,
            range = ?context.range,
            timeout_ms = config.timeout.as_millis(),
            "fragload-net: request start"
        );

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            res = tokio::time::timeout(
                config.timeout,
                self.fetch(context, config, on_progress, &mut details),
            ) => Some(res),
        };

        match result {
            None => {
                debug!(url = %context.url, "fragload-net: request aborted");
                self.aborted(details)
            }
            Some(Err(_) | Ok(Err(NetError::Timeout))) => {
                warn!(url = %context.url, "fragload-net: request timed out");
                LoadOutcome::Timeout {
                    stats: self.stats(),
                    details,
                }
            }
            Some(Ok(Err(error))) => {
                warn!(url = %context.url, %error, "fragload-net: request failed");
                LoadOutcome::Error {
                    response: error.to_response(),
                    details,
                }
            }
            Some(Ok(Ok(data))) => {
                let stats = self.stats();
                debug!(url = %context.url, bytes = stats.loaded, "fragload-net: request complete");
                LoadOutcome::Success {
                    response: LoaderResponse {
                        url: context.url.clone(),
                        data,
                    },
                    stats,
                    details,
                }
            }
        }
    }

    fn abort(&self) {
        self.cancel.cancel();
    }

    fn stats(&self) -> LoadStats {
        *self.stats.lock()
    }
}

fn build_client(options: &NetOptions) -> NetResult<Client> {
    Client::builder()
        .use_rustls_tls()
        .connect_timeout(options.connect_timeout)
        .pool_max_idle_per_host(options.pool_max_idle_per_host)
        .build()
        .map_err(|e| NetError::Client(e.to_string()))
}
