//! In-memory transport with scripted replies per URL.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use fragload_net::{
    ErrorResponse, LoadOutcome, LoadStats, LoadTarget, LoaderResponse, NetworkDetails, OnProgress,
    RangeSpec, RequestContext, Transport, TransportConfig, TransportFactory,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What the scripted server answers for a URL.
#[derive(Clone, Debug)]
pub enum Reply {
    Body(Bytes),
    Status(u16),
    Timeout,
    /// Never completes; only an abort ends the request.
    Hang,
}

#[derive(Clone, Debug)]
struct Scripted {
    delay: Duration,
    reply: Reply,
}

/// A request observed by a [`ScriptedTransport`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub url: Url,
    pub range: Option<RangeSpec>,
    pub target: Option<LoadTarget>,
    pub config: TransportConfig,
}

#[derive(Default)]
struct Shared {
    replies: Mutex<HashMap<Url, Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
    instances: AtomicUsize,
    in_flight: AtomicUsize,
    aborts: AtomicUsize,
}

/// Script shared by every transport created from [`ScriptedNetwork::factory`].
///
/// Unscripted URLs answer `404`.
#[derive(Clone, Default)]
pub struct ScriptedNetwork {
    shared: Arc<Shared>,
}

impl ScriptedNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, url: &Url, reply: Reply) -> &Self {
        self.reply_after(url, Duration::ZERO, reply)
    }

    pub fn reply_after(&self, url: &Url, delay: Duration, reply: Reply) -> &Self {
        self.shared
            .replies
            .lock()
            .insert(url.clone(), Scripted { delay, reply });
        self
    }

    #[must_use]
    pub fn transport(&self) -> ScriptedTransport {
        self.shared.instances.fetch_add(1, Ordering::SeqCst);
        ScriptedTransport {
            shared: Arc::clone(&self.shared),
            cancel: CancellationToken::new(),
            stats: Mutex::new(LoadStats::default()),
        }
    }

    #[must_use]
    pub fn factory(&self) -> TransportFactory {
        let network = self.clone();
        Arc::new(move || Arc::new(network.transport()) as Arc<dyn Transport>)
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().clone()
    }

    #[must_use]
    pub fn requested_urls(&self) -> Vec<Url> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    /// Number of transports created so far.
    #[must_use]
    pub fn instances(&self) -> usize {
        self.shared.instances.load(Ordering::SeqCst)
    }

    /// Requests started but not yet settled (or dropped).
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Number of `abort` calls received by any transport.
    #[must_use]
    pub fn aborts(&self) -> usize {
        self.shared.aborts.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ScriptedTransport {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    stats: Mutex<LoadStats>,
}

impl ScriptedTransport {
    fn slice(body: &Bytes, range: Option<&RangeSpec>) -> Bytes {
        let Some(range) = range else {
            return body.clone();
        };
        let len = body.len() as u64;
        let start = range.start.min(len);
        let end = range.end.map_or(len, |end| (end + 1).min(len)).max(start);
        body.slice(usize::try_from(start).unwrap_or(0)..usize::try_from(end).unwrap_or(0))
    }
}

async fn settle(delay: Duration, reply: &Reply) {
    if matches!(reply, Reply::Hang) {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(delay).await;
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn load(
        &self,
        context: &RequestContext,
        config: &TransportConfig,
        on_progress: Option<&mut OnProgress<'_>>,
    ) -> LoadOutcome {
        self.shared.requests.lock().push(RecordedRequest {
            url: context.url.clone(),
            range: context.range.clone(),
            target: context.target,
            config: config.clone(),
        });
        let scripted = self
            .shared
            .replies
            .lock()
            .get(&context.url)
            .cloned()
            .unwrap_or(Scripted {
                delay: Duration::ZERO,
                reply: Reply::Status(404),
            });

        *self.stats.lock() = LoadStats::started();
        let _in_flight = InFlight::enter(&self.shared.in_flight);
        let details = NetworkDetails::for_url(&context.url);

        let completed = tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = settle(scripted.delay, &scripted.reply) => true,
        };
        if !completed {
            let mut stats = self.stats.lock();
            stats.aborted = true;
            return LoadOutcome::Aborted {
                stats: *stats,
                details,
            };
        }

        match scripted.reply {
            Reply::Body(body) => {
                let body = Self::slice(&body, context.range.as_ref());
                let stats = {
                    let mut stats = self.stats.lock();
                    stats.total = body.len() as u64;
                    stats.record_chunk(body.len());
                    stats.finish();
                    *stats
                };
                let data = match on_progress {
                    Some(on_progress) => {
                        let step = config.high_water_mark.max(1);
                        let mut offset = 0;
                        while offset < body.len() {
                            let end = (offset + step).min(body.len());
                            on_progress(&stats, body.slice(offset..end), &details);
                            offset = end;
                        }
                        Bytes::new()
                    }
                    None => body,
                };
                LoadOutcome::Success {
                    response: LoaderResponse {
                        url: context.url.clone(),
                        data,
                    },
                    stats,
                    details,
                }
            }
            Reply::Status(code) => LoadOutcome::Error {
                response: ErrorResponse {
                    code,
                    text: format!("scripted status {code}"),
                },
                details: NetworkDetails {
                    status: Some(code),
                    ..details
                },
            },
            Reply::Timeout => LoadOutcome::Timeout {
                stats: self.stats(),
                details,
            },
            Reply::Hang => unreachable!("hanging reply only settles through abort"),
        }
    }

    fn abort(&self) {
        self.shared.aborts.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
    }

    fn stats(&self) -> LoadStats {
        *self.stats.lock()
    }
}
