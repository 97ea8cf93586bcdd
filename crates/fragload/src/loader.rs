//! Fragment loader: one network operation per instance at a time.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use fragload_net::{
    HttpTransport, LoadOutcome, LoadStats, NetResult, NetworkDetails, OnProgress, RequestContext,
    Transport, TransportFactory,
};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    chain::load_part_chain,
    config::FragmentLoaderConfig,
    context::fragment_request,
    error::{ErrorDetails, FragResult, LoadError},
    fragment::{Fragment, LevelDetails, Part, same_transport},
    loaded::{FragmentLoaded, LoadedData, ProgressCallback},
    parts::find_independent_part,
    watchdog::Watchdog,
};

struct ActiveLoad {
    transport: Arc<dyn Transport>,
    watchdog: Option<Watchdog>,
}

impl ActiveLoad {
    fn cancel(self) {
        if let Some(watchdog) = self.watchdog {
            watchdog.disarm();
        }
        self.transport.abort();
    }
}

/// Releases a load's transport once the load settles, or when its future is
/// dropped first, in which case the transport is aborted as well.
struct LoadGuard<'a> {
    loader: &'a FragmentLoader,
    frag: &'a Fragment,
    transport: Arc<dyn Transport>,
    settled: bool,
}

impl LoadGuard<'_> {
    /// The transport reached a terminal outcome or was never used.
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(sn = self.frag.sn, "fragload: load dropped before settling");
            self.transport.abort();
        }
        self.loader.reset_loader(self.frag, &self.transport);
    }
}

/// Loads fragments whole or as chains of low-latency parts.
///
/// Starting a load preempts the previous one, which settles with an
/// [`ErrorDetails::InternalAborted`] rejection.
pub struct FragmentLoader {
    config: FragmentLoaderConfig,
    factory: TransportFactory,
    active: Mutex<Option<ActiveLoad>>,
}

impl FragmentLoader {
    /// # Errors
    ///
    /// Fails only when no transport factory is configured and the built-in
    /// HTTP client cannot be created.
    pub fn new(config: FragmentLoaderConfig) -> NetResult<Self> {
        let factory = match config.f_loader.clone().or_else(|| config.loader.clone()) {
            Some(factory) => factory,
            None => HttpTransport::factory(&config.net)?,
        };
        Ok(Self {
            config,
            factory,
            active: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn config(&self) -> &FragmentLoaderConfig {
        &self.config
    }

    /// Whether a transport is currently tracked by this loader.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Load `frag`, as parts when `details` lists some and `on_progress` is
    /// given, otherwise with a single request.
    ///
    /// `target_buffer_time` picks the independent part to start from; it
    /// defaults to, and is clamped to, the fragment start. Resolves `None`
    /// when a hint fragment has no independent part published yet.
    ///
    /// # Errors
    ///
    /// Every failure is a non-fatal [`LoadError`]; see [`ErrorDetails`].
    pub async fn load(
        &self,
        frag: &Arc<Fragment>,
        details: Option<&LevelDetails>,
        target_buffer_time: Option<Duration>,
        mut on_progress: Option<ProgressCallback>,
    ) -> FragResult<Option<FragmentLoaded>> {
        let part_list = details
            .and_then(LevelDetails::part_list)
            .filter(|_| on_progress.is_some());

        if frag.gap {
            return Err(LoadError::gap(frag, None));
        }
        if frag.url.is_none() && part_list.is_none() {
            return Err(LoadError::new(
                ErrorDetails::FragLoadError,
                frag,
                "Fragment does not have a url or part list",
            ));
        }

        let guard = self.start_transport(frag);
        let transport = Arc::clone(&guard.transport);
        debug!(sn = frag.sn, level = frag.level, parts = part_list.is_some(), "fragload: load start");

        if let (Some(parts), Some(on_progress)) = (part_list, on_progress.as_mut()) {
            let target = target_buffer_time.unwrap_or(frag.start).max(frag.start);
            if let Some(start) = find_independent_part(parts, frag, target) {
                return self
                    .load_parts(guard, &transport, frag, parts, start, on_progress)
                    .await
                    .map(Some);
            }
            if frag.url.is_none() {
                debug!(sn = frag.sn, "fragload: no independent part published yet");
                guard.settle();
                return Ok(None);
            }
        }

        let Some(request) = fragment_request(frag) else {
            guard.settle();
            return Err(LoadError::new(
                ErrorDetails::FragLoadError,
                frag,
                "Fragment does not have a url",
            ));
        };
        self.load_whole(guard, &transport, frag, &request, on_progress.as_mut())
            .await
            .map(Some)
    }

    /// Ask the active transport to abort. Its load settles through the
    /// regular rejection path.
    pub fn abort(&self) {
        let transport = self
            .active
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.transport));
        if let Some(transport) = transport {
            debug!("fragload: abort");
            transport.abort();
        }
    }

    /// Abort and detach the active transport.
    pub fn destroy(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            debug!("fragload: destroy");
            active.cancel();
        }
    }

    fn start_transport<'a>(&'a self, frag: &'a Fragment) -> LoadGuard<'a> {
        let transport = (self.factory)();
        frag.attach_loader(Arc::clone(&transport));
        let previous = self.active.lock().replace(ActiveLoad {
            transport: Arc::clone(&transport),
            watchdog: None,
        });
        if let Some(previous) = previous {
            debug!(sn = frag.sn, "fragload: preempting active load");
            previous.cancel();
        }
        LoadGuard {
            loader: self,
            frag,
            transport,
            settled: false,
        }
    }

    /// Detach `transport` from `frag`; stop tracking it (and its watchdog)
    /// only if it is still the active one.
    fn reset_loader(&self, frag: &Fragment, transport: &Arc<dyn Transport>) {
        frag.detach_loader(transport);
        let mut active = self.active.lock();
        if active
            .as_ref()
            .is_some_and(|current| same_transport(&current.transport, transport))
        {
            if let Some(watchdog) = active.take().and_then(|current| current.watchdog) {
                watchdog.disarm();
            }
        }
    }

    fn arm_watchdog(&self, transport: &Arc<dyn Transport>) -> Watchdog {
        let watchdog = Watchdog::arm(self.config.frag_loading_timeout);
        if let Some(active) = self
            .active
            .lock()
            .as_mut()
            .filter(|current| same_transport(&current.transport, transport))
        {
            active.watchdog = Some(watchdog.clone());
        }
        watchdog
    }

    async fn load_parts(
        &self,
        guard: LoadGuard<'_>,
        transport: &Arc<dyn Transport>,
        frag: &Arc<Fragment>,
        parts: &[Arc<Part>],
        start: usize,
        on_progress: &mut ProgressCallback,
    ) -> FragResult<FragmentLoaded> {
        let config = self.config.transport_config();
        let watchdog = self.arm_watchdog(transport);
        trace!(sn = frag.sn, start_part = parts[start].index, "fragload: part chain start");

        let result = tokio::select! {
            biased;
            res = load_part_chain(transport.as_ref(), frag, parts, start, &config, on_progress.as_mut()) => res,
            () = watchdog.expired() => Err(LoadError::timed_out(frag, None, None)),
        };
        guard.settle();

        if let Err(err) = &result {
            warn!(sn = frag.sn, details = %err.details, reason = %err.reason, "fragload: part chain failed");
        }
        result.map(|parts| FragmentLoaded::Parts {
            frag: Arc::clone(frag),
            parts,
        })
    }

    async fn load_whole(
        &self,
        guard: LoadGuard<'_>,
        transport: &Arc<dyn Transport>,
        frag: &Arc<Fragment>,
        request: &RequestContext,
        on_progress: Option<&mut ProgressCallback>,
    ) -> FragResult<FragmentLoaded> {
        let config = self.config.transport_config();
        let mut forward = on_progress.map(|on_progress| {
            move |stats: &LoadStats, chunk: Bytes, details: &NetworkDetails| {
                frag.update_stats(|frag_stats| *frag_stats = *stats);
                on_progress(LoadedData {
                    frag: Arc::clone(frag),
                    part: None,
                    payload: chunk,
                    network_details: details.clone(),
                });
            }
        });

        let outcome = transport
            .load(
                request,
                &config,
                forward.as_mut().map(|f| f as &mut OnProgress<'_>),
            )
            .await;
        guard.settle();
        if let Some(stats) = outcome.stats() {
            frag.update_stats(|frag_stats| *frag_stats = *stats);
        }

        match outcome {
            LoadOutcome::Success { stats, .. } => {
                debug!(sn = frag.sn, bytes = stats.loaded, "fragload: fragment loaded");
                Ok(FragmentLoaded::Whole {
                    frag: Arc::clone(frag),
                })
            }
            LoadOutcome::Error { response, details } => {
                warn!(sn = frag.sn, code = response.code, "fragload: fragment request failed");
                Err(LoadError::request_failed(frag, None, response, details))
            }
            LoadOutcome::Timeout { details, .. } => {
                warn!(sn = frag.sn, "fragload: fragment request timed out");
                Err(LoadError::timed_out(frag, None, Some(details)))
            }
            LoadOutcome::Aborted { details, .. } => {
                debug!(sn = frag.sn, "fragload: fragment request aborted");
                Err(LoadError::aborted(frag, None, "Loader aborted", Some(details)))
            }
        }
    }
}

impl Drop for FragmentLoader {
    fn drop(&mut self) {
        self.destroy();
    }
}
