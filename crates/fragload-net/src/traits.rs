use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    stats::LoadStats,
    types::{ErrorResponse, LoaderResponse, NetworkDetails, RequestContext, TransportConfig},
};

/// Progress hook invoked for every chunk a transport delivers.
pub type OnProgress<'a> = dyn FnMut(&LoadStats, Bytes, &NetworkDetails) + Send + 'a;

/// Terminal result of a single transport request.
#[derive(Clone, Debug)]
pub enum LoadOutcome {
    Success {
        response: LoaderResponse,
        stats: LoadStats,
        details: NetworkDetails,
    },
    Error {
        response: ErrorResponse,
        details: NetworkDetails,
    },
    Timeout {
        stats: LoadStats,
        details: NetworkDetails,
    },
    Aborted {
        stats: LoadStats,
        details: NetworkDetails,
    },
}

impl LoadOutcome {
    /// Stats reported with the outcome, if the variant carries them.
    #[must_use]
    pub fn stats(&self) -> Option<&LoadStats> {
        match self {
            Self::Success { stats, .. } | Self::Timeout { stats, .. } | Self::Aborted { stats, .. } => {
                Some(stats)
            }
            Self::Error { .. } => None,
        }
    }

    #[must_use]
    pub fn details(&self) -> &NetworkDetails {
        match self {
            Self::Success { details, .. }
            | Self::Error { details, .. }
            | Self::Timeout { details, .. }
            | Self::Aborted { details, .. } => details,
        }
    }
}

/// A network loader performing one request per instance.
///
/// `abort` is cooperative: it never cancels synchronously, an in-flight
/// [`Transport::load`] resolves with [`LoadOutcome::Aborted`] instead.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn load(
        &self,
        context: &RequestContext,
        config: &TransportConfig,
        on_progress: Option<&mut OnProgress<'_>>,
    ) -> LoadOutcome;

    fn abort(&self);

    /// Snapshot of the stats of the current (or last) request.
    fn stats(&self) -> LoadStats;
}

/// Creates a fresh transport for every load attempt.
pub type TransportFactory = Arc<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;
