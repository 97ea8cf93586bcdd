#![forbid(unsafe_code)]

use std::{fmt, time::Duration};

use fragload_net::{MIN_CHUNK_SIZE, NetOptions, TransportConfig, TransportFactory};

/// Configuration for [`crate::FragmentLoader`].
#[derive(Clone)]
pub struct FragmentLoaderConfig {
    /// Budget for a whole-fragment request, and for a whole part chain.
    pub frag_loading_timeout: Duration,
    /// Passed through to transports as `max_retry_delay`.
    pub frag_loading_max_retry_timeout: Duration,
    /// Minimum chunk size for progressive delivery.
    pub min_chunk_size: usize,
    /// Fragment-specific transport factory. Takes precedence over `loader`.
    pub f_loader: Option<TransportFactory>,
    /// General transport factory.
    pub loader: Option<TransportFactory>,
    /// Options for the built-in HTTP transport, used when no factory is set.
    pub net: NetOptions,
}

impl Default for FragmentLoaderConfig {
    fn default() -> Self {
        Self {
            frag_loading_timeout: Duration::from_secs(20),
            frag_loading_max_retry_timeout: Duration::from_secs(64),
            min_chunk_size: MIN_CHUNK_SIZE,
            f_loader: None,
            loader: None,
            net: NetOptions::default(),
        }
    }
}

impl fmt::Debug for FragmentLoaderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentLoaderConfig")
            .field("frag_loading_timeout", &self.frag_loading_timeout)
            .field(
                "frag_loading_max_retry_timeout",
                &self.frag_loading_max_retry_timeout,
            )
            .field("min_chunk_size", &self.min_chunk_size)
            .field("f_loader", &self.f_loader.as_ref().map(|_| "TransportFactory"))
            .field("loader", &self.loader.as_ref().map(|_| "TransportFactory"))
            .field("net", &self.net)
            .finish()
    }
}

impl FragmentLoaderConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the load timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.frag_loading_timeout = timeout;
        self
    }

    /// Set the max retry delay passed through to transports.
    #[must_use]
    pub fn with_max_retry_timeout(mut self, timeout: Duration) -> Self {
        self.frag_loading_max_retry_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_min_chunk_size(mut self, size: usize) -> Self {
        self.min_chunk_size = size;
        self
    }

    /// Set the fragment-specific transport factory.
    #[must_use]
    pub fn with_f_loader(mut self, factory: TransportFactory) -> Self {
        self.f_loader = Some(factory);
        self
    }

    /// Set the general transport factory.
    #[must_use]
    pub fn with_loader(mut self, factory: TransportFactory) -> Self {
        self.loader = Some(factory);
        self
    }

    /// Set network options for the built-in HTTP transport.
    #[must_use]
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    /// Per-request transport config. Retries are never delegated to the
    /// transport.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::single_attempt(
            self.frag_loading_timeout,
            self.frag_loading_max_retry_timeout,
        )
        .with_high_water_mark(self.min_chunk_size)
    }
}
