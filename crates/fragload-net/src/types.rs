use std::{collections::HashMap, time::Duration};

use bytes::Bytes;
use url::Url;

/// Smallest chunk handed to a progress callback while streaming a body.
pub const MIN_CHUNK_SIZE: usize = 1 << 14;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.inner.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<HashMap<String, String>> for Headers {
    fn from(map: HashMap<String, String>) -> Self {
        Self { inner: map }
    }
}

/// Inclusive byte range sent as an HTTP `Range` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: Option<u64>,
}

impl RangeSpec {
    #[must_use]
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Range covering `[start, end)` playlist offsets.
    ///
    /// Playlist byte ranges use an exclusive end offset while the header is
    /// inclusive. An empty range degrades to an open-ended request.
    #[must_use]
    pub fn from_offsets(start: u64, end: u64) -> Self {
        if end > start {
            Self::new(start, Some(end - 1))
        } else {
            Self::new(start, None)
        }
    }

    #[must_use]
    pub fn to_header_value(&self) -> String {
        if let Some(end) = self.end {
            format!("bytes={}-{}", self.start, end)
        } else {
            format!("bytes={}-", self.start)
        }
    }
}

#[derive(Clone, Debug)]
pub struct NetOptions {
    /// Connect timeout for the underlying client. Request budgets come from
    /// [`TransportConfig::timeout`].
    pub connect_timeout: Duration,
    /// Max idle connections per host. Set to 0 to disable pooling and reduce memory.
    pub pool_max_idle_per_host: usize,
    /// Headers added to every request.
    pub headers: Option<Headers>,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 0,
            headers: None,
        }
    }
}

/// Expected body representation of a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseType {
    #[default]
    ArrayBuffer,
}

/// The fragment, and part if any, a request is issued for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadTarget {
    /// Media sequence number of the fragment.
    pub sn: u64,
    pub level: usize,
    /// `None` for a whole-fragment request.
    pub part: Option<usize>,
}

/// What a single transport request fetches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub url: Url,
    pub response_type: ResponseType,
    /// `None` requests the whole resource.
    pub range: Option<RangeSpec>,
    pub target: Option<LoadTarget>,
}

impl RequestContext {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            response_type: ResponseType::ArrayBuffer,
            range: None,
            target: None,
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: Option<RangeSpec>) -> Self {
        self.range = range;
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: LoadTarget) -> Self {
        self.target = Some(target);
        self
    }
}

/// Per-attempt parameters handed to a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub max_retry: u32,
    pub retry_delay: Duration,
    /// Passed through to the transport; unused by the fragment loader.
    pub max_retry_delay: Duration,
    /// Minimum number of buffered bytes before a progress chunk is emitted.
    pub high_water_mark: usize,
}

impl TransportConfig {
    /// Config for a request that must not be retried by the transport.
    #[must_use]
    pub fn single_attempt(timeout: Duration, max_retry_delay: Duration) -> Self {
        Self {
            timeout,
            max_retry: 0,
            retry_delay: Duration::ZERO,
            max_retry_delay,
            high_water_mark: MIN_CHUNK_SIZE,
        }
    }

    #[must_use]
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }
}

/// Diagnostics about the underlying request, passed through untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkDetails {
    pub url: Option<Url>,
    pub status: Option<u16>,
    pub headers: Headers,
}

impl NetworkDetails {
    #[must_use]
    pub fn for_url(url: &Url) -> Self {
        Self {
            url: Some(url.clone()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoaderResponse {
    pub url: Url,
    pub data: Bytes,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorResponse {
    /// HTTP status, or `0` when the request never got one.
    pub code: u16,
    pub text: String,
}
