#![forbid(unsafe_code)]

//! Fragment, part and part-list model shared with the playlist layer.

use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};

use fragload_net::{LoadStats, Transport};
use parking_lot::Mutex;
use url::Url;

/// One media segment of a variant playlist.
pub struct Fragment {
    /// Media sequence number.
    pub sn: u64,
    /// Variant (quality level) index.
    pub level: usize,
    /// `None` for a live hint fragment whose URL is not resolved yet.
    pub url: Option<Url>,
    pub start: Duration,
    pub duration: Duration,
    pub byte_range_start_offset: Option<u64>,
    /// Exclusive end offset.
    pub byte_range_end_offset: Option<u64>,
    /// Marked `EXT-X-GAP`: there is nothing to fetch.
    pub gap: bool,
    stats: Mutex<LoadStats>,
    loader: Mutex<Option<Arc<dyn Transport>>>,
}

impl Fragment {
    #[must_use]
    pub fn new(sn: u64, start: Duration, duration: Duration) -> Self {
        Self {
            sn,
            level: 0,
            url: None,
            start,
            duration,
            byte_range_start_offset: None,
            byte_range_end_offset: None,
            gap: false,
            stats: Mutex::new(LoadStats::default()),
            loader: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_byte_range(mut self, start: u64, end: u64) -> Self {
        self.byte_range_start_offset = Some(start);
        self.byte_range_end_offset = Some(end);
        self
    }

    #[must_use]
    pub fn with_gap(mut self, gap: bool) -> Self {
        self.gap = gap;
        self
    }

    #[must_use]
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }

    #[must_use]
    pub fn stats(&self) -> LoadStats {
        *self.stats.lock()
    }

    pub fn update_stats<R>(&self, f: impl FnOnce(&mut LoadStats) -> R) -> R {
        f(&mut self.stats.lock())
    }

    /// Whether a transport is currently loading this fragment.
    #[must_use]
    pub fn has_loader(&self) -> bool {
        self.loader.lock().is_some()
    }

    pub(crate) fn attach_loader(&self, transport: Arc<dyn Transport>) {
        *self.loader.lock() = Some(transport);
    }

    /// Drop the association with `transport`, leaving a newer one in place.
    pub(crate) fn detach_loader(&self, transport: &Arc<dyn Transport>) {
        let mut loader = self.loader.lock();
        if loader
            .as_ref()
            .is_some_and(|current| same_transport(current, transport))
        {
            *loader = None;
        }
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("sn", &self.sn)
            .field("level", &self.level)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("start", &self.start)
            .field("duration", &self.duration)
            .field("byte_range_start_offset", &self.byte_range_start_offset)
            .field("byte_range_end_offset", &self.byte_range_end_offset)
            .field("gap", &self.gap)
            .field("has_loader", &self.has_loader())
            .finish_non_exhaustive()
    }
}

/// A low-latency sub-unit of a fragment.
pub struct Part {
    /// Position within the owning fragment.
    pub index: usize,
    pub url: Url,
    pub start: Duration,
    pub duration: Duration,
    /// Decodable without the preceding parts of the fragment.
    pub independent: bool,
    pub gap: bool,
    pub byte_range_start_offset: Option<u64>,
    pub byte_range_end_offset: Option<u64>,
    fragment: Weak<Fragment>,
    stats: Mutex<LoadStats>,
}

impl Part {
    #[must_use]
    pub fn new(
        fragment: &Arc<Fragment>,
        index: usize,
        url: Url,
        start: Duration,
        duration: Duration,
    ) -> Self {
        Self {
            index,
            url,
            start,
            duration,
            independent: false,
            gap: false,
            byte_range_start_offset: None,
            byte_range_end_offset: None,
            fragment: Arc::downgrade(fragment),
            stats: Mutex::new(LoadStats::default()),
        }
    }

    #[must_use]
    pub fn with_independent(mut self, independent: bool) -> Self {
        self.independent = independent;
        self
    }

    #[must_use]
    pub fn with_gap(mut self, gap: bool) -> Self {
        self.gap = gap;
        self
    }

    #[must_use]
    pub fn with_byte_range(mut self, start: u64, end: u64) -> Self {
        self.byte_range_start_offset = Some(start);
        self.byte_range_end_offset = Some(end);
        self
    }

    /// Identity check against the owning fragment.
    #[must_use]
    pub fn belongs_to(&self, fragment: &Arc<Fragment>) -> bool {
        std::ptr::eq(self.fragment.as_ptr(), Arc::as_ptr(fragment))
    }

    #[must_use]
    pub fn fragment(&self) -> Option<Arc<Fragment>> {
        self.fragment.upgrade()
    }

    #[must_use]
    pub fn stats(&self) -> LoadStats {
        *self.stats.lock()
    }

    pub fn set_stats(&self, stats: LoadStats) {
        *self.stats.lock() = stats;
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("index", &self.index)
            .field("url", &self.url.as_str())
            .field("start", &self.start)
            .field("duration", &self.duration)
            .field("independent", &self.independent)
            .field("gap", &self.gap)
            .finish_non_exhaustive()
    }
}

/// Live-window view of a variant playlist, as far as loading is concerned.
#[derive(Clone, Debug, Default)]
pub struct LevelDetails {
    /// Parts of the playlist window in playback order, possibly spanning
    /// several fragments.
    pub partial_fragments: Option<Vec<Arc<Part>>>,
}

impl LevelDetails {
    #[must_use]
    pub fn with_parts(parts: Vec<Arc<Part>>) -> Self {
        Self {
            partial_fragments: Some(parts),
        }
    }

    #[must_use]
    pub fn part_list(&self) -> Option<&[Arc<Part>]> {
        self.partial_fragments.as_deref()
    }
}

pub(crate) fn same_transport(a: &Arc<dyn Transport>, b: &Arc<dyn Transport>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}
