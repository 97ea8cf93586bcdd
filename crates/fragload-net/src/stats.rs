use std::time::Instant;

/// Timing marks of a load. `None` means the mark was never reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadingTiming {
    pub start: Option<Instant>,
    pub first: Option<Instant>,
    pub end: Option<Instant>,
}

/// Progress and timing counters of one request, fragment or part.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub loaded: u64,
    /// Expected size in bytes, `0` while unknown.
    pub total: u64,
    pub aborted: bool,
    pub loading: LoadingTiming,
}

impl LoadStats {
    /// Stats of a request that starts now.
    #[must_use]
    pub fn started() -> Self {
        Self {
            loading: LoadingTiming {
                start: Some(Instant::now()),
                ..LoadingTiming::default()
            },
            ..Self::default()
        }
    }

    /// Account for `len` body bytes, stamping the first-byte mark once.
    pub fn record_chunk(&mut self, len: usize) {
        if self.loading.first.is_none() {
            self.loading.first = Some(Instant::now());
        }
        self.loaded += len as u64;
    }

    pub fn finish(&mut self) {
        let now = Instant::now();
        if self.loading.first.is_none() {
            self.loading.first = Some(now);
        }
        self.loading.end = Some(now);
    }
}
