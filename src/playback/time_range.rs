use std::time::Duration;

/// A span of media time reported by the engine (seekable or buffered).
///
/// `end == None` means the range is indefinite: the engine knows where it
/// starts but cannot tell where it ends yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRange {
    pub start: Duration,
    pub end: Option<Duration>,
}

impl TimeRange {
    /// Create a finite range. An `end` before `start` is pulled up to `start`.
    pub fn new(start: Duration, end: Duration) -> Self {
        Self {
            start,
            end: Some(end.max(start)),
        }
    }

    /// Range with no extent, as reported before anything is loaded
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn indefinite(start: Duration) -> Self {
        Self { start, end: None }
    }

    /// Convenience constructor used heavily in tests
    pub fn from_secs(start: u64, end: u64) -> Self {
        Self::new(Duration::from_secs(start), Duration::from_secs(end))
    }

    pub fn is_empty(&self) -> bool {
        self.end == Some(self.start)
    }

    pub fn is_indefinite(&self) -> bool {
        self.end.is_none()
    }

    /// Length of the range, `None` when indefinite
    pub fn length(&self) -> Option<Duration> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    /// Length of a finite, non-empty range. This is the only range a bounded
    /// control value can be mapped onto.
    pub fn measurable_length(&self) -> Option<Duration> {
        self.length().filter(|length| !length.is_zero())
    }

    pub fn contains(&self, time: Duration) -> bool {
        time >= self.start && self.end.map_or(true, |end| time <= end)
    }

    /// Clamp `time` to the nearer bound of the range
    pub fn clamp(&self, time: Duration) -> Duration {
        let time = time.max(self.start);
        match self.end {
            Some(end) => time.min(end),
            None => time,
        }
    }
}
