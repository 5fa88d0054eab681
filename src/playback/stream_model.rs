use super::time_range::TimeRange;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default distance from the live edge still considered live
pub const DEFAULT_LIVE_TOLERANCE: Duration = Duration::from_secs(30);

/// Kind of stream being played, derived from the seekable range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    /// Live stream without a usable DVR window
    Live,
    /// Live stream with a window the user can seek back into
    Dvr,
    /// Fixed-length media
    OnDemand,
}

impl StreamKind {
    pub fn is_live_or_dvr(&self) -> bool {
        matches!(self, StreamKind::Live | StreamKind::Dvr)
    }
}

/// Tolerances used to classify streams and live positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// A DVR position within this distance of the live edge is live
    pub live_tolerance: Duration,
    /// A live window must be longer than this to be considered DVR
    pub minimum_dvr_window_length: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            live_tolerance: DEFAULT_LIVE_TOLERANCE,
            minimum_dvr_window_length: Duration::ZERO,
        }
    }
}

/// Classify a stream from its seekable range.
///
/// `advancing` tells whether the end of the range tracks real time. A static
/// range is always on-demand, whatever its length.
pub fn classify(range: &TimeRange, advancing: bool, thresholds: &Thresholds) -> StreamKind {
    if !advancing {
        return StreamKind::OnDemand;
    }

    match range.length() {
        Some(length) if length > thresholds.minimum_dvr_window_length => StreamKind::Dvr,
        // Indefinite or too short a window to seek into
        _ => StreamKind::Live,
    }
}

/// Whether `position` is played in live conditions.
///
/// Live-ness is about proximity to the live edge: a DVR stream scrubbed back
/// past the tolerance is not live anymore.
pub fn is_live(
    position: Duration,
    range: &TimeRange,
    kind: StreamKind,
    thresholds: &Thresholds,
) -> bool {
    if range.is_empty() || !kind.is_live_or_dvr() {
        return false;
    }

    match range.end {
        Some(end) => end.saturating_sub(position) <= thresholds.live_tolerance,
        None => true,
    }
}

/// Infers whether a seekable range advances when the engine adapter cannot
/// say so itself.
///
/// Decides from two samples. Once a range was seen advancing, a single sample
/// with an unchanged end does not flip the decision: two stalls in a row are
/// needed.
#[derive(Debug, Default, Clone)]
pub struct RangeAdvanceDetector {
    last_end: Option<Option<Duration>>,
    advancing: bool,
    stalls: u8,
}

impl RangeAdvanceDetector {
    const STALLS_BEFORE_STATIC: u8 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a new seekable range and return the current decision
    pub fn observe(&mut self, range: &TimeRange) -> bool {
        let previous = self.last_end.replace(range.end);

        if range.is_indefinite() {
            self.mark_advancing();
            return self.advancing;
        }

        match previous {
            // First sample: nothing to compare against yet
            None => {}
            Some(Some(prev_end)) if range.end > Some(prev_end) => self.mark_advancing(),
            Some(None) => self.mark_advancing(),
            Some(_) => {
                self.stalls = self.stalls.saturating_add(1);
                if self.stalls >= Self::STALLS_BEFORE_STATIC || !self.advancing {
                    self.advancing = false;
                }
            }
        }

        self.advancing
    }

    /// Record an advancing decision supplied by the engine adapter, keeping
    /// the detector in sync for samples that arrive without one.
    pub fn record(&mut self, range: &TimeRange, advancing: bool) {
        self.last_end = Some(range.end);
        self.advancing = advancing;
        self.stalls = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn mark_advancing(&mut self) {
        self.advancing = true;
        self.stalls = 0;
    }
}
