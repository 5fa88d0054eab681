pub mod handle;

use crate::error::PlaybackError;
use crate::playback::controller::PlaybackState;
use crate::playback::engine::SeekRequestId;
use crate::playback::stream_model::{StreamKind, Thresholds};
use crate::playback::time_range::TimeRange;
pub use handle::PlaybackProgressHandle;
use std::time::Duration;

/// Progress updates published by the playback controller
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackProgress {
    StateChanged {
        state: PlaybackState,
    },
    /// New position and seekable range, already classified
    TimeUpdate {
        time: Duration,
        range: TimeRange,
        kind: StreamKind,
        is_live: bool,
        /// Thresholds `kind` and `is_live` were derived with
        thresholds: Thresholds,
    },
    BufferedRangeChanged {
        buffered: TimeRange,
        seekable: TimeRange,
    },
    /// The controller accepted a seek and is waiting for the engine
    SeekStarted {
        request: SeekRequestId,
        /// Position the seek started from. Chained seeks keep the position
        /// of the first one.
        from: Duration,
        target: Duration,
    },
    SeekCompleted {
        request: SeekRequestId,
        time: Duration,
        finished: bool,
    },
    /// Engine error, reported once
    Error {
        error: PlaybackError,
    },
    /// A command sent through the handle was refused by the controller
    CommandRejected {
        error: PlaybackError,
    },
}
