pub mod controller;
pub mod engine;
pub mod progress;
pub mod service;
pub mod stream_model;
pub mod time_range;

pub use controller::{PlaybackController, PlaybackSnapshot, PlaybackState};
pub use engine::{
    engine_channel, EngineEvent, EngineEventSender, EngineSample, MediaEngine, SeekRequestId,
};
pub use progress::{PlaybackProgress, PlaybackProgressHandle};
pub use service::{PlaybackCommand, PlaybackHandle, PlaybackService};
pub use stream_model::{classify, is_live, RangeAdvanceDetector, StreamKind, Thresholds};
pub use time_range::TimeRange;
