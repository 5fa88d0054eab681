use super::time_range::TimeRange;
use crate::error::ErrorInfo;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;

/// Identifies a seek request. Ids grow monotonically, so the latest request
/// always carries the largest id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SeekRequestId(pub u64);

impl fmt::Display for SeekRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seek#{}", self.0)
    }
}

/// Periodic sample pushed by the engine adapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSample {
    pub position: Duration,
    pub buffered: TimeRange,
    pub seekable: TimeRange,
    /// Whether the end of the seekable range tracks real time. `None` when
    /// the adapter cannot tell; the controller then infers it from
    /// successive samples.
    pub range_advancing: Option<bool>,
}

impl EngineSample {
    /// Sample for fixed-length media fully buffered up to `position`
    pub fn on_demand(position: Duration, seekable: TimeRange) -> Self {
        Self {
            position,
            buffered: TimeRange::new(seekable.start, position),
            seekable,
            range_advancing: Some(false),
        }
    }

    /// Sample for a stream whose window end tracks real time
    pub fn advancing(position: Duration, seekable: TimeRange) -> Self {
        Self {
            position,
            buffered: TimeRange::new(seekable.start, position),
            seekable,
            range_advancing: Some(true),
        }
    }

    pub fn with_buffered(mut self, buffered: TimeRange) -> Self {
        self.buffered = buffered;
        self
    }
}

/// Events delivered by the engine adapter, in order
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Media loaded and ready to play
    Ready { seekable: TimeRange },
    LoadFailed(ErrorInfo),
    Sample(EngineSample),
    /// Acknowledges the real playing status after a play or pause request
    PlayingChanged(bool),
    SeekCompleted {
        request: SeekRequestId,
        finished: bool,
    },
    Ended,
    Error(ErrorInfo),
}

/// Adapter around the actual media engine.
///
/// All operations are fire-and-forget: results come back later as
/// [`EngineEvent`]s on the channel returned by [`engine_channel`].
pub trait MediaEngine: Send {
    fn load(&mut self, url: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, time: Duration, request: SeekRequestId);
    /// Cancel an outstanding seek. Its completion must not be reported
    /// after the completion of a request superseding it.
    fn cancel_seek(&mut self, request: SeekRequestId);
    /// Release the current item
    fn reset(&mut self);
}

impl<E: MediaEngine + ?Sized> MediaEngine for Box<E> {
    fn load(&mut self, url: &str) {
        (**self).load(url)
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn seek(&mut self, time: Duration, request: SeekRequestId) {
        (**self).seek(time, request)
    }

    fn cancel_seek(&mut self, request: SeekRequestId) {
        (**self).cancel_seek(request)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Sender half handed to the engine adapter
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    tx: tokio_mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEventSender {
    /// Push an event. Returns false once the playback service is gone.
    pub fn send(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn sample(&self, sample: EngineSample) -> bool {
        self.send(EngineEvent::Sample(sample))
    }
}

/// Create the channel engine events travel on
pub fn engine_channel() -> (
    EngineEventSender,
    tokio_mpsc::UnboundedReceiver<EngineEvent>,
) {
    let (tx, rx) = tokio_mpsc::unbounded_channel();
    (EngineEventSender { tx }, rx)
}
