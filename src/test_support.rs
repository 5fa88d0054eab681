// Test support utilities for both unit and integration tests

use crate::playback::engine::{MediaEngine, SeekRequestId};
use crate::scrubber::Seeker;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Call received by [`MockMediaEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Load(String),
    Play,
    Pause,
    Seek(Duration, SeekRequestId),
    CancelSeek(SeekRequestId),
    Reset,
}

/// Mock media engine for testing
///
/// Records every call instead of driving a real player. Clones share the
/// same call log, so a test can keep one clone while the controller owns
/// another. Events are pushed by the test itself.
#[derive(Clone, Default)]
pub struct MockMediaEngine {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl MockMediaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Seeks issued so far, in order
    pub fn seeks(&self) -> Vec<(Duration, SeekRequestId)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::Seek(time, request) => Some((time, request)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MediaEngine for MockMediaEngine {
    fn load(&mut self, url: &str) {
        self.record(EngineCall::Load(url.to_string()));
    }

    fn play(&mut self) {
        self.record(EngineCall::Play);
    }

    fn pause(&mut self) {
        self.record(EngineCall::Pause);
    }

    fn seek(&mut self, time: Duration, request: SeekRequestId) {
        self.record(EngineCall::Seek(time, request));
    }

    fn cancel_seek(&mut self, request: SeekRequestId) {
        self.record(EngineCall::CancelSeek(request));
    }

    fn reset(&mut self) {
        self.record(EngineCall::Reset);
    }
}

/// Seeker recording the requested times instead of seeking
#[derive(Clone, Default)]
pub struct RecordingSeeker {
    requests: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSeeker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<Duration> {
        self.requests.lock().unwrap().clone()
    }
}

impl Seeker for RecordingSeeker {
    fn request_seek(&mut self, time: Duration) -> bool {
        self.requests.lock().unwrap().push(time);
        true
    }
}
