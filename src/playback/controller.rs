use crate::error::{ErrorInfo, PlaybackError};
use crate::playback::engine::{EngineEvent, EngineSample, MediaEngine, SeekRequestId};
use crate::playback::progress::PlaybackProgress;
use crate::playback::stream_model::{self, RangeAdvanceDetector, StreamKind, Thresholds};
use crate::playback::time_range::TimeRange;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{debug, error, info, warn};

/// Playback lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Preparing,
    Ready,
    Playing,
    Paused,
    Seeking,
    Ended,
    Failed(ErrorInfo),
}

impl PlaybackState {
    /// Ended and failed items stay put until a new load
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Ended | PlaybackState::Failed(_))
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Preparing => write!(f, "preparing"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Seeking => write!(f, "seeking"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::Failed(info) => write!(f, "failed ({})", info),
        }
    }
}

/// State a seek returns to once it completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumeState {
    Playing,
    Paused,
}

impl From<ResumeState> for PlaybackState {
    fn from(resume: ResumeState) -> Self {
        match resume {
            ResumeState::Playing => PlaybackState::Playing,
            ResumeState::Paused => PlaybackState::Paused,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    request: SeekRequestId,
    target: Duration,
    start_time: Duration,
}

/// Consistent view of the controller after an update
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub time: Duration,
    pub range: TimeRange,
    pub buffered: TimeRange,
    pub kind: StreamKind,
    pub is_live: bool,
    pub seek_start: Option<Duration>,
    pub seek_target: Option<Duration>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            time: Duration::ZERO,
            range: TimeRange::empty(),
            buffered: TimeRange::empty(),
            kind: StreamKind::OnDemand,
            is_live: false,
            seek_start: None,
            seek_target: None,
        }
    }
}

/// Playback state machine sitting on top of a media engine.
///
/// Single owner: every operation and engine event goes through `&mut self`,
/// in delivery order. Changes are published on the progress channel.
pub struct PlaybackController<E: MediaEngine> {
    engine: E,
    progress_tx: tokio_mpsc::UnboundedSender<PlaybackProgress>,
    thresholds: Thresholds,
    state: PlaybackState,
    url: Option<String>,
    /// Position the current item starts at once ready
    start_time: Option<Duration>,
    autoplay: bool,
    time: Duration,
    range: TimeRange,
    buffered: TimeRange,
    /// Last (buffered, seekable) pair sent to subscribers
    published_buffered: Option<(TimeRange, TimeRange)>,
    advancing: bool,
    advance_detector: RangeAdvanceDetector,
    resume_state: ResumeState,
    next_seek_id: u64,
    pending_seek: Option<PendingSeek>,
}

impl<E: MediaEngine> PlaybackController<E> {
    pub fn new(
        engine: E,
        thresholds: Thresholds,
        progress_tx: tokio_mpsc::UnboundedSender<PlaybackProgress>,
    ) -> Self {
        Self {
            engine,
            progress_tx,
            thresholds,
            state: PlaybackState::Idle,
            url: None,
            start_time: None,
            autoplay: false,
            time: Duration::ZERO,
            range: TimeRange::empty(),
            buffered: TimeRange::empty(),
            published_buffered: None,
            advancing: false,
            advance_detector: RangeAdvanceDetector::new(),
            resume_state: ResumeState::Paused,
            next_seek_id: 0,
            pending_seek: None,
        }
    }

    // ========== Commands ==========

    /// Load a new item. Allowed from any state; an outstanding seek is
    /// cancelled and the previous item's time data is dropped.
    pub fn load(&mut self, url: &str) {
        self.prepare(url, None, false);
    }

    /// Load a new item that starts at `start_time` once ready
    pub fn load_at(&mut self, url: &str, start_time: Duration) {
        self.prepare(url, Some(start_time), false);
    }

    /// Load a new item and start playing as soon as the engine is ready
    pub fn play_url(&mut self, url: &str) {
        self.prepare(url, None, true);
    }

    pub fn play_url_at(&mut self, url: &str, start_time: Duration) {
        self.prepare(url, Some(start_time), true);
    }

    /// Play the current item. After `stop` this loads it again from its
    /// start position.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Idle if self.url.is_some() => {
                if let Some(url) = self.url.clone() {
                    self.prepare(&url, self.start_time, true);
                }
                Ok(())
            }
            PlaybackState::Ready | PlaybackState::Paused => {
                self.engine.play();
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            PlaybackState::Seeking => {
                if self.resume_state != ResumeState::Playing {
                    self.engine.play();
                    self.resume_state = ResumeState::Playing;
                }
                Ok(())
            }
            _ => Err(self.invalid_state("play")),
        }
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            // Nothing is playing yet
            PlaybackState::Paused | PlaybackState::Ready => Ok(()),
            PlaybackState::Playing => {
                self.engine.pause();
                self.set_state(PlaybackState::Paused);
                Ok(())
            }
            PlaybackState::Seeking => {
                if self.resume_state != ResumeState::Paused {
                    self.engine.pause();
                    self.resume_state = ResumeState::Paused;
                }
                Ok(())
            }
            _ => Err(self.invalid_state("pause")),
        }
    }

    pub fn toggle_play_pause(&mut self) -> Result<(), PlaybackError> {
        match (&self.state, self.resume_state) {
            (PlaybackState::Playing, _) | (PlaybackState::Seeking, ResumeState::Playing) => {
                self.pause()
            }
            (PlaybackState::Ready, _)
            | (PlaybackState::Paused, _)
            | (PlaybackState::Seeking, ResumeState::Paused) => self.play(),
            (PlaybackState::Idle, _) if self.url.is_some() => self.play(),
            _ => Err(self.invalid_state("toggle play/pause")),
        }
    }

    /// Seek to `time`, clamped into the seekable range.
    ///
    /// A seek issued while another one is outstanding supersedes it: the
    /// older request is cancelled and its completion will be ignored.
    pub fn seek_to(&mut self, time: Duration) -> Result<SeekRequestId, PlaybackError> {
        match self.state {
            PlaybackState::Playing => self.resume_state = ResumeState::Playing,
            PlaybackState::Paused => self.resume_state = ResumeState::Paused,
            PlaybackState::Seeking => {}
            _ => return Err(self.invalid_state("seek")),
        }

        Ok(self.begin_seek(time))
    }

    /// Stop playback and go back to idle, keeping the item so that `play`
    /// restarts it
    pub fn stop(&mut self) {
        info!("Stopping playback");
        self.cancel_pending_seek();
        self.engine.reset();
        self.autoplay = false;
        self.clear_time_data();
        self.set_state(PlaybackState::Idle);
    }

    /// Drop the current item and go back to idle
    pub fn reset(&mut self) {
        self.stop();
        self.url = None;
        self.start_time = None;
    }

    /// Replace the classification thresholds and republish the time data
    /// under the new rules
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
        if self.is_publishing() {
            self.publish_time_update();
        }
    }

    // ========== Reads ==========

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn current_time(&self) -> Duration {
        self.time
    }

    pub fn current_range(&self) -> TimeRange {
        self.range
    }

    pub fn buffered_range(&self) -> TimeRange {
        self.buffered
    }

    pub fn stream_kind(&self) -> StreamKind {
        stream_model::classify(&self.range, self.advancing, &self.thresholds)
    }

    pub fn is_live(&self) -> bool {
        stream_model::is_live(self.time, &self.range, self.stream_kind(), &self.thresholds)
    }

    /// Target of the outstanding seek, if any
    pub fn seek_target_time(&self) -> Option<Duration> {
        self.pending_seek.map(|pending| pending.target)
    }

    /// Position the outstanding seek started from, if any
    pub fn seek_start_time(&self) -> Option<Duration> {
        self.pending_seek.map(|pending| pending.start_time)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state: self.state.clone(),
            time: self.time,
            range: self.range,
            buffered: self.buffered,
            kind: self.stream_kind(),
            is_live: self.is_live(),
            seek_start: self.seek_start_time(),
            seek_target: self.seek_target_time(),
        }
    }

    // ========== Engine events ==========

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ready { seekable } => self.on_ready(seekable),
            EngineEvent::LoadFailed(info) => {
                if self.state == PlaybackState::Preparing {
                    self.fail(PlaybackError::EngineLoad(info));
                } else {
                    debug!("Ignoring load failure while {}: {}", self.state, info);
                }
            }
            EngineEvent::Sample(sample) => self.on_sample(sample),
            EngineEvent::PlayingChanged(playing) => self.on_playing_changed(playing),
            EngineEvent::SeekCompleted { request, finished } => {
                self.on_seek_completed(request, finished)
            }
            EngineEvent::Ended => self.on_ended(),
            EngineEvent::Error(info) => self.on_error(info),
        }
    }

    fn on_ready(&mut self, seekable: TimeRange) {
        if self.state != PlaybackState::Preparing {
            debug!("Ignoring engine ready while {}", self.state);
            return;
        }

        info!("Media ready, seekable range {:?}", seekable);
        self.range = seekable;
        self.set_state(PlaybackState::Ready);
        self.publish_buffered_if_changed();

        match self.start_time {
            Some(start_time) => {
                self.begin_seek(start_time);
            }
            None => self.publish_time_update(),
        }

        if self.autoplay {
            self.autoplay = false;
            // Ready and Seeking both accept play
            let _ = self.play();
        }
    }

    fn on_sample(&mut self, sample: EngineSample) {
        if self.state == PlaybackState::Idle {
            return;
        }

        self.time = sample.position;
        self.range = sample.seekable;
        self.advancing = match sample.range_advancing {
            Some(advancing) => {
                self.advance_detector.record(&sample.seekable, advancing);
                advancing
            }
            None => self.advance_detector.observe(&sample.seekable),
        };

        self.buffered = sample.buffered;

        if self.is_publishing() {
            self.publish_time_update();
        }
        if self.is_publishing() || self.state == PlaybackState::Seeking {
            self.publish_buffered_if_changed();
        }
    }

    fn on_playing_changed(&mut self, playing: bool) {
        match (&self.state, playing) {
            (PlaybackState::Playing, false) => self.set_state(PlaybackState::Paused),
            (PlaybackState::Paused, true) | (PlaybackState::Ready, true) => {
                self.set_state(PlaybackState::Playing)
            }
            (PlaybackState::Seeking, true) => self.resume_state = ResumeState::Playing,
            (PlaybackState::Seeking, false) => self.resume_state = ResumeState::Paused,
            _ => {}
        }
    }

    fn on_seek_completed(&mut self, request: SeekRequestId, finished: bool) {
        let pending = match self.pending_seek {
            Some(pending) if pending.request == request => pending,
            _ => {
                debug!("Dropping completion of stale {}", request);
                return;
            }
        };
        self.pending_seek = None;

        if finished {
            info!("{} completed at {:?}", request, pending.target);
            self.time = pending.target;
        } else {
            error!("{} to {:?} failed", request, pending.target);
        }

        self.set_state(self.resume_state.into());
        let _ = self.progress_tx.send(PlaybackProgress::SeekCompleted {
            request,
            time: pending.target,
            finished,
        });

        if !finished {
            self.report(PlaybackError::EngineSeek {
                target: pending.target,
                info: ErrorInfo::new("seek did not finish"),
            });
        }

        self.publish_time_update();
    }

    fn on_ended(&mut self) {
        if matches!(self.state, PlaybackState::Idle) || self.state.is_terminal() {
            return;
        }

        info!("Playback ended");
        self.cancel_pending_seek();
        self.set_state(PlaybackState::Ended);
    }

    fn on_error(&mut self, info: ErrorInfo) {
        if matches!(self.state, PlaybackState::Idle | PlaybackState::Failed(_)) {
            debug!("Ignoring engine error while {}: {}", self.state, info);
            return;
        }

        self.cancel_pending_seek();
        self.fail(PlaybackError::EngineFatal(info));
    }

    // ========== Helpers ==========

    fn prepare(&mut self, url: &str, start_time: Option<Duration>, autoplay: bool) {
        match start_time {
            Some(start_time) => info!("Loading {} at {:?}", url, start_time),
            None => info!("Loading {}", url),
        }
        self.cancel_pending_seek();
        self.clear_time_data();
        self.url = Some(url.to_string());
        self.start_time = start_time;
        self.autoplay = autoplay;
        self.set_state(PlaybackState::Preparing);
        self.engine.load(url);
    }

    /// Seek without checking the state. Clamps `time` into the seekable
    /// range and supersedes any outstanding seek.
    fn begin_seek(&mut self, time: Duration) -> SeekRequestId {
        let target = self.range.clamp(time);
        if !self.range.contains(time) {
            debug!("Seek target {:?} clamped to {:?}", time, target);
        }

        let start_time = match self.pending_seek.take() {
            Some(superseded) => {
                debug!(
                    "{} superseded before completion (target {:?})",
                    superseded.request, superseded.target
                );
                self.engine.cancel_seek(superseded.request);
                superseded.start_time
            }
            None => self.time,
        };

        self.next_seek_id += 1;
        let request = SeekRequestId(self.next_seek_id);
        self.pending_seek = Some(PendingSeek {
            request,
            target,
            start_time,
        });

        info!("Seeking to {:?} ({})", target, request);
        self.set_state(PlaybackState::Seeking);
        let _ = self.progress_tx.send(PlaybackProgress::SeekStarted {
            request,
            from: start_time,
            target,
        });
        self.engine.seek(target, request);

        request
    }

    fn fail(&mut self, error: PlaybackError) {
        let info = match &error {
            PlaybackError::EngineLoad(info) | PlaybackError::EngineFatal(info) => info.clone(),
            other => ErrorInfo::new(other.to_string()),
        };
        self.set_state(PlaybackState::Failed(info));
        self.report(error);
    }

    /// Publish an error once, logged by severity
    fn report(&self, error: PlaybackError) {
        if error.is_recoverable() {
            warn!("Playback error: {}", error);
        } else {
            error!("Playback failed: {}", error);
        }
        let _ = self.progress_tx.send(PlaybackProgress::Error { error });
    }

    fn cancel_pending_seek(&mut self) {
        if let Some(pending) = self.pending_seek.take() {
            debug!("Cancelling outstanding {}", pending.request);
            self.engine.cancel_seek(pending.request);
        }
    }

    fn clear_time_data(&mut self) {
        self.time = Duration::ZERO;
        self.range = TimeRange::empty();
        self.buffered = TimeRange::empty();
        self.published_buffered = None;
        self.advancing = false;
        self.advance_detector.reset();
        self.resume_state = ResumeState::Paused;
    }

    /// Whether position updates reach subscribers in the current state
    fn is_publishing(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Ready | PlaybackState::Playing | PlaybackState::Paused
        )
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        debug!("Playback state {} -> {}", self.state, state);
        self.state = state.clone();
        let _ = self
            .progress_tx
            .send(PlaybackProgress::StateChanged { state });
    }

    fn publish_time_update(&self) {
        let kind = self.stream_kind();
        let _ = self.progress_tx.send(PlaybackProgress::TimeUpdate {
            time: self.time,
            range: self.range,
            kind,
            is_live: stream_model::is_live(self.time, &self.range, kind, &self.thresholds),
            thresholds: self.thresholds,
        });
    }

    /// The buffered fraction depends on both ranges, so a sliding seekable
    /// window is a change even when the buffered range is not
    fn publish_buffered_if_changed(&mut self) {
        let current = (self.buffered, self.range);
        if self.published_buffered == Some(current) {
            return;
        }
        self.published_buffered = Some(current);
        let _ = self.progress_tx.send(PlaybackProgress::BufferedRangeChanged {
            buffered: self.buffered,
            seekable: self.range,
        });
    }

    fn invalid_state(&self, operation: &'static str) -> PlaybackError {
        debug!("Rejected {} while {}", operation, self.state);
        PlaybackError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EngineCall, MockMediaEngine};

    struct Fixture {
        controller: PlaybackController<MockMediaEngine>,
        engine: MockMediaEngine,
        progress_rx: tokio_mpsc::UnboundedReceiver<PlaybackProgress>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_thresholds(Thresholds::default())
        }

        fn with_thresholds(thresholds: Thresholds) -> Self {
            let engine = MockMediaEngine::new();
            let (progress_tx, progress_rx) = tokio_mpsc::unbounded_channel();
            let controller = PlaybackController::new(engine.clone(), thresholds, progress_tx);
            Self {
                controller,
                engine,
                progress_rx,
            }
        }

        /// Load an on-demand item of `length` seconds and start playing
        fn playing(length: u64) -> Self {
            let mut fixture = Self::new();
            fixture.controller.load("https://example.com/vod.m3u8");
            fixture.controller.handle_engine_event(EngineEvent::Ready {
                seekable: TimeRange::from_secs(0, length),
            });
            fixture.controller.play().unwrap();
            fixture.drain();
            fixture.engine.clear();
            fixture
        }

        fn drain(&mut self) -> Vec<PlaybackProgress> {
            let mut events = Vec::new();
            while let Ok(event) = self.progress_rx.try_recv() {
                events.push(event);
            }
            events
        }

        fn states(&mut self) -> Vec<PlaybackState> {
            self.drain()
                .into_iter()
                .filter_map(|event| match event {
                    PlaybackProgress::StateChanged { state } => Some(state),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn load_then_ready_captures_range() {
        let mut fixture = Fixture::new();
        fixture.controller.load("https://example.com/a.m3u8");
        assert_eq!(fixture.controller.state(), &PlaybackState::Preparing);
        assert_eq!(
            fixture.engine.calls(),
            vec![EngineCall::Load("https://example.com/a.m3u8".to_string())]
        );

        fixture.controller.handle_engine_event(EngineEvent::Ready {
            seekable: TimeRange::from_secs(0, 120),
        });

        assert_eq!(fixture.controller.state(), &PlaybackState::Ready);
        assert_eq!(fixture.controller.current_range(), TimeRange::from_secs(0, 120));
        assert_eq!(
            fixture.states(),
            vec![PlaybackState::Preparing, PlaybackState::Ready]
        );
    }

    #[test]
    fn load_failure_fails_once() {
        let mut fixture = Fixture::new();
        fixture.controller.load("https://example.com/missing.m3u8");
        fixture
            .controller
            .handle_engine_event(EngineEvent::LoadFailed(ErrorInfo::with_code("not found", 404)));
        fixture
            .controller
            .handle_engine_event(EngineEvent::Error(ErrorInfo::new("late error")));

        let errors: Vec<_> = fixture
            .drain()
            .into_iter()
            .filter(|event| matches!(event, PlaybackProgress::Error { .. }))
            .collect();
        assert_eq!(
            errors,
            vec![PlaybackProgress::Error {
                error: PlaybackError::EngineLoad(ErrorInfo::with_code("not found", 404))
            }]
        );
        assert!(matches!(
            fixture.controller.state(),
            PlaybackState::Failed(_)
        ));
    }

    #[test]
    fn play_from_idle_is_rejected() {
        let mut fixture = Fixture::new();
        let result = fixture.controller.play();
        assert!(matches!(
            result,
            Err(PlaybackError::InvalidState {
                operation: "play",
                ..
            })
        ));
        assert_eq!(fixture.controller.state(), &PlaybackState::Idle);
        assert!(fixture.engine.calls().is_empty());
    }

    #[test]
    fn repeated_pause_is_idempotent() {
        let mut fixture = Fixture::playing(600);

        fixture.controller.pause().unwrap();
        fixture.controller.pause().unwrap();
        fixture.controller.pause().unwrap();

        assert_eq!(fixture.engine.calls(), vec![EngineCall::Pause]);
        assert_eq!(fixture.states(), vec![PlaybackState::Paused]);
    }

    #[test]
    fn toggle_play_pause_alternates() {
        let mut fixture = Fixture::playing(600);
        fixture.controller.toggle_play_pause().unwrap();
        assert_eq!(fixture.controller.state(), &PlaybackState::Paused);
        fixture.controller.toggle_play_pause().unwrap();
        assert_eq!(fixture.controller.state(), &PlaybackState::Playing);
        assert_eq!(
            fixture.engine.calls(),
            vec![EngineCall::Pause, EngineCall::Play]
        );
    }

    #[test]
    fn engine_acknowledgement_corrects_optimistic_state() {
        let mut fixture = Fixture::playing(600);
        fixture
            .controller
            .handle_engine_event(EngineEvent::PlayingChanged(false));
        assert_eq!(fixture.controller.state(), &PlaybackState::Paused);
    }

    #[test]
    fn seek_is_clamped_into_range() {
        let mut fixture = Fixture::playing(100);
        fixture.controller.seek_to(Duration::from_secs(500)).unwrap();
        assert_eq!(
            fixture.controller.seek_target_time(),
            Some(Duration::from_secs(100))
        );
        assert_eq!(
            fixture.engine.calls(),
            vec![EngineCall::Seek(Duration::from_secs(100), SeekRequestId(1))]
        );
    }

    #[test]
    fn superseded_seek_completes_once_for_latest() {
        let mut fixture = Fixture::playing(600);

        let first = fixture.controller.seek_to(Duration::from_secs(10)).unwrap();
        let second = fixture.controller.seek_to(Duration::from_secs(20)).unwrap();
        assert!(second > first);

        // Engine reports the cancelled seek late, then the real one
        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request: first,
                finished: false,
            });
        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request: second,
                finished: true,
            });

        let completions: Vec<_> = fixture
            .drain()
            .into_iter()
            .filter(|event| matches!(event, PlaybackProgress::SeekCompleted { .. }))
            .collect();
        assert_eq!(
            completions,
            vec![PlaybackProgress::SeekCompleted {
                request: second,
                time: Duration::from_secs(20),
                finished: true,
            }]
        );
        assert!(fixture.engine.calls().contains(&EngineCall::CancelSeek(first)));
        assert_eq!(fixture.controller.state(), &PlaybackState::Playing);
        assert_eq!(fixture.controller.current_time(), Duration::from_secs(20));
    }

    #[test]
    fn seek_returns_to_paused_when_paused() {
        let mut fixture = Fixture::playing(600);
        fixture.controller.pause().unwrap();
        let request = fixture.controller.seek_to(Duration::from_secs(30)).unwrap();
        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request,
                finished: true,
            });
        assert_eq!(fixture.controller.state(), &PlaybackState::Paused);
    }

    #[test]
    fn play_during_seek_resumes_playing() {
        let mut fixture = Fixture::playing(600);
        fixture.controller.pause().unwrap();
        let request = fixture.controller.seek_to(Duration::from_secs(30)).unwrap();
        fixture.controller.play().unwrap();
        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request,
                finished: true,
            });
        assert_eq!(fixture.controller.state(), &PlaybackState::Playing);
    }

    #[test]
    fn failed_seek_is_reported_and_not_fatal() {
        let mut fixture = Fixture::playing(600);
        let request = fixture.controller.seek_to(Duration::from_secs(30)).unwrap();
        fixture.drain();
        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request,
                finished: false,
            });

        let events = fixture.drain();
        assert!(events.iter().any(|event| matches!(
            event,
            PlaybackProgress::Error {
                error: PlaybackError::EngineSeek { .. }
            }
        )));
        assert_eq!(fixture.controller.state(), &PlaybackState::Playing);
    }

    #[test]
    fn samples_are_not_published_while_seeking() {
        let mut fixture = Fixture::playing(600);
        fixture.controller.seek_to(Duration::from_secs(300)).unwrap();
        fixture.drain();

        fixture
            .controller
            .handle_engine_event(EngineEvent::Sample(EngineSample::on_demand(
                Duration::from_secs(5),
                TimeRange::from_secs(0, 600),
            )));

        assert!(!fixture
            .drain()
            .iter()
            .any(|event| matches!(event, PlaybackProgress::TimeUpdate { .. })));
        // Internal state still follows the engine
        assert_eq!(fixture.controller.current_time(), Duration::from_secs(5));
    }

    #[test]
    fn samples_classify_dvr_stream() {
        let mut fixture = Fixture::playing(0);
        fixture
            .controller
            .handle_engine_event(EngineEvent::Sample(EngineSample::advancing(
                Duration::from_secs(3590),
                TimeRange::from_secs(0, 3600),
            )));

        assert_eq!(fixture.controller.stream_kind(), StreamKind::Dvr);
        assert!(fixture.controller.is_live());

        let last_update = fixture
            .drain()
            .into_iter()
            .rev()
            .find(|event| matches!(event, PlaybackProgress::TimeUpdate { .. }));
        assert_eq!(
            last_update,
            Some(PlaybackProgress::TimeUpdate {
                time: Duration::from_secs(3590),
                range: TimeRange::from_secs(0, 3600),
                kind: StreamKind::Dvr,
                is_live: true,
                thresholds: Thresholds::default(),
            })
        );
    }

    #[test]
    fn ended_stops_publishing_and_rejects_play() {
        let mut fixture = Fixture::playing(60);
        fixture.controller.handle_engine_event(EngineEvent::Ended);
        fixture.drain();

        fixture
            .controller
            .handle_engine_event(EngineEvent::Sample(EngineSample::on_demand(
                Duration::from_secs(60),
                TimeRange::from_secs(0, 60),
            )));
        assert!(fixture.drain().is_empty());
        assert!(fixture.controller.play().is_err());
        assert_eq!(fixture.controller.state(), &PlaybackState::Ended);
    }

    #[test]
    fn load_cancels_outstanding_seek_and_keeps_thresholds() {
        let thresholds = Thresholds {
            live_tolerance: Duration::from_secs(10),
            minimum_dvr_window_length: Duration::from_secs(60),
        };
        let mut fixture = Fixture::with_thresholds(thresholds);
        fixture.controller.load("https://example.com/a.m3u8");
        fixture.controller.handle_engine_event(EngineEvent::Ready {
            seekable: TimeRange::from_secs(0, 600),
        });
        fixture.controller.play().unwrap();
        let request = fixture.controller.seek_to(Duration::from_secs(30)).unwrap();

        fixture.controller.load("https://example.com/b.m3u8");
        assert!(fixture.engine.calls().contains(&EngineCall::CancelSeek(request)));
        assert_eq!(fixture.controller.current_range(), TimeRange::empty());
        assert_eq!(fixture.controller.thresholds(), thresholds);

        fixture.drain();
        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request,
                finished: true,
            });
        assert!(fixture.drain().is_empty());
    }

    #[test]
    fn play_url_starts_when_ready() {
        let mut fixture = Fixture::new();
        fixture.controller.play_url("https://example.com/live.m3u8");
        fixture.controller.handle_engine_event(EngineEvent::Ready {
            seekable: TimeRange::empty(),
        });
        assert_eq!(fixture.controller.state(), &PlaybackState::Playing);
        assert_eq!(fixture.engine.calls().last(), Some(&EngineCall::Play));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut fixture = Fixture::playing(60);
        fixture.controller.reset();
        assert_eq!(fixture.controller.state(), &PlaybackState::Idle);
        assert_eq!(fixture.controller.url(), None);
        assert_eq!(fixture.engine.calls(), vec![EngineCall::Reset]);
    }

    #[test]
    fn fatal_error_after_playing_is_surfaced_once() {
        let mut fixture = Fixture::playing(60);
        fixture
            .controller
            .handle_engine_event(EngineEvent::Error(ErrorInfo::new("decoder crashed")));
        fixture
            .controller
            .handle_engine_event(EngineEvent::Error(ErrorInfo::new("decoder crashed")));

        let errors = fixture
            .drain()
            .into_iter()
            .filter(|event| matches!(event, PlaybackProgress::Error { .. }))
            .count();
        assert_eq!(errors, 1);
        assert_eq!(
            fixture.controller.state(),
            &PlaybackState::Failed(ErrorInfo::new("decoder crashed"))
        );
    }

    #[test]
    fn seek_publishes_start_and_clamped_target() {
        let mut fixture = Fixture::playing(100);
        fixture
            .controller
            .handle_engine_event(EngineEvent::Sample(EngineSample::on_demand(
                Duration::from_secs(12),
                TimeRange::from_secs(0, 100),
            )));
        fixture.drain();

        let request = fixture.controller.seek_to(Duration::from_secs(250)).unwrap();

        assert!(fixture.drain().contains(&PlaybackProgress::SeekStarted {
            request,
            from: Duration::from_secs(12),
            target: Duration::from_secs(100),
        }));
        assert_eq!(
            fixture.controller.seek_start_time(),
            Some(Duration::from_secs(12))
        );
    }

    #[test]
    fn chained_seeks_keep_first_start_time() {
        let mut fixture = Fixture::playing(600);
        fixture
            .controller
            .handle_engine_event(EngineEvent::Sample(EngineSample::on_demand(
                Duration::from_secs(40),
                TimeRange::from_secs(0, 600),
            )));

        fixture.controller.seek_to(Duration::from_secs(100)).unwrap();
        // The engine keeps reporting while the first seek runs
        fixture
            .controller
            .handle_engine_event(EngineEvent::Sample(EngineSample::on_demand(
                Duration::from_secs(70),
                TimeRange::from_secs(0, 600),
            )));
        let request = fixture.controller.seek_to(Duration::from_secs(200)).unwrap();

        let snapshot = fixture.controller.snapshot();
        assert_eq!(snapshot.seek_start, Some(Duration::from_secs(40)));
        assert_eq!(snapshot.seek_target, Some(Duration::from_secs(200)));

        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request,
                finished: true,
            });
        assert_eq!(fixture.controller.seek_start_time(), None);
        assert_eq!(fixture.controller.seek_target_time(), None);
    }

    #[test]
    fn start_time_is_sought_once_ready() {
        let mut fixture = Fixture::new();
        fixture
            .controller
            .play_url_at("https://example.com/vod.m3u8", Duration::from_secs(90));
        fixture.controller.handle_engine_event(EngineEvent::Ready {
            seekable: TimeRange::from_secs(0, 600),
        });

        assert_eq!(fixture.controller.state(), &PlaybackState::Seeking);
        assert_eq!(
            fixture.engine.calls(),
            vec![
                EngineCall::Load("https://example.com/vod.m3u8".to_string()),
                EngineCall::Seek(Duration::from_secs(90), SeekRequestId(1)),
                EngineCall::Play,
            ]
        );
        // Position zero is never shown before the start position
        assert!(!fixture
            .drain()
            .iter()
            .any(|event| matches!(event, PlaybackProgress::TimeUpdate { .. })));

        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request: SeekRequestId(1),
                finished: true,
            });
        assert_eq!(fixture.controller.state(), &PlaybackState::Playing);
        assert_eq!(fixture.controller.current_time(), Duration::from_secs(90));
    }

    #[test]
    fn load_at_stays_paused_after_start_seek() {
        let mut fixture = Fixture::new();
        fixture
            .controller
            .load_at("https://example.com/vod.m3u8", Duration::from_secs(30));
        fixture.controller.handle_engine_event(EngineEvent::Ready {
            seekable: TimeRange::from_secs(0, 600),
        });
        fixture
            .controller
            .handle_engine_event(EngineEvent::SeekCompleted {
                request: SeekRequestId(1),
                finished: true,
            });

        assert_eq!(fixture.controller.state(), &PlaybackState::Paused);
        assert!(!fixture.engine.calls().contains(&EngineCall::Play));
    }

    #[test]
    fn stop_keeps_item_and_play_restarts_it() {
        let mut fixture = Fixture::new();
        fixture
            .controller
            .load_at("https://example.com/vod.m3u8", Duration::from_secs(30));
        fixture.controller.handle_engine_event(EngineEvent::Ready {
            seekable: TimeRange::from_secs(0, 600),
        });
        fixture.engine.clear();

        fixture.controller.stop();
        assert_eq!(fixture.controller.state(), &PlaybackState::Idle);
        assert_eq!(fixture.controller.url(), Some("https://example.com/vod.m3u8"));
        assert_eq!(fixture.controller.current_range(), TimeRange::empty());
        assert_eq!(
            fixture.engine.calls(),
            vec![EngineCall::CancelSeek(SeekRequestId(1)), EngineCall::Reset]
        );

        fixture.engine.clear();
        fixture.controller.play().unwrap();
        assert_eq!(fixture.controller.state(), &PlaybackState::Preparing);
        fixture.controller.handle_engine_event(EngineEvent::Ready {
            seekable: TimeRange::from_secs(0, 600),
        });
        assert_eq!(
            fixture.engine.calls(),
            vec![
                EngineCall::Load("https://example.com/vod.m3u8".to_string()),
                EngineCall::Seek(Duration::from_secs(30), SeekRequestId(2)),
                EngineCall::Play,
            ]
        );
    }

    #[test]
    fn play_after_reset_is_rejected() {
        let mut fixture = Fixture::playing(60);
        fixture.controller.reset();
        assert!(fixture.controller.play().is_err());
        assert!(fixture.controller.toggle_play_pause().is_err());
    }

    #[test]
    fn buffered_range_from_preparing_is_published_when_ready() {
        let mut fixture = Fixture::new();
        fixture.controller.load("https://example.com/vod.m3u8");
        let sample = EngineSample::on_demand(Duration::ZERO, TimeRange::from_secs(0, 100))
            .with_buffered(TimeRange::from_secs(0, 40));
        fixture
            .controller
            .handle_engine_event(EngineEvent::Sample(sample));
        fixture.controller.handle_engine_event(EngineEvent::Ready {
            seekable: TimeRange::from_secs(0, 100),
        });
        fixture.controller.play().unwrap();
        for _ in 0..4 {
            fixture
                .controller
                .handle_engine_event(EngineEvent::Sample(sample));
        }

        let buffered: Vec<_> = fixture
            .drain()
            .into_iter()
            .filter(|event| matches!(event, PlaybackProgress::BufferedRangeChanged { .. }))
            .collect();
        assert_eq!(
            buffered,
            vec![PlaybackProgress::BufferedRangeChanged {
                buffered: TimeRange::from_secs(0, 40),
                seekable: TimeRange::from_secs(0, 100),
            }]
        );
    }

    #[test]
    fn sliding_window_republishes_buffered_range() {
        let mut fixture = Fixture::playing(0);
        let buffered = TimeRange::from_secs(100, 3600);
        for start in [0, 0, 10] {
            let seekable = TimeRange::from_secs(start, 3600);
            fixture.controller.handle_engine_event(EngineEvent::Sample(
                EngineSample::advancing(Duration::from_secs(3590), seekable)
                    .with_buffered(buffered),
            ));
        }

        let seekables: Vec<_> = fixture
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                PlaybackProgress::BufferedRangeChanged { seekable, .. } => Some(seekable),
                _ => None,
            })
            .collect();
        assert_eq!(
            seekables,
            vec![TimeRange::from_secs(0, 3600), TimeRange::from_secs(10, 3600)]
        );
    }

    #[test]
    fn time_updates_carry_current_thresholds() {
        let mut fixture = Fixture::playing(0);
        let strict = Thresholds {
            live_tolerance: Duration::from_secs(5),
            minimum_dvr_window_length: Duration::ZERO,
        };
        fixture.controller.set_thresholds(strict);
        fixture
            .controller
            .handle_engine_event(EngineEvent::Sample(EngineSample::advancing(
                Duration::from_secs(80),
                TimeRange::from_secs(0, 100),
            )));

        let last_update = fixture
            .drain()
            .into_iter()
            .rev()
            .find(|event| matches!(event, PlaybackProgress::TimeUpdate { .. }));
        assert_eq!(
            last_update,
            Some(PlaybackProgress::TimeUpdate {
                time: Duration::from_secs(80),
                range: TimeRange::from_secs(0, 100),
                kind: StreamKind::Dvr,
                is_live: false,
                thresholds: strict,
            })
        );
    }
}
