use super::{ScrubPosition, ScrubberConfig, ScrubberEvent, Seeker, DEFAULT_SCRUB_VALUE};
use crate::error::PlaybackError;
use crate::playback::controller::PlaybackState;
use crate::playback::progress::PlaybackProgress;
use crate::playback::stream_model::{self, StreamKind, Thresholds};
use crate::playback::time_range::TimeRange;
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tracing::debug;

/// Last time update received from the controller
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimeSample {
    time: Duration,
    range: TimeRange,
    kind: StreamKind,
    is_live: bool,
    thresholds: Thresholds,
}

/// State of an ongoing drag gesture
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    start_value: f64,
    /// Range captured when the drag started, so a moving DVR window does not
    /// shift the time under the knob
    range: Option<TimeRange>,
    kind: StreamKind,
    last_time: Option<Duration>,
    /// The controller's range became unusable during the drag
    range_lost: bool,
}

impl DragSession {
    pub fn start_value(&self) -> f64 {
        self.start_value
    }

    /// Time of the last accepted drag move
    pub fn last_time(&self) -> Option<Duration> {
        self.last_time
    }

    /// Range the drag maps values onto, when it can map any
    fn usable_range(&self) -> Option<(TimeRange, Duration)> {
        if self.range_lost {
            return None;
        }
        self.range
            .and_then(|range| range.measurable_length().map(|length| (range, length)))
    }
}

/// Who owns the displayed value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    /// Display follows the controller
    #[default]
    Idle,
    /// Display follows user input; controller updates are only recorded
    Dragging(DragSession),
    /// Drag just ended: the released value stays on screen until the
    /// controller has taken the seek and reports a new time
    Released,
}

/// Reconciles controller time updates with user drags on a time slider.
///
/// Feed it every [`PlaybackProgress`] through [`handle_progress`] and the
/// control's gestures through `begin_drag` / `drag_to` / `end_drag`. It
/// reports what to render on its event channel and seeks through `S`.
///
/// [`handle_progress`]: ScrubberReconciler::handle_progress
pub struct ScrubberReconciler<S: Seeker> {
    config: ScrubberConfig,
    seeker: S,
    events_tx: tokio_mpsc::UnboundedSender<ScrubberEvent>,
    interaction: InteractionState,
    latest: Option<TimeSample>,
    displayed: ScrubPosition,
    buffered_fraction: f64,
    /// Seeks requested but not yet started or rejected by the controller
    unsettled_seeks: usize,
}

impl<S: Seeker> ScrubberReconciler<S> {
    pub fn new(
        config: ScrubberConfig,
        seeker: S,
        events_tx: tokio_mpsc::UnboundedSender<ScrubberEvent>,
    ) -> Self {
        Self {
            config,
            seeker,
            events_tx,
            interaction: InteractionState::Idle,
            latest: None,
            displayed: ScrubPosition::default(),
            buffered_fraction: 0.0,
            unsettled_seeks: 0,
        }
    }

    pub fn config(&self) -> &ScrubberConfig {
        &self.config
    }

    pub fn seeker(&self) -> &S {
        &self.seeker
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn position(&self) -> ScrubPosition {
        self.displayed
    }

    pub fn value(&self) -> f64 {
        self.displayed.value
    }

    /// Time under the knob. While dragging this is the dragged time, not the
    /// controller's current time.
    pub fn time(&self) -> Duration {
        self.displayed.time
    }

    /// Whether the knob sits in live conditions
    pub fn is_live(&self) -> bool {
        self.displayed.is_live
    }

    pub fn buffered_fraction(&self) -> f64 {
        self.buffered_fraction
    }

    /// Whether the knob is pinned to the live edge and cannot be dragged
    pub fn is_pinned(&self) -> bool {
        self.config.live_knob_pinning
            && self
                .latest
                .map_or(false, |sample| sample.kind == StreamKind::Live)
    }

    // ========== Controller side ==========

    pub fn handle_progress(&mut self, progress: &PlaybackProgress) {
        match *progress {
            PlaybackProgress::TimeUpdate {
                time,
                range,
                kind,
                is_live,
                thresholds,
            } => self.on_time_update(TimeSample {
                time,
                range,
                kind,
                is_live,
                thresholds,
            }),
            PlaybackProgress::SeekStarted { .. }
            | PlaybackProgress::CommandRejected {
                error: PlaybackError::InvalidState {
                    operation: "seek", ..
                },
            } => self.unsettled_seeks = self.unsettled_seeks.saturating_sub(1),
            PlaybackProgress::BufferedRangeChanged { buffered, seekable } => {
                self.on_buffered(&buffered, &seekable)
            }
            PlaybackProgress::StateChanged {
                state: PlaybackState::Idle | PlaybackState::Preparing,
            } => self.reset_display(),
            _ => {}
        }
    }

    fn on_time_update(&mut self, sample: TimeSample) {
        self.latest = Some(sample);

        if self.is_pinned() {
            if matches!(self.interaction, InteractionState::Dragging(_)) {
                debug!("Stream became live without DVR, cancelling drag");
            }
            self.interaction = InteractionState::Idle;
        }

        if let InteractionState::Dragging(session) = &mut self.interaction {
            match sample.range.measurable_length() {
                Some(_) => {
                    if session.range.is_none() {
                        debug!("Drag adopting first usable range {:?}", sample.range);
                        session.range = Some(sample.range);
                        session.kind = sample.kind;
                    }
                    session.range_lost = false;
                }
                None => session.range_lost = true,
            }
            // Display authority stays with the user
            return;
        }

        // Anything published before the controller took our seek predates it
        if self.interaction == InteractionState::Released && self.unsettled_seeks > 0 {
            debug!("Holding released value until the seek starts");
            return;
        }

        self.interaction = InteractionState::Idle;
        self.show(self.engine_position(&sample), false);
    }

    fn on_buffered(&mut self, buffered: &TimeRange, seekable: &TimeRange) {
        let fraction = match seekable.measurable_length() {
            Some(length) => {
                let buffered_end = buffered.end.or(seekable.end).unwrap_or(seekable.start);
                let loaded = buffered_end.saturating_sub(seekable.start);
                (loaded.as_secs_f64() / length.as_secs_f64()).clamp(0.0, 1.0)
            }
            None => 0.0,
        };

        if fraction != self.buffered_fraction {
            self.buffered_fraction = fraction;
            let _ = self
                .events_tx
                .send(ScrubberEvent::BufferedFractionChanged { fraction });
        }
    }

    /// Position the controller sample maps to when nobody drags
    fn engine_position(&self, sample: &TimeSample) -> ScrubPosition {
        let value = if self.is_pinned() {
            self.config.live_knob_edge.value()
        } else {
            match sample.range.measurable_length() {
                Some(length) => {
                    let offset = sample.time.saturating_sub(sample.range.start);
                    (offset.as_secs_f64() / length.as_secs_f64()).clamp(0.0, 1.0)
                }
                None => DEFAULT_SCRUB_VALUE,
            }
        };

        ScrubPosition {
            value,
            time: sample.time,
            is_live: sample.is_live,
        }
    }

    // ========== Control side ==========

    /// Start a drag. Rejected when already dragging or when the knob is
    /// pinned to the live edge.
    pub fn begin_drag(&mut self) -> bool {
        if matches!(self.interaction, InteractionState::Dragging(_)) {
            debug!("begin_drag ignored: already dragging");
            return false;
        }
        if self.is_pinned() {
            debug!("begin_drag ignored: knob pinned to live edge");
            return false;
        }

        let (range, kind) = match self.latest {
            Some(sample) => (
                sample.range.measurable_length().map(|_| sample.range),
                sample.kind,
            ),
            None => (None, StreamKind::OnDemand),
        };

        self.interaction = InteractionState::Dragging(DragSession {
            start_value: self.displayed.value,
            range,
            kind,
            last_time: None,
            range_lost: false,
        });
        true
    }

    /// Move the knob to `value` (clamped to `[0, 1]`).
    ///
    /// Returns false when not dragging or when no usable range is known; the
    /// last valid position then stays on screen.
    pub fn drag_to(&mut self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        let value = value.clamp(0.0, 1.0);
        let thresholds = self
            .latest
            .map_or_else(Thresholds::default, |sample| sample.thresholds);

        let InteractionState::Dragging(session) = &mut self.interaction else {
            debug!("drag_to ignored: no drag in progress");
            return false;
        };

        let Some((range, length)) = session.usable_range() else {
            debug!("drag_to ignored: no usable range to map {} onto", value);
            return false;
        };

        let time = range.start + length.mul_f64(value);
        session.last_time = Some(time);
        let position = ScrubPosition {
            value,
            time,
            is_live: stream_model::is_live(time, &range, session.kind, &thresholds),
        };

        let _ = self.events_tx.send(ScrubberEvent::MovingToTime {
            time,
            value,
            interactive: true,
        });
        self.show(position, true);

        if self.config.seeking_during_tracking {
            self.seek(time);
        }
        true
    }

    /// Finish a drag, seeking to the last dragged time if seeks were
    /// deferred.
    pub fn end_drag(&mut self) -> bool {
        let session = match std::mem::take(&mut self.interaction) {
            InteractionState::Dragging(session) => session,
            other => {
                self.interaction = other;
                debug!("end_drag ignored: no drag in progress");
                return false;
            }
        };

        match session.last_time {
            Some(time) => {
                if !self.config.seeking_during_tracking {
                    self.seek(time);
                }
                self.interaction = InteractionState::Released;
            }
            None => {
                // Nothing was dragged, go back to following the controller
                if let Some(sample) = self.latest {
                    self.show(self.engine_position(&sample), false);
                }
            }
        }
        true
    }

    /// The control went away: forget everything
    pub fn detach(&mut self) {
        self.interaction = InteractionState::Idle;
        self.latest = None;
        self.displayed = ScrubPosition::default();
        self.buffered_fraction = 0.0;
        self.unsettled_seeks = 0;
    }

    fn seek(&mut self, time: Duration) {
        if self.seeker.request_seek(time) {
            self.unsettled_seeks += 1;
        }
    }

    fn reset_display(&mut self) {
        self.interaction = InteractionState::Idle;
        self.latest = None;
        self.unsettled_seeks = 0;
        self.show(ScrubPosition::default(), false);
        if self.buffered_fraction != 0.0 {
            self.buffered_fraction = 0.0;
            let _ = self
                .events_tx
                .send(ScrubberEvent::BufferedFractionChanged { fraction: 0.0 });
        }
    }

    /// Display `position`, notifying the control if anything changed.
    /// Interactive moves have already sent their `MovingToTime`.
    fn show(&mut self, position: ScrubPosition, interactive: bool) {
        if position == self.displayed {
            return;
        }
        self.displayed = position;

        if !interactive {
            let _ = self.events_tx.send(ScrubberEvent::MovingToTime {
                time: position.time,
                value: position.value,
                interactive: false,
            });
        }
        let _ = self.events_tx.send(ScrubberEvent::ValueChanged {
            value: position.value,
            time: position.time,
            is_live: position.is_live,
        });
    }
}
