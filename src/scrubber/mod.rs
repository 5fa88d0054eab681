//! Scrubber (time slider) reconciliation
//!
//! Maps the controller's time updates onto a bounded control value while the
//! user may be dragging the control:
//!
//! - `reconciler`: `ScrubberReconciler`, the interaction state machine
//! - `seeker`: the `Seeker` seam the reconciler issues seeks through

mod reconciler;
mod seeker;

pub use reconciler::{DragSession, InteractionState, ScrubberReconciler};
pub use seeker::Seeker;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Value displayed when no range can be mapped onto the control
pub const DEFAULT_SCRUB_VALUE: f64 = 0.0;

/// Edge the knob is pinned to for pure live streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnobEdge {
    #[default]
    Left,
    Right,
}

impl KnobEdge {
    pub fn value(&self) -> f64 {
        match self {
            KnobEdge::Left => 0.0,
            KnobEdge::Right => 1.0,
        }
    }
}

/// Scrubber behavior options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrubberConfig {
    /// Seek on every drag move instead of once on release
    pub seeking_during_tracking: bool,
    /// Pin the knob to `live_knob_edge` for live streams without DVR
    pub live_knob_pinning: bool,
    pub live_knob_edge: KnobEdge,
}

impl Default for ScrubberConfig {
    fn default() -> Self {
        Self {
            seeking_during_tracking: true,
            live_knob_pinning: false,
            live_knob_edge: KnobEdge::Left,
        }
    }
}

/// Position displayed by the control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrubPosition {
    /// Knob value in `[0, 1]`
    pub value: f64,
    pub time: Duration,
    pub is_live: bool,
}

impl Default for ScrubPosition {
    fn default() -> Self {
        Self {
            value: DEFAULT_SCRUB_VALUE,
            time: Duration::ZERO,
            is_live: false,
        }
    }
}

/// Notifications sent to the interactive control
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrubberEvent {
    /// Render the knob at a new position
    ValueChanged {
        value: f64,
        time: Duration,
        is_live: bool,
    },
    BufferedFractionChanged {
        fraction: f64,
    },
    /// The knob moved, either dragged by the user or following playback
    MovingToTime {
        time: Duration,
        value: f64,
        interactive: bool,
    },
}
