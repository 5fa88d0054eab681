use crate::playback::stream_model::{Thresholds, DEFAULT_LIVE_TOLERANCE};
use crate::scrubber::{KnobEdge, ScrubberConfig};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{info, warn};

/// Playback and scrubber configuration
///
/// In debug builds: loads a .env file, then reads `PLAYHEAD_*` variables.
/// In release builds: reads `PLAYHEAD_*` variables only.
/// Hosts with their own config files can deserialize it directly.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayheadConfig {
    /// Seek while the knob is dragged instead of once on release
    pub seeking_during_tracking: bool,
    /// Distance from the live edge still considered live
    #[serde(rename = "live_tolerance_secs", deserialize_with = "duration_from_secs")]
    pub live_tolerance: Duration,
    /// Live windows must be longer than this to count as DVR
    #[serde(
        rename = "minimum_dvr_window_secs",
        deserialize_with = "duration_from_secs"
    )]
    pub minimum_dvr_window_length: Duration,
    /// Pin the knob to an edge for live streams without DVR
    pub live_knob_pinning: bool,
    pub live_knob_edge: KnobEdge,
}

impl Default for PlayheadConfig {
    fn default() -> Self {
        Self {
            seeking_during_tracking: true,
            live_tolerance: DEFAULT_LIVE_TOLERANCE,
            minimum_dvr_window_length: Duration::ZERO,
            live_knob_pinning: false,
            live_knob_edge: KnobEdge::Left,
        }
    }
}

impl PlayheadConfig {
    /// Load configuration based on build mode
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                info!("Config: dev mode, loaded .env file");
            }
        }

        Self::from_env()
    }

    /// Load configuration from `PLAYHEAD_*` environment variables, falling
    /// back to defaults for anything missing or invalid
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let config = Self {
            seeking_during_tracking: parse_var(
                &lookup,
                "PLAYHEAD_SEEKING_DURING_TRACKING",
                parse_bool,
            )
            .unwrap_or(defaults.seeking_during_tracking),
            live_tolerance: parse_var(&lookup, "PLAYHEAD_LIVE_TOLERANCE_SECS", parse_secs)
                .unwrap_or(defaults.live_tolerance),
            minimum_dvr_window_length: parse_var(
                &lookup,
                "PLAYHEAD_MIN_DVR_WINDOW_SECS",
                parse_secs,
            )
            .unwrap_or(defaults.minimum_dvr_window_length),
            live_knob_pinning: parse_var(&lookup, "PLAYHEAD_LIVE_KNOB_PINNING", parse_bool)
                .unwrap_or(defaults.live_knob_pinning),
            live_knob_edge: parse_var(&lookup, "PLAYHEAD_LIVE_KNOB_EDGE", parse_edge)
                .unwrap_or(defaults.live_knob_edge),
        };

        info!(
            "Config: live tolerance {:?}, minimum DVR window {:?}, seeking during tracking {}",
            config.live_tolerance, config.minimum_dvr_window_length, config.seeking_during_tracking
        );
        config
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            live_tolerance: self.live_tolerance,
            minimum_dvr_window_length: self.minimum_dvr_window_length,
        }
    }

    pub fn scrubber_config(&self) -> ScrubberConfig {
        ScrubberConfig {
            seeking_during_tracking: self.seeking_during_tracking,
            live_knob_pinning: self.live_knob_pinning,
            live_knob_edge: self.live_knob_edge,
        }
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = lookup(key)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!("Config: ignoring invalid {}={:?}", key, raw);
    }
    parsed
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_secs(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

fn parse_edge(value: &str) -> Option<KnobEdge> {
    match value.to_lowercase().as_str() {
        "left" => Some(KnobEdge::Left),
        "right" => Some(KnobEdge::Right),
        _ => None,
    }
}

fn duration_from_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
