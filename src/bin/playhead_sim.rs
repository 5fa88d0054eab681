use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{error, info};

use playhead::playback::{
    engine_channel, EngineEvent, EngineEventSender, EngineSample, MediaEngine, PlaybackProgress,
    PlaybackService, SeekRequestId, TimeRange,
};
use playhead::scrubber::{ScrubberEvent, ScrubberReconciler, Seeker};
use playhead::PlayheadConfig;

const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
enum StreamShape {
    OnDemand { length: Duration },
    Dvr { window: Duration },
}

/// Engine state advanced by the ticker task. One tick plays one second of
/// media so the simulation runs ten times faster than real time.
struct SimState {
    shape: StreamShape,
    loaded: bool,
    playing: bool,
    position: Duration,
    live_edge: Duration,
}

impl SimState {
    fn seekable(&self) -> TimeRange {
        match self.shape {
            StreamShape::OnDemand { length } => TimeRange::new(Duration::ZERO, length),
            StreamShape::Dvr { window } => {
                TimeRange::new(self.live_edge.saturating_sub(window), self.live_edge)
            }
        }
    }

    fn sample(&self) -> EngineSample {
        let seekable = self.seekable();
        let buffered_end = seekable
            .end
            .map_or(self.position, |end| (self.position + Duration::from_secs(20)).min(end));
        EngineSample {
            position: self.position,
            buffered: TimeRange::new(seekable.start, buffered_end),
            seekable,
            range_advancing: match self.shape {
                StreamShape::OnDemand { .. } => Some(false),
                // Let the controller infer it
                StreamShape::Dvr { .. } => None,
            },
        }
    }
}

/// Scripted engine answering requests right away
struct SimulatedEngine {
    state: Arc<Mutex<SimState>>,
    events: EngineEventSender,
}

impl SimulatedEngine {
    fn with_state(&self, f: impl FnOnce(&mut SimState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

impl MediaEngine for SimulatedEngine {
    fn load(&mut self, url: &str) {
        info!("Engine loading {}", url);
        let mut seekable = TimeRange::empty();
        self.with_state(|state| {
            state.loaded = true;
            state.position = match state.shape {
                StreamShape::OnDemand { .. } => Duration::ZERO,
                StreamShape::Dvr { .. } => state.live_edge,
            };
            seekable = state.seekable();
        });
        self.events.send(EngineEvent::Ready { seekable });
    }

    fn play(&mut self) {
        self.with_state(|state| state.playing = true);
        self.events.send(EngineEvent::PlayingChanged(true));
    }

    fn pause(&mut self) {
        self.with_state(|state| state.playing = false);
        self.events.send(EngineEvent::PlayingChanged(false));
    }

    fn seek(&mut self, time: Duration, request: SeekRequestId) {
        self.with_state(|state| state.position = time);
        self.events.send(EngineEvent::SeekCompleted {
            request,
            finished: true,
        });
    }

    fn cancel_seek(&mut self, request: SeekRequestId) {
        info!("Engine cancelling {}", request);
    }

    fn reset(&mut self) {
        self.with_state(|state| {
            state.loaded = false;
            state.playing = false;
        });
    }
}

fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    let args: Vec<String> = env::args().collect();
    let shape = match parse_args(&args) {
        Some(shape) => shape,
        None => {
            print_usage(program_name(&args));
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(simulate(shape));
}

async fn simulate(shape: StreamShape) {
    let config = PlayheadConfig::load();
    let state = Arc::new(Mutex::new(SimState {
        shape,
        loaded: false,
        playing: false,
        position: Duration::ZERO,
        live_edge: Duration::from_secs(7200),
    }));

    let (engine_tx, engine_rx) = engine_channel();
    let engine = SimulatedEngine {
        state: state.clone(),
        events: engine_tx.clone(),
    };
    let handle = PlaybackService::start(
        engine,
        engine_rx,
        config.thresholds(),
        tokio::runtime::Handle::current(),
    );

    tokio::spawn(tick(state, engine_tx));

    let (scrubber_tx, mut scrubber_rx) = tokio_mpsc::unbounded_channel();
    let mut scrubber =
        ScrubberReconciler::new(config.scrubber_config(), handle.clone(), scrubber_tx);
    let mut progress_rx = handle.subscribe_progress();

    handle.play_url("sim://stream");
    settle(&mut progress_rx, &mut scrubber, Duration::from_secs(1)).await;

    info!("Dragging knob back to the middle");
    scrubber.begin_drag();
    for step in 1..=5 {
        scrubber.drag_to(1.0 - 0.1 * step as f64);
        settle(&mut progress_rx, &mut scrubber, TICK).await;
    }
    scrubber.end_drag();
    settle(&mut progress_rx, &mut scrubber, Duration::from_secs(1)).await;

    handle.toggle_play_pause();
    settle(&mut progress_rx, &mut scrubber, Duration::from_millis(500)).await;

    while let Ok(event) = scrubber_rx.try_recv() {
        if let ScrubberEvent::MovingToTime {
            time,
            value,
            interactive: true,
        } = event
        {
            info!("Knob dragged to {:.2} ({:?})", value, time);
        }
    }

    let snapshot = handle.snapshot();
    info!(
        "Final state {} at {:?} in {:?}, {:?} stream, live: {}, knob {:.2}",
        snapshot.state,
        snapshot.time,
        snapshot.range,
        snapshot.kind,
        snapshot.is_live,
        scrubber.value()
    );
}

/// Feed progress to the scrubber for `duration`
async fn settle<S: Seeker>(
    progress_rx: &mut tokio_mpsc::UnboundedReceiver<PlaybackProgress>,
    scrubber: &mut ScrubberReconciler<S>,
    duration: Duration,
) {
    let deadline = tokio::time::Instant::now() + duration;
    while let Ok(Some(progress)) = tokio::time::timeout_at(deadline, progress_rx.recv()).await {
        if let PlaybackProgress::StateChanged { state } = &progress {
            info!("Playback state: {}", state);
        }
        scrubber.handle_progress(&progress);
    }
}

/// Advance the simulated media clock and push samples
async fn tick(state: Arc<Mutex<SimState>>, events: EngineEventSender) {
    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;
        let sample = {
            let Ok(mut state) = state.lock() else {
                return;
            };
            if let StreamShape::Dvr { .. } = state.shape {
                state.live_edge += Duration::from_secs(1);
            }
            if !state.loaded {
                continue;
            }
            if state.playing {
                state.position += Duration::from_secs(1);
            }
            state.sample()
        };
        if !events.sample(sample) {
            return;
        }
    }
}

fn parse_args(args: &[String]) -> Option<StreamShape> {
    match args.get(1).map(String::as_str) {
        None | Some("--dvr") => {
            let window = args.get(2).and_then(|v| v.parse().ok()).unwrap_or(3600);
            Some(StreamShape::Dvr {
                window: Duration::from_secs(window),
            })
        }
        Some("--vod") => {
            let length = args.get(2).and_then(|v| v.parse().ok()).unwrap_or(600);
            Some(StreamShape::OnDemand {
                length: Duration::from_secs(length),
            })
        }
        Some(_) => None,
    }
}

fn program_name(args: &[String]) -> &str {
    args.first().map_or("playhead_sim", String::as_str)
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [--dvr <window secs> | --vod <length secs>]", program);
    eprintln!();
    eprintln!("Runs the playback controller and scrubber against a simulated engine.");
    eprintln!("Set PLAYHEAD_* variables (or a .env file) to change thresholds.");
}
