use crate::playback::controller::{PlaybackController, PlaybackSnapshot, PlaybackState};
use crate::playback::engine::{EngineEvent, MediaEngine};
use crate::playback::progress::{PlaybackProgress, PlaybackProgressHandle};
use crate::playback::stream_model::{StreamKind, Thresholds};
use crate::playback::time_range::TimeRange;
use crate::error::PlaybackError;
use std::time::Duration;
use tokio::sync::{mpsc as tokio_mpsc, watch};
use tracing::{info, warn};

/// Playback commands sent to the service
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackCommand {
    /// Load an item, optionally starting at a position
    Load(String, Option<Duration>),
    PlayUrl(String, Option<Duration>),
    Play,
    Pause,
    TogglePlayPause,
    Seek(Duration),
    Stop,
    Reset,
    SetThresholds(Thresholds),
}

/// Handle to the playback service for sending commands and reading state
#[derive(Clone)]
pub struct PlaybackHandle {
    command_tx: tokio_mpsc::UnboundedSender<PlaybackCommand>,
    progress_handle: PlaybackProgressHandle,
    snapshot_rx: watch::Receiver<PlaybackSnapshot>,
}

impl PlaybackHandle {
    pub fn load(&self, url: impl Into<String>) {
        self.send(PlaybackCommand::Load(url.into(), None));
    }

    pub fn load_at(&self, url: impl Into<String>, start_time: Duration) {
        self.send(PlaybackCommand::Load(url.into(), Some(start_time)));
    }

    pub fn play_url(&self, url: impl Into<String>) {
        self.send(PlaybackCommand::PlayUrl(url.into(), None));
    }

    pub fn play_url_at(&self, url: impl Into<String>, start_time: Duration) {
        self.send(PlaybackCommand::PlayUrl(url.into(), Some(start_time)));
    }

    pub fn play(&self) {
        self.send(PlaybackCommand::Play);
    }

    pub fn pause(&self) {
        self.send(PlaybackCommand::Pause);
    }

    pub fn toggle_play_pause(&self) {
        self.send(PlaybackCommand::TogglePlayPause);
    }

    /// Request a seek. Completion arrives as `PlaybackProgress::SeekCompleted`.
    pub fn seek(&self, position: Duration) {
        self.send(PlaybackCommand::Seek(position));
    }

    /// Stop playback but keep the item; `play` restarts it
    pub fn stop(&self) {
        self.send(PlaybackCommand::Stop);
    }

    pub fn reset(&self) {
        self.send(PlaybackCommand::Reset);
    }

    pub fn set_thresholds(&self, thresholds: Thresholds) {
        self.send(PlaybackCommand::SetThresholds(thresholds));
    }

    pub fn subscribe_progress(&self) -> tokio_mpsc::UnboundedReceiver<PlaybackProgress> {
        self.progress_handle.subscribe_all()
    }

    /// Latest consistent snapshot of the controller
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified after every update that changed the snapshot
    pub fn watch_snapshot(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.snapshot_rx.borrow().state.clone()
    }

    pub fn current_time(&self) -> Duration {
        self.snapshot_rx.borrow().time
    }

    pub fn current_range(&self) -> TimeRange {
        self.snapshot_rx.borrow().range
    }

    pub fn stream_kind(&self) -> StreamKind {
        self.snapshot_rx.borrow().kind
    }

    pub fn is_live(&self) -> bool {
        self.snapshot_rx.borrow().is_live
    }

    fn send(&self, command: PlaybackCommand) {
        if self.command_tx.send(command).is_err() {
            warn!("Playback service is gone, command dropped");
        }
    }
}

/// Service owning the playback controller.
///
/// Commands from handles and events from the engine are applied one at a
/// time on a single task, so the controller never sees concurrent mutation.
pub struct PlaybackService<E: MediaEngine> {
    controller: PlaybackController<E>,
    command_rx: tokio_mpsc::UnboundedReceiver<PlaybackCommand>,
    engine_rx: tokio_mpsc::UnboundedReceiver<EngineEvent>,
    progress_tx: tokio_mpsc::UnboundedSender<PlaybackProgress>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
}

impl<E: MediaEngine + 'static> PlaybackService<E> {
    /// Spawn the service on `runtime_handle`.
    ///
    /// `engine_rx` is the receiving half of [`engine_channel`], whose sender
    /// the engine adapter pushes its events into.
    ///
    /// [`engine_channel`]: crate::playback::engine::engine_channel
    pub fn start(
        engine: E,
        engine_rx: tokio_mpsc::UnboundedReceiver<EngineEvent>,
        thresholds: Thresholds,
        runtime_handle: tokio::runtime::Handle,
    ) -> PlaybackHandle {
        let (command_tx, command_rx) = tokio_mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = tokio_mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(PlaybackSnapshot::default());

        let progress_handle = PlaybackProgressHandle::new(progress_rx, runtime_handle.clone());

        let handle = PlaybackHandle {
            command_tx,
            progress_handle,
            snapshot_rx,
        };

        let service = PlaybackService {
            controller: PlaybackController::new(engine, thresholds, progress_tx.clone()),
            command_rx,
            engine_rx,
            progress_tx,
            snapshot_tx,
        };
        runtime_handle.spawn(service.run());

        handle
    }

    async fn run(mut self) {
        info!("PlaybackService started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // Every handle was dropped
                    None => break,
                },
                Some(event) = self.engine_rx.recv() => {
                    self.controller.handle_engine_event(event);
                }
            }

            self.publish_snapshot();
        }

        self.controller.reset();
        info!("PlaybackService stopped");
    }

    fn handle_command(&mut self, command: PlaybackCommand) {
        let result = match command {
            PlaybackCommand::Load(url, start_time) => {
                match start_time {
                    Some(start_time) => self.controller.load_at(&url, start_time),
                    None => self.controller.load(&url),
                }
                Ok(())
            }
            PlaybackCommand::PlayUrl(url, start_time) => {
                match start_time {
                    Some(start_time) => self.controller.play_url_at(&url, start_time),
                    None => self.controller.play_url(&url),
                }
                Ok(())
            }
            PlaybackCommand::Play => self.controller.play(),
            PlaybackCommand::Pause => self.controller.pause(),
            PlaybackCommand::TogglePlayPause => self.controller.toggle_play_pause(),
            PlaybackCommand::Seek(position) => self.controller.seek_to(position).map(|_| ()),
            PlaybackCommand::Stop => {
                self.controller.stop();
                Ok(())
            }
            PlaybackCommand::Reset => {
                self.controller.reset();
                Ok(())
            }
            PlaybackCommand::SetThresholds(thresholds) => {
                self.controller.set_thresholds(thresholds);
                Ok(())
            }
        };

        if let Err(error) = result {
            self.reject(error);
        }
    }

    fn reject(&self, error: PlaybackError) {
        warn!("Playback command rejected: {}", error);
        let _ = self
            .progress_tx
            .send(PlaybackProgress::CommandRejected { error });
    }

    fn publish_snapshot(&self) {
        let snapshot = self.controller.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}
