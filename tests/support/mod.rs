use std::time::Duration;
use tokio::sync::mpsc as tokio_mpsc;
use tokio::time::{timeout, Instant};

use playhead::playback::PlaybackProgress;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Receive progress until `predicate` matches, handing every event
/// (including the match) to `observe`
pub async fn recv_until<P, O>(
    progress_rx: &mut tokio_mpsc::UnboundedReceiver<PlaybackProgress>,
    timeout_duration: Duration,
    mut observe: O,
    predicate: P,
) -> Option<PlaybackProgress>
where
    P: Fn(&PlaybackProgress) -> bool,
    O: FnMut(&PlaybackProgress),
{
    let deadline = Instant::now() + timeout_duration;

    while Instant::now() < deadline {
        match timeout(Duration::from_millis(100), progress_rx.recv()).await {
            Ok(Some(progress)) => {
                observe(&progress);
                if predicate(&progress) {
                    return Some(progress);
                }
            }
            Ok(None) => break,
            Err(_) => continue,
        }
    }

    None
}

/// Drain whatever progress arrives within `window`
pub async fn drain(
    progress_rx: &mut tokio_mpsc::UnboundedReceiver<PlaybackProgress>,
    window: Duration,
) -> Vec<PlaybackProgress> {
    let mut events = Vec::new();
    let deadline = Instant::now() + window;
    while let Ok(Some(progress)) = tokio::time::timeout_at(deadline, progress_rx.recv()).await {
        events.push(progress);
    }
    events
}

/// Poll `condition` until it holds or `timeout_duration` elapses
pub async fn eventually<F: Fn() -> bool>(condition: F, timeout_duration: Duration) -> bool {
    let deadline = Instant::now() + timeout_duration;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
