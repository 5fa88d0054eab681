use super::PlaybackProgress;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use tokio::sync::mpsc as tokio_mpsc;
use tracing::{info, warn};

type SubscriptionId = u64;

struct Subscription {
    tx: tokio_mpsc::UnboundedSender<PlaybackProgress>,
}

type Subscriptions = Arc<Mutex<HashMap<SubscriptionId, Subscription>>>;

/// Handle for subscribing to playback progress updates
#[derive(Clone)]
pub struct PlaybackProgressHandle {
    subscriptions: Subscriptions,
    next_id: Arc<AtomicU64>,
}

impl PlaybackProgressHandle {
    /// Create a new progress handle and spawn the task fanning updates out
    /// to subscribers
    pub fn new(
        mut progress_rx: tokio_mpsc::UnboundedReceiver<PlaybackProgress>,
        runtime_handle: tokio::runtime::Handle,
    ) -> Self {
        let subscriptions: Subscriptions = Arc::new(Mutex::new(HashMap::new()));
        let subscriptions_clone = subscriptions.clone();

        runtime_handle.spawn(async move {
            while let Some(progress) = progress_rx.recv().await {
                dispatch(&subscriptions_clone, progress);
            }
            info!("Playback progress channel closed, exiting");
        });

        Self {
            subscriptions,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe to all playback progress updates.
    /// The subscription is removed once the receiver is dropped.
    pub fn subscribe_all(&self) -> tokio_mpsc::UnboundedReceiver<PlaybackProgress> {
        let (tx, rx) = tokio_mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        match self.subscriptions.lock() {
            Ok(mut subs) => {
                subs.insert(id, Subscription { tx });
            }
            Err(_) => warn!("Progress subscriptions poisoned, subscriber {} dropped", id),
        }
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

fn dispatch(subscriptions: &Subscriptions, progress: PlaybackProgress) {
    let Ok(mut subs) = subscriptions.lock() else {
        return;
    };

    // A failed send means the receiver was dropped
    subs.retain(|_, subscription| subscription.tx.send(progress.clone()).is_ok());
}
