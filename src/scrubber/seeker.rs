use crate::playback::controller::PlaybackController;
use crate::playback::engine::MediaEngine;
use crate::playback::service::PlaybackHandle;
use std::time::Duration;
use tracing::warn;

/// Something the scrubber can ask to seek.
///
/// Accepted requests must later show up on the progress stream as
/// `SeekStarted`, or as `CommandRejected` for a `seek`.
pub trait Seeker {
    /// Returns false when the request was refused on the spot
    fn request_seek(&mut self, time: Duration) -> bool;
}

impl<S: Seeker + ?Sized> Seeker for &mut S {
    fn request_seek(&mut self, time: Duration) -> bool {
        (**self).request_seek(time)
    }
}

impl Seeker for PlaybackHandle {
    fn request_seek(&mut self, time: Duration) -> bool {
        self.seek(time);
        true
    }
}

impl<E: MediaEngine> Seeker for PlaybackController<E> {
    fn request_seek(&mut self, time: Duration) -> bool {
        match self.seek_to(time) {
            Ok(_) => true,
            Err(e) => {
                warn!("Scrubber seek to {:?} rejected: {}", time, e);
                false
            }
        }
    }
}
