// Library exports for integration tests and embedding applications

pub mod config;
pub mod error;
pub mod playback;
pub mod scrubber;

pub use config::PlayheadConfig;
pub use error::{ErrorInfo, PlaybackError};

// Test support (only available with test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
