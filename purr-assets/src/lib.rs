//! Purr Assets Library
//!
//! This library loads animated GIFs in the background, keeps the decoded
//! frames keyed by name and schedules their playback for a polling renderer.

pub mod playback;
pub mod registry;
pub mod transport;

pub use playback::Playback;
pub use registry::{AssetRegistry, AssetState, FrameRef};
pub use transport::{AutoTransport, FileTransport, HttpConfig, HttpTransport, Transport};

pub use purr_decoder::{DecodedAnimation, DecodedFrame, DecoderConfig};

/// Errors raised while fetching raw bytes
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] ureq::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),
}

/// Reasons an asset ends up failed
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Fetch failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode failed: {0}")]
    Decode(#[from] purr_decoder::Error),

    #[error("Could not spawn loader thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Loader thread panicked")]
    WorkerPanicked,
}

/// Registry configuration
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Settings passed to every decode
    pub decoder: DecoderConfig,
}
