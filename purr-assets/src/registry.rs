//! Keyed store of decoded animations with background loading
//!
//! Each accepted [`AssetRegistry::request_load`] runs fetch and decode on its
//! own thread. The result is published with a single insert under the
//! registry lock, so readers see either `Loading` or the complete outcome.

use crate::playback::Playback;
use crate::transport::Transport;
use crate::{LoadError, RegistryConfig};
use log::{debug, info, warn};
use purr_decoder::{DecodedAnimation, DecodedFrame};
use std::collections::HashMap;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle of a named asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Absent,
    Loading,
    Loaded,
    Failed,
}

/// Shared handle to one frame of a loaded animation
#[derive(Debug, Clone)]
pub struct FrameRef {
    animation: Arc<DecodedAnimation>,
    index: usize,
}

impl FrameRef {
    /// Position of the frame in the animation
    pub fn index(&self) -> usize {
        self.index
    }

    /// The animation the frame belongs to
    pub fn animation(&self) -> &Arc<DecodedAnimation> {
        &self.animation
    }
}

impl Deref for FrameRef {
    type Target = DecodedFrame;

    fn deref(&self) -> &DecodedFrame {
        &self.animation.frames()[self.index]
    }
}

struct LoadedAsset {
    animation: Arc<DecodedAnimation>,
    delays: Vec<Duration>,
    playback: Playback,
}

enum Entry {
    Loading,
    Loaded(LoadedAsset),
    Failed(Arc<LoadError>),
}

struct Shared {
    transport: Box<dyn Transport>,
    config: RegistryConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Shared {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Worker body; a panic still publishes a failed entry
    fn run(&self, name: String, source: String) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.load(&name, &source)));
        if outcome.is_err() {
            warn!("Loader for '{}' panicked", name);
            self.entries()
                .insert(name, Entry::Failed(Arc::new(LoadError::WorkerPanicked)));
        }
    }

    fn load(&self, name: &str, source: &str) {
        info!("Loading '{}' from {}", name, source);

        let entry = match self.fetch_and_decode(source) {
            Ok(animation) => {
                info!(
                    "Loaded '{}': {}x{}, {} frames, {} bytes decoded",
                    name,
                    animation.width(),
                    animation.height(),
                    animation.frame_count(),
                    animation.byte_size()
                );
                let delays = animation.frames().iter().map(DecodedFrame::delay).collect();
                Entry::Loaded(LoadedAsset {
                    animation: Arc::new(animation),
                    delays,
                    playback: Playback::new(Instant::now()),
                })
            }
            Err(e) => {
                warn!("Failed to load '{}': {}", name, e);
                Entry::Failed(Arc::new(e))
            }
        };

        self.entries().insert(name.to_string(), entry);
    }

    fn fetch_and_decode(&self, source: &str) -> Result<DecodedAnimation, LoadError> {
        let bytes = self.transport.fetch(source)?;
        debug!("Fetched {} bytes from {}", bytes.len(), source);
        Ok(purr_decoder::decode(&bytes, &self.config.decoder)?)
    }
}

/// Registry of named animations loaded on background threads
pub struct AssetRegistry {
    shared: Arc<Shared>,
    workers: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl AssetRegistry {
    /// Creates a registry with the default decoder settings
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, RegistryConfig::default())
    }

    pub fn with_config(transport: impl Transport + 'static, config: RegistryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport: Box::new(transport),
                config,
                entries: Mutex::new(HashMap::new()),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Starts loading `name` from `source` unless the name is already known.
    ///
    /// Returns true when a new load was started. A failed name stays failed
    /// until [`AssetRegistry::forget_failed`] is called. If the loader thread
    /// cannot be spawned the entry is marked failed right away.
    pub fn request_load(&self, name: &str, source: &str) -> bool {
        self.reap_finished();

        {
            let mut entries = self.shared.entries();
            if entries.contains_key(name) {
                return false;
            }
            entries.insert(name.to_string(), Entry::Loading);
        }

        let shared = Arc::clone(&self.shared);
        let (worker_name, worker_source) = (name.to_string(), source.to_string());
        let spawned = thread::Builder::new()
            .name("purr-loader".to_string())
            .spawn(move || shared.run(worker_name, worker_source));

        match spawned {
            Ok(handle) => {
                self.workers().push((name.to_string(), handle));
            }
            Err(e) => {
                warn!("Could not spawn loader for '{}': {}", name, e);
                self.shared
                    .entries()
                    .insert(name.to_string(), Entry::Failed(Arc::new(LoadError::Spawn(e))));
            }
        }
        true
    }

    /// Lifecycle state of `name`
    pub fn state(&self, name: &str) -> AssetState {
        match self.shared.entries().get(name) {
            None => AssetState::Absent,
            Some(Entry::Loading) => AssetState::Loading,
            Some(Entry::Loaded(_)) => AssetState::Loaded,
            Some(Entry::Failed(_)) => AssetState::Failed,
        }
    }

    /// Frame to display for `name`, if it is loaded
    pub fn current_frame(&self, name: &str) -> Option<FrameRef> {
        match self.shared.entries().get(name) {
            Some(Entry::Loaded(asset)) => Some(FrameRef {
                animation: Arc::clone(&asset.animation),
                index: asset.playback.index(),
            }),
            _ => None,
        }
    }

    /// Canvas size of `name`, if it is loaded
    pub fn dimensions(&self, name: &str) -> Option<(u32, u32)> {
        match self.shared.entries().get(name) {
            Some(Entry::Loaded(asset)) => Some((asset.animation.width(), asset.animation.height())),
            _ => None,
        }
    }

    /// Why `name` failed, if it did
    pub fn failure(&self, name: &str) -> Option<Arc<LoadError>> {
        match self.shared.entries().get(name) {
            Some(Entry::Failed(e)) => Some(Arc::clone(e)),
            _ => None,
        }
    }

    /// Drops a failed entry so that it can be requested again
    pub fn forget_failed(&self, name: &str) -> bool {
        let mut entries = self.shared.entries();
        if matches!(entries.get(name), Some(Entry::Failed(_))) {
            entries.remove(name);
            true
        } else {
            false
        }
    }

    /// Advances the playback of `name` to `now`; true when its frame changed
    pub fn advance(&self, name: &str, now: Instant) -> bool {
        match self.shared.entries().get_mut(name) {
            Some(Entry::Loaded(asset)) => asset.playback.advance(&asset.delays, now),
            _ => false,
        }
    }

    /// Advances every loaded animation; returns how many changed frame
    pub fn advance_all(&self, now: Instant) -> usize {
        let mut changed = 0;
        for entry in self.shared.entries().values_mut() {
            if let Entry::Loaded(asset) = entry {
                if asset.playback.advance(&asset.delays, now) {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Blocks until every started load has finished
    pub fn wait_idle(&self) {
        let workers: Vec<_> = self.workers().drain(..).collect();
        for (name, handle) in workers {
            self.join_worker(name, handle);
        }
    }

    fn workers(&self) -> MutexGuard<'_, Vec<(String, JoinHandle<()>)>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reap_finished(&self) {
        let finished: Vec<_> = {
            let mut workers = self.workers();
            let (finished, running): (Vec<_>, Vec<_>) =
                workers.drain(..).partition(|(_, handle)| handle.is_finished());
            *workers = running;
            finished
        };
        for (name, handle) in finished {
            self.join_worker(name, handle);
        }
    }

    fn join_worker(&self, name: String, handle: JoinHandle<()>) {
        if handle.join().is_err() {
            warn!("Loader for '{}' panicked", name);
            self.shared
                .entries()
                .insert(name, Entry::Failed(Arc::new(LoadError::WorkerPanicked)));
        }
    }
}

impl Drop for AssetRegistry {
    fn drop(&mut self) {
        self.wait_idle();
    }
}
