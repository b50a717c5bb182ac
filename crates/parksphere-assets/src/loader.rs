//! Background fetch + decode.
//!
//! Jobs go to a pool of named worker threads over a bounded
//! `crossbeam-channel`; decoded payloads come back on a second channel and
//! are drained by the cache on the frame thread. GPU upload never happens
//! here. With zero workers the loader runs each job inline at submit time
//! and still delivers the result through the channel, which keeps tests
//! deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use parksphere_render::{MeshData, TextureData};
use tracing::{debug, warn};

use crate::error::AssetError;
use crate::mesh_codec::decode_mesh;
use crate::source::AssetSource;
use crate::texture::decode_texture;

/// Identity of a cached asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKey {
    Terrain { site: String, level: u8 },
    Texture(String),
}

impl AssetKey {
    pub fn terrain(site: impl Into<String>, level: u8) -> Self {
        Self::Terrain {
            site: site.into(),
            level,
        }
    }
}

/// Terrain LOD asset path for a site.
pub fn terrain_path(site: &str, level: u8) -> String {
    format!("{site}/terrain_lod{level}.psm")
}

/// Terrain colour texture path for a site.
pub fn terrain_texture_path(site: &str) -> String {
    format!("{site}/terrain_color.jpg")
}

/// A unit of background work.
#[derive(Debug, Clone)]
pub struct LoadJob {
    pub key: AssetKey,
    pub path: String,
}

impl LoadJob {
    pub fn for_key(key: AssetKey) -> Self {
        let path = match &key {
            AssetKey::Terrain { site, level } => terrain_path(site, *level),
            AssetKey::Texture(url) => url.clone(),
        };
        Self { key, path }
    }
}

#[derive(Debug)]
pub enum Payload {
    Mesh(MeshData),
    Texture(TextureData),
}

/// A finished job, successful or not.
#[derive(Debug)]
pub struct LoadResult {
    pub key: AssetKey,
    pub path: String,
    pub outcome: Result<Payload, AssetError>,
    pub elapsed_us: u64,
}

/// Fetch and decode one job on the calling thread.
pub fn run_job(source: &dyn AssetSource, job: LoadJob) -> LoadResult {
    let start = Instant::now();
    let outcome = source
        .fetch(&job.path)
        .map_err(AssetError::from)
        .and_then(|bytes| match &job.key {
            AssetKey::Terrain { .. } => Ok(Payload::Mesh(decode_mesh(&bytes)?)),
            AssetKey::Texture(_) => Ok(Payload::Texture(decode_texture(&job.path, &bytes)?)),
        });
    LoadResult {
        key: job.key,
        path: job.path,
        outcome,
        elapsed_us: start.elapsed().as_micros() as u64,
    }
}

/// Worker count used when the configuration leaves `fetch_workers` at 0.
pub fn default_worker_count() -> usize {
    (num_cpus::get() / 2).clamp(1, 4)
}

/// Background fetch/decode pool.
pub struct AssetLoader {
    job_sender: Sender<LoadJob>,
    result_sender: Sender<LoadResult>,
    result_receiver: Receiver<LoadResult>,
    in_flight: Arc<AtomicU64>,
    /// Set in inline mode: jobs run on `submit`.
    inline_source: Option<Arc<dyn AssetSource>>,
    workers: usize,
}

impl AssetLoader {
    /// Spawn `worker_count` workers sharing `source`. Zero workers selects
    /// inline mode.
    pub fn new(source: Arc<dyn AssetSource>, worker_count: usize, queue_capacity: usize) -> Self {
        let (job_sender, job_receiver) = bounded::<LoadJob>(queue_capacity.max(1));
        let (result_sender, result_receiver) = unbounded::<LoadResult>();
        let in_flight = Arc::new(AtomicU64::new(0));

        let mut spawned = 0;
        for index in 0..worker_count {
            let receiver = job_receiver.clone();
            let sender = result_sender.clone();
            let source = Arc::clone(&source);
            let in_flight = Arc::clone(&in_flight);

            let spawn = std::thread::Builder::new()
                .name(format!("asset-loader-{index}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        let result = run_job(source.as_ref(), job);
                        in_flight.fetch_sub(1, Ordering::Relaxed);
                        if sender.send(result).is_err() {
                            break;
                        }
                    }
                });
            match spawn {
                Ok(_) => spawned += 1,
                Err(e) => warn!("Failed to spawn asset loader worker: {e}"),
            }
        }

        let inline_source = (spawned == 0).then_some(source);
        if worker_count > 0 && spawned == 0 {
            warn!("No asset loader workers available; loading inline");
        }
        debug!(workers = spawned, "Asset loader ready");

        Self {
            job_sender,
            result_sender,
            result_receiver,
            in_flight,
            inline_source,
            workers: spawned,
        }
    }

    /// Inline loader: every job runs during `submit`.
    pub fn inline(source: Arc<dyn AssetSource>) -> Self {
        Self::new(source, 0, 1)
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn is_inline(&self) -> bool {
        self.inline_source.is_some()
    }

    /// Queue a job. Returns it back if the queue is full or closed.
    #[allow(clippy::result_large_err)]
    pub fn submit(&self, job: LoadJob) -> Result<(), LoadJob> {
        if let Some(source) = &self.inline_source {
            let result = run_job(source.as_ref(), job);
            // We own the receiver, so the channel cannot be disconnected.
            let _ = self.result_sender.send(result);
            return Ok(());
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.job_sender.try_send(job).map_err(|e| {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            match e {
                TrySendError::Full(job) | TrySendError::Disconnected(job) => job,
            }
        })
    }

    /// Drain every finished job. Call once per frame on the frame thread.
    pub fn drain_results(&self) -> Vec<LoadResult> {
        self.result_receiver.try_iter().collect()
    }

    /// Jobs queued or executing on workers.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_codec::encode_mesh;
    use crate::source::{MemorySource, UnavailableSource};
    use std::time::Duration;

    fn memory_with_lod() -> Arc<MemorySource> {
        let source = MemorySource::new();
        source.insert(terrain_path("a", 0), encode_mesh(&MeshData::uv_sphere(1.0, 8, 4), true));
        Arc::new(source)
    }

    #[test]
    fn test_inline_mode_delivers_on_drain() {
        let loader = AssetLoader::inline(memory_with_lod());
        assert!(loader.is_inline());
        loader.submit(LoadJob::for_key(AssetKey::terrain("a", 0))).unwrap();
        let results = loader.drain_results();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].outcome, Ok(Payload::Mesh(_))));
        assert!(loader.drain_results().is_empty());
    }

    #[test]
    fn test_worker_pool_reports_failures() {
        let loader = AssetLoader::new(Arc::new(UnavailableSource), 2, 8);
        assert_eq!(loader.worker_count(), 2);
        loader.submit(LoadJob::for_key(AssetKey::terrain("a", 1))).unwrap();
        loader
            .submit(LoadJob::for_key(AssetKey::Texture("x.png".into())))
            .unwrap();

        let mut results = Vec::new();
        for _ in 0..200 {
            results.extend(loader.drain_results());
            if results.len() == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome.is_err()));
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[test]
    fn test_full_queue_rejects() {
        let slow = Arc::new(MemorySource::new().with_latency(Duration::from_millis(200)));
        let loader = AssetLoader::new(slow, 1, 1);
        let mut rejected = 0;
        for level in 0..4 {
            if loader.submit(LoadJob::for_key(AssetKey::terrain("s", level))).is_err() {
                rejected += 1;
            }
        }
        assert!(rejected >= 2, "rejected {rejected}");
    }

    #[test]
    fn test_job_paths() {
        assert_eq!(LoadJob::for_key(AssetKey::terrain("12", 3)).path, "12/terrain_lod3.psm");
        assert_eq!(
            LoadJob::for_key(AssetKey::Texture("earth/clouds.png".into())).path,
            "earth/clouds.png"
        );
    }
}
