//! Where asset bytes come from.
//!
//! Paths are relative to the asset root (`earth/earth_day_4k.jpg`,
//! `12/terrain_lod2.psm`). Every source is `Send + Sync` so the loader's
//! worker threads can share one behind an `Arc`.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::FetchError;

/// Largest response body accepted from a remote source.
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// A read-only store of asset bytes.
pub trait AssetSource: Send + Sync {
    /// Fetch the bytes at `path`. Blocking; called from loader workers.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Pick a source from the configured asset root.
///
/// `http://` and `https://` roots fetch over HTTP with `timeout`; `offline`
/// or an empty root yields a source that always fails; anything else is a
/// directory.
pub fn source_for(base: &str, timeout: Duration) -> Arc<dyn AssetSource> {
    let trimmed = base.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Arc::new(HttpSource::new(trimmed, timeout))
    } else if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("offline") {
        Arc::new(UnavailableSource)
    } else {
        Arc::new(DirectorySource::new(trimmed))
    }
}

// ── Directory ──────────────────────────────────────────────────────

/// Assets laid out on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `path` under the root, refusing anything that escapes it.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            .then(|| self.root.join(relative))
    }
}

impl AssetSource for DirectorySource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self
            .resolve(path)
            .ok_or_else(|| FetchError::NotFound(path.to_string()))?;
        std::fs::read(&full).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(path.to_string())
            } else {
                FetchError::Io {
                    path: full.display().to_string(),
                    source: e,
                }
            }
        })
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}

// ── HTTP ───────────────────────────────────────────────────────────

/// Static assets served over HTTP GET.
pub struct HttpSource {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl AssetSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(path);
        debug!(%url, "GET");
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Err(FetchError::NotFound(url)),
            Err(ureq::Error::Status(status, _)) => return Err(FetchError::Status { url, status }),
            Err(ureq::Error::Transport(t)) => {
                return Err(FetchError::Transport {
                    url,
                    reason: t.to_string(),
                });
            }
        };
        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut body)
            .map_err(|e| FetchError::Io {
                path: url.clone(),
                source: e,
            })?;
        Ok(body)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

// ── Memory ─────────────────────────────────────────────────────────

/// Assets held in memory: embedded data and tests.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: Mutex<FxHashMap<String, Vec<u8>>>,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long in every fetch, to simulate a slow network.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(path.into(), bytes);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        let entries = self.entries.lock().map_err(|_| FetchError::Offline)?;
        entries
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_string()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ── Offline ────────────────────────────────────────────────────────

/// A source that always fails; everything renders from fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableSource;

impl AssetSource for UnavailableSource {
    fn fetch(&self, _path: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Offline)
    }

    fn describe(&self) -> String {
        "offline".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("12")).unwrap();
        std::fs::write(dir.path().join("12/terrain_lod0.psm"), b"abc").unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.fetch("12/terrain_lod0.psm").unwrap(), b"abc");
        assert!(matches!(
            source.fetch("12/terrain_lod1.psm"),
            Err(FetchError::NotFound(_))
        ));
    }

    #[test]
    fn test_directory_source_refuses_escape() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(matches!(source.fetch("../etc/passwd"), Err(FetchError::NotFound(_))));
        assert!(matches!(source.fetch("/etc/passwd"), Err(FetchError::NotFound(_))));
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySource::new();
        source.insert("parks.json", b"[]".to_vec());
        assert_eq!(source.fetch("parks.json").unwrap(), b"[]");
        assert!(source.fetch("nope").is_err());
        assert_eq!(source.len(), 1);
    }

    #[test]
    fn test_unavailable_source_always_fails() {
        assert!(matches!(UnavailableSource.fetch("x"), Err(FetchError::Offline)));
    }

    #[test]
    fn test_source_selection() {
        let timeout = Duration::from_secs(1);
        assert_eq!(source_for("offline", timeout).describe(), "offline");
        assert_eq!(source_for("", timeout).describe(), "offline");
        assert_eq!(
            source_for("http://localhost:8000/assets/", timeout).describe(),
            "http://localhost:8000/assets"
        );
        assert!(source_for("public/z/assets", timeout).describe().starts_with("dir:"));
    }

    #[test]
    fn test_http_url_join() {
        let source = HttpSource::new("https://cdn.example.com/assets/", Duration::from_secs(1));
        assert_eq!(
            source.url_for("/earth/clouds.png"),
            "https://cdn.example.com/assets/earth/clouds.png"
        );
    }
}
