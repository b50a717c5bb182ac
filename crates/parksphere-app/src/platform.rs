//! OS directory resolution for config, cache and log files.

use std::io;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "parksphere";

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The OS did not provide a configuration directory.
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Where ParkSphere keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    /// Holds `config.ron`.
    pub config_dir: PathBuf,
    /// Downloaded assets, when a directory source mirrors a remote root.
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl PlatformDirs {
    /// Resolve the OS locations without touching the disk.
    pub fn resolve() -> Result<Self, PlatformError> {
        let config_dir = dirs::config_dir()
            .ok_or(PlatformError::NoConfigDir)?
            .join(APP_NAME);
        let cache_dir = dirs::cache_dir()
            .map(|base| base.join(APP_NAME))
            .unwrap_or_else(|| config_dir.join("cache"));
        Ok(Self {
            log_dir: config_dir.join("logs"),
            config_dir,
            cache_dir,
        })
    }

    /// Everything under one directory, as used with `--config`.
    pub fn rooted(config_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            cache_dir: config_dir.join("cache"),
            log_dir: config_dir.join("logs"),
        }
    }

    /// `--config` if given, else the OS locations.
    pub fn for_override(config_dir: Option<&Path>) -> Result<Self, PlatformError> {
        match config_dir {
            Some(dir) => Ok(Self::rooted(dir)),
            None => Self::resolve(),
        }
    }

    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        for dir in [&self.config_dir, &self.cache_dir, &self.log_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_roots_everything() {
        let root = Path::new("/tmp/parksphere-root");
        let dirs = PlatformDirs::for_override(Some(root)).expect("override never fails");
        assert_eq!(dirs.config_dir, root);
        assert!(dirs.log_dir.starts_with(root));
        assert!(dirs.cache_dir.starts_with(root));
    }

    #[test]
    fn test_resolved_dirs_are_namespaced() {
        // Headless CI images may lack a config dir entirely.
        if let Ok(dirs) = PlatformDirs::resolve() {
            assert!(dirs.config_dir.ends_with(APP_NAME));
            assert!(dirs.log_dir.starts_with(&dirs.config_dir));
        }
    }

    #[test]
    fn test_directory_creation() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dirs = PlatformDirs::rooted(&tmp.path().join(APP_NAME));
        dirs.create_dirs().expect("create_dirs");
        assert!(dirs.config_dir.is_dir());
        assert!(dirs.cache_dir.is_dir());
        assert!(dirs.log_dir.is_dir());
    }
}
