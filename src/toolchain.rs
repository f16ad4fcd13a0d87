//! Go toolchain bootstrap
//!
//! The toolchain is unpacked once into `<cache root>/toolchain/` and reused
//! by every later run. Extraction happens in a hidden staging directory next
//! to the final location and is renamed into place, so a `toolchain/`
//! directory that exists is always complete, even when two processes
//! bootstrap at the same time. Staging directories a crashed run left
//! behind are swept the next time extraction is needed.

use crate::assets::{AssetKind, AssetStore};
use crate::error::{SelfextError, SelfextResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Prefix of the staging directories extraction happens in
const STAGING_PREFIX: &str = ".toolchain-";

/// Age after which a staging directory is taken to be abandoned
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Location of a usable Go toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainHandle {
    compiler_path: PathBuf,
    root_dir: PathBuf,
}

impl ToolchainHandle {
    /// Handle for an arbitrary compiler, e.g. a stand-in used by tests
    pub fn new(compiler_path: impl Into<PathBuf>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            compiler_path: compiler_path.into(),
            root_dir: root_dir.into(),
        }
    }

    /// Resolve the standard Go distribution layout under `toolchain_dir`
    pub fn in_dir(toolchain_dir: &Path) -> Self {
        let root_dir = toolchain_dir.join("go");
        let compiler_path = root_dir.join("bin").join(compiler_name());
        Self {
            compiler_path,
            root_dir,
        }
    }

    /// Use an installed Go distribution rooted at `goroot` as-is
    pub fn from_goroot(goroot: &Path) -> SelfextResult<Self> {
        let compiler_path = goroot.join("bin").join(compiler_name());
        if !compiler_path.is_file() {
            return Err(SelfextError::Bootstrap(format!(
                "{} is not a Go installation (no bin/{})",
                goroot.display(),
                compiler_name()
            )));
        }
        Ok(Self {
            compiler_path,
            root_dir: goroot.to_path_buf(),
        })
    }

    /// The `go` executable
    pub fn compiler_path(&self) -> &Path {
        &self.compiler_path
    }

    /// `GOROOT`
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

/// Name of the Go binary on this host
fn compiler_name() -> &'static str {
    if cfg!(windows) {
        "go.exe"
    } else {
        "go"
    }
}

/// Default cache root: `<user config dir>/selfext/go`
pub fn default_cache_root() -> SelfextResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("selfext").join("go"))
        .ok_or_else(|| {
            SelfextError::Bootstrap("cannot determine the user config directory".to_string())
        })
}

/// Populates the toolchain cache from an [`AssetStore`]
pub struct ToolchainBootstrapper<'a> {
    assets: &'a dyn AssetStore,
    stale_after: Duration,
}

impl<'a> ToolchainBootstrapper<'a> {
    pub fn new(assets: &'a dyn AssetStore) -> Self {
        Self {
            assets,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Staging directories older than this are removed before extracting
    pub fn with_stale_after(mut self, age: Duration) -> Self {
        self.stale_after = age;
        self
    }

    /// Make sure the toolchain is unpacked under `cache_root` and return its handle.
    ///
    /// Does no I/O beyond a single `stat` once the cache is populated.
    pub fn ensure(&self, cache_root: &Path) -> SelfextResult<ToolchainHandle> {
        let toolchain_dir = cache_root.join(AssetKind::Toolchain.dir_name());

        if toolchain_dir.exists() {
            debug!(
                target: "selfext::bootstrap",
                path = %toolchain_dir.display(),
                "Using cached toolchain"
            );
            return Ok(ToolchainHandle::in_dir(&toolchain_dir));
        }

        info!(
            target: "selfext::bootstrap",
            path = %toolchain_dir.display(),
            "Unpacking Go toolchain (first run)"
        );

        fs::create_dir_all(cache_root).map_err(|e| {
            SelfextError::Bootstrap(format!(
                "cannot create cache directory {}: {}",
                cache_root.display(),
                e
            ))
        })?;

        self.sweep_stale_staging(cache_root);

        // Sibling of the final directory so the rename stays on one filesystem
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(cache_root)
            .map_err(|e| {
                SelfextError::Bootstrap(format!(
                    "cannot create staging directory in {}: {}",
                    cache_root.display(),
                    e
                ))
            })?;

        let asset = self.assets.asset(AssetKind::Toolchain)?;
        if asset.bytes.is_empty() {
            return Err(SelfextError::Bootstrap(format!(
                "embedded toolchain '{}' is empty",
                asset.file_name
            )));
        }
        asset.unpack_to(staging.path()).map_err(|e| {
            SelfextError::Bootstrap(format!("cannot unpack {}: {}", asset.file_name, e))
        })?;

        let staged = ToolchainHandle::in_dir(staging.path());
        if !staged.compiler_path().is_file() {
            return Err(SelfextError::Bootstrap(format!(
                "{} does not contain go/bin/{}",
                asset.file_name,
                compiler_name()
            )));
        }

        match fs::rename(staging.path(), &toolchain_dir) {
            Ok(()) => {
                info!(
                    target: "selfext::bootstrap",
                    path = %toolchain_dir.display(),
                    "Toolchain ready"
                );
            }
            Err(e) if toolchain_dir.exists() => {
                // Another process won the race; its copy is complete
                warn!(
                    target: "selfext::bootstrap",
                    error = %e,
                    "Toolchain was populated concurrently, discarding our copy"
                );
            }
            Err(e) => {
                return Err(SelfextError::Bootstrap(format!(
                    "cannot move toolchain into {}: {}",
                    toolchain_dir.display(),
                    e
                )));
            }
        }

        Ok(ToolchainHandle::in_dir(&toolchain_dir))
    }

    /// Remove staging directories left by runs that died mid-extraction.
    ///
    /// A directory younger than `stale_after` may belong to a run still in
    /// progress and is kept. Failures are logged and otherwise ignored.
    fn sweep_stale_staging(&self, cache_root: &Path) {
        let Ok(entries) = fs::read_dir(cache_root) else {
            return;
        };
        let now = SystemTime::now();

        for entry in entries.flatten() {
            if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < self.stale_after {
                continue;
            }

            let path = entry.path();
            match fs::remove_dir_all(&path) {
                Ok(()) => debug!(
                    target: "selfext::bootstrap",
                    path = %path.display(),
                    age_secs = age.as_secs(),
                    "Removed stale staging directory"
                ),
                Err(e) => warn!(
                    target: "selfext::bootstrap",
                    path = %path.display(),
                    error = %e,
                    "Cannot remove stale staging directory"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{CachedAsset, MemoryAssets};
    use std::borrow::Cow;
    use tempfile::TempDir;

    fn cache_entries(cache: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(cache)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Populates the cache itself while handing out the toolchain, the way a
    /// concurrent process finishing first would
    struct RacingAssets {
        cache_root: PathBuf,
    }

    impl AssetStore for RacingAssets {
        fn asset(&self, kind: AssetKind) -> SelfextResult<CachedAsset<'_>> {
            let winner = ToolchainHandle::in_dir(&self.cache_root.join(kind.dir_name()));
            fs::create_dir_all(winner.compiler_path().parent().unwrap()).unwrap();
            fs::write(winner.compiler_path(), b"winner").unwrap();

            Ok(CachedAsset {
                kind,
                file_name: Cow::Borrowed("go.tar.gz"),
                bytes: Cow::Owned(fake_go_distribution(true)),
            })
        }
    }

    fn fake_go_distribution(with_compiler: bool) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        let mut entries: Vec<(String, &[u8])> = vec![("go/VERSION".to_string(), &b"go1.22.5"[..])];
        if with_compiler {
            entries.push((format!("go/bin/{}", compiler_name()), &b"#!/bin/sh\n"[..]));
        }
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_handle_layout() {
        let handle = ToolchainHandle::in_dir(Path::new("/cache/toolchain"));
        assert_eq!(handle.root_dir(), Path::new("/cache/toolchain/go"));
        assert_eq!(
            handle.compiler_path(),
            Path::new("/cache/toolchain/go/bin").join(compiler_name())
        );
    }

    #[test]
    fn test_ensure_extracts_once() {
        let cache = TempDir::new().unwrap();
        let assets = MemoryAssets::new().with(
            AssetKind::Toolchain,
            "go1.22.5.linux-amd64.tar.gz",
            fake_go_distribution(true),
        );
        let bootstrapper = ToolchainBootstrapper::new(&assets);

        let first = bootstrapper.ensure(cache.path()).unwrap();
        assert!(first.compiler_path().is_file());
        assert_eq!(assets.lookups(), 1);

        let second = bootstrapper.ensure(cache.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(assets.lookups(), 1, "second ensure must not touch the asset");
    }

    #[test]
    fn test_ensure_leaves_no_staging_dirs() {
        let cache = TempDir::new().unwrap();
        let assets =
            MemoryAssets::new().with(AssetKind::Toolchain, "go.tar.gz", fake_go_distribution(true));

        ToolchainBootstrapper::new(&assets).ensure(cache.path()).unwrap();

        assert_eq!(cache_entries(cache.path()), vec!["toolchain".to_string()]);
    }

    #[test]
    fn test_ensure_lost_race_uses_winner() {
        let cache = TempDir::new().unwrap();
        let assets = RacingAssets {
            cache_root: cache.path().to_path_buf(),
        };

        let handle = ToolchainBootstrapper::new(&assets)
            .ensure(cache.path())
            .unwrap();

        assert_eq!(handle, ToolchainHandle::in_dir(&cache.path().join("toolchain")));
        assert_eq!(fs::read(handle.compiler_path()).unwrap(), b"winner");
        assert_eq!(cache_entries(cache.path()), vec!["toolchain".to_string()]);
    }

    #[test]
    fn test_ensure_sweeps_stale_staging() {
        let cache = TempDir::new().unwrap();
        let abandoned = cache.path().join(".toolchain-abandoned");
        fs::create_dir_all(abandoned.join("go/bin")).unwrap();
        fs::create_dir_all(cache.path().join("unrelated")).unwrap();
        let assets =
            MemoryAssets::new().with(AssetKind::Toolchain, "go.tar.gz", fake_go_distribution(true));

        ToolchainBootstrapper::new(&assets)
            .with_stale_after(Duration::ZERO)
            .ensure(cache.path())
            .unwrap();

        assert_eq!(
            cache_entries(cache.path()),
            vec!["toolchain".to_string(), "unrelated".to_string()]
        );
    }

    #[test]
    fn test_ensure_keeps_recent_staging() {
        let cache = TempDir::new().unwrap();
        let in_progress = cache.path().join(".toolchain-busy");
        fs::create_dir_all(&in_progress).unwrap();
        let assets =
            MemoryAssets::new().with(AssetKind::Toolchain, "go.tar.gz", fake_go_distribution(true));

        ToolchainBootstrapper::new(&assets).ensure(cache.path()).unwrap();

        assert!(in_progress.is_dir());
    }

    #[test]
    fn test_handle_from_goroot() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            ToolchainHandle::from_goroot(temp.path()),
            Err(SelfextError::Bootstrap(_))
        ));

        fs::create_dir_all(temp.path().join("bin")).unwrap();
        fs::write(temp.path().join("bin").join(compiler_name()), b"").unwrap();
        let handle = ToolchainHandle::from_goroot(temp.path()).unwrap();
        assert_eq!(handle.root_dir(), temp.path());
    }

    #[test]
    fn test_ensure_missing_compiler() {
        let cache = TempDir::new().unwrap();
        let assets = MemoryAssets::new().with(
            AssetKind::Toolchain,
            "go.tar.gz",
            fake_go_distribution(false),
        );

        let err = ToolchainBootstrapper::new(&assets)
            .ensure(cache.path())
            .unwrap_err();
        assert!(matches!(err, SelfextError::Bootstrap(_)));
        assert!(!cache.path().join("toolchain").exists());
    }

    #[test]
    fn test_ensure_corrupt_payload() {
        let cache = TempDir::new().unwrap();
        let assets =
            MemoryAssets::new().with(AssetKind::Toolchain, "go.tar.gz", b"not gzip".to_vec());

        let err = ToolchainBootstrapper::new(&assets)
            .ensure(cache.path())
            .unwrap_err();
        assert!(matches!(err, SelfextError::Bootstrap(_)));
        assert!(!cache.path().join("toolchain").exists());
    }

    #[test]
    fn test_ensure_empty_payload() {
        let cache = TempDir::new().unwrap();
        let assets = MemoryAssets::new().with(AssetKind::Toolchain, "go.tar.gz", Vec::new());

        let err = ToolchainBootstrapper::new(&assets)
            .ensure(cache.path())
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
