//! Embedded payloads
//!
//! selfext carries two compressed archives inside its own binary:
//!
//! - the Go toolchain distribution, unpacked once into the user cache;
//! - the wrapper project (`go.mod` plus the extraction code shared by every
//!   generated executable), unpacked into each scratch workspace.
//!
//! Both are reached through [`AssetStore`] so the pipeline can be driven by
//! in-memory payloads in tests.

use crate::error::{SelfextError, SelfextResult};
use crate::extract::Extractor;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static TOOLCHAIN_ARCHIVE: &[u8] = include_bytes!(env!("SELFEXT_TOOLCHAIN_PATH"));
static TOOLCHAIN_FILE_NAME: &str = env!("SELFEXT_TOOLCHAIN_FILE");
static WRAPPER_ARCHIVE: &[u8] = include_bytes!(env!("SELFEXT_WRAPPER_PATH"));

/// Runtime fallback when the binary was built without a toolchain
pub const TOOLCHAIN_ARCHIVE_ENV: &str = "SELFEXT_TOOLCHAIN_ARCHIVE";

/// The embedded payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Go toolchain distribution
    Toolchain,
    /// Wrapper project skeleton
    WrapperProject,
}

impl AssetKind {
    /// Subdirectory the asset is unpacked into
    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetKind::Toolchain => "toolchain",
            AssetKind::WrapperProject => "wrapper",
        }
    }
}

/// A named compressed blob
#[derive(Debug, Clone)]
pub struct CachedAsset<'a> {
    pub kind: AssetKind,
    /// File name; its extension selects the decompressor
    pub file_name: Cow<'a, str>,
    pub bytes: Cow<'a, [u8]>,
}

impl CachedAsset<'_> {
    /// Unpack into `dest`, creating it as needed
    pub fn unpack_to(&self, dest: &Path) -> SelfextResult<()> {
        Extractor::new().unpack_bytes(&self.bytes, &self.file_name, dest)
    }
}

/// Source of the embedded payloads
pub trait AssetStore {
    /// Look up an asset
    fn asset(&self, kind: AssetKind) -> SelfextResult<CachedAsset<'_>>;

    /// Unpack an asset into `parent/<kind dir>` and return that directory
    fn extract(&self, kind: AssetKind, parent: &Path) -> SelfextResult<PathBuf> {
        let dest = parent.join(kind.dir_name());
        self.asset(kind)?.unpack_to(&dest)?;
        Ok(dest)
    }
}

/// Payloads compiled into this binary by `build.rs`
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedAssets;

impl EmbeddedAssets {
    pub fn new() -> Self {
        Self
    }

    /// File name of the embedded toolchain, if one was embedded
    pub fn toolchain_name() -> Option<&'static str> {
        (!TOOLCHAIN_ARCHIVE.is_empty()).then_some(TOOLCHAIN_FILE_NAME)
    }

    fn toolchain_from_env() -> SelfextResult<CachedAsset<'static>> {
        let path = std::env::var_os(TOOLCHAIN_ARCHIVE_ENV)
            .map(PathBuf::from)
            .ok_or_else(|| {
                SelfextError::Bootstrap(format!(
                    "this build has no embedded Go toolchain; rebuild with {0}=<go distribution> \
                     or set {0} at run time",
                    TOOLCHAIN_ARCHIVE_ENV
                ))
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SelfextError::Bootstrap(format!("{} must name a file", TOOLCHAIN_ARCHIVE_ENV))
            })?;
        let bytes = std::fs::read(&path).map_err(|e| {
            SelfextError::Bootstrap(format!("failed to read {}: {}", path.display(), e))
        })?;

        tracing::debug!("Using toolchain archive from {}", path.display());
        Ok(CachedAsset {
            kind: AssetKind::Toolchain,
            file_name: Cow::Owned(file_name),
            bytes: Cow::Owned(bytes),
        })
    }
}

impl AssetStore for EmbeddedAssets {
    fn asset(&self, kind: AssetKind) -> SelfextResult<CachedAsset<'_>> {
        match kind {
            AssetKind::Toolchain if TOOLCHAIN_ARCHIVE.is_empty() => Self::toolchain_from_env(),
            AssetKind::Toolchain => Ok(CachedAsset {
                kind,
                file_name: Cow::Borrowed(TOOLCHAIN_FILE_NAME),
                bytes: Cow::Borrowed(TOOLCHAIN_ARCHIVE),
            }),
            AssetKind::WrapperProject => Ok(CachedAsset {
                kind,
                file_name: Cow::Borrowed("wrapper.tar.gz"),
                bytes: Cow::Borrowed(WRAPPER_ARCHIVE),
            }),
        }
    }
}

/// In-memory payloads, for embedding selfext or driving it in tests
#[derive(Debug, Default)]
pub struct MemoryAssets {
    assets: HashMap<AssetKind, (String, Vec<u8>)>,
    lookups: AtomicUsize,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset
    pub fn with(mut self, kind: AssetKind, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.assets.insert(kind, (file_name.into(), bytes));
        self
    }

    /// The embedded wrapper project, so only the toolchain needs faking
    pub fn with_embedded_wrapper(self) -> Self {
        self.with(
            AssetKind::WrapperProject,
            "wrapper.tar.gz",
            WRAPPER_ARCHIVE.to_vec(),
        )
    }

    /// How many times an asset has been looked up
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl AssetStore for MemoryAssets {
    fn asset(&self, kind: AssetKind) -> SelfextResult<CachedAsset<'_>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let (file_name, bytes) = self.assets.get(&kind).ok_or_else(|| {
            SelfextError::Bootstrap(format!("asset '{}' is not available", kind.dir_name()))
        })?;
        Ok(CachedAsset {
            kind,
            file_name: Cow::Borrowed(file_name.as_str()),
            bytes: Cow::Borrowed(bytes.as_slice()),
        })
    }
}

impl<T: AssetStore + ?Sized> AssetStore for &T {
    fn asset(&self, kind: AssetKind) -> SelfextResult<CachedAsset<'_>> {
        (**self).asset(kind)
    }
}
