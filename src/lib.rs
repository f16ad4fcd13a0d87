//! selfext - Self-Extracting Executables From Any Archive
//!
//! This crate turns an archive (`.zip`, `.tar`, `.tar.gz`/`.tgz`) into a
//! standalone program that recreates the archive's contents when run,
//! for any supported OS/architecture, **without requiring any build tools**
//! on the user's machine.
//!
//! # How it works
//!
//! selfext carries a complete Go toolchain inside its own binary:
//!
//! 1. On first use the toolchain is unpacked into the user cache
//!    (`<config dir>/selfext/go/toolchain/go`) and reused afterwards
//! 2. A small Go project is unpacked into a scratch directory and the
//!    archive is copied next to it as `payload.<ext>`
//! 3. A rendered generator program writes `wrapper.go`, which embeds the
//!    archive with `//go:embed` together with its size and SHA-256
//! 4. The project is cross-compiled with `CGO_ENABLED=0` to
//!    `<archive>.exe` next to the input archive
//!
//! The produced program verifies its payload and unpacks it into
//! `./<archive name without extension>` (or `-d <dir>`).
//!
//! # Quick Start
//!
//! ```bash
//! # Build for the host
//! selfext ~/backups/data.zip
//!
//! # Cross-build for Windows on ARM
//! selfext --os windows --arch arm64 data.tar.gz
//! ```
//!
//! ```no_run
//! use selfext::{PackConfig, PackOutcome, Packer};
//!
//! let config = PackConfig::new().with_archive("data.zip");
//! if let PackOutcome::Packed(output) = Packer::new(config).pack()? {
//!     println!("{} ({} bytes)", output.executable.display(), output.size);
//! }
//! # Ok::<(), selfext::SelfextError>(())
//! ```

mod assets;
mod config;
mod driver;
mod error;
mod extract;
mod packer;
mod paths;
pub mod progress;
mod target;
mod template;
mod toolchain;
mod version;
mod workspace;

// Re-export public API
pub use assets::{
    AssetKind, AssetStore, CachedAsset, EmbeddedAssets, MemoryAssets, TOOLCHAIN_ARCHIVE_ENV,
};
pub use config::{
    CacheSettings, PackConfig, Settings, TargetSettings, ToolchainSettings, CACHE_DIR_ENV,
    SETTINGS_FILE_NAME,
};
pub use driver::{BuildBackend, ProcessOutput, ToolchainDriver};
pub use error::{BuildStage, SelfextError, SelfextResult};
pub use extract::{ArchiveFormat, Extractor};
pub use packer::{PackOutcome, PackOutput, PackState, Packer, WRAPPER_SOURCE};
pub use paths::{expand_path, normalize_path};
pub use progress::{PackProgress, ProgressExt, ProgressStyles};
pub use target::{BuildTarget, TargetArch, TargetOs};
pub use template::{base_name, GenerationParams, TemplateId, TemplateRenderer};
pub use toolchain::{default_cache_root, ToolchainBootstrapper, ToolchainHandle};
pub use version::VersionInfo;
pub use workspace::ScratchWorkspace;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
