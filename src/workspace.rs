//! Per-invocation scratch workspace

use crate::assets::{AssetKind, AssetStore};
use crate::error::{SelfextError, SelfextResult};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary directory holding the wrapper project for one run.
///
/// Removed recursively when dropped, whichever way the run ends.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
    wrapper_dir: PathBuf,
}

impl ScratchWorkspace {
    /// Create a workspace under `root` (the system temp dir when `None`)
    /// and unpack the wrapper project into it
    pub fn create(root: Option<&Path>, assets: &dyn AssetStore) -> SelfextResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("selfext_wrapper");
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let wrapper_dir = assets.extract(AssetKind::WrapperProject, dir.path())?;
        tracing::debug!("Scratch workspace: {}", dir.path().display());

        Ok(Self { dir, wrapper_dir })
    }

    /// Workspace root
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory containing the wrapper project (`go.mod` etc.)
    pub fn wrapper_dir(&self) -> &Path {
        &self.wrapper_dir
    }

    /// Copy `archive` into the wrapper directory as `staged_name`, keeping
    /// its permission bits
    pub fn stage_archive(&self, archive: &Path, staged_name: &str) -> SelfextResult<PathBuf> {
        let dest = self.wrapper_dir.join(staged_name);

        // fs::copy carries the source permissions over
        fs::copy(archive, &dest).map_err(|source| SelfextError::Copy {
            from: archive.to_path_buf(),
            to: dest.clone(),
            source,
        })?;

        Ok(dest)
    }
}
