//! Pack orchestration
//!
//! A pack runs as a linear state machine:
//!
//! ```text
//! Idle -> ArchiveResolved -> ToolchainReady -> WorkspacePrepared
//!      -> ArchiveStaged -> GeneratorRun -> Compiled -> Done
//! ```
//!
//! Any failure moves to `Aborted`. The scratch workspace is owned by the
//! running pack and removed when it goes out of scope, on success and on
//! every error path.

use crate::assets::{AssetStore, EmbeddedAssets};
use crate::config::PackConfig;
use crate::driver::{BuildBackend, ToolchainDriver};
use crate::error::{BuildStage, SelfextError, SelfextResult};
use crate::extract::ArchiveFormat;
use crate::paths::expand_path;
use crate::progress::{PackProgress, ProgressExt};
use crate::target::BuildTarget;
use crate::template::{GenerationParams, TemplateId, TemplateRenderer};
use crate::toolchain::{ToolchainBootstrapper, ToolchainHandle};
use crate::workspace::ScratchWorkspace;
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

static EMBEDDED_ASSETS: EmbeddedAssets = EmbeddedAssets;
static TOOLCHAIN_DRIVER: ToolchainDriver = ToolchainDriver;

/// File the generator writes next to itself
pub const WRAPPER_SOURCE: &str = "wrapper.go";

/// Stages of a pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackState {
    Idle,
    ArchiveResolved,
    ToolchainReady,
    WorkspacePrepared,
    ArchiveStaged,
    GeneratorRun,
    Compiled,
    Done,
    Aborted,
}

impl fmt::Display for PackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackState::Idle => "idle",
            PackState::ArchiveResolved => "archive-resolved",
            PackState::ToolchainReady => "toolchain-ready",
            PackState::WorkspacePrepared => "workspace-prepared",
            PackState::ArchiveStaged => "archive-staged",
            PackState::GeneratorRun => "generator-run",
            PackState::Compiled => "compiled",
            PackState::Done => "done",
            PackState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Result of a successful pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackOutput {
    /// Path to the generated executable
    pub executable: PathBuf,
    /// Size of the executable in bytes
    pub size: u64,
    /// Size of the embedded archive in bytes
    pub payload_size: u64,
    /// Hex SHA-256 of the embedded archive
    pub payload_sha256: String,
    /// Platform the executable was built for
    pub target: BuildTarget,
}

/// What a pack did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackOutcome {
    /// An executable was produced
    Packed(PackOutput),
    /// No archive was given
    Skipped,
}

/// Archive accepted for packing
#[derive(Debug)]
struct ResolvedArchive {
    path: PathBuf,
    file_name: String,
    format: ArchiveFormat,
    params: GenerationParams,
}

/// Where the Go toolchain comes from
#[derive(Debug)]
enum ToolchainSource {
    /// Embedded distribution, unpacked under this cache root
    Cache(PathBuf),
    /// Existing installation
    Installed(PathBuf),
}

/// Turns an archive into a self-extracting executable
pub struct Packer<'a> {
    config: PackConfig,
    assets: &'a dyn AssetStore,
    backend: &'a dyn BuildBackend,
    renderer: TemplateRenderer,
    progress: Option<PackProgress>,
    state: Cell<PackState>,
    entered: Cell<Instant>,
}

impl Packer<'static> {
    /// Packer using the embedded payloads and the real Go toolchain
    pub fn new(config: PackConfig) -> Self {
        Self::with_backends(config, &EMBEDDED_ASSETS, &TOOLCHAIN_DRIVER)
    }
}

impl<'a> Packer<'a> {
    /// Packer with explicit asset and build backends
    pub fn with_backends(
        config: PackConfig,
        assets: &'a dyn AssetStore,
        backend: &'a dyn BuildBackend,
    ) -> Self {
        Self {
            config,
            assets,
            backend,
            renderer: TemplateRenderer::new(),
            progress: None,
            state: Cell::new(PackState::Idle),
            entered: Cell::new(Instant::now()),
        }
    }

    /// Show spinners for the long-running stages
    pub fn with_progress(mut self, progress: PackProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> PackState {
        self.state.get()
    }

    /// Run the pack
    pub fn pack(&self) -> SelfextResult<PackOutcome> {
        self.state.set(PackState::Idle);
        self.entered.set(Instant::now());

        let result = self.run();
        // The caller reports the error itself
        if let Err(e) = &result {
            debug!(
                target: "selfext::pack",
                state = %self.state(),
                "Pack aborted: {}",
                e
            );
            self.transition(PackState::Aborted);
        }
        result
    }

    fn run(&self) -> SelfextResult<PackOutcome> {
        let Some(raw) = self.config.archive.as_deref() else {
            info!(target: "selfext::pack", "No archive given, nothing to do");
            return Ok(PackOutcome::Skipped);
        };

        // Everything that can be rejected up front is, before the toolchain is touched
        let archive = resolve_archive(raw)?;
        let target = self.config.target()?;
        let toolchain_source = match self.config.goroot()? {
            Some(goroot) => ToolchainSource::Installed(goroot),
            None => ToolchainSource::Cache(self.config.cache_root()?),
        };
        debug!(
            target: "selfext::pack",
            archive = %archive.path.display(),
            format = archive.format.name(),
            build_target = %target,
            "Archive resolved"
        );
        self.transition(PackState::ArchiveResolved);

        let toolchain = self.step("Preparing Go toolchain", "Go toolchain ready", || {
            match &toolchain_source {
                ToolchainSource::Installed(goroot) => ToolchainHandle::from_goroot(goroot),
                ToolchainSource::Cache(cache_root) => {
                    ToolchainBootstrapper::new(self.assets).ensure(cache_root)
                }
            }
        })?;
        let version = self.backend.version(&toolchain)?;
        debug!(
            target: "selfext::pack",
            goroot = %toolchain.root_dir().display(),
            %version,
            "Using Go toolchain"
        );
        self.transition(PackState::ToolchainReady);

        let workspace = ScratchWorkspace::create(self.config.scratch_root.as_deref(), self.assets)?;
        self.transition(PackState::WorkspacePrepared);

        let staged_name = archive.params.embed_directive.to_string_lossy();
        let staged = workspace.stage_archive(&archive.path, &staged_name)?;
        let (payload_size, payload_sha256) = checksum(&staged)?;
        self.transition(PackState::ArchiveStaged);

        let wrapper_dir = workspace.wrapper_dir();
        self.step("Generating wrapper source", "Wrapper source generated", || {
            self.generate(&toolchain, wrapper_dir, &archive.params)
        })?;
        self.transition(PackState::GeneratorRun);

        let executable = archive.path.with_file_name(format!("{}.exe", archive.file_name));
        let size = self.step(
            &format!("Compiling for {}", target),
            &format!("Compiled {}", executable.display()),
            || {
                self.backend
                    .cross_compile(&toolchain, wrapper_dir, &executable, &target)?;
                fs::metadata(&executable)
                    .map(|m| m.len())
                    .map_err(|e| SelfextError::Build {
                        stage: BuildStage::Compile,
                        code: Some(0),
                        output: format!("{} was not produced: {}", executable.display(), e),
                    })
            },
        )?;
        self.transition(PackState::Compiled);

        drop(workspace);
        self.transition(PackState::Done);

        info!(
            target: "selfext::pack",
            executable = %executable.display(),
            size,
            "Pack complete"
        );

        Ok(PackOutcome::Packed(PackOutput {
            executable,
            size,
            payload_size,
            payload_sha256,
            target,
        }))
    }

    /// Render and run the generator, which must leave `wrapper.go` behind
    fn generate(
        &self,
        toolchain: &ToolchainHandle,
        wrapper_dir: &Path,
        params: &GenerationParams,
    ) -> SelfextResult<()> {
        let source = self.renderer.render(TemplateId::Generator, params)?;
        let generator = TemplateId::Generator.file_name();
        fs::write(wrapper_dir.join(generator), source)?;

        let output = self.backend.run_generator(
            toolchain,
            wrapper_dir,
            Path::new(generator),
            &params.archive_file_name,
        )?;

        if !wrapper_dir.join(WRAPPER_SOURCE).is_file() {
            return Err(SelfextError::Build {
                stage: BuildStage::Generate,
                code: output.code,
                output: format!(
                    "generator did not produce {}\n{}",
                    WRAPPER_SOURCE,
                    output.combined()
                ),
            });
        }
        Ok(())
    }

    fn transition(&self, next: PackState) {
        let previous = self.state.replace(next);
        let elapsed = self.entered.replace(Instant::now()).elapsed();
        info!(
            target: "selfext::pack",
            from = %previous,
            to = %next,
            elapsed_ms = elapsed.as_millis() as u64,
            "State transition"
        );
    }

    /// Run `f` under a spinner when progress is enabled
    fn step<T>(
        &self,
        message: &str,
        done: &str,
        f: impl FnOnce() -> SelfextResult<T>,
    ) -> SelfextResult<T> {
        let spinner = self.progress.as_ref().map(|p| p.spinner(message));
        let result = f();
        if let Some(spinner) = spinner {
            match &result {
                Ok(_) => spinner.finish_success(done),
                Err(_) => spinner.finish_error(message),
            }
        }
        result
    }
}

fn resolve_archive(raw: &str) -> SelfextResult<ResolvedArchive> {
    let path = expand_path(raw)?;

    let metadata = fs::metadata(&path)
        .map_err(|e| SelfextError::InvalidPath(format!("{}: {}", path.display(), e)))?;
    if !metadata.is_file() {
        return Err(SelfextError::InvalidPath(format!(
            "{} is not a file",
            path.display()
        )));
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            SelfextError::InvalidPath(format!("{} has no UTF-8 file name", path.display()))
        })?
        .to_string();

    let format = ArchiveFormat::from_file_name(&file_name)?;
    if !format.is_self_extractable() {
        return Err(SelfextError::UnsupportedFormat(format!(
            "{} archives cannot be unpacked by the generated executable ({})",
            format.name(),
            file_name
        )));
    }

    // Names that cannot be carried into the generated source are refused here
    let params = GenerationParams::for_archive(&file_name, format);
    params.validate().map_err(|e| match e {
        SelfextError::Render(reason) => SelfextError::InvalidPath(format!(
            "{}: unusable archive file name ({})",
            path.display(),
            reason
        )),
        other => other,
    })?;

    Ok(ResolvedArchive {
        path,
        file_name,
        format,
        params,
    })
}

/// Size and hex SHA-256 of a file
fn checksum(path: &Path) -> SelfextResult<(u64, String)> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let size = std::io::copy(&mut file, &mut hasher)?;
    Ok((size, format!("{:x}", hasher.finalize())))
}
