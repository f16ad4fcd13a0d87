//! Go toolchain invocations
//!
//! Two blocking subprocess calls make up a pack: running the rendered
//! generator, then cross-compiling the wrapper package it produced. A
//! `go version` check runs before them. All go through [`BuildBackend`] so
//! the orchestration can be tested without Go.

use crate::error::{BuildStage, SelfextError, SelfextResult};
use crate::target::BuildTarget;
use crate::toolchain::ToolchainHandle;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Captured result of a toolchain process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr, for diagnostics
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

impl From<std::process::Output> for ProcessOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// The toolchain calls of a pack
pub trait BuildBackend {
    /// Report the toolchain version, e.g. `go version go1.22.5 linux/amd64`.
    /// Fails with [`SelfextError::Bootstrap`] when the compiler cannot run.
    fn version(&self, toolchain: &ToolchainHandle) -> SelfextResult<String>;

    /// Run `generator_source` in `work_dir` with `--file <archive_file_name>`.
    /// The generator writes `wrapper.go` next to itself.
    fn run_generator(
        &self,
        toolchain: &ToolchainHandle,
        work_dir: &Path,
        generator_source: &Path,
        archive_file_name: &str,
    ) -> SelfextResult<ProcessOutput>;

    /// Compile the package at `source` (a directory, or a single file) into
    /// `output` for `target`
    fn cross_compile(
        &self,
        toolchain: &ToolchainHandle,
        source: &Path,
        output: &Path,
        target: &BuildTarget,
    ) -> SelfextResult<ProcessOutput>;
}

/// [`BuildBackend`] that runs the real `go` binary
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolchainDriver;

impl ToolchainDriver {
    pub fn new() -> Self {
        Self
    }

    /// Base command with the toolchain environment applied on top of the
    /// inherited one
    fn command(toolchain: &ToolchainHandle) -> Command {
        let mut cmd = Command::new(toolchain.compiler_path());
        cmd.env("GOROOT", toolchain.root_dir())
            .env("GOTOOLCHAIN", "local")
            .env("GOPROXY", "off");
        cmd
    }

    fn run(stage: BuildStage, mut cmd: Command) -> SelfextResult<ProcessOutput> {
        debug!(target: "selfext::driver", %stage, command = ?cmd, "Running toolchain");

        let output = cmd.output().map_err(|e| SelfextError::Build {
            stage,
            code: None,
            output: format!("failed to start {}: {}", cmd.get_program().to_string_lossy(), e),
        })?;
        let output = ProcessOutput::from(output);

        if !output.stdout.is_empty() {
            debug!(target: "selfext::driver", %stage, "stdout:\n{}", output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            debug!(target: "selfext::driver", %stage, "stderr:\n{}", output.stderr.trim_end());
        }

        if !output.success() {
            return Err(SelfextError::Build {
                stage,
                code: output.code,
                output: output.combined(),
            });
        }
        Ok(output)
    }
}

impl BuildBackend for ToolchainDriver {
    fn version(&self, toolchain: &ToolchainHandle) -> SelfextResult<String> {
        let output = Self::command(toolchain)
            .arg("version")
            .output()
            .map_err(|e| {
                SelfextError::Bootstrap(format!(
                    "failed to run {}: {}",
                    toolchain.compiler_path().display(),
                    e
                ))
            })?;
        let output = ProcessOutput::from(output);
        if !output.success() {
            return Err(SelfextError::Bootstrap(format!(
                "`go version` failed: {}",
                output.combined().trim()
            )));
        }
        Ok(output.stdout.trim().to_string())
    }

    fn run_generator(
        &self,
        toolchain: &ToolchainHandle,
        work_dir: &Path,
        generator_source: &Path,
        archive_file_name: &str,
    ) -> SelfextResult<ProcessOutput> {
        let mut cmd = Self::command(toolchain);
        cmd.current_dir(work_dir)
            .arg("run")
            .arg(generator_source)
            .arg("--file")
            .arg(archive_file_name);
        Self::run(BuildStage::Generate, cmd)
    }

    fn cross_compile(
        &self,
        toolchain: &ToolchainHandle,
        source: &Path,
        output: &Path,
        target: &BuildTarget,
    ) -> SelfextResult<ProcessOutput> {
        let mut cmd = Self::command(toolchain);
        cmd.envs(target.env())
            .env("CGO_ENABLED", "0")
            .arg("build")
            .arg("-trimpath")
            .arg("-o")
            .arg(output);

        if source.is_dir() {
            cmd.current_dir(source).arg(".");
        } else {
            let file_name = source.file_name().ok_or_else(|| {
                SelfextError::InvalidPath(format!("{} has no file name", source.display()))
            })?;
            if let Some(parent) = source.parent().filter(|p| !p.as_os_str().is_empty()) {
                cmd.current_dir(parent);
            }
            cmd.arg(file_name);
        }

        Self::run(BuildStage::Compile, cmd)
    }
}

impl<T: BuildBackend + ?Sized> BuildBackend for &T {
    fn version(&self, toolchain: &ToolchainHandle) -> SelfextResult<String> {
        (**self).version(toolchain)
    }

    fn run_generator(
        &self,
        toolchain: &ToolchainHandle,
        work_dir: &Path,
        generator_source: &Path,
        archive_file_name: &str,
    ) -> SelfextResult<ProcessOutput> {
        (**self).run_generator(toolchain, work_dir, generator_source, archive_file_name)
    }

    fn cross_compile(
        &self,
        toolchain: &ToolchainHandle,
        source: &Path,
        output: &Path,
        target: &BuildTarget,
    ) -> SelfextResult<ProcessOutput> {
        (**self).cross_compile(toolchain, source, output, target)
    }
}
