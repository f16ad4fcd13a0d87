//! Error types for selfext

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for selfext operations
pub type SelfextResult<T> = Result<T, SelfextError>;

/// Which toolchain invocation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// `go run` of the rendered generator
    Generate,
    /// `go build` of the final wrapper
    Compile,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStage::Generate => f.write_str("generate"),
            BuildStage::Compile => f.write_str("compile"),
        }
    }
}

/// Errors that can occur while producing a self-extracting executable
#[derive(Error, Debug)]
pub enum SelfextError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive argument is empty or cannot be resolved
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The toolchain cache could not be populated
    #[error("Toolchain bootstrap failed: {0}")]
    Bootstrap(String),

    /// The archive extension is not handled by the extractor
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Staging the archive into the scratch workspace failed
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A template parameter is missing or not name-shaped
    #[error("Template render error: {0}")]
    Render(String),

    /// A toolchain invocation exited unsuccessfully
    #[error("Toolchain {stage} step failed ({})", exit_label(*code))]
    Build {
        stage: BuildStage,
        code: Option<i32>,
        output: String,
    },

    /// The requested OS/architecture pair cannot be built
    #[error("Unsupported target: {0}")]
    UnsupportedTarget(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal or failed to start".to_string(),
    }
}

impl SelfextError {
    /// Captured toolchain output, if this error came from a build step
    pub fn build_output(&self) -> Option<&str> {
        match self {
            SelfextError::Build { output, .. } if !output.trim().is_empty() => Some(output),
            _ => None,
        }
    }
}
