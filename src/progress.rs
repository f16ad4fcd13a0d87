//! Progress indicators for CLI operations
//!
//! Spinners draw to stderr and are hidden automatically when stderr is not a
//! terminal, so piped output and tests stay clean.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Style presets for the pack stages
pub struct ProgressStyles;

impl ProgressStyles {
    /// Style for indeterminate operations (spinner only)
    pub fn spinner() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }

    /// Style for success message
    pub fn success() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    /// Style for error message
    pub fn error() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.red} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

/// Progress tracker for a pack run
#[derive(Debug, Clone)]
pub struct PackProgress {
    multi: MultiProgress,
}

impl PackProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Create a spinner for an indeterminate operation
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyles::spinner());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Print a success line
    pub fn success(&self, msg: &str) {
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(ProgressStyles::success());
        pb.set_prefix("✓");
        pb.finish_with_message(msg.to_string());
    }
}

impl Default for PackProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper trait for progress bar operations
pub trait ProgressExt {
    /// Finish with a success message
    fn finish_success(&self, msg: &str);

    /// Finish with an error message
    fn finish_error(&self, msg: &str);
}

impl ProgressExt for ProgressBar {
    fn finish_success(&self, msg: &str) {
        self.set_style(ProgressStyles::success());
        self.set_prefix("✓");
        self.finish_with_message(msg.to_string());
    }

    fn finish_error(&self, msg: &str) {
        self.set_style(ProgressStyles::error());
        self.set_prefix("✗");
        self.finish_with_message(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_styles() {
        let _ = ProgressStyles::spinner();
        let _ = ProgressStyles::success();
        let _ = ProgressStyles::error();
    }

    #[test]
    fn test_pack_progress() {
        let progress = PackProgress::new();
        let pb = progress.spinner("Testing...");
        pb.finish_success("Done");
        let pb = progress.spinner("Failing...");
        pb.finish_error("failed");
        progress.success("packed");
    }
}
