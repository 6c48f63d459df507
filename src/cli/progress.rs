//! Spinner for export stages

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::options::{ExportStage, StageCallback};

/// Creates a spinner for CLI display
pub fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Progress manager for an export run
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(message: &str) -> Self {
        eprintln!("{message}");
        Self {
            pb: create_spinner(),
        }
    }

    /// Callback that moves the spinner message to each new stage
    pub fn stage_callback(&self) -> StageCallback {
        let pb = self.pb.clone();
        Arc::new(move |stage: ExportStage| pb.set_message(format!("{stage}...")))
    }

    pub fn finish(&self, message: &str) {
        self.pb.finish_with_message(message.to_string());
    }

    pub fn abandon(&self) {
        self.pb.finish_and_clear();
    }
}
