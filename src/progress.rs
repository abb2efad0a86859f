//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche della run.
//!
//! ## Responsabilità:
//! - Progress bar visuale con `indicatif` per feedback real-time
//! - Conteggio degli stati terminali (skipped, copied, resized, failed, cancelled)
//! - Byte in ingresso/uscita e file rimasti sopra budget
//! - Report finale aggregato
//!
//! ## Componenti principali:
//! - `ProgressManager`: gestisce la progress bar (lunghezza ignota, la
//!   discovery è lazy)
//! - `RunStats`: statistiche cumulative, risultato della run
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] 150 files [OK] photo.jpg: 62% scale
//! ```

use crate::file_manager::FileManager;
use crate::resizer::events::{FileOutcome, FileReport};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Manages progress reporting for a resize run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager; the total is unknown while the tree is walked
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress manager that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Runs `f` with the bar temporarily cleared, so log lines don't tear it
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.bar.suspend(f)
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A file that ended in `Failed`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub kind: String,
    pub error: String,
}

/// Aggregate of every terminal state of a run
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunStats {
    pub skipped: usize,
    pub copied: usize,
    pub resized: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Resized files whose budget could not be met
    pub over_budget: usize,
    /// Source bytes of copied and resized files
    pub bytes_in: u64,
    /// Bytes written (or that would be written in dry run)
    pub bytes_out: u64,
    pub duration_seconds: f64,
    pub failures: Vec<FailedFile>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &FileReport) {
        match &report.outcome {
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Copied { size } => {
                self.copied += 1;
                self.bytes_in += size;
                self.bytes_out += size;
            }
            FileOutcome::Resized {
                original_size,
                output_size,
                within_budget,
                ..
            } => {
                self.resized += 1;
                self.bytes_in += original_size;
                self.bytes_out += output_size;
                if !within_budget {
                    self.over_budget += 1;
                }
            }
            FileOutcome::Failed { kind, error } => {
                self.failed += 1;
                self.failures.push(FailedFile {
                    path: report.source.clone(),
                    kind: kind.clone(),
                    error: error.clone(),
                });
            }
            FileOutcome::Cancelled => self.cancelled += 1,
        }
    }

    /// Every file that reached a terminal state
    pub fn files_seen(&self) -> usize {
        self.skipped + self.copied + self.resized + self.failed + self.cancelled
    }

    /// Files with an output produced by this run
    pub fn files_written(&self) -> usize {
        self.copied + self.resized
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.bytes_in, self.bytes_out)
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Seen: {} | Resized: {} | Copied: {} | Skipped: {} | Failed: {} | Saved: {} ({:.2}%)",
            self.files_seen(),
            self.resized,
            self.copied,
            self.skipped,
            self.failed,
            FileManager::format_size(self.bytes_in.saturating_sub(self.bytes_out)),
            self.overall_reduction_percent()
        )
    }
}
