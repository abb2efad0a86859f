//! # Progress Tracking Module
//!
//! Unifica progress bar e sink degli eventi in un singolo tracker thread-safe.
//! Ogni evento viene inoltrato al sink interno con la barra sospesa, così le
//! righe di log non la spezzano.

use crate::config::RunConfig;
use crate::progress::{ProgressManager, RunStats};
use crate::resizer::events::{EventSink, FileOutcome, FileReport};
use std::sync::Arc;

/// Sink che aggiorna la progress bar e inoltra al sink interno
pub struct ProgressTracker {
    inner: Arc<dyn EventSink>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    /// Crea un nuovo tracker attorno a `inner`
    pub fn new(inner: Arc<dyn EventSink>) -> Self {
        Self::with_manager(inner, ProgressManager::new())
    }

    pub fn with_manager(inner: Arc<dyn EventSink>, progress_manager: ProgressManager) -> Self {
        Self {
            inner,
            progress_manager,
        }
    }

    /// Messaggio breve per la barra
    fn status_message(report: &FileReport) -> String {
        let name = report.file_name();
        match &report.outcome {
            FileOutcome::Skipped => format!("[SKIP] {}: already exists", name),
            FileOutcome::Copied { .. } => format!("[COPY] {}: within budget", name),
            FileOutcome::Resized {
                scale_percent,
                within_budget: true,
                ..
            } => format!("[OK] {}: {}% scale", name, scale_percent),
            FileOutcome::Resized { scale_percent, .. } => {
                format!("[OVER] {}: {}% scale, budget not met", name, scale_percent)
            }
            FileOutcome::Failed { .. } => format!("[ERROR] {}: error", name),
            FileOutcome::Cancelled => format!("[STOP] {}: cancelled", name),
        }
    }
}

impl EventSink for ProgressTracker {
    fn run_started(&self, run: &RunConfig) {
        self.progress_manager.suspend(|| self.inner.run_started(run));
    }

    fn file_finished(&self, report: &FileReport) {
        self.progress_manager
            .suspend(|| self.inner.file_finished(report));
        self.progress_manager.update(&Self::status_message(report));
    }

    fn run_finished(&self, stats: &RunStats) {
        self.progress_manager.finish(&stats.format_summary());
        self.inner.run_finished(stats);
    }
}
