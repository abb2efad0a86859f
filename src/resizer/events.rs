//! # Events Module
//!
//! Esito di ogni file e sink iniettabile che lo riceve.
//!
//! ## Responsabilità:
//! - `FileOutcome`: stato terminale di un file (skip, copia, resize, errore, stop)
//! - `FileReport`: esito + identità del file, unica traccia osservabile
//! - `EventSink`: interfaccia passata a dispatcher e pipeline al posto di
//!   configurazione globale del logging
//!
//! ## Implementazioni:
//! - `TracingSink`: una riga `tracing` strutturata per decisione
//! - `MemorySink`: raccoglie i report in memoria (embedding, test)
//! - `JsonSink` (in `json_output`) e `ProgressTracker` (progress bar)

use crate::config::RunConfig;
use crate::file_manager::FileManager;
use crate::progress::RunStats;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// What happened to the EXIF blob of a resized file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataHandling {
    /// Plain codec, or the source had no EXIF block
    None,
    Kept,
    /// Metadata requested but the output container cannot carry EXIF
    Dropped,
}

/// Terminal state of one file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Destination already present
    Skipped,
    /// Source within budget, copied byte for byte
    Copied { size: u64 },
    Resized {
        original_size: u64,
        output_size: u64,
        scale_percent: u8,
        within_budget: bool,
        probes: u32,
        metadata: MetadataHandling,
    },
    Failed { kind: String, error: String },
    Cancelled,
}

/// Esito di un file con la sua identità
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// True when nothing was written
    pub dry_run: bool,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }
}

/// Receives per-file decisions and run boundaries
pub trait EventSink: Send + Sync {
    fn run_started(&self, _run: &RunConfig) {}

    fn file_finished(&self, report: &FileReport);

    fn run_finished(&self, _stats: &RunStats) {}
}

/// Logs every decision as a structured `tracing` event
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn run_started(&self, run: &RunConfig) {
        info!("Starting resize of: {}", run.source_root.display());
        info!("Output directory: {}", run.destination_root.display());
        info!(
            "Target size: {} | Threads: {} | Filter: {} | Metadata: {}",
            FileManager::format_size(run.target_file_size),
            run.num_threads,
            run.resize_filter,
            if run.preserve_metadata { "preserved" } else { "stripped" }
        );
        if run.dry_run {
            info!("Dry run mode: No files will be written");
        }
    }

    fn file_finished(&self, report: &FileReport) {
        let file = report.source.display();
        let destination = report.destination.display();
        match &report.outcome {
            FileOutcome::Skipped => {
                info!(%file, %destination, reason = "destination exists", "skipped");
            }
            FileOutcome::Copied { size } => {
                info!(
                    %file,
                    %destination,
                    size = *size,
                    reason = "within budget",
                    "copied without resizing"
                );
            }
            FileOutcome::Resized {
                original_size,
                output_size,
                scale_percent,
                within_budget,
                probes,
                metadata,
            } => {
                if *within_budget {
                    info!(
                        %file,
                        %destination,
                        original_size = *original_size,
                        output_size = *output_size,
                        scale_percent = *scale_percent,
                        probes = *probes,
                        "resized"
                    );
                } else {
                    warn!(
                        %file,
                        %destination,
                        original_size = *original_size,
                        output_size = *output_size,
                        scale_percent = *scale_percent,
                        reason = "budget unattainable, smallest scale used",
                        "resized over budget"
                    );
                }
                if *metadata == MetadataHandling::Dropped {
                    warn!(%file, reason = "format cannot carry EXIF", "metadata dropped");
                }
            }
            FileOutcome::Failed { kind, error } => {
                error!(%file, kind = %kind, reason = %error, "failed to process image");
            }
            FileOutcome::Cancelled => {
                warn!(%file, reason = "stop requested", "cancelled");
            }
        }
    }

    fn run_finished(&self, stats: &RunStats) {
        info!("=== Resize Complete ===");
        info!("Files resized: {}", stats.resized);
        info!("Files copied: {}", stats.copied);
        info!("Files skipped: {}", stats.skipped);
        info!("Files failed: {}", stats.failed);
        if stats.cancelled > 0 {
            info!("Files cancelled: {}", stats.cancelled);
        }
        if stats.over_budget > 0 {
            warn!("Resized over budget: {}", stats.over_budget);
        }
        info!(
            "Bytes in: {} | Bytes out: {} | Elapsed: {:.2}s",
            FileManager::format_size(stats.bytes_in),
            FileManager::format_size(stats.bytes_out),
            stats.duration_seconds
        );
        for failure in &stats.failures {
            error!("Failed: {} ({})", failure.path.display(), failure.error);
        }
    }
}

/// Collects every report in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<FileReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the reports received so far
    pub fn reports(&self) -> Vec<FileReport> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn file_finished(&self, report: &FileReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
    }
}
