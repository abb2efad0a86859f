//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso da altri
//! programmi (una riga JSON per evento su stdout).
//!
//! ## Tipi di messaggi:
//! - `start`: inizio della run con la configurazione risolta
//! - `file_complete`: stato terminale di un file
//! - `complete`: fine della run con le statistiche aggregate
//! - `error`: errore fatale

use crate::config::RunConfig;
use crate::progress::RunStats;
use crate::resize::ResizeAlgorithm;
use crate::resizer::events::{EventSink, FileReport};
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage<'a> {
    /// Inizio della run
    #[serde(rename = "start")]
    Start {
        source_dir: PathBuf,
        destination_dir: PathBuf,
        config: JsonConfig,
    },

    /// Fine elaborazione di un file specifico
    #[serde(rename = "file_complete")]
    FileComplete {
        #[serde(flatten)]
        report: &'a FileReport,
    },

    /// Run completata
    #[serde(rename = "complete")]
    Complete {
        #[serde(flatten)]
        stats: &'a RunStats,
    },

    /// Errore fatale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub target_file_size: u64,
    pub num_threads: usize,
    pub preserve_metadata: bool,
    pub jpeg_quality: u8,
    pub resize_filter: ResizeAlgorithm,
    pub extensions: Vec<String>,
    pub dry_run: bool,
}

impl JsonMessage<'_> {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&RunConfig> for JsonConfig {
    fn from(run: &RunConfig) -> Self {
        Self {
            target_file_size: run.target_file_size,
            num_threads: run.num_threads,
            preserve_metadata: run.preserve_metadata,
            jpeg_quality: run.jpeg_quality,
            resize_filter: run.resize_filter,
            extensions: run.extensions.iter().cloned().collect(),
            dry_run: run.dry_run,
        }
    }
}

/// Sink that prints every event as a JSON line
#[derive(Debug, Default)]
pub struct JsonSink;

impl EventSink for JsonSink {
    fn run_started(&self, run: &RunConfig) {
        JsonMessage::Start {
            source_dir: run.source_root.clone(),
            destination_dir: run.destination_root.clone(),
            config: JsonConfig::from(run),
        }
        .emit();
    }

    fn file_finished(&self, report: &FileReport) {
        JsonMessage::FileComplete { report }.emit();
    }

    fn run_finished(&self, stats: &RunStats) {
        JsonMessage::Complete { stats }.emit();
    }
}
