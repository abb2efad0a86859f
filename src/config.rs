//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con le opzioni modificabili dall'utente
//! - Valida i parametri e produce `RunConfig`, immutabile per tutta la run
//! - Supporta caricamento/salvataggio da/verso file JSON
//!
//! ## Parametri di configurazione:
//! - `source_dir`: directory sorgente (obbligatoria)
//! - `destination_dir`: directory in cui creare `<nome_sorgente>_low_res`
//!   (default: None = `<sorgente>_low_res` accanto alla sorgente)
//! - `target_file_size`: budget in byte per file (default: 1 MiB)
//! - `num_threads`: worker paralleli (default: 4)
//! - `preserve_metadata`: preserva il blocco EXIF (default: false)
//! - `jpeg_quality`: qualità JPEG per misura e scrittura (default: 95)
//! - `resize_filter`: filtro di resize (default: triangle)
//! - `extensions`: estensioni riconosciute (default: jpg, jpeg, png, bmp, tiff)
//! - `dry_run`: simula senza scrivere (default: false)
//! - `json_output`: eventi JSON su stdout (default: false)
//!
//! ## Validazione:
//! - `num_threads` > 0, `target_file_size` > 0, `jpeg_quality` 1-100
//! - ogni estensione deve avere un encoder compilato
//! - la sorgente deve esistere ed essere una directory
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     source_dir: "/photos".into(),
//!     num_threads: 8,
//!     ..Default::default()
//! };
//! let run_config = config.resolve()?;
//! ```

use crate::codec::format_for_extension;
use crate::error::{ResizeError, Result};
use crate::resize::ResizeAlgorithm;
use crate::resizer::PathResolver;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// 1 MiB, the default per-file budget
pub const DEFAULT_TARGET_FILE_SIZE: u64 = 1024 * 1024;

pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff"];

/// Configuration for a resize run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the tree to process
    pub source_dir: PathBuf,
    /// Parent directory for `<source-name>_low_res` (None = next to the source)
    pub destination_dir: Option<PathBuf>,
    /// Maximum encoded size of each output file, in bytes
    pub target_file_size: u64,
    /// Number of parallel workers
    pub num_threads: usize,
    /// Carry the EXIF block over to resized files
    pub preserve_metadata: bool,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Resize filter
    pub resize_filter: ResizeAlgorithm,
    /// Recognized extensions, without dot
    pub extensions: Vec<String>,
    /// Dry run - report decisions without writing
    pub dry_run: bool,
    /// Output events as JSON lines for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::new(),
            destination_dir: None,
            target_file_size: DEFAULT_TARGET_FILE_SIZE,
            num_threads: 4,
            preserve_metadata: false,
            jpeg_quality: 95,
            resize_filter: ResizeAlgorithm::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            dry_run: false,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters that do not touch the filesystem
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(ResizeError::Config(
                "Number of threads must be greater than 0".to_string(),
            ));
        }

        if self.target_file_size == 0 {
            return Err(ResizeError::Config(
                "Target file size must be greater than 0".to_string(),
            ));
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ResizeError::Config(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if self.extensions.is_empty() {
            return Err(ResizeError::Config(
                "At least one image extension is required".to_string(),
            ));
        }

        for ext in &self.extensions {
            let ext = normalize_extension(ext);
            if format_for_extension(&ext).is_none() {
                return Err(ResizeError::Config(format!(
                    "Unsupported image extension: {}",
                    ext
                )));
            }
        }

        Ok(())
    }

    /// Validates and freezes the configuration for one run
    pub fn resolve(&self) -> Result<RunConfig> {
        self.validate()?;

        if !self.source_dir.is_dir() {
            return Err(ResizeError::Config(format!(
                "Source directory does not exist or is not a directory: {}",
                self.source_dir.display()
            )));
        }

        let source_root = self
            .source_dir
            .canonicalize()
            .map_err(|e| ResizeError::fs(&self.source_dir, e))?;
        let destination_root =
            PathResolver::destination_root(&source_root, self.destination_dir.as_deref())?;

        Ok(RunConfig {
            source_root,
            destination_root,
            target_file_size: self.target_file_size,
            num_threads: self.num_threads,
            extensions: self.extensions.iter().map(|e| normalize_extension(e)).collect(),
            preserve_metadata: self.preserve_metadata,
            jpeg_quality: self.jpeg_quality,
            resize_filter: self.resize_filter,
            dry_run: self.dry_run,
        })
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("image-resizer").join("config.json"))
    }

    /// Load configuration from file (defaults if the file does not exist)
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// Resolved, read-only settings shared by every worker of a run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Canonical source root
    pub source_root: PathBuf,
    /// `<destination>/<source-name>_low_res` or `<source>_low_res`
    pub destination_root: PathBuf,
    pub target_file_size: u64,
    pub num_threads: usize,
    /// Lowercased, without dot
    pub extensions: BTreeSet<String>,
    pub preserve_metadata: bool,
    pub jpeg_quality: u8,
    pub resize_filter: ResizeAlgorithm,
    pub dry_run: bool,
}

impl RunConfig {
    /// True if the lowercased extension of `path` is recognized
    pub fn is_recognized(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| self.extensions.contains(&ext.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}
