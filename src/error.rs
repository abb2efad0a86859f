//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore della libreria.
//!
//! ## Responsabilità:
//! - Definisce `ResizeError` per categorizzare i fallimenti di un singolo file
//! - Distingue gli errori fatali di configurazione (la run non parte)
//! - Mantiene il path del file coinvolto per log leggibili
//!
//! ## Categorie di errori:
//! - `Decode`: immagine illeggibile, corrotta o con feature non supportate
//! - `Encode`: il formato di destinazione rifiuta il raster o i metadata
//! - `Filesystem`: permessi, disco pieno, path non validi
//! - `Config`: configurazione non valida (errore fatale per la run)
//! - `Cancelled`: stop ricevuto tra due step della pipeline
//!
//! Un budget irraggiungibile NON è un errore: la ricerca restituisce il punto
//! più stretto esplorato e la pipeline lo segnala come output degradato.
//!
//! ## Esempio:
//! ```rust,ignore
//! let bytes = std::fs::read(path).map_err(|e| ResizeError::fs(path, e))?;
//! ```

use std::path::{Path, PathBuf};

/// Errors raised while resizing a tree of images
#[derive(thiserror::Error, Debug)]
pub enum ResizeError {
    #[error("Decode error for {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Filesystem error on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Processing cancelled")]
    Cancelled,
}

impl ResizeError {
    /// Wraps an I/O error with the path it happened on
    pub fn fs(path: &Path, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn decode(path: &Path, source: image::ImageError) -> Self {
        Self::Decode {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short machine-friendly category, used in events and JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::Encode(_) => "encode",
            Self::Filesystem { .. } => "filesystem",
            Self::Config(_) => "config",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<image::ImageError> for ResizeError {
    fn from(err: image::ImageError) -> Self {
        Self::Encode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResizeError>;
