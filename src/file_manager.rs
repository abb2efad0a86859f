//! # File Management Module
//!
//! Questo modulo gestisce le operazioni sui file e la discovery delle immagini.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva e lazy delle immagini nella directory sorgente
//! - Classificazione per estensione (case-insensitive)
//! - Scritture atomiche: file temporaneo nella directory di destinazione,
//!   poi rename, così un file parziale non è mai visibile
//! - Formattazione e parsing di dimensioni human-readable
//!
//! ## Discovery:
//! - Ordine deterministico (entry ordinate per nome in ogni directory)
//! - Solo file regolari, i symlink non vengono seguiti
//! - La directory di output viene esclusa se sta dentro la sorgente
//! - Entry illeggibili: warning e si prosegue
//!
//! ## Esempio:
//! ```rust,ignore
//! for item in FileManager::discover(&root, &extensions, None) {
//!     println!("{} ({})", item.path.display(), FileManager::format_size(item.size));
//! }
//! ```

use crate::error::{ResizeError, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;
use walkdir::WalkDir;

/// One candidate image found under the source root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    pub path: PathBuf,
    /// Lowercased, without dot
    pub extension: String,
    pub size: u64,
}

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Lazily walks `root`, yielding every regular file with a recognized extension.
    ///
    /// `exclude` prunes one directory (and its subtree) from the walk.
    pub fn discover<'a>(
        root: &'a Path,
        extensions: &'a BTreeSet<String>,
        exclude: Option<&'a Path>,
    ) -> impl Iterator<Item = SourceItem> + 'a {
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| exclude.map_or(true, |excluded| entry.path() != excluded))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let extension = Self::extension_of(entry.path())?;
                if !extensions.contains(&extension) {
                    return None;
                }
                match entry.metadata() {
                    Ok(metadata) => Some(SourceItem {
                        path: entry.into_path(),
                        extension,
                        size: metadata.len(),
                    }),
                    Err(e) => {
                        warn!("Skipping {}: cannot read metadata: {}", entry.path().display(), e);
                        None
                    }
                }
            })
    }

    /// Lowercased extension without dot
    pub fn extension_of(path: &Path) -> Option<String> {
        path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// Copia byte per byte attraverso un file temporaneo, restituisce i byte copiati
    pub fn copy_atomic(source: &Path, destination: &Path) -> Result<u64> {
        let mut input = File::open(source).map_err(|e| ResizeError::fs(source, e))?;
        let mut temp = Self::temp_file_for(destination)?;
        let copied = std::io::copy(&mut input, &mut temp).map_err(|e| ResizeError::fs(destination, e))?;
        Self::persist(temp, destination)?;
        Ok(copied)
    }

    /// Scrive `data` attraverso un file temporaneo nella stessa directory
    pub fn write_atomic(destination: &Path, data: &[u8]) -> Result<()> {
        let mut temp = Self::temp_file_for(destination)?;
        temp.write_all(data).map_err(|e| ResizeError::fs(destination, e))?;
        Self::persist(temp, destination)
    }

    fn temp_file_for(destination: &Path) -> Result<NamedTempFile> {
        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        NamedTempFile::new_in(parent).map_err(|e| ResizeError::fs(parent, e))
    }

    fn persist(temp: NamedTempFile, destination: &Path) -> Result<()> {
        temp.as_file()
            .sync_all()
            .map_err(|e| ResizeError::fs(destination, e))?;
        // On error the temp file is dropped and removed
        temp.persist(destination)
            .map_err(|e| ResizeError::fs(destination, e.error))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Parses `1048576`, `500KB`, `1MiB`, `1.5 MB`... (1024-based units)
    pub fn parse_size(input: &str) -> std::result::Result<u64, String> {
        let trimmed = input.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid size '{}'", input))?;
        let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" | "kib" => 1024,
            "m" | "mb" | "mib" => 1024 * 1024,
            "g" | "gb" | "gib" => 1024 * 1024 * 1024,
            other => return Err(format!("unknown size unit '{}' in '{}'", other, input)),
        };

        let bytes = (value * multiplier as f64).floor();
        if bytes < 1.0 {
            return Err(format!("size must be at least 1 byte, got '{}'", input));
        }
        Ok(bytes as u64)
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
        if original_size == 0 {
            0.0
        } else {
            ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
        }
    }
}
