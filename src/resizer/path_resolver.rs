//! # Path Resolution Module
//!
//! Centralizza tutta la logica di calcolo dei path di output.
//! Calcolo puro: la creazione delle directory avviene solo al momento della
//! scrittura, nella pipeline.

use crate::error::{ResizeError, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to the source directory name
pub const LOW_RES_SUFFIX: &str = "_low_res";

/// Utility per calcolare i path di output in modo centralizzato
pub struct PathResolver;

impl PathResolver {
    /// `<destination>/<source-name>_low_res`, or `<source>_low_res` next to the source
    pub fn destination_root(source_root: &Path, destination_dir: Option<&Path>) -> Result<PathBuf> {
        let name = source_root.file_name().ok_or_else(|| {
            ResizeError::Config(format!(
                "Source directory has no usable name: {}",
                source_root.display()
            ))
        })?;
        let low_res_name = format!("{}{}", name.to_string_lossy(), LOW_RES_SUFFIX);

        let root = match destination_dir {
            Some(dir) => dir.join(low_res_name),
            None => source_root.with_file_name(low_res_name),
        };
        debug!("Destination root: {}", root.display());
        Ok(root)
    }

    /// Mirrors `input_path` (under `source_root`) into `destination_root`
    pub fn get_output_path(
        input_path: &Path,
        source_root: &Path,
        destination_root: &Path,
    ) -> Result<PathBuf> {
        let relative = input_path.strip_prefix(source_root).map_err(|_| {
            ResizeError::fs(
                input_path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path is not under source root {}", source_root.display()),
                ),
            )
        })?;

        if relative.as_os_str().is_empty() {
            return Err(ResizeError::fs(
                input_path,
                io::Error::new(io::ErrorKind::InvalidInput, "path is the source root itself"),
            ));
        }

        Ok(destination_root.join(relative))
    }

    /// Crea le directory parent se necessario (già esistenti = ok)
    pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResizeError::fs(parent, e))?;
        }
        Ok(())
    }
}
