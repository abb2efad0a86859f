//! # Size Search Module
//!
//! Trova la riduzione minima (quindi il massimo contenuto conservato) per cui
//! l'immagine ri-codificata sta nel budget di byte.
//!
//! ## Algoritmo:
//! Ricerca binaria sulla riduzione `r` in `[0, 100]` (scala = `100 - r`):
//! 1. `mid = (left + right) / 2`, si misura la dimensione codificata a `mid`
//! 2. Troppo grande → servono riduzioni maggiori (`left = mid + 1`)
//! 3. Nel budget → `mid` è il miglior candidato, si prova a ridurre meno
//!    (`right = mid - 1`)
//!
//! Circa 7 encode per file invece dei 100 di una scansione lineare.
//!
//! ## Limiti noti:
//! - Si assume che la dimensione sia non crescente al crescere di `r`. Un codec
//!   che viola la monotonicità può far perdere una riduzione minore ammissibile.
//! - Se nessuna sonda sta nel budget si restituisce la sonda più piccola
//!   misurata (per curve monotone l'estremo `r = 100`, cioè 1×1) con
//!   `within_budget = false`, mai "nessuna riduzione".

use crate::codec::ImageCodec;
use crate::error::{ResizeError, Result};
use crate::resize::{resize_to_percent, ResizeAlgorithm};
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use tracing::debug;

/// Largest reduction the search explores
pub const MAX_REDUCTION: u8 = 100;

/// Esito della ricerca per un file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// Reduction percentage, 0 = untouched
    pub reduction: u8,
    /// Encoded size in bytes at `reduction`
    pub encoded_size: u64,
    /// False only when every probe exceeded the budget
    pub within_budget: bool,
    /// Number of encodes performed
    pub probes: u32,
}

impl SearchResult {
    /// Percentage of each side kept at this reduction
    pub fn scale_percent(&self) -> u8 {
        MAX_REDUCTION - self.reduction
    }
}

/// Ricerca binaria sulla riduzione, indipendente dal codec.
///
/// `measure(r)` restituisce la dimensione codificata con riduzione `r`.
/// Un errore di misura interrompe la ricerca e viene propagato.
pub fn search_reduction<F, E>(budget: u64, mut measure: F) -> std::result::Result<SearchResult, E>
where
    F: FnMut(u8) -> std::result::Result<u64, E>,
{
    let (mut left, mut right) = (0i32, i32::from(MAX_REDUCTION));
    let mut mid = (left + right) / 2;
    let mut size = measure(mid as u8)?;
    let mut probes = 1;
    let mut best: Option<(u8, u64)> = None;
    // Only read when every probe exceeded the budget, first probe included
    let mut tightest = (mid as u8, size);

    loop {
        if size > budget {
            if size < tightest.1 {
                tightest = (mid as u8, size);
            }
            left = mid + 1;
        } else {
            best = Some((mid as u8, size));
            right = mid - 1;
        }

        if left > right {
            break;
        }
        mid = (left + right) / 2;
        size = measure(mid as u8)?;
        probes += 1;
    }

    let (reduction, encoded_size, within_budget) = match best {
        Some((reduction, encoded_size)) => (reduction, encoded_size, true),
        None => (tightest.0, tightest.1, false),
    };
    Ok(SearchResult {
        reduction,
        encoded_size,
        within_budget,
        probes,
    })
}

/// Esegue la ricerca su un raster reale, misurando con il codec
pub fn search_raster(
    codec: &dyn ImageCodec,
    raster: &DynamicImage,
    format: ImageFormat,
    metadata: Option<&[u8]>,
    budget: u64,
    algorithm: ResizeAlgorithm,
) -> Result<SearchResult> {
    search_reduction::<_, ResizeError>(budget, |reduction| {
        let scaled = resize_to_percent(raster, MAX_REDUCTION - reduction, algorithm);
        let size = codec.encoded_size(&scaled, format, metadata)?;
        debug!(
            "probe r={}% -> {}x{} = {} bytes (budget {})",
            reduction,
            scaled.width(),
            scaled.height(),
            size,
            budget
        );
        Ok(size)
    })
}
