//! # Image Resize Module
//!
//! Questo modulo produce il raster scalato a partire da un raster sorgente e da
//! una percentuale.
//!
//! ## Caratteristiche
//! - **SOLO DOWNSCALE**: percentuali ≥ 100 restituiscono il raster invariato
//! - **Dimensioni**: `floor(lato × percentuale / 100)`, minimo 1 pixel per lato
//! - **Filtro di default**: `Triangle`; in downscale il crate `image` allarga il
//!   supporto del filtro del fattore di scala, quindi media l'area coperta come
//!   un filtro INTER_AREA
//! - **Puro**: nessun I/O, deterministico
//!
//! ## Esempio
//! ```rust,ignore
//! let half = resize_to_percent(&raster, 50, ResizeAlgorithm::default());
//! assert_eq!(half.width(), raster.width() / 2);
//! ```

use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Algoritmi di resize disponibili
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeAlgorithm {
    /// Nearest neighbour, il più veloce
    Nearest,
    /// Triangle - media d'area in downscale (default)
    #[default]
    Triangle,
    /// Catmull-Rom, buona qualità generale
    CatmullRom,
    /// Gaussian, più morbido
    Gaussian,
    /// Lanczos3 - migliore nitidezza, più lento
    Lanczos3,
}

impl ResizeAlgorithm {
    /// Converte l'algoritmo nel filtro del crate `image`
    pub fn filter(&self) -> FilterType {
        match self {
            ResizeAlgorithm::Nearest => FilterType::Nearest,
            ResizeAlgorithm::Triangle => FilterType::Triangle,
            ResizeAlgorithm::CatmullRom => FilterType::CatmullRom,
            ResizeAlgorithm::Gaussian => FilterType::Gaussian,
            ResizeAlgorithm::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResizeAlgorithm::Nearest => "nearest",
            ResizeAlgorithm::Triangle => "triangle",
            ResizeAlgorithm::CatmullRom => "catmull-rom",
            ResizeAlgorithm::Gaussian => "gaussian",
            ResizeAlgorithm::Lanczos3 => "lanczos3",
        }
    }
}

impl fmt::Display for ResizeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResizeAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "triangle" | "area" => Ok(Self::Triangle),
            "catmull-rom" | "catmullrom" => Ok(Self::CatmullRom),
            "gaussian" => Ok(Self::Gaussian),
            "lanczos3" | "lanczos" => Ok(Self::Lanczos3),
            other => Err(format!(
                "unknown resize filter '{}' (expected nearest, triangle, catmull-rom, gaussian or lanczos3)",
                other
            )),
        }
    }
}

/// Dimensions after keeping `percent` of each side, never below 1×1
pub fn scaled_dimensions(width: u32, height: u32, percent: u8) -> (u32, u32) {
    let percent = u64::from(percent.min(100));
    let scale = |side: u32| ((u64::from(side) * percent / 100) as u32).max(1);
    (scale(width), scale(height))
}

/// Scala il raster mantenendo `percent`% di ogni lato
pub fn resize_to_percent(
    image: &DynamicImage,
    percent: u8,
    algorithm: ResizeAlgorithm,
) -> DynamicImage {
    if percent >= 100 {
        return image.clone();
    }
    let (width, height) = scaled_dimensions(image.width(), image.height(), percent);
    image.resize_exact(width, height, algorithm.filter())
}
