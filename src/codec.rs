//! # Codec Adapter Module
//!
//! Interfaccia stretta verso decoder ed encoder del crate `image`.
//!
//! ## Responsabilità:
//! - Decodifica di un file in un raster (`DynamicImage`), riconoscendo il
//!   formato dal contenuto anche se l'estensione non corrisponde
//! - Misura della dimensione codificata senza scrivere su disco
//! - Codifica finale nel formato originale del file
//!
//! ## Strategie:
//! - `PlainCodec`: decodifica/codifica senza metadata
//! - `ExifCodec`: estrae il blocco EXIF in decodifica (JPEG APP1, PNG eXIf via
//!   `img-parts`) e lo riattacca in codifica. Per i contenitori che non possono
//!   trasportarlo (BMP, TIFF) il blob viene scartato e la pipeline lo segnala.
//!
//! La misura e la scrittura usano gli stessi byte (stessa qualità JPEG, stesso
//! blob EXIF), quindi la dimensione misurata è esattamente quella scritta.
//!
//! ## Formati:
//! | Estensione | Formato | EXIF |
//! |------------|---------|------|
//! | jpg, jpeg  | JPEG    | ✅   |
//! | png        | PNG     | ✅   |
//! | bmp        | BMP     | ❌   |
//! | tif, tiff  | TIFF    | ❌   |

use crate::error::{ResizeError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::ImageEXIF;
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Formats the resizer can both decode and re-encode
pub const SUPPORTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Maps a file extension (without dot, any case) to its encode format
pub fn format_for_extension(extension: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(extension).filter(|format| SUPPORTED_FORMATS.contains(format))
}

/// Raster decodificato più eventuale blob EXIF
pub struct Decoded {
    pub raster: DynamicImage,
    pub format: ImageFormat,
    pub metadata: Option<Vec<u8>>,
}

/// Codec collaborator used by the pipeline and the size search
pub trait ImageCodec: Send + Sync {
    /// Short strategy name for logs
    fn name(&self) -> &'static str;

    /// Decodifica il file nel formato indicato
    fn decode(&self, path: &Path, format: ImageFormat) -> Result<Decoded>;

    /// Codifica in memoria; `metadata` viene riattaccato se la strategia lo supporta
    fn encode(
        &self,
        raster: &DynamicImage,
        format: ImageFormat,
        metadata: Option<&[u8]>,
    ) -> Result<Vec<u8>>;

    /// Dimensione codificata, senza scrivere su disco
    fn encoded_size(
        &self,
        raster: &DynamicImage,
        format: ImageFormat,
        metadata: Option<&[u8]>,
    ) -> Result<u64> {
        Ok(self.encode(raster, format, metadata)?.len() as u64)
    }

    /// Whether this strategy tries to carry metadata over at all
    fn preserves_metadata(&self) -> bool {
        false
    }

    /// Whether `format` can carry a metadata blob with this strategy
    fn embeds_metadata(&self, _format: ImageFormat) -> bool {
        false
    }
}

/// Selects the codec strategy for a run
pub fn codec_for(preserve_metadata: bool, jpeg_quality: u8) -> Box<dyn ImageCodec> {
    if preserve_metadata {
        Box::new(ExifCodec::new(jpeg_quality))
    } else {
        Box::new(PlainCodec::new(jpeg_quality))
    }
}

/// Codec senza metadata
#[derive(Debug, Clone)]
pub struct PlainCodec {
    jpeg_quality: u8,
}

impl PlainCodec {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }
}

impl ImageCodec for PlainCodec {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn decode(&self, path: &Path, format: ImageFormat) -> Result<Decoded> {
        let (raster, _, _) = read_raster(path, format)?;
        Ok(Decoded {
            raster,
            format,
            metadata: None,
        })
    }

    fn encode(
        &self,
        raster: &DynamicImage,
        format: ImageFormat,
        _metadata: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        encode_raster(raster, format, self.jpeg_quality)
    }
}

/// Codec che preserva il blocco EXIF
#[derive(Debug, Clone)]
pub struct ExifCodec {
    jpeg_quality: u8,
}

impl ExifCodec {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }
}

impl ImageCodec for ExifCodec {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn decode(&self, path: &Path, format: ImageFormat) -> Result<Decoded> {
        let (raster, content_format, bytes) = read_raster(path, format)?;
        let metadata = read_exif(bytes, content_format);
        Ok(Decoded {
            raster,
            format,
            metadata,
        })
    }

    fn encode(
        &self,
        raster: &DynamicImage,
        format: ImageFormat,
        metadata: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let data = encode_raster(raster, format, self.jpeg_quality)?;
        match metadata {
            Some(exif) if self.embeds_metadata(format) => embed_exif(data, format, exif),
            _ => Ok(data),
        }
    }

    fn preserves_metadata(&self) -> bool {
        true
    }

    fn embeds_metadata(&self, format: ImageFormat) -> bool {
        matches!(format, ImageFormat::Jpeg | ImageFormat::Png)
    }
}

/// Legge e decodifica il file. Il formato viene riconosciuto dal contenuto,
/// l'estensione vale solo come fallback. Restituisce anche i byte letti e il
/// formato effettivo del contenuto.
fn read_raster(path: &Path, format: ImageFormat) -> Result<(DynamicImage, ImageFormat, Vec<u8>)> {
    let bytes = std::fs::read(path).map_err(|e| ResizeError::fs(path, e))?;
    let reader = ImageReader::with_format(Cursor::new(bytes.as_slice()), format)
        .with_guessed_format()
        .map_err(|e| ResizeError::fs(path, e))?;
    let content_format = reader.format().unwrap_or(format);
    if content_format != format {
        debug!(
            "{} holds {:?} data, decoding by content",
            path.display(),
            content_format
        );
    }
    let raster = reader.decode().map_err(|e| ResizeError::decode(path, e))?;
    Ok((raster, content_format, bytes))
}

/// Converte il raster in un color type accettato dall'encoder di `format`
fn normalize_color(raster: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    use ColorType::*;
    match (format, raster.color()) {
        // JPEG has no alpha and no 16-bit samples
        (ImageFormat::Jpeg, L8 | Rgb8) => Cow::Borrowed(raster),
        (ImageFormat::Jpeg, L16 | La8 | La16) => {
            Cow::Owned(DynamicImage::ImageLuma8(raster.to_luma8()))
        }
        (ImageFormat::Jpeg, _) => Cow::Owned(DynamicImage::ImageRgb8(raster.to_rgb8())),
        // BMP only takes 8-bit samples
        (ImageFormat::Bmp, L8 | La8 | Rgb8 | Rgba8) => Cow::Borrowed(raster),
        (ImageFormat::Bmp, _) => Cow::Owned(DynamicImage::ImageRgba8(raster.to_rgba8())),
        // PNG has no float samples
        (ImageFormat::Png, Rgb32F | Rgba32F) => {
            Cow::Owned(DynamicImage::ImageRgba16(raster.to_rgba16()))
        }
        // TIFF has no gray+alpha and no float samples
        (ImageFormat::Tiff, La8) => Cow::Owned(DynamicImage::ImageRgba8(raster.to_rgba8())),
        (ImageFormat::Tiff, La16 | Rgb32F | Rgba32F) => {
            Cow::Owned(DynamicImage::ImageRgba16(raster.to_rgba16()))
        }
        _ => Cow::Borrowed(raster),
    }
}

/// Codifica il raster nel formato richiesto
fn encode_raster(raster: &DynamicImage, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let raster = normalize_color(raster, format);
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut data, jpeg_quality);
            raster.write_with_encoder(encoder)?;
        }
        ImageFormat::Bmp | ImageFormat::Png | ImageFormat::Tiff => {
            raster.write_to(&mut Cursor::new(&mut data), format)?;
        }
        other => {
            return Err(ResizeError::Encode(format!(
                "unsupported output format {:?}",
                other
            )))
        }
    }
    Ok(data)
}

/// Estrae il blob EXIF dai byte originali, se presente
fn read_exif(bytes: Vec<u8>, format: ImageFormat) -> Option<Vec<u8>> {
    match format {
        ImageFormat::Jpeg => {
            let jpeg = Jpeg::from_bytes(bytes.into()).ok()?;
            jpeg.exif().map(|e| e.to_vec())
        }
        ImageFormat::Png => {
            let png = Png::from_bytes(bytes.into()).ok()?;
            png.exif().map(|e| e.to_vec())
        }
        _ => None,
    }
}

/// Riattacca il blob EXIF ai byte codificati
fn embed_exif(data: Vec<u8>, format: ImageFormat, exif: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(data.into())
                .map_err(|e| ResizeError::Encode(format!("failed to parse JPEG for EXIF: {}", e)))?;
            jpeg.set_exif(Some(exif.to_vec().into()));
            jpeg.encoder()
                .write_to(&mut output)
                .map_err(|e| ResizeError::Encode(format!("failed to write JPEG with EXIF: {}", e)))?;
        }
        ImageFormat::Png => {
            let mut png = Png::from_bytes(data.into())
                .map_err(|e| ResizeError::Encode(format!("failed to parse PNG for EXIF: {}", e)))?;
            png.set_exif(Some(exif.to_vec().into()));
            png.encoder()
                .write_to(&mut output)
                .map_err(|e| ResizeError::Encode(format!("failed to write PNG with EXIF: {}", e)))?;
        }
        _ => return Ok(data),
    }
    Ok(output)
}
