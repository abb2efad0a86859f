//! # Task Resizer Module
//!
//! Pipeline per un singolo file, eseguita su un thread del pool bloccante.
//! Separata dal dispatcher per maggiore modularità.
//!
//! ## Step (in ordine stretto):
//! 1. Destinazione già presente → `Skipped`
//! 2. Creazione ricorsiva della directory padre (già esistente = ok)
//! 3. Sorgente entro il budget → copia byte per byte → `Copied`
//! 4. Altrimenti decode → ricerca → resize → encode → `Resized`
//! 5. Qualsiasi errore → `Failed`, gli altri file proseguono
//!
//! Lo stop viene controllato solo tra uno step e l'altro, mai durante un
//! encode. Tutte le scritture passano da un file temporaneo + rename.

use crate::codec::{format_for_extension, ImageCodec};
use crate::config::RunConfig;
use crate::error::{ResizeError, Result};
use crate::file_manager::{FileManager, SourceItem};
use crate::resize::resize_to_percent;
use crate::resizer::events::{FileOutcome, FileReport, MetadataHandling};
use crate::resizer::path_resolver::PathResolver;
use crate::search::search_raster;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Unità di lavoro per un file
#[derive(Debug, Clone)]
pub struct ResizeJob {
    pub item: SourceItem,
    pub destination: PathBuf,
    pub budget: u64,
}

impl ResizeJob {
    pub fn new(item: SourceItem, run: &RunConfig) -> Result<Self> {
        let destination =
            PathResolver::get_output_path(&item.path, &run.source_root, &run.destination_root)?;
        Ok(Self {
            item,
            destination,
            budget: run.target_file_size,
        })
    }
}

/// Worker per l'elaborazione di un singolo file
pub struct TaskResizer {
    run: Arc<RunConfig>,
    codec: Arc<dyn ImageCodec>,
    /// Cancellation receiver for stopping between steps
    stop_receiver: Option<broadcast::Receiver<()>>,
}

impl TaskResizer {
    /// Crea nuovo task resizer
    pub fn new(run: Arc<RunConfig>, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            run,
            codec,
            stop_receiver: None,
        }
    }

    /// Crea un task resizer con supporto per cancellazione
    pub fn with_cancellation(
        run: Arc<RunConfig>,
        codec: Arc<dyn ImageCodec>,
        stop_receiver: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            run,
            codec,
            stop_receiver: Some(stop_receiver),
        }
    }

    /// Checks if a stop signal has been received
    fn should_stop(&mut self) -> bool {
        if let Some(ref mut receiver) = self.stop_receiver {
            match receiver.try_recv() {
                Ok(_) => return true,
                Err(broadcast::error::TryRecvError::Empty) => return false,
                // Signal was sent but we missed it, treat as stop
                Err(broadcast::error::TryRecvError::Lagged(_)) => return true,
                Err(broadcast::error::TryRecvError::Closed) => return false,
            }
        }
        false
    }

    fn checkpoint(&mut self) -> Result<()> {
        if self.should_stop() {
            return Err(ResizeError::Cancelled);
        }
        Ok(())
    }

    /// Processa un singolo file; gli errori diventano `Failed` nel report
    pub fn process(&mut self, job: ResizeJob) -> FileReport {
        let outcome = match self.process_steps(&job) {
            Ok(outcome) => outcome,
            Err(ResizeError::Cancelled) => FileOutcome::Cancelled,
            Err(e) => FileOutcome::Failed {
                kind: e.kind().to_string(),
                error: e.to_string(),
            },
        };

        FileReport {
            source: job.item.path,
            destination: job.destination,
            dry_run: self.run.dry_run,
            outcome,
        }
    }

    fn process_steps(&mut self, job: &ResizeJob) -> Result<FileOutcome> {
        self.checkpoint()?;

        if job.destination.exists() {
            return Ok(FileOutcome::Skipped);
        }

        if !self.run.dry_run {
            PathResolver::ensure_parent_dirs(&job.destination)?;
        }

        if job.item.size <= job.budget {
            let size = if self.run.dry_run {
                job.item.size
            } else {
                FileManager::copy_atomic(&job.item.path, &job.destination)?
            };
            return Ok(FileOutcome::Copied { size });
        }

        self.resize_to_budget(job)
    }

    /// Decode → ricerca → resize → encode → scrittura atomica
    fn resize_to_budget(&mut self, job: &ResizeJob) -> Result<FileOutcome> {
        let format = format_for_extension(&job.item.extension).ok_or_else(|| {
            ResizeError::Encode(format!("no encoder for extension '{}'", job.item.extension))
        })?;

        self.checkpoint()?;
        debug!(
            "Resizing {} ({} > {} bytes) with {} codec",
            job.item.path.display(),
            job.item.size,
            job.budget,
            self.codec.name()
        );
        let decoded = self.codec.decode(&job.item.path, format)?;
        let metadata = decoded.metadata.as_deref();

        self.checkpoint()?;
        let search = search_raster(
            self.codec.as_ref(),
            &decoded.raster,
            decoded.format,
            metadata,
            job.budget,
            self.run.resize_filter,
        )?;
        debug!(
            "Search for {}: reduction {}% ({} bytes, {} probes)",
            job.item.path.display(),
            search.reduction,
            search.encoded_size,
            search.probes
        );

        self.checkpoint()?;
        let resized = resize_to_percent(&decoded.raster, search.scale_percent(), self.run.resize_filter);
        let data = self.codec.encode(&resized, decoded.format, metadata)?;
        if !self.run.dry_run {
            FileManager::write_atomic(&job.destination, &data)?;
        }

        // BMP/TIFF are never inspected for EXIF: requested metadata is dropped
        let metadata = if !self.codec.preserves_metadata() {
            MetadataHandling::None
        } else if !self.codec.embeds_metadata(decoded.format) {
            MetadataHandling::Dropped
        } else if metadata.is_some() {
            MetadataHandling::Kept
        } else {
            MetadataHandling::None
        };

        Ok(FileOutcome::Resized {
            original_size: job.item.size,
            output_size: data.len() as u64,
            scale_percent: search.scale_percent(),
            within_budget: search.within_budget,
            probes: search.probes,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ExifCodec, PlainCodec};
    use crate::config::Config;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::path::Path;
    use tempfile::TempDir;

    /// Pseudo-random noise compresses badly, so sizes stay large
    fn noise_image(width: u32, height: u32, seed: u32) -> DynamicImage {
        let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            Rgb([state as u8, (state >> 8) as u8, (state >> 16) as u8])
        }))
    }

    fn setup(budget: u64) -> (TempDir, Arc<RunConfig>) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir_all(&source).unwrap();
        let config = Config {
            source_dir: source,
            target_file_size: budget,
            jpeg_quality: 90,
            ..Default::default()
        };
        let run = Arc::new(config.resolve().unwrap());
        (dir, run)
    }

    fn item_for(path: &Path) -> SourceItem {
        SourceItem {
            path: path.to_path_buf(),
            extension: FileManager::extension_of(path).unwrap(),
            size: std::fs::metadata(path).unwrap().len(),
        }
    }

    fn task(run: &Arc<RunConfig>) -> TaskResizer {
        TaskResizer::new(run.clone(), Arc::new(PlainCodec::new(run.jpeg_quality)))
    }

    #[test]
    fn test_small_file_is_copied_verbatim() {
        let (_dir, run) = setup(1024 * 1024);
        let path = run.source_root.join("small.png");
        noise_image(16, 16, 1).save_with_format(&path, ImageFormat::Png).unwrap();

        let job = ResizeJob::new(item_for(&path), &run).unwrap();
        let destination = job.destination.clone();
        let report = task(&run).process(job);

        assert!(matches!(report.outcome, FileOutcome::Copied { .. }));
        assert_eq!(std::fs::read(&destination).unwrap(), std::fs::read(&path).unwrap());
    }

    #[test]
    fn test_large_file_is_resized_under_budget() {
        let (_dir, run) = setup(20 * 1024);
        std::fs::create_dir_all(run.source_root.join("nested")).unwrap();
        let path = run.source_root.join("nested/big.bmp");
        noise_image(200, 150, 2).save_with_format(&path, ImageFormat::Bmp).unwrap();

        let job = ResizeJob::new(item_for(&path), &run).unwrap();
        let destination = job.destination.clone();
        assert_eq!(destination, run.destination_root.join("nested/big.bmp"));

        let report = task(&run).process(job);
        match report.outcome {
            FileOutcome::Resized {
                output_size,
                scale_percent,
                within_budget,
                ..
            } => {
                assert!(within_budget);
                assert!(output_size <= 20 * 1024);
                assert!(scale_percent < 100);
                assert_eq!(std::fs::metadata(&destination).unwrap().len(), output_size);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let written = image::open(&destination).unwrap();
        assert!(written.width() < 200);
    }

    #[test]
    fn test_existing_destination_is_skipped_untouched() {
        let (_dir, run) = setup(10);
        let path = run.source_root.join("a.jpg");
        noise_image(32, 32, 3).save_with_format(&path, ImageFormat::Jpeg).unwrap();

        let job = ResizeJob::new(item_for(&path), &run).unwrap();
        std::fs::create_dir_all(job.destination.parent().unwrap()).unwrap();
        std::fs::write(&job.destination, b"previous output").unwrap();
        let destination = job.destination.clone();

        let report = task(&run).process(job);
        assert_eq!(report.outcome, FileOutcome::Skipped);
        assert_eq!(std::fs::read(&destination).unwrap(), b"previous output");
    }

    #[test]
    fn test_corrupt_file_fails_without_output() {
        let (_dir, run) = setup(10);
        let path = run.source_root.join("broken.jpg");
        std::fs::write(&path, vec![0xFFu8; 256]).unwrap();

        let job = ResizeJob::new(item_for(&path), &run).unwrap();
        let destination = job.destination.clone();
        let report = task(&run).process(job);

        match &report.outcome {
            FileOutcome::Failed { kind, .. } => assert_eq!(kind, "decode"),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!destination.exists());
        let leftovers = std::fs::read_dir(destination.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_stop_signal_cancels_before_work() {
        let (_dir, run) = setup(10);
        let path = run.source_root.join("a.png");
        noise_image(32, 32, 4).save_with_format(&path, ImageFormat::Png).unwrap();

        let (sender, receiver) = broadcast::channel(1);
        let mut task = TaskResizer::with_cancellation(
            run.clone(),
            Arc::new(PlainCodec::new(90)),
            receiver,
        );
        sender.send(()).unwrap();

        let job = ResizeJob::new(item_for(&path), &run).unwrap();
        let destination = job.destination.clone();
        assert_eq!(task.process(job).outcome, FileOutcome::Cancelled);
        assert!(!destination.exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir_all(&source).unwrap();
        let config = Config {
            source_dir: source.clone(),
            target_file_size: 4 * 1024,
            dry_run: true,
            ..Default::default()
        };
        let run = Arc::new(config.resolve().unwrap());
        let path = run.source_root.join("big.png");
        noise_image(64, 64, 5).save_with_format(&path, ImageFormat::Png).unwrap();

        let report = task(&run).process(ResizeJob::new(item_for(&path), &run).unwrap());
        assert!(report.dry_run);
        assert!(matches!(report.outcome, FileOutcome::Resized { .. }));
        assert!(!run.destination_root.exists());
    }

    #[test]
    fn test_metadata_handling_reported_per_container() {
        let (_dir, run) = setup(2 * 1024);
        let bmp = run.source_root.join("scan.bmp");
        noise_image(60, 60, 6).save_with_format(&bmp, ImageFormat::Bmp).unwrap();
        let jpg = run.source_root.join("plain.jpg");
        noise_image(80, 80, 7).save_with_format(&jpg, ImageFormat::Jpeg).unwrap();

        let mut exif_task = TaskResizer::new(run.clone(), Arc::new(ExifCodec::new(90)));
        let metadata_of = |report: FileReport| match report.outcome {
            FileOutcome::Resized { metadata, .. } => metadata,
            other => panic!("unexpected outcome {:?}", other),
        };

        let report = exif_task.process(ResizeJob::new(item_for(&bmp), &run).unwrap());
        assert_eq!(metadata_of(report), MetadataHandling::Dropped);

        // No EXIF block in the source
        let report = exif_task.process(ResizeJob::new(item_for(&jpg), &run).unwrap());
        assert_eq!(metadata_of(report), MetadataHandling::None);
    }
}
