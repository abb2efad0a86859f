//! # Space Image Resizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Caricamento del file di configurazione e override dai flag
//! - Selezione del sink (log, progress bar o JSON) e avvio della run
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (sorgente, budget, thread, etc.)
//! 2. Configura il logging (`RUST_LOG`, INFO o DEBUG con `--verbose`)
//! 3. Carica `--config` (o il file di default) e applica i flag espliciti
//! 4. Istanzia BatchResizer e avvia la run, Ctrl-C ferma i nuovi file
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-resizer ~/Pictures/Trip --size 500KB --threads 8 --preserve-metadata
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use space_image_resizer::{
    file_manager::FileManager,
    json_output::{JsonMessage, JsonSink},
    BatchResizer, Config, EventSink, ProgressTracker, ResizeAlgorithm, TracingSink,
};

#[derive(Parser)]
#[command(name = "image-resizer")]
#[command(about = "Downsize a tree of images so every file fits a byte budget")]
struct Args {
    /// Directory containing the images to resize
    source_directory: PathBuf,

    /// Parent directory for `<source-name>_low_res` (default: next to the source)
    #[arg(short, long)]
    destination: Option<PathBuf>,

    /// Target file size, e.g. 1048576, 500KB, 1.5MB
    #[arg(short, long, value_parser = FileManager::parse_size)]
    size: Option<u64>,

    /// Number of parallel workers
    #[arg(short, long)]
    threads: Option<usize>,

    /// Keep EXIF metadata in resized files
    #[arg(long)]
    preserve_metadata: bool,

    /// JPEG quality (1-100), used for both measuring and writing
    #[arg(short, long)]
    quality: Option<u8>,

    /// Resize filter: nearest, triangle, catmull-rom, gaussian, lanczos3
    #[arg(long)]
    filter: Option<ResizeAlgorithm>,

    /// Dry run - report decisions without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Emit JSON lines on stdout instead of log lines
    #[arg(long)]
    json: bool,

    /// JSON configuration file (flags override its values)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Don't draw the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Applies the explicit flags on top of the loaded configuration
    fn apply_to(&self, config: &mut Config) {
        config.source_dir = self.source_directory.clone();
        if let Some(ref destination) = self.destination {
            config.destination_dir = Some(destination.clone());
        }
        if let Some(size) = self.size {
            config.target_file_size = size;
        }
        if let Some(threads) = self.threads {
            config.num_threads = threads;
        }
        if let Some(quality) = self.quality {
            config.jpeg_quality = quality;
        }
        if let Some(filter) = self.filter {
            config.resize_filter = filter;
        }
        config.preserve_metadata |= self.preserve_metadata;
        config.dry_run |= self.dry_run;
        config.json_output |= self.json;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stderr keeps stdout clean for JSON output
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json_output = args.json;
    if let Err(e) = run(args).await {
        if json_output {
            JsonMessage::error(e.to_string(), Some(format!("{:#}", e))).emit();
        }
        return Err(e);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            Config::from_file(&path)
                .await
                .with_context(|| format!("Failed to load config file {}", path.display()))?
        }
        None => Config::default(),
    };
    args.apply_to(&mut config);

    let sink: Arc<dyn EventSink> = if config.json_output {
        Arc::new(JsonSink)
    } else if args.no_progress {
        Arc::new(TracingSink)
    } else {
        Arc::new(ProgressTracker::new(Arc::new(TracingSink)))
    };

    let resizer = BatchResizer::new(&config, sink)?;

    let stop_handle = resizer.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing files in progress");
            stop_handle.stop();
        }
    });

    let stats = resizer.run().await?;
    debug!("Run finished: {}", stats.format_summary());

    Ok(())
}
