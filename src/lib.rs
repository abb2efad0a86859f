//! # Space Image Resizer Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Ridimensiona un intero albero di immagini sotto un budget di byte per file
//! - Rispecchia la struttura delle directory in `<sorgente>_low_res`
//! - Run idempotenti: i file già presenti in destinazione vengono saltati
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore della libreria
//! - `file_manager`: Discovery lazy, copie e scritture atomiche
//! - `codec`: Decode/encode in memoria, con o senza EXIF
//! - `search`: Ricerca binaria della percentuale di riduzione
//! - `resize`: Resize del raster a una percentuale della dimensione originale
//! - `resizer`: Pipeline per file e orchestratore concorrente
//! - `progress`: Progress bar e statistiche
//! - `json_output`: Eventi JSON per l'uso da altri programmi
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use space_image_resizer::{BatchResizer, Config, TracingSink};
//!
//! let config = Config { source_dir: "Photos".into(), ..Default::default() };
//! let resizer = BatchResizer::new(&config, Arc::new(TracingSink))?;
//! let stats = resizer.run().await?;
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod progress;
pub mod resize;
pub mod resizer;
pub mod search;

pub use codec::{codec_for, ExifCodec, ImageCodec, PlainCodec};
pub use config::{Config, RunConfig};
pub use error::ResizeError;
pub use progress::RunStats;
pub use resize::ResizeAlgorithm;
pub use resizer::{
    BatchResizer, EventSink, FileOutcome, FileReport, MemorySink, ProgressTracker, StopHandle,
    TracingSink,
};
pub use search::{search_reduction, SearchResult};
