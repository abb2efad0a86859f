//! # Resizer Module
//!
//! Separa le responsabilità in sottomoduli:
//! - `batch_resizer`: Orchestratore della run (traversal + pool di worker)
//! - `task_resizer`: Pipeline per singolo file
//! - `events`: Esiti per file e sink iniettabili
//! - `progress_tracker`: Progress bar come sink
//! - `path_resolver`: Logica di calcolo path centralizzata

pub mod batch_resizer;
pub mod events;
pub mod path_resolver;
pub mod progress_tracker;
pub mod task_resizer;

pub use batch_resizer::{BatchResizer, StopHandle};
pub use events::{EventSink, FileOutcome, FileReport, MemorySink, MetadataHandling, TracingSink};
pub use path_resolver::PathResolver;
pub use progress_tracker::ProgressTracker;
pub use task_resizer::{ResizeJob, TaskResizer};
