//! # Batch Resizer Main Orchestrator
//!
//! Orchestratore della run: un producer che attraversa l'albero sorgente,
//! un canale limitato e al massimo N pipeline in parallelo.
//!
//! ## Responsabilità:
//! - Crea la directory di destinazione (errore fatale se impossibile)
//! - Traversal lazy su un thread bloccante, esclusa la destinazione se è
//!   dentro la sorgente
//! - Concorrenza limitata con `Semaphore` + `JoinSet::spawn_blocking`
//! - Nessun abort per errori sui singoli file, anche in caso di panic
//! - Stop cooperativo: nessun nuovo file dopo lo stop, le pipeline in corso
//!   si fermano al primo step utile
//! - Aggregazione in `RunStats`

use crate::codec::{codec_for, ImageCodec};
use crate::config::{Config, RunConfig};
use crate::error::{ResizeError, Result};
use crate::file_manager::{FileManager, SourceItem};
use crate::progress::RunStats;
use crate::resizer::events::{EventSink, FileOutcome, FileReport};
use crate::resizer::task_resizer::{ResizeJob, TaskResizer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info};

/// Clonable handle that asks a running batch to stop
#[derive(Clone)]
pub struct StopHandle {
    sender: broadcast::Sender<()>,
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Requests a stop. Also effective before the run starts.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("Stop requested, no new files will be started");
            // No receivers just means no pipeline is running
            let _ = self.sender.send(());
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }
}

/// Orchestratore della run
pub struct BatchResizer {
    run: Arc<RunConfig>,
    codec: Arc<dyn ImageCodec>,
    sink: Arc<dyn EventSink>,
    stop_handle: StopHandle,
}

impl BatchResizer {
    /// Valida la configurazione e seleziona il codec
    pub fn new(config: &Config, sink: Arc<dyn EventSink>) -> Result<Self> {
        let run = config.resolve()?;
        let codec: Arc<dyn ImageCodec> =
            Arc::from(codec_for(run.preserve_metadata, run.jpeg_quality));
        Ok(Self::with_codec(Arc::new(run), codec, sink))
    }

    /// Costruttore con codec iniettato
    pub fn with_codec(
        run: Arc<RunConfig>,
        codec: Arc<dyn ImageCodec>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            run,
            codec,
            sink,
            stop_handle: StopHandle::new(),
        }
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.run
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Esegue la run e attende che ogni file avviato raggiunga uno stato terminale
    pub async fn run(&self) -> Result<RunStats> {
        let start_time = Instant::now();
        let run = self.run.clone();

        if !run.dry_run {
            tokio::fs::create_dir_all(&run.destination_root)
                .await
                .map_err(|e| ResizeError::fs(&run.destination_root, e))?;
        }

        let exclude = Self::excluded_subtree(&run);
        if let Some(ref excluded) = exclude {
            debug!("Excluding destination from traversal: {}", excluded.display());
        }

        self.sink.run_started(&run);

        let (item_sender, mut item_receiver) = mpsc::channel::<SourceItem>(run.num_threads * 2);
        let producer = {
            let run = run.clone();
            tokio::task::spawn_blocking(move || {
                let mut produced = 0usize;
                for item in
                    FileManager::discover(&run.source_root, &run.extensions, exclude.as_deref())
                {
                    // Receiver dropped: the dispatcher stopped
                    if item_sender.blocking_send(item).is_err() {
                        break;
                    }
                    produced += 1;
                }
                produced
            })
        };

        let semaphore = Arc::new(Semaphore::new(run.num_threads));
        let mut tasks: JoinSet<FileReport> = JoinSet::new();
        let mut in_flight: HashMap<Id, (PathBuf, PathBuf)> = HashMap::new();
        let mut stats = RunStats::new();

        while let Some(item) = item_receiver.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            // Subscribe before checking, so a stop sent afterwards is seen by the task
            let stop_receiver = self.stop_handle.subscribe();
            if self.stop_handle.is_stopped() {
                break;
            }

            let source = item.path.clone();
            let job = match ResizeJob::new(item, &run) {
                Ok(job) => job,
                Err(e) => {
                    let report = Self::failure_report(&run, source, &e);
                    self.sink.file_finished(&report);
                    stats.record(&report);
                    continue;
                }
            };

            let destination = job.destination.clone();
            let mut task =
                TaskResizer::with_cancellation(run.clone(), self.codec.clone(), stop_receiver);
            let sink = self.sink.clone();

            let handle = tasks.spawn_blocking(move || {
                let _permit = permit;
                let report = task.process(job);
                sink.file_finished(&report);
                report
            });
            in_flight.insert(handle.id(), (source, destination));

            while let Some(result) = tasks.try_join_next_with_id() {
                self.collect(result, &mut in_flight, &mut stats);
            }
        }

        drop(item_receiver);

        while let Some(result) = tasks.join_next_with_id().await {
            self.collect(result, &mut in_flight, &mut stats);
        }

        match producer.await {
            Ok(produced) => debug!("Traversal produced {} files", produced),
            Err(e) => error!("Traversal task failed: {}", e),
        }

        stats.duration_seconds = start_time.elapsed().as_secs_f64();
        self.sink.run_finished(&stats);

        Ok(stats)
    }

    /// Registra il risultato di un task; un panic diventa un `Failed`
    fn collect(
        &self,
        result: std::result::Result<(Id, FileReport), JoinError>,
        in_flight: &mut HashMap<Id, (PathBuf, PathBuf)>,
        stats: &mut RunStats,
    ) {
        match result {
            Ok((id, report)) => {
                in_flight.remove(&id);
                stats.record(&report);
            }
            Err(e) => {
                let (source, destination) = in_flight.remove(&e.id()).unwrap_or_default();
                let report = FileReport {
                    source,
                    destination,
                    dry_run: self.run.dry_run,
                    outcome: FileOutcome::Failed {
                        kind: "panic".to_string(),
                        error: e.to_string(),
                    },
                };
                self.sink.file_finished(&report);
                stats.record(&report);
            }
        }
    }

    fn failure_report(
        run: &RunConfig,
        source: PathBuf,
        error: &ResizeError,
    ) -> FileReport {
        // No destination: the path could not be mapped
        FileReport {
            source,
            destination: PathBuf::new(),
            dry_run: run.dry_run,
            outcome: FileOutcome::Failed {
                kind: error.kind().to_string(),
                error: error.to_string(),
            },
        }
    }

    /// The destination root, when it lies inside the source tree
    fn excluded_subtree(run: &RunConfig) -> Option<PathBuf> {
        let destination = run
            .destination_root
            .canonicalize()
            .unwrap_or_else(|_| run.destination_root.clone());
        if destination.starts_with(&run.source_root) {
            Some(destination)
        } else {
            None
        }
    }
}
