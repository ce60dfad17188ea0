//! Threaded import pipeline.
//!
//! # Responsibility
//! - Run submitted jobs on a fixed pool of worker threads.
//! - Write successful results into the series store under a fresh key.
//! - Deliver every outcome once, in completion order, on the thread that
//!   calls `pump` or `wait`.
//!
//! # Invariants
//! - Completion hooks never run on worker threads.
//! - Each submitted job yields exactly one `ImportOutcome`.

use crate::import::job::{JobHandle, JobId, JobState};
use crate::import::parser::parse_file_with;
use crate::import::{ImportConfig, ImportError, ImportResult};
use crate::logging::panic_text;
use crate::model::{DataFileSpec, EntityKind};
use crate::oid::Oid;
use crate::store::{SeriesStore, StoreKey};
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{info, warn};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A parsed file already written to the store, waiting to be attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedFile {
    pub datafile_id: Oid,
    pub store_key: StoreKey,
    pub spec: DataFileSpec,
    pub rows: usize,
    pub dropped_rows: usize,
}

/// Result of one job as handed back to the control thread.
#[derive(Debug)]
pub struct ImportOutcome {
    pub job: JobHandle,
    pub result: ImportResult<ImportedFile>,
}

impl ImportOutcome {
    pub fn dataset_id(&self) -> Oid {
        self.job.dataset_id()
    }

    pub fn store_key(&self) -> Option<&StoreKey> {
        self.result.as_ref().ok().map(|file| &file.store_key)
    }
}

type CompletionHook = Box<dyn FnMut(&ImportOutcome)>;

/// Background loader for raw measurement files.
///
/// Dropping the pipeline cancels outstanding jobs and joins the workers.
pub struct ImportPipeline {
    queue: Option<Sender<JobHandle>>,
    completed_tx: Sender<ImportOutcome>,
    completed_rx: Receiver<ImportOutcome>,
    workers: Vec<JoinHandle<()>>,
    hooks: Vec<CompletionHook>,
    outstanding: HashMap<JobId, JobHandle>,
    next_id: u64,
}

impl ImportPipeline {
    /// Starts `workers` threads (at least one) writing into `store`.
    pub fn new(store: Arc<dyn SeriesStore>, workers: usize) -> std::io::Result<Self> {
        let (queue_tx, queue_rx) = unbounded::<JobHandle>();
        let (completed_tx, completed_rx) = unbounded();
        let mut handles = Vec::new();
        for index in 0..workers.max(1) {
            let store = Arc::clone(&store);
            let queue = queue_rx.clone();
            let completed = completed_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("dgp-import-{index}"))
                .spawn(move || worker_loop(store.as_ref(), &queue, &completed))?;
            handles.push(handle);
        }
        info!(
            "event=pipeline_start module=import status=ok workers={}",
            handles.len()
        );
        Ok(Self {
            queue: Some(queue_tx),
            completed_tx,
            completed_rx,
            workers: handles,
            hooks: Vec::new(),
            outstanding: HashMap::new(),
            next_id: 1,
        })
    }

    /// Registers a hook run once per outcome, in registration order.
    pub fn add_completion_hook(&mut self, hook: impl FnMut(&ImportOutcome) + 'static) {
        self.hooks.push(Box::new(hook));
    }

    /// Queues `path` for import into `dataset_id`.
    ///
    /// The dataset is not checked here; the caller validates it when
    /// attaching the result.
    pub fn submit(
        &mut self,
        path: impl Into<PathBuf>,
        config: ImportConfig,
        dataset_id: Oid,
    ) -> JobHandle {
        let id = JobId(self.next_id);
        self.next_id += 1;
        let job = JobHandle::new(id, dataset_id, path.into(), config);
        self.outstanding.insert(id, job.clone());

        info!(
            "event=import_job module=import status=queued job={} dataset={} kind={} path={}",
            id,
            dataset_id,
            job.config().kind,
            job.source_path().display()
        );

        let sent = self
            .queue
            .as_ref()
            .map(|queue| queue.send(job.clone()).is_ok())
            .unwrap_or(false);
        if !sent {
            job.finish(JobState::Failed);
            let _ = self.completed_tx.send(ImportOutcome {
                job: job.clone(),
                result: Err(ImportError::PipelineClosed),
            });
        }
        job
    }

    /// Number of submitted jobs whose outcome was not yet delivered.
    pub fn pending(&self) -> usize {
        self.outstanding.len()
    }

    /// Delivers every outcome that is ready without blocking.
    pub fn pump(&mut self) -> Vec<ImportOutcome> {
        let mut delivered = Vec::new();
        while let Ok(outcome) = self.completed_rx.try_recv() {
            delivered.push(self.deliver(outcome));
        }
        delivered
    }

    /// Blocks until every submitted job is delivered or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Vec<ImportOutcome> {
        let deadline = Instant::now() + timeout;
        let mut delivered = Vec::new();
        while !self.outstanding.is_empty() {
            match self.completed_rx.recv_deadline(deadline) {
                Ok(outcome) => delivered.push(self.deliver(outcome)),
                Err(_) => break,
            }
        }
        delivered
    }

    /// Requests cancellation of every job not yet delivered.
    pub fn cancel_all(&self) -> usize {
        self.outstanding.values().filter(|job| job.cancel()).count()
    }

    fn deliver(&mut self, outcome: ImportOutcome) -> ImportOutcome {
        self.outstanding.remove(&outcome.job.id());
        for hook in &mut self.hooks {
            hook(&outcome);
        }
        outcome
    }
}

impl Drop for ImportPipeline {
    fn drop(&mut self) {
        self.cancel_all();
        self.queue.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("event=pipeline_stop module=import status=error reason=worker_panicked");
            }
        }
    }
}

fn worker_loop(
    store: &dyn SeriesStore,
    queue: &Receiver<JobHandle>,
    completed: &Sender<ImportOutcome>,
) {
    for job in queue.iter() {
        let outcome = run_job(store, job);
        if completed.send(outcome).is_err() {
            break;
        }
    }
}

pub(crate) fn run_job(store: &dyn SeriesStore, job: JobHandle) -> ImportOutcome {
    run_job_with(store, job, &mut |_| {})
}

/// Runs `job`, calling `on_stage` at every stage boundary before the
/// cancellation check.
pub(crate) fn run_job_with(
    store: &dyn SeriesStore,
    job: JobHandle,
    on_stage: &mut dyn FnMut(&JobHandle),
) -> ImportOutcome {
    let started_at = Instant::now();
    if !job.start() {
        job.finish(JobState::Failed);
        info!(
            "event=import_job module=import status=cancelled job={} stage=queued",
            job.id()
        );
        return ImportOutcome {
            job,
            result: Err(ImportError::Cancelled),
        };
    }
    info!(
        "event=import_job module=import status=running job={}",
        job.id()
    );

    let result = catch_unwind(AssertUnwindSafe(|| execute(store, &job, on_stage)))
        .unwrap_or_else(|payload| Err(ImportError::Panicked(panic_text(payload.as_ref()))));

    match &result {
        Ok(file) => {
            job.finish(JobState::Completed);
            info!(
                "event=import_job module=import status=completed job={} key={} rows={} dropped_rows={} duration_ms={}",
                job.id(),
                file.store_key,
                file.rows,
                file.dropped_rows,
                started_at.elapsed().as_millis()
            );
        }
        Err(err) => {
            job.finish(JobState::Failed);
            warn!(
                "event=import_job module=import status=failed job={} duration_ms={} error={}",
                job.id(),
                started_at.elapsed().as_millis(),
                err
            );
        }
    }
    ImportOutcome { job, result }
}

fn execute(
    store: &dyn SeriesStore,
    job: &JobHandle,
    on_stage: &mut dyn FnMut(&JobHandle),
) -> ImportResult<ImportedFile> {
    let mut checkpoint = || {
        on_stage(job);
        if job.is_cancel_requested() {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    };
    let parsed = parse_file_with(job.source_path(), job.config(), &mut checkpoint)?;
    checkpoint()?;

    let kind = job.config().kind;
    let datafile_id = Oid::new(EntityKind::DataFile);
    let store_key = StoreKey::for_datafile(kind, datafile_id);
    store.put(&store_key, &parsed.table, &parsed.attrs)?;

    let spec = DataFileSpec {
        kind,
        source_path: job.source_path().to_path_buf(),
        name: None,
        column_format: parsed.columns,
        ingested_at: Some(Utc::now()),
    };
    Ok(ImportedFile {
        datafile_id,
        store_key,
        spec,
        rows: parsed.table.len(),
        dropped_rows: parsed.dropped_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::{run_job, run_job_with, ImportPipeline};
    use crate::import::job::{JobHandle, JobId};
    use crate::import::{ImportConfig, ImportError, JobState};
    use crate::model::{DataKind, EntityKind, Scalar};
    use crate::oid::Oid;
    use crate::store::{SeriesStore, SqliteSeriesStore};
    use std::cell::RefCell;
    use std::io::Write;
    use std::path::Path;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    fn write_gravity_file(dir: &Path, name: &str, rows: usize) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for row in 0..rows {
            writeln!(file, "{},{},{}", 1_520_604_000.0 + row as f64 * 0.1, 980.0, 0.5).unwrap();
        }
        path
    }

    fn config() -> ImportConfig {
        ImportConfig::gravity().with_columns(["time", "gravity", "long"])
    }

    #[test]
    fn completed_job_is_stored_and_delivered_to_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gravity_file(dir.path(), "line1.dat", 20);
        let store = Arc::new(SqliteSeriesStore::open_in_memory().unwrap());
        let mut pipeline = ImportPipeline::new(store.clone(), 1).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        pipeline.add_completion_hook(move |outcome| {
            sink.borrow_mut().push(outcome.store_key().cloned());
        });

        let dataset = Oid::new(EntityKind::DataSet);
        let job = pipeline.submit(&path, config(), dataset);
        let outcomes = pipeline.wait(Duration::from_secs(10));

        assert_eq!(outcomes.len(), 1);
        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(outcomes[0].dataset_id(), dataset);
        let file = outcomes[0].result.as_ref().unwrap();
        assert_eq!(file.rows, 20);
        assert_eq!(file.spec.kind, DataKind::Gravity);
        assert_eq!(file.store_key.datafile_oid(), Some(file.datafile_id));
        assert_eq!(seen.borrow().as_slice(), &[Some(file.store_key.clone())]);

        let attrs = store.get_attrs(&file.store_key).unwrap().unwrap();
        assert_eq!(
            attrs["source_path"],
            Scalar::Text(path.to_string_lossy().into_owned())
        );
        assert_eq!(pipeline.pending(), 0);
    }

    #[test]
    fn unreadable_file_is_delivered_as_failure() {
        let store = Arc::new(SqliteSeriesStore::open_in_memory().unwrap());
        let mut pipeline = ImportPipeline::new(store.clone(), 2).unwrap();
        let job = pipeline.submit(
            "/definitely/not/here.dat",
            config(),
            Oid::new(EntityKind::DataSet),
        );
        let outcomes = pipeline.wait(Duration::from_secs(10));
        assert!(matches!(outcomes[0].result, Err(ImportError::Io { .. })));
        assert_eq!(job.state(), JobState::Failed);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn job_cancelled_while_queued_fails_without_writing() {
        let store = SqliteSeriesStore::open_in_memory().unwrap();
        let job = JobHandle::new(
            JobId(1),
            Oid::new(EntityKind::DataSet),
            "/raw/unused.dat".into(),
            config(),
        );
        assert!(job.cancel());
        let outcome = run_job(&store, job.clone());
        assert!(matches!(outcome.result, Err(ImportError::Cancelled)));
        assert_eq!(job.state(), JobState::Failed);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn job_cancelled_while_running_fails_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gravity_file(dir.path(), "line2.dat", 50);
        let store = SqliteSeriesStore::open_in_memory().unwrap();
        let job = JobHandle::new(JobId(2), Oid::new(EntityKind::DataSet), path, config());

        let mut stages = 0;
        let outcome = run_job_with(&store, job.clone(), &mut |running| {
            stages += 1;
            assert_eq!(running.state(), JobState::Running);
            if stages == 2 {
                assert!(running.cancel());
            }
        });

        assert_eq!(stages, 2);
        assert!(matches!(outcome.result, Err(ImportError::Cancelled)));
        assert!(outcome.result.as_ref().unwrap_err().is_cancelled());
        assert_eq!(job.state(), JobState::Failed);
        assert!(!job.cancel());
        assert!(store.keys().unwrap().is_empty());
    }
}
