//! One open project: controller, document file, series store and importer.
//!
//! # Responsibility
//! - Create and open project directories.
//! - Attach import results to the tree on the control thread.
//! - Persist the project document on demand or after each mutation.
//!
//! # Invariants
//! - Import results only reach the tree through `pump`/`wait_for_imports`.
//! - A rejected import leaves no orphaned store entry behind.

use crate::config::CoreConfig;
use crate::controller::{ControllerError, ProjectController, ProjectTree};
use crate::document::{
    load_from_dir, locate_project_document, save_to_dir, SerializationError,
};
use crate::import::{ImportConfig, ImportError, ImportOutcome, ImportPipeline, JobHandle};
use crate::model::{EntityKind, ProjectSpec};
use crate::oid::Oid;
use crate::store::{SeriesStore, SqliteSeriesStore, StorageError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug)]
pub enum SessionError {
    /// Config failed normalization.
    Config(String),
    /// A project document already exists where a new project was requested.
    AlreadyExists(PathBuf),
    Document(SerializationError),
    Storage(StorageError),
    Controller(ControllerError),
    /// Import workers could not be started.
    Io(std::io::Error),
}

impl SessionError {
    /// Whether the project itself could not be identified.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Document(err) if err.is_fatal())
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(detail) => write!(f, "invalid config: {detail}"),
            Self::AlreadyExists(path) => {
                write!(f, "a project already exists at {}", path.display())
            }
            Self::Document(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Controller(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Document(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Controller(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Config(_) | Self::AlreadyExists(_) => None,
        }
    }
}

impl From<SerializationError> for SessionError {
    fn from(value: SerializationError) -> Self {
        Self::Document(value)
    }
}

impl From<StorageError> for SessionError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<ControllerError> for SessionError {
    fn from(value: ControllerError) -> Self {
        Self::Controller(value)
    }
}

impl From<std::io::Error> for SessionError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// What happened to one finished import job.
#[derive(Debug)]
pub enum ImportReport {
    /// The new DataFile is attached to its dataset.
    Attached { job: JobHandle, datafile: Oid },
    /// The job succeeded but the controller refused the file; its store
    /// entry was removed.
    Rejected {
        job: JobHandle,
        error: ControllerError,
    },
    /// Parsing or storing failed.
    Failed { job: JobHandle, error: ImportError },
}

impl ImportReport {
    pub fn job(&self) -> &JobHandle {
        match self {
            Self::Attached { job, .. } | Self::Rejected { job, .. } | Self::Failed { job, .. } => {
                job
            }
        }
    }

    pub fn datafile(&self) -> Option<Oid> {
        match self {
            Self::Attached { datafile, .. } => Some(*datafile),
            Self::Rejected { .. } | Self::Failed { .. } => None,
        }
    }
}

pub struct ProjectSession {
    dir: PathBuf,
    config: CoreConfig,
    controller: ProjectController,
    store: Arc<SqliteSeriesStore>,
    pipeline: ImportPipeline,
}

impl ProjectSession {
    /// Creates a new project named `name` in `dir` and writes its document.
    pub fn create(dir: &Path, name: &str, config: CoreConfig) -> SessionResult<Self> {
        let config = config.normalized().map_err(SessionError::Config)?;
        if let Some(existing) = locate_project_document(dir, &config.document_name) {
            return Err(SessionError::AlreadyExists(existing));
        }
        std::fs::create_dir_all(dir)?;
        let controller = ProjectController::new(ProjectSpec::new(name, dir))?;
        let session = Self::assemble(dir, config, controller)?;
        session.save()?;
        Ok(session)
    }

    /// Opens the project document found in `dir`.
    pub fn open(dir: &Path, config: CoreConfig) -> SessionResult<Self> {
        let config = config.normalized().map_err(SessionError::Config)?;
        let (document, tree) = load_from_dir(dir, &config.document_name)?;
        let dir = document.parent().unwrap_or(dir).to_path_buf();
        info!(
            "event=session_open module=session status=ok path={} nodes={}",
            document.display(),
            tree.len()
        );
        Self::assemble(&dir, config, ProjectController::from_tree(tree))
    }

    fn assemble(
        dir: &Path,
        config: CoreConfig,
        controller: ProjectController,
    ) -> SessionResult<Self> {
        let store = Arc::new(SqliteSeriesStore::open(dir.join(&config.store_name))?);
        let shared: Arc<dyn SeriesStore> = store.clone();
        let mut controller = controller.with_store(Arc::clone(&shared));
        let pipeline = ImportPipeline::new(shared, config.workers)?;

        if config.autosave {
            let target = dir.to_path_buf();
            let name = config.document_name.clone();
            controller.add_mutation_hook(move |tree: &ProjectTree| {
                if let Err(err) = save_to_dir(tree, &target, &name) {
                    warn!(
                        "event=autosave module=session status=error dir={} error={}",
                        target.display(),
                        err
                    );
                }
            });
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            controller,
            store,
            pipeline,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir.join(&self.config.document_name)
    }

    pub fn controller(&self) -> &ProjectController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ProjectController {
        &mut self.controller
    }

    pub fn tree(&self) -> &ProjectTree {
        self.controller.tree()
    }

    pub fn store(&self) -> &Arc<SqliteSeriesStore> {
        &self.store
    }

    /// Submitted imports whose result was not attached yet.
    pub fn pending_imports(&self) -> usize {
        self.pipeline.pending()
    }

    /// Requests cancellation of every pending import. Cancelled jobs are
    /// still reported by the next `pump` or `wait_for_imports`.
    pub fn cancel_imports(&self) -> usize {
        self.pipeline.cancel_all()
    }

    /// Writes the project document now.
    pub fn save(&self) -> SessionResult<PathBuf> {
        Ok(save_to_dir(
            self.controller.tree(),
            &self.dir,
            &self.config.document_name,
        )?)
    }

    /// Queues `path` for import into `dataset`.
    ///
    /// Only the dataset's existence is checked here; slot conflicts are
    /// detected when the result is attached.
    pub fn submit_import(
        &mut self,
        path: impl Into<PathBuf>,
        config: ImportConfig,
        dataset: Oid,
    ) -> SessionResult<JobHandle> {
        self.controller
            .ensure_kind(dataset, EntityKind::DataSet)
            .map_err(ControllerError::from)?;
        Ok(self.pipeline.submit(path, config, dataset))
    }

    /// Attaches every finished job without blocking.
    pub fn pump(&mut self) -> Vec<ImportReport> {
        let outcomes = self.pipeline.pump();
        self.attach_all(outcomes)
    }

    /// Blocks until all submitted jobs finish or `timeout` passes, then
    /// attaches them.
    pub fn wait_for_imports(&mut self, timeout: Duration) -> Vec<ImportReport> {
        let outcomes = self.pipeline.wait(timeout);
        self.attach_all(outcomes)
    }

    fn attach_all(&mut self, outcomes: Vec<ImportOutcome>) -> Vec<ImportReport> {
        outcomes
            .into_iter()
            .map(|outcome| self.attach(outcome))
            .collect()
    }

    fn attach(&mut self, outcome: ImportOutcome) -> ImportReport {
        let dataset = outcome.dataset_id();
        let ImportOutcome { job, result } = outcome;
        let file = match result {
            Ok(file) => file,
            Err(error) => return ImportReport::Failed { job, error },
        };

        match self
            .controller
            .attach_data_file(dataset, file.datafile_id, file.spec)
        {
            Ok(()) => ImportReport::Attached {
                job,
                datafile: file.datafile_id,
            },
            Err(error) => {
                if let Err(cleanup) = self.store.delete(&file.store_key) {
                    warn!(
                        "event=import_attach module=session status=error job={} key={} error={}",
                        job.id(),
                        file.store_key,
                        cleanup
                    );
                }
                info!(
                    "event=import_attach module=session status=rejected job={} dataset={} reason={}",
                    job.id(),
                    dataset,
                    error
                );
                ImportReport::Rejected { job, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectSession, SessionError};
    use crate::config::CoreConfig;
    use crate::model::{DataSetSpec, FlightSpec};

    #[test]
    fn create_then_open_restores_tree() {
        let dir = tempfile::tempdir().unwrap();
        let flight = {
            let mut session =
                ProjectSession::create(dir.path(), "Survey", CoreConfig::default()).unwrap();
            let flight = session
                .controller_mut()
                .add_flight(FlightSpec::new("F1"))
                .unwrap();
            session
                .controller_mut()
                .flight(flight)
                .unwrap()
                .add_dataset(DataSetSpec::default())
                .unwrap();
            flight
        };

        let session = ProjectSession::open(dir.path(), CoreConfig::default()).unwrap();
        assert_eq!(session.tree().project().name(), "Survey");
        assert_eq!(session.tree().children_of(flight).len(), 1);
        assert!(session.dir().join("dgpdata.sqlite3").is_file());
    }

    #[test]
    fn create_refuses_existing_project() {
        let dir = tempfile::tempdir().unwrap();
        drop(ProjectSession::create(dir.path(), "Survey", CoreConfig::default()).unwrap());
        let err = ProjectSession::create(dir.path(), "Again", CoreConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::AlreadyExists(_)));
    }

    #[test]
    fn open_without_document_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProjectSession::open(dir.path(), CoreConfig::default())
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn autosave_off_leaves_document_stale() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig::default().without_autosave();
        let mut session = ProjectSession::create(dir.path(), "Survey", config.clone()).unwrap();
        session
            .controller_mut()
            .add_flight(FlightSpec::new("F1"))
            .unwrap();
        drop(session);

        let reopened = ProjectSession::open(dir.path(), config).unwrap();
        assert!(reopened.tree().flights().is_empty());
    }
}
