//! Import job identity and state machine.
//!
//! # Invariants
//! - State only moves `Queued -> Running -> {Completed, Failed}` or
//!   `Queued -> Failed` (cancelled before start).
//! - Terminal states are never left.

use crate::import::ImportConfig;
use crate::oid::Oid;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl JobId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn to_u8(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Failed => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Queued,
            1 => Self::Running,
            2 => Self::Completed,
            _ => Self::Failed,
        }
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct JobShared {
    id: JobId,
    dataset_id: Oid,
    source_path: PathBuf,
    config: ImportConfig,
    state: AtomicU8,
    cancel_requested: AtomicBool,
}

/// Shared view of one submitted job.
///
/// Clones observe the same job; the worker thread holds one too.
#[derive(Debug, Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

impl JobHandle {
    pub(crate) fn new(
        id: JobId,
        dataset_id: Oid,
        source_path: PathBuf,
        config: ImportConfig,
    ) -> Self {
        Self {
            shared: Arc::new(JobShared {
                id,
                dataset_id,
                source_path,
                config,
                state: AtomicU8::new(JobState::Queued.to_u8()),
                cancel_requested: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.shared.id
    }

    pub fn dataset_id(&self) -> Oid {
        self.shared.dataset_id
    }

    pub fn source_path(&self) -> &Path {
        &self.shared.source_path
    }

    pub fn config(&self) -> &ImportConfig {
        &self.shared.config
    }

    pub fn state(&self) -> JobState {
        JobState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Requests cancellation.
    ///
    /// A queued job fails without running; a running job stops at its next
    /// stage boundary. Returns `false` when the job already finished.
    pub fn cancel(&self) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        self.shared.cancel_requested.store(true, Ordering::Release);
        true
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::Acquire)
    }

    /// Moves `Queued -> Running`. Fails when the job was cancelled first.
    pub(crate) fn start(&self) -> bool {
        if self.is_cancel_requested() {
            return false;
        }
        self.shared
            .state
            .compare_exchange(
                JobState::Queued.to_u8(),
                JobState::Running.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn finish(&self, state: JobState) {
        debug_assert!(state.is_terminal());
        self.shared.state.store(state.to_u8(), Ordering::Release);
    }
}

impl PartialEq for JobHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for JobHandle {}
