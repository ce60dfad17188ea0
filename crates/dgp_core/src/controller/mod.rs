//! Controller layer: the only way to mutate a project tree.
//!
//! # Responsibility
//! - Create entities through factory operations that assign identifiers.
//! - Enforce ownership, slot and reference rules on every mutation.
//! - Publish ordered change notifications and run post-mutation hooks.
//!
//! # Invariants
//! - A failed operation leaves the tree unchanged.
//! - Events are published in operation order, after the mutation applied.
//! - All tree mutation happens on the thread that owns the controller.

use crate::model::ValidationError;
use crate::store::StorageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod entity_controllers;
mod events;
mod project_controller;
mod tree;

pub use entity_controllers::{DataSetController, FlightController, GravimeterController};
pub use events::{EventBus, ProjectEvent, SubscriptionId};
pub use project_controller::{ChildSpec, ProjectController};
pub use tree::ProjectTree;

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors from controller operations.
#[derive(Debug)]
pub enum ControllerError {
    /// Rejected operation; the tree is unchanged.
    Validation(ValidationError),
    /// Store entries could not be removed; the tree is unchanged.
    Storage(StorageError),
}

impl ControllerError {
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(_) => None,
        }
    }
}

impl Display for ControllerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ControllerError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for ControllerError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}
