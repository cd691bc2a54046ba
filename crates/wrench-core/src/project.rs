//! A project living on the refine service.

use std::path::PathBuf;

use crate::{CoreError, ProjectId, ProjectName, ProjectState};

/// A remote project created from one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteProject {
    /// Identifier assigned by the service.
    pub id: ProjectId,

    /// Display name the project was created with.
    pub name: ProjectName,

    /// File the project was created from.
    pub source: PathBuf,

    state: ProjectState,
}

impl RemoteProject {
    /// Track a freshly created project.
    pub fn created(id: ProjectId, name: ProjectName, source: PathBuf) -> Self {
        Self {
            id,
            name,
            source,
            state: ProjectState::Created,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProjectState {
        self.state
    }

    /// Move the project forward to `next`.
    pub fn advance(&mut self, next: ProjectState) -> Result<(), CoreError> {
        if !self.state.can_advance_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}
