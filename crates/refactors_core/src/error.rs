use thiserror::Error;

use crate::RefactorStep;

#[derive(Debug, Error)]
pub enum RefactorError {
    #[error("unknown refactor: {name}")]
    UnknownRefactor { name: String },
    #[error("refactor {name} does not implement {capability}")]
    MissingCapability {
        name: String,
        capability: RefactorStep,
    },
    #[error("refactor {name} has already run")]
    AlreadyRun { name: String },
    #[error("unable to roll back refactor {name}, it has not run yet")]
    NotRun { name: String },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("refactor failed: {message}")]
    Failed { message: String },
}

impl RefactorError {
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownRefactor { name: name.into() }
    }

    pub fn missing_capability(name: impl Into<String>, capability: RefactorStep) -> Self {
        Self::MissingCapability {
            name: name.into(),
            capability,
        }
    }

    pub fn already_run(name: impl Into<String>) -> Self {
        Self::AlreadyRun { name: name.into() }
    }

    pub fn not_run(name: impl Into<String>) -> Self {
        Self::NotRun { name: name.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

pub type RefactorResult<T> = Result<T, RefactorError>;

impl From<sea_orm::DbErr> for RefactorError {
    fn from(value: sea_orm::DbErr) -> Self {
        RefactorError::storage(value.to_string())
    }
}
