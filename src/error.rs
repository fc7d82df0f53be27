// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("Conflicting write to {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid desired state: {0}")]
    BuildError(String),

    #[error("Coordination service error: {0}")]
    CoordinationError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl StrataError {
    pub fn is_not_found(&self) -> bool {
        match self {
            StrataError::NotFound(_) => true,
            StrataError::KubeError(kube::Error::Api(e)) => e.code == 404,
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        match self {
            StrataError::AlreadyExists(_) => true,
            StrataError::KubeError(kube::Error::Api(e)) => {
                e.code == 409 && e.reason == "AlreadyExists"
            }
            _ => false,
        }
    }

    /// Build errors never heal on retry; everything else may.
    pub fn is_build(&self) -> bool {
        matches!(self, StrataError::BuildError(_))
    }

    pub fn is_transient(&self) -> bool {
        !self.is_build() && !matches!(self, StrataError::ConfigError(_))
    }
}

pub type Result<T> = std::result::Result<T, StrataError>;

/// Treat a missing object as success, mirroring the usual delete-if-present idiom.
pub fn ignore_not_found<T: Default>(result: Result<T>) -> Result<T> {
    match result {
        Err(e) if e.is_not_found() => Ok(T::default()),
        other => other,
    }
}

/// Treat an object that is already there as success for create-if-absent steps.
pub fn ignore_already_exists<T: Default>(result: Result<T>) -> Result<T> {
    match result {
        Err(e) if e.is_already_exists() => Ok(T::default()),
        other => other,
    }
}
