use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error("unknown storage kind '{0}'")]
    UnknownStorage(String),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("malformed {collection} record: {reason}")]
    Malformed {
        collection: &'static str,
        reason: String,
    },

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
}

/// Outcomes of gym operations that aren't a successful result.
#[derive(Debug, Error)]
pub enum GymError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user {0} not found")]
    UserNotFound(u64),
    #[error("class {0} not found")]
    ClassNotFound(u64),
    #[error("enrollment {0} not found")]
    EnrollmentNotFound(u64),
    #[error("user already enrolled in class")]
    AlreadyEnrolled,
    #[error("class has no available seats")]
    ClassFull,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gym(#[from] GymError),
    #[error(transparent)]
    Cors(#[from] rocket_cors::Error),
}
