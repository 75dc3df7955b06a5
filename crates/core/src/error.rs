//! Error types for the environment repository.
//!
//! [`EnvironmentError`] covers every failure mode of resolving an
//! (application, profiles, label) triple against the backing git repository:
//! configuration problems, label and repository resolution, working-copy
//! bring-up, and property-file materialisation.
//!
//! Label resolution failures are kept distinguishable from transport
//! failures: a request for a branch, tag or commit that does not exist maps
//! to [`EnvironmentError::NoSuchLabel`], while clone/checkout/transport
//! problems map to [`EnvironmentError::NoSuchRepository`]. Anything outside
//! the git domain is wrapped in [`EnvironmentError::CannotLoadEnvironment`].

use std::path::PathBuf;

/// Error type for all environment repository operations.
#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("invalid repository settings: {0}")]
    InvalidSettings(String),
    #[error("no such label: {label}")]
    NoSuchLabel {
        label: String,
        #[source]
        source: git2::Error,
    },
    #[error("no such repository: {uri}")]
    NoSuchRepository {
        uri: String,
        #[source]
        source: git2::Error,
    },
    #[error("cannot load environment")]
    CannotLoadEnvironment(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to initialize base directory: {0}")]
    BaseDirInit(std::io::Error),
    #[error("failed to read property file: {0}")]
    PropertyRead(std::io::Error),
    #[error("failed to parse property file {path}: {reason}", path = path.display())]
    PropertyParse { path: PathBuf, reason: String },
}

/// Type alias for Results that can fail with [`EnvironmentError`].
pub type EnvironmentResult<T> = std::result::Result<T, EnvironmentError>;

/// Map a git error raised while refreshing `label` to its domain error.
///
/// A missing ref means the requested label does not exist; everything else
/// means the repository could not be cloned or checked out.
pub(crate) fn refresh_error(uri: &str, label: &str, source: git2::Error) -> EnvironmentError {
    if source.code() == git2::ErrorCode::NotFound
        && matches!(
            source.class(),
            git2::ErrorClass::Reference | git2::ErrorClass::Object
        )
    {
        EnvironmentError::NoSuchLabel {
            label: label.to_string(),
            source,
        }
    } else {
        EnvironmentError::NoSuchRepository {
            uri: uri.to_string(),
            source,
        }
    }
}
