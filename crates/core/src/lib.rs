//! # confgit core
//!
//! Core logic for the confgit configuration server: a git-backed
//! environment repository that resolves an (application, profiles, label)
//! triple to an ordered list of property sources materialised from a
//! working copy held at the requested revision.
//!
//! **No API concerns**: HTTP routing, content-type handling and response
//! mapping live in `api-rest`; key management lives in `confgit-encryption`.

pub mod assembler;
pub mod environment;
pub mod error;
pub mod git;
pub mod materialise;
pub mod settings;

pub use environment::{denormalize, normalize, Environment, Locations, PropertySource};
pub use error::{EnvironmentError, EnvironmentResult};
pub use git::repository::GitEnvironmentRepository;
pub use settings::GitSettings;

/// The contract shared by all environment backends.
///
/// Resolves the configuration of `application` under the comma-separated
/// `profiles` at `label` (`None` selects the backend's default label).
pub trait EnvironmentRepository: Send + Sync {
    fn find_one(
        &self,
        application: &str,
        profiles: &str,
        label: Option<&str>,
    ) -> EnvironmentResult<Environment>;
}

/// Backends that expose the filesystem locations behind an environment.
pub trait SearchPathLocator: EnvironmentRepository {
    fn get_locations(
        &self,
        application: &str,
        profile: &str,
        label: Option<&str>,
    ) -> EnvironmentResult<Locations>;
}
