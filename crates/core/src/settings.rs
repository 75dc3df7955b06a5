//! Git repository settings.
//!
//! This module defines the configuration for a single git-backed environment
//! repository. Settings are resolved once at process startup (typically from
//! environment variables in `main`) and then shared read-only behind an
//! `Arc`, so request handling never consults process-wide state.
//!
//! # Working directory resolution
//!
//! The working directory is normally the `basedir` the remote is cloned
//! into. For `file:` URIs the remote *is* the working tree: no clone is
//! performed and the path named by the URI is used in place.

use crate::error::{EnvironmentError, EnvironmentResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default label checked out when a request names none.
pub const MAIN_LABEL: &str = "main";

/// Label retried when the default `main` label cannot be resolved.
pub const MASTER_LABEL: &str = "master";

/// URI prefix marking a local repository that is read in place.
pub const FILE_URI_PREFIX: &str = "file:";

const SUPPORTED_SCHEMES: [&str; 4] = ["http", "https", "ssh", "file"];

/// Configuration for a git-backed environment repository.
///
/// Immutable after construction; shared read-only across request handlers.
/// Use [`GitSettings::new`] with the `with_*` builders:
///
/// ```rust,ignore
/// let settings = GitSettings::new("https://example.com/config.git", basedir)?
///     .with_default_label("main")
///     .with_force_pull(true);
/// ```
#[derive(Clone, Debug)]
pub struct GitSettings {
    uri: String,
    basedir: PathBuf,
    search_paths: Vec<String>,
    default_label: String,
    try_master_branch: bool,
    timeout: Duration,
    refresh_rate: i64,
    clone_on_start: bool,
    force_pull: bool,
    delete_untracked_branches: bool,
    skip_ssl_validation: bool,
    clone_submodules: bool,
    username: Option<String>,
    password: Option<String>,
    passphrase: Option<String>,
}

impl GitSettings {
    /// Create settings for the repository at `uri`, cloned into `basedir`.
    ///
    /// # Errors
    ///
    /// Returns `EnvironmentError::InvalidSettings` if `uri` is empty or uses
    /// an unsupported scheme.
    pub fn new(uri: impl Into<String>, basedir: impl Into<PathBuf>) -> EnvironmentResult<Self> {
        let uri = uri.into().trim().to_string();
        if uri.is_empty() {
            return Err(EnvironmentError::InvalidSettings(
                "you need to configure a uri for the git repository".into(),
            ));
        }
        if let Some((scheme, _)) = uri.split_once("://") {
            if !SUPPORTED_SCHEMES.contains(&scheme) {
                return Err(EnvironmentError::InvalidSettings(format!(
                    "unsupported scheme in git uri: {scheme}"
                )));
            }
        }

        Ok(Self {
            uri,
            basedir: basedir.into(),
            search_paths: Vec::new(),
            default_label: MAIN_LABEL.to_string(),
            try_master_branch: true,
            timeout: Duration::from_secs(5),
            refresh_rate: 0,
            clone_on_start: false,
            force_pull: false,
            delete_untracked_branches: false,
            skip_ssl_validation: false,
            clone_submodules: false,
            username: None,
            password: None,
            passphrase: None,
        })
    }

    /// Search-path templates evaluated under the working directory.
    ///
    /// Templates may use the `{application}`, `{profile}` and `{label}`
    /// placeholders.
    pub fn with_search_paths(mut self, search_paths: Vec<String>) -> Self {
        self.search_paths = search_paths;
        self
    }

    pub fn with_default_label(mut self, default_label: impl Into<String>) -> Self {
        self.default_label = default_label.into();
        self
    }

    /// Retry `master` when the default `main` label cannot be resolved.
    pub fn with_try_master_branch(mut self, try_master_branch: bool) -> Self {
        self.try_master_branch = try_master_branch;
        self
    }

    /// Timeout for transport commands (fetch, clone). Zero disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Seconds between refreshes of the working copy.
    ///
    /// Negative means never pull, zero means pull on every request, positive
    /// debounces pulls to at most one per interval.
    pub fn with_refresh_rate(mut self, refresh_rate: i64) -> Self {
        self.refresh_rate = refresh_rate;
        self
    }

    /// Clone at startup instead of on the first request.
    pub fn with_clone_on_start(mut self, clone_on_start: bool) -> Self {
        self.clone_on_start = clone_on_start;
        self
    }

    /// Discard local working-tree changes and take the remote state.
    pub fn with_force_pull(mut self, force_pull: bool) -> Self {
        self.force_pull = force_pull;
        self
    }

    /// Delete local branches whose origin-tracked branch was removed.
    pub fn with_delete_untracked_branches(mut self, delete_untracked_branches: bool) -> Self {
        self.delete_untracked_branches = delete_untracked_branches;
        self
    }

    /// Skip certificate validation on HTTPS transports.
    pub fn with_skip_ssl_validation(mut self, skip_ssl_validation: bool) -> Self {
        self.skip_ssl_validation = skip_ssl_validation;
        self
    }

    pub fn with_clone_submodules(mut self, clone_submodules: bool) -> Self {
        self.clone_submodules = clone_submodules;
        self
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// Passphrase for the SSH private key.
    pub fn with_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.passphrase = passphrase.filter(|p| !p.is_empty());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn basedir(&self) -> &Path {
        &self.basedir
    }

    pub fn search_paths(&self) -> &[String] {
        &self.search_paths
    }

    pub fn default_label(&self) -> &str {
        &self.default_label
    }

    pub fn try_master_branch(&self) -> bool {
        self.try_master_branch
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn refresh_rate(&self) -> i64 {
        self.refresh_rate
    }

    pub fn clone_on_start(&self) -> bool {
        self.clone_on_start
    }

    pub fn force_pull(&self) -> bool {
        self.force_pull
    }

    pub fn delete_untracked_branches(&self) -> bool {
        self.delete_untracked_branches
    }

    pub fn skip_ssl_validation(&self) -> bool {
        self.skip_ssl_validation
    }

    pub fn clone_submodules(&self) -> bool {
        self.clone_submodules
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    /// Whether the URI names a local repository that is read in place.
    pub fn is_file_uri(&self) -> bool {
        self.uri.starts_with(FILE_URI_PREFIX)
    }

    /// The directory holding the working tree.
    ///
    /// For `file:` URIs this is the path named by the URI (the remote is the
    /// working tree); otherwise it is `basedir`.
    pub fn working_directory(&self) -> PathBuf {
        if self.is_file_uri() {
            let rest = &self.uri[FILE_URI_PREFIX.len()..];
            let path = rest.strip_prefix("//").unwrap_or(rest);
            PathBuf::from(path)
        } else {
            self.basedir.clone()
        }
    }
}
