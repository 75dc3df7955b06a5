//! The git-backed environment repository.
//!
//! [`GitEnvironmentRepository`] orchestrates the cloner, branch resolution
//! and synchronizer behind the [`EnvironmentRepository`] contract: it maps
//! an (application, profiles, label) triple to the search locations of a
//! working copy brought to the requested revision, and to the property
//! sources materialised from them.
//!
//! # Concurrency
//!
//! Every git-touching operation runs under one coarse mutex per repository:
//! the working tree is a mutable shared resource that cannot be mutated
//! concurrently. `get_locations` calls on the same repository are totally
//! ordered; reads of the immutable settings are lock-free. A stale
//! `.git/index.lock` found at the start of a refresh is crash debris from a
//! dead process and is deleted — the mutex already excludes live writers
//! from this process.

use crate::environment::{Environment, Locations};
use crate::error::{refresh_error, EnvironmentError, EnvironmentResult};
use crate::git::factory::GitFactory;
use crate::git::sync::Synchronizer;
use crate::git::{branches, cloner};
use crate::settings::{GitSettings, MAIN_LABEL, MASTER_LABEL};
use crate::{assembler, materialise, EnvironmentRepository, SearchPathLocator};
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

/// An environment repository backed by a single remote git repository.
pub struct GitEnvironmentRepository {
    settings: Arc<GitSettings>,
    factory: GitFactory,
    state: Mutex<Synchronizer>,
}

impl GitEnvironmentRepository {
    pub fn new(settings: Arc<GitSettings>) -> Self {
        let factory = GitFactory::new(settings.clone_submodules());
        let state = Mutex::new(Synchronizer::new(&settings));
        Self {
            settings,
            factory,
            state,
        }
    }

    pub fn settings(&self) -> &GitSettings {
        &self.settings
    }

    /// Startup hook: clone the remote now when `clone_on_start` is set.
    ///
    /// Slower startup, faster first query.
    pub fn initialize(&self) -> EnvironmentResult<()> {
        let _state = self.lock_state();
        if self.settings.clone_on_start() {
            cloner::init_cloned_repository(&self.settings, &self.factory)?;
        }
        Ok(())
    }

    /// Bring the working copy to `label` and return the HEAD commit id.
    fn refresh(&self, state: &mut Synchronizer, label: &str) -> EnvironmentResult<String> {
        let map_err = |err: git2::Error| refresh_error(self.settings.uri(), label, err);

        let lock = self.settings.working_directory().join(".git/index.lock");
        if lock.exists() {
            // Left behind by a crashed process; live writers are excluded by
            // the repository mutex.
            tracing::info!("deleting stale git lock file at {}", lock.display());
            let _ = fs::remove_file(&lock);
        }

        let repo = if self.settings.working_directory().join(".git").exists() {
            let repo = self
                .factory
                .open(&self.settings.working_directory())
                .map_err(map_err)?;
            if self.origin_matches(&repo) {
                repo
            } else {
                // Somebody else's working copy; rebuild it from our remote.
                tracing::warn!(
                    "working directory origin does not match {}, recloning",
                    self.settings.uri()
                );
                drop(repo);
                cloner::copy_repository(&self.settings, &self.factory)?
            }
        } else {
            cloner::copy_repository(&self.settings, &self.factory)?
        };

        if state.should_pull(&repo, &self.settings).map_err(map_err)? {
            if let Some(updates) = state.fetch(&repo, &self.settings, label) {
                if self.settings.delete_untracked_branches() && !updates.is_empty() {
                    branches::delete_untracked_local_branches(&repo, &self.settings, &updates);
                }
            }
        }

        // Checkout after fetch so new branches and tags are visible; merge
        // because the remote branch may have moved underneath an existing
        // local branch.
        branches::checkout(&repo, label).map_err(map_err)?;
        state.try_merge(&repo, label);

        let head = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(map_err)?;
        Ok(head.id().to_string())
    }

    /// Whether the working copy's origin is our remote.
    ///
    /// `file:` URIs are read in place and carry no origin of their own.
    fn origin_matches(&self, repo: &git2::Repository) -> bool {
        if self.settings.is_file_uri() {
            return true;
        }
        repo.find_remote("origin")
            .ok()
            .and_then(|remote| remote.url().map(str::to_owned))
            .map(|url| url == self.settings.uri())
            .unwrap_or(false)
    }

    fn lock_state(&self) -> MutexGuard<'_, Synchronizer> {
        // A poisoning panic leaves at worst a dirty working tree, which the
        // next refresh normalises back to origin.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn split_profiles(profiles: &str) -> Vec<String> {
        let parsed: Vec<String> = profiles
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect();
        if parsed.is_empty() {
            vec!["default".to_string()]
        } else {
            parsed
        }
    }
}

impl SearchPathLocator for GitEnvironmentRepository {
    /// Resolve the search locations for `(application, profile, label)`.
    ///
    /// A missing label falls back to the default label; when that is `main`
    /// and the fallback is enabled, a failed refresh is retried once against
    /// `master` and the returned locations carry the `master` label.
    fn get_locations(
        &self,
        application: &str,
        profile: &str,
        label: Option<&str>,
    ) -> EnvironmentResult<Locations> {
        let mut state = self.lock_state();

        let requested = label.unwrap_or_else(|| self.settings.default_label());
        let (label, version) = match self.refresh(&mut state, requested) {
            Ok(version) => (requested.to_string(), version),
            Err(err)
                if requested == self.settings.default_label()
                    && requested == MAIN_LABEL
                    && self.settings.try_master_branch() =>
            {
                tracing::info!("could not refresh default label {requested}: {err}");
                tracing::info!("will try to refresh the {MASTER_LABEL} label instead");
                (
                    MASTER_LABEL.to_string(),
                    self.refresh(&mut state, MASTER_LABEL)?,
                )
            }
            Err(err) => return Err(err),
        };

        let search_paths = assembler::search_locations(
            &self.settings.working_directory(),
            application,
            profile,
            &label,
            self.settings.search_paths(),
        );
        Ok(Locations {
            application: application.to_string(),
            profile: profile.to_string(),
            label,
            version,
            search_paths,
        })
    }
}

impl EnvironmentRepository for GitEnvironmentRepository {
    fn find_one(
        &self,
        application: &str,
        profiles: &str,
        label: Option<&str>,
    ) -> EnvironmentResult<Environment> {
        let locations = self.get_locations(application, profiles, label)?;
        let profile_list = Self::split_profiles(profiles);
        let sources =
            materialise::property_sources(&locations.search_paths, application, &profile_list)?;

        let mut environment = Environment::new(application, profile_list);
        environment.label = Some(locations.label);
        environment.version = Some(locations.version);
        environment.property_sources = sources;
        Ok(environment)
    }
}
