//! Working-copy synchronisation.
//!
//! The synchronizer decides when to pull from the remote and brings the
//! local working copy in line with `origin/<label>` afterwards. It owns the
//! time of the last refresh and the debounce policy around it.
//!
//! Failure policy: fetch, merge and reset errors are logged and swallowed —
//! a stale working copy still serves requests, and the following checkout
//! fails loudly if the tree is truly unusable.

use crate::git::branches::{self, ORIGIN_REF_PREFIX};
use crate::git::credentials;
use crate::settings::GitSettings;
use git2::build::CheckoutBuilder;
use git2::{
    AutotagOption, BranchType, FetchOptions, FetchPrune, Oid, Repository, ResetType, Statuses,
    StatusOptions,
};
use std::cell::RefCell;
use std::fs;
use std::time::{Duration, Instant};

/// The per-ref result of a fetch against `refs/remotes/origin/*`.
#[derive(Clone, Debug)]
pub(crate) struct TrackingRefUpdate {
    pub local_ref: String,
    #[allow(dead_code)]
    pub old_id: Oid,
    pub new_id: Oid,
}

impl TrackingRefUpdate {
    /// A pruned tracking ref reports a zero new object id.
    pub fn is_delete(&self) -> bool {
        self.new_id.is_zero()
    }
}

/// Decides when to pull and normalises the working copy afterwards.
pub(crate) struct Synchronizer {
    refresh_rate: i64,
    force_pull: bool,
    last_refresh: Option<Instant>,
}

impl Synchronizer {
    pub fn new(settings: &GitSettings) -> Self {
        Self {
            refresh_rate: settings.refresh_rate(),
            force_pull: settings.force_pull(),
            last_refresh: None,
        }
    }

    /// Whether a fetch should run for this request.
    ///
    /// Never pulls with a negative refresh rate, debounces with a positive
    /// one, and otherwise pulls when the tree is clean and an origin is
    /// configured — or unconditionally under `force_pull` with a dirty tree
    /// (the dirty paths are logged and later discarded).
    pub fn should_pull(
        &mut self,
        repo: &Repository,
        settings: &GitSettings,
    ) -> Result<bool, git2::Error> {
        if self.refresh_rate < 0 {
            return Ok(false);
        }
        if self.refresh_rate > 0 {
            if let Some(last) = self.last_refresh {
                if last.elapsed() < Duration::from_secs(self.refresh_rate as u64) {
                    return Ok(false);
                }
            }
        }

        let statuses = self.read_statuses(repo, settings)?;
        let clean = statuses.is_empty();
        let origin_url = origin_url(repo);

        if self.force_pull && !clean {
            log_dirty(&statuses);
            return Ok(true);
        }
        if !clean {
            tracing::info!(
                "cannot pull from remote {}, the working tree is not clean",
                origin_url.as_deref().unwrap_or("<none>")
            );
        }
        Ok(clean && origin_url.is_some())
    }

    /// Read the working-tree status, recovering once from a corrupt index.
    ///
    /// Recovery (only under `force_pull`): delete `.git/index`, hard-reset
    /// to `HEAD`, re-read.
    fn read_statuses<'repo>(
        &self,
        repo: &'repo Repository,
        settings: &GitSettings,
    ) -> Result<Statuses<'repo>, git2::Error> {
        match repo.statuses(Some(&mut status_options())) {
            Ok(statuses) => Ok(statuses),
            Err(err) => {
                if !self.force_pull {
                    return Err(err);
                }
                tracing::warn!("status failed on the local repository, resetting the index: {err}");
                let _ = fs::remove_file(settings.working_directory().join(".git/index"));
                let head = repo.revparse_single("HEAD")?;
                repo.reset(&head, ResetType::Hard, None)?;
                repo.statuses(Some(&mut status_options()))
            }
        }
    }

    /// Fetch from origin, collecting the tracking-ref updates.
    ///
    /// The refresh time is stamped *before* the call when debouncing, so a
    /// failed fetch still consumes the refresh window. Errors are logged and
    /// yield `None`; the request continues on the local state.
    pub fn fetch(
        &mut self,
        repo: &Repository,
        settings: &GitSettings,
        label: &str,
    ) -> Option<Vec<TrackingRefUpdate>> {
        if self.refresh_rate > 0 {
            self.last_refresh = Some(Instant::now());
        }
        match do_fetch(repo, settings) {
            Ok(updates) => {
                if !updates.is_empty() {
                    tracing::info!(
                        "fetched for remote {label} and found {} updates",
                        updates.len()
                    );
                }
                Some(updates)
            }
            Err(err) => {
                tracing::warn!(
                    "could not fetch remote for {label} remote {}: {err}",
                    origin_url(repo).as_deref().unwrap_or("<none>")
                );
                None
            }
        }
    }

    /// Merge the fetched `origin/<label>` and reset hard if the tree is
    /// still dirty or ahead afterwards.
    pub fn try_merge(&self, repo: &Repository, label: &str) {
        if !branches::is_branch(repo, label) {
            return;
        }
        if let Err(err) = merge(repo, label) {
            tracing::warn!(
                "could not merge remote for {label} remote {}: {err}",
                origin_url(repo).as_deref().unwrap_or("<none>")
            );
        }
        if !is_clean(repo, label) {
            tracing::warn!(
                "the local repository is dirty or ahead of origin, resetting it to origin/{label}"
            );
            reset_hard(repo, label, &format!("{ORIGIN_REF_PREFIX}{label}"));
        }
    }
}

fn status_options() -> StatusOptions {
    let mut options = StatusOptions::new();
    options.include_untracked(true).recurse_untracked_dirs(true);
    options
}

fn origin_url(repo: &Repository) -> Option<String> {
    repo.find_remote("origin")
        .ok()
        .and_then(|remote| remote.url().map(str::to_owned))
}

fn log_dirty(statuses: &Statuses<'_>) {
    let dirties: Vec<String> = statuses
        .iter()
        .filter_map(|entry| entry.path().map(str::to_owned))
        .collect();
    tracing::warn!("dirty files found: {dirties:?}");
}

fn do_fetch(
    repo: &Repository,
    settings: &GitSettings,
) -> Result<Vec<TrackingRefUpdate>, git2::Error> {
    let updates = RefCell::new(Vec::new());
    {
        let mut callbacks = credentials::remote_callbacks(settings);
        callbacks.update_tips(|refname, old_id, new_id| {
            updates.borrow_mut().push(TrackingRefUpdate {
                local_ref: refname.to_string(),
                old_id,
                new_id,
            });
            true
        });

        let mut options = FetchOptions::new();
        options.remote_callbacks(callbacks);
        options.download_tags(AutotagOption::All);
        options.prune(if settings.delete_untracked_branches() {
            FetchPrune::On
        } else {
            FetchPrune::Unspecified
        });

        let mut remote = repo.find_remote("origin")?;
        // An empty refspec list fetches the remote's configured refspecs.
        remote.fetch(&[] as &[&str], Some(&mut options), None)?;
    }
    Ok(updates.into_inner())
}

/// Merge `origin/<label>` into the current branch.
///
/// The working copy never carries its own commits, so the interesting cases
/// are "already up to date" and "fast-forward"; a diverged tree is left for
/// the reset that follows.
fn merge(repo: &Repository, label: &str) -> Result<(), git2::Error> {
    let remote_ref = repo.find_reference(&format!("{ORIGIN_REF_PREFIX}{label}"))?;
    let annotated = repo.reference_to_annotated_commit(&remote_ref)?;
    let (analysis, _) = repo.merge_analysis(&[&annotated])?;

    if analysis.is_up_to_date() {
        return Ok(());
    }
    if analysis.is_fast_forward() {
        let target = annotated.id();
        let object = repo.find_object(target, None)?;
        repo.checkout_tree(&object, None)?;
        let refname = format!("refs/heads/{label}");
        let mut local_ref = repo.find_reference(&refname)?;
        local_ref.set_target(target, "fast-forward")?;
        repo.set_head(&refname)?;
        return Ok(());
    }
    tracing::warn!("merged from remote {label} with a non-fast-forward result");
    Ok(())
}

/// Hard-reset the working copy to `refname`, logging the new object id.
/// Errors are logged and swallowed.
fn reset_hard(repo: &Repository, label: &str, refname: &str) {
    match do_reset(repo, refname) {
        Ok(oid) => tracing::info!("reset label {label} to version {oid}"),
        Err(err) => {
            tracing::warn!("could not reset to remote for {label} (current ref={refname}): {err}")
        }
    }
}

fn do_reset(repo: &Repository, refname: &str) -> Result<Oid, git2::Error> {
    let object = repo.revparse_single(refname)?;
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.reset(&object, ResetType::Hard, Some(&mut checkout))?;
    Ok(object.peel_to_commit()?.id())
}

/// Clean means an empty status *and* not ahead of the tracking branch.
///
/// A branch without tracking information counts as not ahead. Any failure
/// reports not-clean.
pub(crate) fn is_clean(repo: &Repository, label: &str) -> bool {
    match clean_state(repo, label) {
        Ok(clean) => clean,
        Err(err) => {
            tracing::warn!("could not execute status command on the local repository: {err}");
            false
        }
    }
}

fn clean_state(repo: &Repository, label: &str) -> Result<bool, git2::Error> {
    let statuses = repo.statuses(Some(&mut status_options()))?;

    let ahead = match repo.find_branch(label, BranchType::Local) {
        Ok(branch) => match branch.upstream() {
            Ok(upstream) => {
                let local = branch.get().peel_to_commit()?.id();
                let remote = upstream.get().peel_to_commit()?.id();
                let (ahead, _behind) = repo.graph_ahead_behind(local, remote)?;
                ahead > 0
            }
            Err(_) => false,
        },
        Err(_) => false,
    };

    Ok(statuses.is_empty() && !ahead)
}
