//! Branch, tag and commit-id resolution.
//!
//! Checkout supports three shapes of label: a branch (local, or remote-only,
//! in which case a local tracking branch is created first), a tag, and a
//! bare commit id. Tags and commit ids leave `HEAD` detached.

use crate::git::sync::TrackingRefUpdate;
use crate::settings::{GitSettings, MAIN_LABEL, MASTER_LABEL};
use git2::{BranchType, Repository};

pub(crate) const ORIGIN_REF_PREFIX: &str = "refs/remotes/origin/";

/// True iff `label` names a local or an origin-tracked branch.
pub(crate) fn is_branch(repo: &Repository, label: &str) -> bool {
    is_local_branch(repo, label)
        || repo
            .find_reference(&format!("{ORIGIN_REF_PREFIX}{label}"))
            .is_ok()
}

/// True iff `refs/heads/<label>` exists.
pub(crate) fn is_local_branch(repo: &Repository, label: &str) -> bool {
    repo.find_reference(&format!("refs/heads/{label}")).is_ok()
}

/// Check out `label`.
///
/// A remote-only branch gets a local tracking branch first; tags and commit
/// ids are checked out detached.
pub(crate) fn checkout(repo: &Repository, label: &str) -> Result<(), git2::Error> {
    if is_branch(repo, label) && !is_local_branch(repo, label) {
        track_branch(repo, label)?;
    }

    if is_local_branch(repo, label) {
        let refname = format!("refs/heads/{label}");
        let object = repo.revparse_single(&refname)?;
        repo.checkout_tree(&object, None)?;
        repo.set_head(&refname)?;
    } else {
        let object = repo.revparse_single(label)?;
        let commit = object.peel_to_commit()?;
        repo.checkout_tree(commit.as_object(), None)?;
        repo.set_head_detached(commit.id())?;
    }
    Ok(())
}

/// Create a local branch for `origin/<label>` with tracking set up.
fn track_branch(repo: &Repository, label: &str) -> Result<(), git2::Error> {
    let remote_ref = repo.find_reference(&format!("{ORIGIN_REF_PREFIX}{label}"))?;
    let commit = remote_ref.peel_to_commit()?;
    let mut branch = repo.branch(label, &commit, false)?;
    branch.set_upstream(Some(&format!("origin/{label}")))?;
    Ok(())
}

/// Check out the default label, retrying with `master` when the default is
/// `main` and the fallback is enabled.
pub(crate) fn checkout_default_with_retry(
    repo: &Repository,
    settings: &GitSettings,
) -> Result<(), git2::Error> {
    match checkout(repo, settings.default_label()) {
        Ok(()) => Ok(()),
        Err(err) if settings.default_label() == MAIN_LABEL && settings.try_master_branch() => {
            tracing::info!(
                "could not checkout default label {}: {err}",
                settings.default_label()
            );
            tracing::info!("will try to checkout the {MASTER_LABEL} label instead");
            checkout(repo, MASTER_LABEL)
        }
        Err(err) => Err(err),
    }
}

/// Delete local branches whose origin-tracked branch was removed.
///
/// Returns the branches actually deleted. Failures are logged and swallowed,
/// yielding an empty set.
pub(crate) fn delete_untracked_local_branches(
    repo: &Repository,
    settings: &GitSettings,
    updates: &[TrackingRefUpdate],
) -> Vec<String> {
    let branches: Vec<String> = updates
        .iter()
        .filter(|update| update.is_delete())
        .filter_map(|update| {
            update
                .local_ref
                .strip_prefix(ORIGIN_REF_PREFIX)
                .map(str::to_string)
        })
        .collect();
    if branches.is_empty() {
        return Vec::new();
    }

    match delete_branches(repo, settings, &branches) {
        Ok(deleted) => deleted,
        Err(err) => {
            tracing::warn!("failed to delete {branches:?} branches: {err}");
            Vec::new()
        }
    }
}

fn delete_branches(
    repo: &Repository,
    settings: &GitSettings,
    branches: &[String],
) -> Result<Vec<String>, git2::Error> {
    // The current branch cannot be deleted.
    checkout_default_with_retry(repo, settings)?;

    let mut deleted = Vec::new();
    for name in branches {
        if let Ok(mut branch) = repo.find_branch(name, BranchType::Local) {
            branch.delete()?;
            deleted.push(name.clone());
        }
    }
    tracing::info!("deleted {deleted:?} from {branches:?} branches to delete");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::testutil::{clone_fixture, RemoteFixture};
    use git2::Oid;

    #[test]
    fn recognises_local_and_remote_branches() {
        let remote = RemoteFixture::new();
        remote.commit_file("app.yml", "a: 1\n", "add app config");
        remote.branch("feature");
        let (_dir, repo) = clone_fixture(&remote);

        assert!(is_branch(&repo, "main"));
        assert!(is_local_branch(&repo, "main"));
        assert!(is_branch(&repo, "feature"));
        assert!(!is_local_branch(&repo, "feature"));
        assert!(!is_branch(&repo, "nope"));
    }

    #[test]
    fn checkout_of_a_remote_branch_creates_a_tracking_branch() {
        let remote = RemoteFixture::new();
        remote.commit_file("app.yml", "a: 1\n", "add app config");
        remote.branch("feature");
        let (_dir, repo) = clone_fixture(&remote);

        checkout(&repo, "feature").unwrap();

        assert!(is_local_branch(&repo, "feature"));
        let branch = repo.find_branch("feature", BranchType::Local).unwrap();
        assert!(branch.upstream().is_ok());
        assert_eq!(repo.head().unwrap().shorthand(), Some("feature"));
    }

    #[test]
    fn checkout_of_a_tag_detaches_head() {
        let remote = RemoteFixture::new();
        let tagged = remote.commit_file("app.yml", "a: 1\n", "add app config");
        remote.tag("v1");
        remote.commit_file("app.yml", "a: 2\n", "bump");
        let (_dir, repo) = clone_fixture(&remote);

        checkout(&repo, "v1").unwrap();

        assert!(repo.head_detached().unwrap());
        assert_eq!(repo.head().unwrap().peel_to_commit().unwrap().id(), tagged);
    }

    #[test]
    fn checkout_of_a_commit_id_detaches_head() {
        let remote = RemoteFixture::new();
        let first = remote.commit_file("app.yml", "a: 1\n", "add app config");
        remote.commit_file("app.yml", "a: 2\n", "bump");
        let (_dir, repo) = clone_fixture(&remote);

        checkout(&repo, &first.to_string()).unwrap();

        assert!(repo.head_detached().unwrap());
        assert_eq!(repo.head().unwrap().peel_to_commit().unwrap().id(), first);
    }

    #[test]
    fn checkout_of_a_missing_label_reports_not_found() {
        let remote = RemoteFixture::new();
        remote.commit_file("app.yml", "a: 1\n", "add app config");
        let (_dir, repo) = clone_fixture(&remote);

        let err = checkout(&repo, "nope").unwrap_err();
        assert_eq!(err.code(), git2::ErrorCode::NotFound);
    }

    #[test]
    fn default_checkout_falls_back_to_master() {
        let remote = RemoteFixture::with_initial_head("master");
        remote.commit_file("app.yml", "a: 1\n", "add app config");
        let (dir, repo) = clone_fixture(&remote);

        let settings = GitSettings::new(remote.uri(), dir.path()).unwrap();
        checkout_default_with_retry(&repo, &settings).unwrap();
        assert_eq!(repo.head().unwrap().shorthand(), Some("master"));
    }

    #[test]
    fn delete_untracked_removes_only_deleted_tracking_refs() {
        let remote = RemoteFixture::new();
        remote.commit_file("app.yml", "a: 1\n", "add app config");
        remote.branch("feature");
        let (dir, repo) = clone_fixture(&remote);
        checkout(&repo, "feature").unwrap();

        let settings = GitSettings::new(remote.uri(), dir.path()).unwrap();
        let updates = vec![
            TrackingRefUpdate {
                local_ref: format!("{ORIGIN_REF_PREFIX}feature"),
                old_id: Oid::zero(),
                new_id: Oid::zero(),
            },
            TrackingRefUpdate {
                local_ref: format!("{ORIGIN_REF_PREFIX}main"),
                old_id: Oid::zero(),
                new_id: repo.head().unwrap().peel_to_commit().unwrap().id(),
            },
        ];

        let deleted = delete_untracked_local_branches(&repo, &settings, &updates);
        assert_eq!(deleted, vec!["feature".to_string()]);
        assert!(!is_local_branch(&repo, "feature"));
        assert!(is_local_branch(&repo, "main"));
    }

    #[test]
    fn delete_untracked_with_no_deletions_is_a_no_op() {
        let remote = RemoteFixture::new();
        remote.commit_file("app.yml", "a: 1\n", "add app config");
        let (dir, repo) = clone_fixture(&remote);

        let settings = GitSettings::new(remote.uri(), dir.path()).unwrap();
        assert!(delete_untracked_local_branches(&repo, &settings, &[]).is_empty());
    }
}
