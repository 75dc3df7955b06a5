//! Working-copy bring-up.
//!
//! First touch of a repository: wipe the base directory, clone the remote
//! into it (or, for `file:` URIs, open the named local repository in place —
//! the remote *is* the working tree), and leave the default label checked
//! out. Callers serialise these operations through the repository mutex.

use crate::error::{EnvironmentError, EnvironmentResult};
use crate::git::{branches, credentials, factory::GitFactory};
use crate::settings::GitSettings;
use git2::Repository;
use std::fs;

/// Clone at startup and leave the default label checked out.
///
/// Skipped for `file:` URIs — there is nothing to clone. The repository is
/// closed and re-opened once to exercise the on-disk path, and the default
/// label is only checked out when it differs (case-insensitively) from the
/// branch the remote's HEAD selected.
pub(crate) fn init_cloned_repository(
    settings: &GitSettings,
    factory: &GitFactory,
) -> EnvironmentResult<()> {
    if settings.is_file_uri() {
        return Ok(());
    }

    delete_basedir_contents(settings)?;
    let repo = clone_to_basedir(settings, factory)?;
    drop(repo);

    let repo = factory
        .open(&settings.working_directory())
        .map_err(|source| no_such_repository(settings, source))?;

    if !settings.default_label().is_empty() {
        // The branch the remote's HEAD selects depends on the hosting
        // organisation's settings and need not be the configured label.
        let head_branch = repo
            .head()
            .ok()
            .and_then(|head| head.shorthand().map(str::to_owned));
        if let Some(branch) = head_branch {
            if !branch.eq_ignore_ascii_case(settings.default_label()) {
                branches::checkout_default_with_retry(&repo, settings)
                    .map_err(|source| no_such_repository(settings, source))?;
            }
        }
    }
    Ok(())
}

/// On-demand bring-up of the working copy.
///
/// Deletes and recreates the base directory, then clones — or, for `file:`
/// URIs, opens the named repository in place without copying.
pub(crate) fn copy_repository(
    settings: &GitSettings,
    factory: &GitFactory,
) -> EnvironmentResult<Repository> {
    delete_basedir_contents(settings)?;
    fs::create_dir_all(settings.basedir()).map_err(EnvironmentError::BaseDirInit)?;

    if settings.is_file_uri() {
        open_local_repository(settings, factory)
    } else {
        clone_to_basedir(settings, factory)
    }
}

fn open_local_repository(
    settings: &GitSettings,
    factory: &GitFactory,
) -> EnvironmentResult<Repository> {
    let remote = settings.working_directory();
    if !remote.is_dir() {
        return Err(EnvironmentError::InvalidSettings(format!(
            "no directory at {}",
            settings.uri()
        )));
    }
    if !remote.join(".git").is_dir() {
        return Err(EnvironmentError::InvalidSettings(format!(
            "no .git directory at {}",
            settings.uri()
        )));
    }
    factory
        .open(&remote)
        .map_err(|source| no_such_repository(settings, source))
}

fn clone_to_basedir(settings: &GitSettings, factory: &GitFactory) -> EnvironmentResult<Repository> {
    let options = credentials::fetch_options(settings);
    match factory.clone(settings.uri(), settings.basedir(), options) {
        Ok(repo) => Ok(repo),
        Err(source) => {
            tracing::warn!("error occurred cloning to base directory: {source}");
            // Leave nothing half-cloned behind; the next request starts clean.
            if let Err(err) = delete_basedir_contents(settings) {
                tracing::warn!("failed to clean up base directory after clone error: {err}");
            }
            Err(no_such_repository(settings, source))
        }
    }
}

/// Delete the contents of the base directory, entry by entry.
///
/// A failure here poisons the base directory and is fatal.
fn delete_basedir_contents(settings: &GitSettings) -> EnvironmentResult<()> {
    let basedir = settings.basedir();
    if !basedir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(basedir).map_err(EnvironmentError::BaseDirInit)? {
        let entry = entry.map_err(EnvironmentError::BaseDirInit)?;
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(EnvironmentError::BaseDirInit)?;
    }
    Ok(())
}

fn no_such_repository(settings: &GitSettings, source: git2::Error) -> EnvironmentError {
    EnvironmentError::NoSuchRepository {
        uri: settings.uri().to_string(),
        source,
    }
}
