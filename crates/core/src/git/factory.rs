//! Seam over the `git2` entry points.
//!
//! Wraps repository open and clone so the submodule policy is applied in one
//! place and callers never touch `git2::build` directly.

use git2::build::RepoBuilder;
use git2::{FetchOptions, Repository};
use std::path::Path;

/// Opens and clones repositories with the configured submodule handling.
pub struct GitFactory {
    clone_submodules: bool,
}

impl GitFactory {
    pub fn new(clone_submodules: bool) -> Self {
        Self { clone_submodules }
    }

    /// Open an existing repository at `dir`.
    ///
    /// Fails if `dir` is not a git repository.
    pub fn open(&self, dir: &Path) -> Result<Repository, git2::Error> {
        Repository::open(dir)
    }

    /// Clone `url` into `into`, updating submodules when configured.
    pub fn clone(
        &self,
        url: &str,
        into: &Path,
        fetch_options: FetchOptions<'_>,
    ) -> Result<Repository, git2::Error> {
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);
        let repo = builder.clone(url, into)?;
        if self.clone_submodules {
            let mut submodules = repo.submodules()?;
            for submodule in &mut submodules {
                submodule.update(true, None)?;
            }
        }
        Ok(repo)
    }
}
