//! Fixtures for git tests.
//!
//! Tests run against real repositories built in temporary directories: a
//! [`RemoteFixture`] plays the remote (cloned from its plain filesystem
//! path, or opened in place via its `file:` URI), and `clone_fixture`
//! produces a local working copy the way the server would.

use git2::{BranchType, Oid, Repository, RepositoryInitOptions, Signature};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub(crate) struct RemoteFixture {
    dir: TempDir,
    repo: Repository,
}

impl RemoteFixture {
    /// A repository whose unborn initial branch is `main`.
    pub fn new() -> Self {
        Self::with_initial_head("main")
    }

    pub fn with_initial_head(branch: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let mut options = RepositoryInitOptions::new();
        options.initial_head(branch);
        let repo = Repository::init_opts(dir.path(), &options).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Config Admin").unwrap();
            config.set_str("user.email", "admin@example.com").unwrap();
        }
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Plain filesystem path; cloning from it exercises the clone path.
    pub fn uri(&self) -> String {
        self.dir.path().display().to_string()
    }

    /// `file:` URI; the server opens it in place without cloning.
    pub fn file_uri(&self) -> String {
        format!("file://{}", self.dir.path().display())
    }

    /// Write `contents` to `name`, stage it and commit on the current branch.
    pub fn commit_file(&self, name: &str, contents: &str, message: &str) -> Oid {
        fs::write(self.dir.path().join(name), contents).unwrap();
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let signature = Signature::now("Config Admin", "admin@example.com").unwrap();
        let parents = match self.repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        self.repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &parent_refs,
            )
            .unwrap()
    }

    /// Create a branch at the current HEAD.
    pub fn branch(&self, name: &str) {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        self.repo.branch(name, &head, false).unwrap();
    }

    pub fn delete_branch(&self, name: &str) {
        self.repo
            .find_branch(name, BranchType::Local)
            .unwrap()
            .delete()
            .unwrap();
    }

    /// Create a lightweight tag at the current HEAD.
    pub fn tag(&self, name: &str) {
        let head = self.repo.head().unwrap().peel_to_commit().unwrap();
        self.repo
            .tag_lightweight(name, head.as_object(), false)
            .unwrap();
    }
}

/// Clone the fixture into a fresh temporary working copy.
pub(crate) fn clone_fixture(remote: &RemoteFixture) -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = git2::build::RepoBuilder::new()
        .clone(&remote.uri(), dir.path())
        .unwrap();
    (dir, repo)
}
