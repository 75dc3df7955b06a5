//! The git working-copy subsystem.
//!
//! Submodules, leaves first: [`factory`] wraps the `git2` entry points,
//! [`credentials`] builds transport auth, [`branches`] resolves labels,
//! [`sync`] owns the pull policy, [`cloner`] brings the working copy up, and
//! [`repository`] orchestrates them behind the environment-repository
//! contract.

pub(crate) mod branches;
pub(crate) mod cloner;
pub(crate) mod credentials;
pub mod factory;
pub mod repository;
pub(crate) mod sync;

#[cfg(test)]
pub(crate) mod testutil;
