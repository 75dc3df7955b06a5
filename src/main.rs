//! confgit server binary.
//!
//! ## Purpose
//! Runs the configuration server: resolves the repository and encryption
//! settings from environment variables, validates the base directory,
//! optionally clones the remote up front, and serves the REST API.
//!
//! ## Environment variables
//! - `CONFGIT_ADDR`: listen address (default `0.0.0.0:8888`)
//! - `CONFGIT_PREFIX`: path prefix for the whole API (default none)
//! - `CONFGIT_GIT_URI`: remote repository URI (required)
//! - `CONFGIT_GIT_BASEDIR`: working-copy directory (default under the
//!   system temp directory)
//! - `CONFGIT_GIT_DEFAULT_LABEL`, `CONFGIT_GIT_TRY_MASTER_BRANCH`,
//!   `CONFGIT_GIT_TIMEOUT`, `CONFGIT_GIT_REFRESH_RATE`,
//!   `CONFGIT_GIT_CLONE_ON_START`, `CONFGIT_GIT_FORCE_PULL`,
//!   `CONFGIT_GIT_DELETE_UNTRACKED_BRANCHES`,
//!   `CONFGIT_GIT_SKIP_SSL_VALIDATION`, `CONFGIT_GIT_CLONE_SUBMODULES`,
//!   `CONFGIT_GIT_SEARCH_PATHS` (comma separated),
//!   `CONFGIT_GIT_USERNAME`, `CONFGIT_GIT_PASSWORD`,
//!   `CONFGIT_GIT_PASSPHRASE`
//! - `ENCRYPT_KEY`: symmetric secret or PEM key material
//! - `ENCRYPT_KEY_STORE_LOCATION`: PEM private-key file

use api_rest::AppState;
use confgit_core::{EnvironmentRepository, GitEnvironmentRepository, GitSettings};
use confgit_encryption::{ActiveKeyLocator, EncryptionService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("confgit=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Arc::new(git_settings_from_env()?);

    // Fail early on an unusable base directory rather than on first request.
    if !settings.is_file_uri() {
        std::fs::create_dir_all(settings.basedir())?;
        let probe = settings.basedir().join(".confgit_write_test");
        if let Err(err) = std::fs::write(&probe, b"test") {
            anyhow::bail!(
                "base directory is not writable: {} ({err})",
                settings.basedir().display()
            );
        }
        let _ = std::fs::remove_file(&probe);
    }

    let repository = Arc::new(GitEnvironmentRepository::new(settings.clone()));
    if settings.clone_on_start() {
        tracing::info!("cloning {} into {}", settings.uri(), settings.basedir().display());
        repository.initialize()?;
    }

    let encryption = Arc::new(EncryptionService::new(Arc::new(ActiveKeyLocator::new())));
    if let Ok(location) = std::env::var("ENCRYPT_KEY_STORE_LOCATION") {
        let encryptor = confgit_encryption::load_key_file(&PathBuf::from(&location))?;
        encryption.install(encryptor);
        tracing::info!("installed encryption key from {location}");
    }
    if let Ok(key) = std::env::var("ENCRYPT_KEY") {
        encryption.install_key(&key)?;
        tracing::info!("installed encryption key from the environment");
    }

    let state = AppState {
        repository: repository as Arc<dyn EnvironmentRepository>,
        encryption,
    };
    let api = api_rest::router(state);
    let app = match std::env::var("CONFGIT_PREFIX") {
        Ok(prefix) if !prefix.is_empty() => {
            let prefix = if prefix.starts_with('/') {
                prefix
            } else {
                format!("/{prefix}")
            };
            axum::Router::new().nest(&prefix, api)
        }
        _ => api,
    };

    let addr = std::env::var("CONFGIT_ADDR").unwrap_or_else(|_| "0.0.0.0:8888".into());
    tracing::info!("-- starting confgit on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn git_settings_from_env() -> anyhow::Result<GitSettings> {
    let uri = std::env::var("CONFGIT_GIT_URI")
        .map_err(|_| anyhow::anyhow!("CONFGIT_GIT_URI must point at the configuration repository"))?;
    let basedir = std::env::var("CONFGIT_GIT_BASEDIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("confgit-repo"));

    let mut settings = GitSettings::new(uri, basedir)?;

    if let Ok(label) = std::env::var("CONFGIT_GIT_DEFAULT_LABEL") {
        settings = settings.with_default_label(label);
    }
    settings = settings
        .with_try_master_branch(env_bool("CONFGIT_GIT_TRY_MASTER_BRANCH", true)?)
        .with_clone_on_start(env_bool("CONFGIT_GIT_CLONE_ON_START", false)?)
        .with_force_pull(env_bool("CONFGIT_GIT_FORCE_PULL", false)?)
        .with_delete_untracked_branches(env_bool("CONFGIT_GIT_DELETE_UNTRACKED_BRANCHES", false)?)
        .with_skip_ssl_validation(env_bool("CONFGIT_GIT_SKIP_SSL_VALIDATION", false)?)
        .with_clone_submodules(env_bool("CONFGIT_GIT_CLONE_SUBMODULES", false)?)
        .with_username(std::env::var("CONFGIT_GIT_USERNAME").ok())
        .with_password(std::env::var("CONFGIT_GIT_PASSWORD").ok())
        .with_passphrase(std::env::var("CONFGIT_GIT_PASSPHRASE").ok());

    if let Ok(timeout) = std::env::var("CONFGIT_GIT_TIMEOUT") {
        let seconds: u64 = timeout
            .parse()
            .map_err(|_| anyhow::anyhow!("CONFGIT_GIT_TIMEOUT must be a number of seconds"))?;
        settings = settings.with_timeout(Duration::from_secs(seconds));
    }
    if let Ok(rate) = std::env::var("CONFGIT_GIT_REFRESH_RATE") {
        let seconds: i64 = rate
            .parse()
            .map_err(|_| anyhow::anyhow!("CONFGIT_GIT_REFRESH_RATE must be a number of seconds"))?;
        settings = settings.with_refresh_rate(seconds);
    }
    if let Ok(paths) = std::env::var("CONFGIT_GIT_SEARCH_PATHS") {
        let paths: Vec<String> = paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect();
        settings = settings.with_search_paths(paths);
    }

    Ok(settings)
}

fn env_bool(name: &str, default: bool) -> anyhow::Result<bool> {
    match std::env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => anyhow::bail!("{name} must be a boolean, got {other:?}"),
        },
        Err(_) => Ok(default),
    }
}
