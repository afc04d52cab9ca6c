use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use missive_common::{Session, internal, logging, tracing};
use missive_delivery::{DeliveryConfig, MailSender, SmtpTransport};
use missive_store::StoreConfig;
use serde::Deserialize;

const CONFIG_ENV: &str = "MISSIVE_CONFIG";

/// Top-level configuration, read from RON
///
/// ```ron
/// (
///     store: (type: "File", path: "/var/spool/missive"),
///     delivery: (send_queue_capacity: 100, enqueue_timeout_ms: 2000),
///     session: (host: "smtp.example.org", port: 587, tls: StartTls),
/// )
/// ```
///
/// Every section may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MissiveConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Session used for batches that do not bring their own
    #[serde(default)]
    pub session: Session,
}

#[derive(Debug, Default)]
pub struct Missive {
    config: MissiveConfig,
}

impl Missive {
    #[must_use]
    pub const fn new(config: MissiveConfig) -> Self {
        Self { config }
    }

    /// Parse a RON configuration. Optional values may be written without
    /// `Some(..)`.
    ///
    /// # Errors
    ///
    /// The text is not a valid configuration.
    pub fn from_ron_str(config: &str) -> anyhow::Result<Self> {
        let config = ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .from_str(config)?;

        Ok(Self::new(config))
    }

    /// # Errors
    ///
    /// The file cannot be read or is not a valid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::from_ron_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))
    }

    #[must_use]
    pub const fn config(&self) -> &MissiveConfig {
        &self.config
    }

    /// Build the configured store and start the workers.
    ///
    /// This is how an application embeds the pipeline: submit batches to the
    /// returned sender, using the configured default session unless a batch
    /// needs its own. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// The content store cannot be initialised.
    pub fn start(self) -> anyhow::Result<(MailSender, Arc<Session>)> {
        logging::init();

        let MissiveConfig {
            store,
            delivery,
            session,
        } = self.config;

        if let Some(path) = store.path() {
            internal!(level = INFO, "Storing messages in {}", path.display());
        }
        let store = store
            .into_content_store()
            .context("Failed to initialise the content store")?;

        internal!(level = INFO, "Delivering through {}", session.address());
        let sender = MailSender::start(delivery, store, Arc::new(SmtpTransport::new()));

        Ok((sender, Arc::new(session)))
    }

    /// Start the pipeline and keep it up until SIGINT or SIGTERM, then stop
    /// the workers.
    ///
    /// Nothing submits batches here; the sender has no inbound interface. This
    /// only checks that the configuration and store come up and hosts idle
    /// workers. Use [`start`](Self::start) to feed the pipeline.
    ///
    /// # Errors
    ///
    /// Startup failed, or the signal handlers could not be installed.
    pub async fn run(self) -> anyhow::Result<()> {
        let (sender, _) = self.start()?;

        internal!("Controller running");
        let ret = shutdown_signal().await;

        internal!("Shutting down...");
        sender.shutdown().await;

        ret
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            r?;
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    Ok(())
}

/// Find the configuration file using the following precedence:
/// 1. `MISSIVE_CONFIG` environment variable
/// 2. ./missive.config.ron (current working directory)
/// 3. /etc/missive/missive.config.ron (system-wide config)
///
/// # Errors
///
/// `MISSIVE_CONFIG` names a missing file, or none of the defaults exist.
pub fn find_config_file() -> anyhow::Result<PathBuf> {
    locate_config(
        std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        &[
            PathBuf::from("./missive.config.ron"),
            PathBuf::from("/etc/missive/missive.config.ron"),
        ],
    )
}

fn locate_config(explicit: Option<PathBuf>, defaults: &[PathBuf]) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "{CONFIG_ENV} points to non-existent file: {}",
            path.display()
        );
    }

    if let Some(path) = defaults.iter().find(|path| path.exists()) {
        tracing::debug!("Using config file {}", path.display());
        return Ok(path.clone());
    }

    let paths_tried = defaults
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - {CONFIG_ENV} environment variable\n{paths_tried}"
    )
}
