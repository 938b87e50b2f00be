use crate::backend::HttpAuthBackend;
use crate::session::{
    Collaborators, FileTokenStore, SessionOrchestrator, SessionSettings, SessionSignals,
    SessionStore,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub token_file: PathBuf,
    pub check_interval: Duration,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            token_file: PathBuf::from(crate::cli::commands::DEFAULT_TOKEN_FILE),
            check_interval: crate::session::DEFAULT_EXPIRY_CHECK_INTERVAL,
        }
    }

    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            expiry_check_interval: self.check_interval,
            ..SessionSettings::default()
        }
    }

    /// Wire an orchestrator against the HTTP backend and the token file.
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid.
    pub fn orchestrator(&self) -> Result<SessionOrchestrator> {
        let backend = HttpAuthBackend::new(&self.api_url)
            .with_context(|| format!("invalid API URL: {}", self.api_url))?;
        let tokens = FileTokenStore::new(&self.token_file);

        Ok(SessionOrchestrator::new(
            Arc::new(SessionStore::new()),
            SessionSignals::new(),
            Collaborators::new(Arc::new(backend), Arc::new(tokens)),
            self.settings(),
        ))
    }
}
