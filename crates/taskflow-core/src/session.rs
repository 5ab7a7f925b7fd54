use tracing::{debug, info};

use crate::error::UserError;
use crate::kvstore::{SESSION_KEY, Storage};
use crate::validation::is_valid_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn { name: String },
}

#[derive(Debug)]
pub struct Session {
    storage: Storage,
    state: SessionState,
}

impl Session {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            state: SessionState::LoggedOut,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn name(&self) -> Option<&str> {
        match &self.state {
            SessionState::LoggedIn { name } => Some(name),
            SessionState::LoggedOut => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.state, SessionState::LoggedIn { .. })
    }

    /// Picks up a name persisted by an earlier run. Returns whether the
    /// session is now logged in.
    #[tracing::instrument(skip(self))]
    pub fn restore(&mut self) -> bool {
        match self.storage.get_session() {
            Some(name) if !name.is_empty() => {
                info!(name = %name, "restored persisted session");
                self.state = SessionState::LoggedIn { name };
                true
            }
            _ => {
                debug!("no persisted session");
                false
            }
        }
    }

    #[tracing::instrument(skip(self, name))]
    pub fn login(&mut self, name: &str) -> Result<(), UserError> {
        let name = name.trim();
        if !is_valid_name(name) {
            debug!(len = name.chars().count(), "rejected login name");
            return Err(UserError::InvalidName);
        }

        self.storage.set_session(name);
        self.state = SessionState::LoggedIn {
            name: name.to_string(),
        };
        info!(name = %name, "logged in");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn logout(&mut self) {
        self.storage.remove(SESSION_KEY);
        self.state = SessionState::LoggedOut;
        info!("logged out");
    }
}
