//! Session state supplied by the identity provider, and the single guard
//! every protected surface goes through.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const SESSION_FILE: &str = "session.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub authenticated: bool,
    pub user: Option<User>,
}

impl Session {
    pub fn signed_in(user: User) -> Self {
        Self {
            authenticated: true,
            user: Some(user),
        }
    }
}

/// Session persisted between invocations under the state directory.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(SESSION_FILE),
        }
    }

    pub fn load(&self) -> AppResult<Session> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Session::default()),
            Err(err) => return Err(err.into()),
        };
        toml::from_str(&raw)
            .map_err(|err| AppError::Config(format!("{}: {err}", self.path.display())))
    }

    pub fn save(&self, session: &Session) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(session)
            .map_err(|err| AppError::Config(format!("failed to encode session: {err}")))?;
        fs::write(&self.path, raw)?;
        tracing::info!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    pub fn clear(&self) -> AppResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// What every controller receives at construction instead of reaching for
/// ambient session state. Only [`AuthGuard::admit`] builds one.
#[derive(Debug, Clone)]
pub struct Context {
    user: User,
    today: NaiveDate,
    page_size: usize,
}

impl Context {
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

pub struct AuthGuard;

impl AuthGuard {
    /// Blocks everything behind it until the session is authenticated.
    pub fn admit(session: &Session, today: NaiveDate, page_size: usize) -> AppResult<Context> {
        match (session.authenticated, &session.user) {
            (true, Some(user)) => {
                tracing::debug!(user_id = %user.id, "Session admitted");
                Ok(Context {
                    user: user.clone(),
                    today,
                    page_size,
                })
            }
            _ => {
                tracing::info!("No authenticated session, redirecting to login");
                Err(AppError::AuthRequired)
            }
        }
    }
}
