//! Identity of the signed-in viewer.
//!
//! The session is explicit context handed to whoever needs it. State only
//! changes through [`SessionHandle::dispatch`], which runs the pure
//! [`reduce`] function, persists the result and notifies listeners.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::UserSummary;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub user: Option<UserSummary>,
    pub logged_in: bool,
    pub access_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Replace everything with a persisted snapshot.
    Hydrate(Session),
    SetUserDetails(Option<UserSummary>),
    SetLoggedIn(bool),
    SetToken(Option<String>),
    /// The backend stopped accepting our credentials. User details are kept
    /// so a sign-in prompt can still greet them.
    Expire,
    Clear,
}

pub fn reduce(state: &Session, action: SessionAction) -> Session {
    match action {
        SessionAction::Hydrate(session) => session,
        SessionAction::SetUserDetails(user) => Session { user, ..state.clone() },
        SessionAction::SetLoggedIn(logged_in) => Session { logged_in, ..state.clone() },
        SessionAction::SetToken(access_token) => Session { access_token, ..state.clone() },
        SessionAction::Expire => Session { user: state.user.clone(), logged_in: false, access_token: None },
        SessionAction::Clear => Session::default(),
    }
}

/// JSON file holding the last session snapshot.
#[derive(Clone, Debug)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>, SessionError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(session)?)?;
        Ok(())
    }

    pub fn remove(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

type Listener = Box<dyn Fn(&Session) + Send + Sync>;

struct Inner {
    state: Mutex<Session>,
    store: Option<SessionStore>,
    listeners: Mutex<Vec<Listener>>,
}

#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("state", &self.current()).field("store", &self.inner.store).finish()
    }
}

impl SessionHandle {
    /// An in-memory session that is never persisted.
    pub fn ephemeral() -> Self {
        Self::with_store(None)
    }

    /// Opens a persisted session, hydrating from the store when it exists.
    pub fn open(store: SessionStore) -> Result<Self, SessionError> {
        let persisted = store.load()?;
        let handle = Self::with_store(Some(store));
        if let Some(session) = persisted {
            debug!("hydrating session (logged in: {})", session.logged_in);
            *handle.inner.state.lock().unwrap_or_else(PoisonError::into_inner) = session;
        }
        Ok(handle)
    }

    fn with_store(store: Option<SessionStore>) -> Self {
        Self { inner: Arc::new(Inner { state: Mutex::new(Session::default()), store, listeners: Mutex::new(Vec::new()) }) }
    }

    pub fn current(&self) -> Session {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn user(&self) -> Option<UserSummary> {
        self.current().user
    }

    pub fn is_logged_in(&self) -> bool {
        self.current().logged_in
    }

    /// Calls `listener` with the current state now and after every dispatch.
    pub fn subscribe(&self, listener: impl Fn(&Session) + Send + Sync + 'static) {
        listener(&self.current());
        self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner).push(Box::new(listener));
    }

    /// The single write path. In-memory state is updated even when
    /// persisting it fails; the error is still returned.
    pub fn dispatch(&self, action: SessionAction) -> Result<Session, SessionError> {
        let clearing = action == SessionAction::Clear;
        let next = {
            let mut state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
            *state = reduce(&state, action);
            state.clone()
        };
        for listener in self.inner.listeners.lock().unwrap_or_else(PoisonError::into_inner).iter() {
            listener(&next);
        }
        if let Some(store) = &self.inner.store {
            if clearing {
                store.remove()?;
                info!("session cleared");
            } else {
                store.save(&next)?;
            }
        }
        Ok(next)
    }
}
