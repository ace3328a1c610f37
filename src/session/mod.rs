pub mod role;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::bearer_value;
use crate::error::{ClientError, ClientResult};
use crate::storage::{Storage, TOKEN_KEY, USER_KEY};

pub use role::{DistrictReach, Role, RolePermissions};

/// Authenticated user profile as returned by the login exchange.
///
/// Only `role` is required; every other profile field is kept as sent so the
/// persisted record round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub role: String,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl User {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            profile: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.profile.insert(key.into(), value.into());
        self
    }

    pub fn parse(raw: &str) -> ClientResult<Self> {
        serde_json::from_str(raw).map_err(|e| ClientError::malformed(USER_KEY, e.to_string()))
    }

    fn profile_str(&self, key: &str) -> Option<&str> {
        self.profile.get(key).and_then(Value::as_str)
    }

    pub fn email(&self) -> Option<&str> {
        self.profile_str("email")
    }

    pub fn full_name(&self) -> Option<&str> {
        self.profile_str("full_name")
    }

    pub fn district_code(&self) -> Option<&str> {
        self.profile_str("district_code")
    }

    pub fn known_role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    /// Permissions implied by the role; unknown roles get none
    pub fn permissions(&self) -> Option<RolePermissions> {
        self.known_role().map(|role| role.permissions())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// `restore_session` has not completed; guards must not be evaluated
    #[default]
    Pending,
    Ready,
}

/// Point-in-time view of the session, as read by the route gate
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub user: Option<User>,
}

impl SessionSnapshot {
    pub fn pending() -> Self {
        Self {
            phase: SessionPhase::Pending,
            user: None,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            phase: SessionPhase::Ready,
            user: None,
        }
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            phase: SessionPhase::Ready,
            user: Some(user),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    default_headers: HeaderMap,
    phase: SessionPhase,
}

/// Owner of the authenticated identity and its persisted copies.
///
/// Clones share the same state; hand one to every component that needs to
/// read or end the session.
#[derive(Clone)]
pub struct SessionService {
    storage: Arc<dyn Storage>,
    state: Arc<RwLock<SessionState>>,
}

impl SessionService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Rebuild the session from persisted storage at process start.
    ///
    /// Never fails: unreadable or corrupt persisted data leaves the session
    /// logged out, and corrupt data is wiped so it cannot resurface.
    pub fn restore_session(&self) -> Option<User> {
        let restored = match self.load_persisted() {
            Ok(restored) => restored,
            Err(e @ ClientError::MalformedState { .. }) | Err(e @ ClientError::InvalidHeader(_)) => {
                tracing::warn!("Discarding persisted session: {}", e);
                self.remove_persisted();
                None
            }
            Err(e) => {
                tracing::warn!("Could not read persisted session: {}", e);
                None
            }
        };

        let mut state = self.write_state();
        state.phase = SessionPhase::Ready;
        match restored {
            Some((header, user)) => {
                tracing::debug!("Restored session for role '{}'", user.role);
                state.default_headers.insert(AUTHORIZATION, header);
                state.user = Some(user.clone());
                Some(user)
            }
            None => {
                state.default_headers.remove(AUTHORIZATION);
                state.user = None;
                None
            }
        }
    }

    fn load_persisted(&self) -> ClientResult<Option<(reqwest::header::HeaderValue, User)>> {
        let token = self.storage.get_item(TOKEN_KEY)?.filter(|t| !t.is_empty());
        let raw_user = self.storage.get_item(USER_KEY)?.filter(|u| !u.is_empty());

        let (Some(token), Some(raw_user)) = (token, raw_user) else {
            return Ok(None);
        };

        let user = User::parse(&raw_user)?;
        let header = bearer_value(&token)?;
        Ok(Some((header, user)))
    }

    /// Mark the session as authenticated.
    ///
    /// Persisting the credential is the job of whoever performed the
    /// authentication exchange; see [`SessionService::persist_credentials`].
    pub fn login(&self, user: User) {
        tracing::info!("Session established for role '{}'", user.role);
        let mut state = self.write_state();
        state.phase = SessionPhase::Ready;
        state.user = Some(user);
    }

    /// Write the credential and user record issued by the login exchange
    pub fn persist_credentials(&self, token: &str, user: &User) -> ClientResult<()> {
        // Validate before touching storage so a bad token is never persisted
        bearer_value(token)?;
        let raw_user = serde_json::to_string(user)?;
        self.storage.set_item(TOKEN_KEY, token)?;
        self.storage.set_item(USER_KEY, &raw_user)?;
        Ok(())
    }

    /// End the session. Safe to call repeatedly.
    pub fn logout(&self) {
        self.remove_persisted();
        let mut state = self.write_state();
        state.default_headers.remove(AUTHORIZATION);
        if state.user.take().is_some() {
            tracing::info!("Session ended");
        }
    }

    /// React to the backend rejecting the credential (HTTP 401)
    pub fn expire(&self) {
        tracing::warn!("Backend rejected the session credential; logging out");
        self.logout();
    }

    fn remove_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove_item(key) {
                tracing::warn!("Failed to remove persisted '{}': {}", key, e);
            }
        }
    }

    pub fn user(&self) -> Option<User> {
        self.read_state().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_state().user.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.read_state().phase == SessionPhase::Ready
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.read_state();
        SessionSnapshot {
            phase: state.phase,
            user: state.user.clone(),
        }
    }

    /// Headers every outgoing request starts from
    pub fn default_headers(&self) -> HeaderMap {
        self.read_state().default_headers.clone()
    }

    /// Persisted credential, read fresh from storage
    pub fn credential(&self) -> Option<String> {
        match self.storage.get_item(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Could not read persisted credential: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("SessionService")
            .field("phase", &state.phase)
            .field("user", &state.user)
            .finish()
    }
}
