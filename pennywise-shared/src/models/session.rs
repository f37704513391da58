/// Session state and its transition function
///
/// The session is modelled as an explicit phase instead of a bag of optional
/// fields, so that the combinations the client must never observe cannot be
/// constructed:
///
/// - a token without a user (or a user without a token)
/// - a locked session whose user has no PIN
///
/// ```text
/// SessionPhase
///   ├─> Unauthenticated
///   └─> Authenticated(AuthenticatedSession { token, user, locked })
///                                             locked ⇒ user.pin_hash.is_some()
/// ```
///
/// Users entering a session are [redacted](User::redacted): only the fact
/// that a PIN exists is kept, never its value.
///
/// Every mutation goes through [`SessionState::apply`], which takes a
/// [`SessionAction`] and reports whether anything changed. The session store
/// feeds this directly into a `watch` channel.
///
/// # Example
///
/// ```
/// use pennywise_shared::models::session::{AuthenticatedSession, SessionAction, SessionState};
/// use pennywise_shared::models::user::User;
///
/// let user = User {
///     id: "u1".into(),
///     name: "Ada".into(),
///     email: "ada@example.com".into(),
///     pin_hash: Some("1234".into()),
///     is_pro: false,
/// };
///
/// let mut state = SessionState::default();
/// state.apply(SessionAction::Established(AuthenticatedSession::new("tok".into(), user)));
/// state.apply(SessionAction::LoadingFinished);
///
/// assert!(state.is_authenticated());
/// assert!(state.is_locked());
/// ```

use super::user::User;

/// An authenticated session
///
/// Fields are private so the lock invariant is enforced by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    token: String,
    user: User,
    locked: bool,
}

impl AuthenticatedSession {
    /// Creates a session for a user loaded by login or bootstrap
    ///
    /// The session starts locked iff the user has a PIN.
    pub fn new(token: String, user: User) -> Self {
        let user = user.redacted();
        let locked = user.has_pin();
        AuthenticatedSession { token, user, locked }
    }

    /// Creates a session for a freshly registered account
    ///
    /// New accounts never start locked.
    pub fn fresh(token: String, user: User) -> Self {
        AuthenticatedSession {
            token,
            user: user.redacted(),
            locked: false,
        }
    }

    /// Bearer token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Current user snapshot
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Whether the PIN lock is engaged
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn lock(&mut self) -> bool {
        if !self.user.has_pin() || self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    fn unlock(&mut self) -> bool {
        std::mem::replace(&mut self.locked, false)
    }

    fn replace_user(&mut self, user: User) -> bool {
        let user = user.redacted();
        let locked = self.locked && user.has_pin();
        if self.user == user && self.locked == locked {
            return false;
        }
        self.user = user;
        self.locked = locked;
        true
    }
}

/// Phase of the client session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// No credentials
    #[default]
    Unauthenticated,

    /// Signed in, possibly behind the PIN lock
    Authenticated(AuthenticatedSession),
}

impl SessionPhase {
    /// Authenticated session, if any
    pub fn session(&self) -> Option<&AuthenticatedSession> {
        match self {
            SessionPhase::Unauthenticated => None,
            SessionPhase::Authenticated(session) => Some(session),
        }
    }
}

/// Transitions accepted by [`SessionState::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// A new identity was loaded (bootstrap, login, registration)
    Established(AuthenticatedSession),

    /// All credentials were dropped (logout, invalidation)
    Cleared,

    /// Bootstrap finished, whatever its outcome
    LoadingFinished,

    /// Engage the PIN lock (no-op without a PIN)
    Locked,

    /// Release the PIN lock
    Unlocked,

    /// A PIN was configured on the server
    PinSet,

    /// The Pro entitlement was confirmed
    ProGranted,

    /// The identity endpoint returned a newer snapshot of the same account
    UserRefreshed(User),
}

/// Complete client-side session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// True until bootstrap completes; session fields must not be read before
    pub loading: bool,

    /// Current phase
    pub phase: SessionPhase,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            loading: true,
            phase: SessionPhase::Unauthenticated,
        }
    }
}

impl SessionState {
    /// Applies a transition, returning true if the state changed
    pub fn apply(&mut self, action: SessionAction) -> bool {
        match action {
            SessionAction::Established(session) => {
                let next = SessionPhase::Authenticated(session);
                if self.phase == next {
                    return false;
                }
                self.phase = next;
                true
            }
            SessionAction::Cleared => {
                if self.phase == SessionPhase::Unauthenticated {
                    return false;
                }
                self.phase = SessionPhase::Unauthenticated;
                true
            }
            SessionAction::LoadingFinished => std::mem::replace(&mut self.loading, false),
            SessionAction::Locked => self.with_session(AuthenticatedSession::lock),
            SessionAction::Unlocked => self.with_session(AuthenticatedSession::unlock),
            SessionAction::PinSet => self.with_session(|session| session.user.mark_pin()),
            SessionAction::ProGranted => self.with_session(|session| session.user.grant_pro()),
            SessionAction::UserRefreshed(user) => {
                self.with_session(|session| session.replace_user(user))
            }
        }
    }

    fn with_session(&mut self, f: impl FnOnce(&mut AuthenticatedSession) -> bool) -> bool {
        match &mut self.phase {
            SessionPhase::Authenticated(session) => f(session),
            SessionPhase::Unauthenticated => false,
        }
    }

    /// Authenticated session, if any
    pub fn session(&self) -> Option<&AuthenticatedSession> {
        self.phase.session()
    }

    /// Current user, if signed in
    pub fn user(&self) -> Option<&User> {
        self.session().map(AuthenticatedSession::user)
    }

    /// Bearer token, if signed in
    pub fn token(&self) -> Option<&str> {
        self.session().map(AuthenticatedSession::token)
    }

    /// True when a token is held
    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    /// True when the PIN lock is engaged
    pub fn is_locked(&self) -> bool {
        self.session().is_some_and(AuthenticatedSession::is_locked)
    }
}
