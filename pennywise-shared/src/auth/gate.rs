/// Route gating
///
/// Pure decision functions that select what a route renders from the current
/// session flags. They are cheap and hold no state, so callers re-evaluate on
/// every change to `loading`, the token or the lock flag instead of caching a
/// decision.
///
/// # Protected Routes
///
/// ```text
/// loading            → Loading          (spinner, decide nothing else)
/// no token           → RedirectToLogin
/// token, locked      → ShowLockScreen   (blocks all other content)
/// token, unlocked    → ShowContent
/// ```
///
/// # Public Routes (login, registration)
///
/// ```text
/// loading            → Loading
/// token              → RedirectToApp
/// no token           → ShowContent
/// ```
///
/// # Example
///
/// ```
/// use pennywise_shared::auth::gate::{protected_route, GateDecision, Route};
///
/// let decision = protected_route(false, false, false);
/// assert_eq!(decision, GateDecision::RedirectToLogin);
/// assert_eq!(decision.redirect(), Some(Route::Login));
/// ```

use crate::models::SessionState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client routes the core can force navigation to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Login screen
    Login,

    /// Registration screen
    Register,

    /// Dashboard (application root)
    Dashboard,

    /// Settings, also the checkout entry point
    Settings,

    /// AI insights (the Pro feature landing page)
    Insights,

    /// Payment return page
    PaymentSuccess,
}

impl Route {
    /// Path of the route in the client router
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/",
            Route::Settings => "/settings",
            Route::Insights => "/insights",
            Route::PaymentSuccess => "/payment/success",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// What a gated route renders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Session still bootstrapping
    Loading,

    /// Not signed in; go to the login screen
    RedirectToLogin,

    /// Signed in but PIN-locked; render only the lock screen
    ShowLockScreen,

    /// Render the requested content
    ShowContent,

    /// Already signed in; leave the public screen
    RedirectToApp,
}

impl GateDecision {
    /// Forced navigation implied by the decision, if any
    pub fn redirect(&self) -> Option<Route> {
        match self {
            GateDecision::RedirectToLogin => Some(Route::Login),
            GateDecision::RedirectToApp => Some(Route::Dashboard),
            GateDecision::Loading | GateDecision::ShowLockScreen | GateDecision::ShowContent => {
                None
            }
        }
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Loading => write!(f, "loading"),
            GateDecision::RedirectToLogin => write!(f, "redirect to {}", Route::Login),
            GateDecision::ShowLockScreen => write!(f, "locked"),
            GateDecision::ShowContent => write!(f, "authenticated"),
            GateDecision::RedirectToApp => write!(f, "redirect to {}", Route::Dashboard),
        }
    }
}

/// Gate for routes that require a signed-in, unlocked session
pub fn protected_route(loading: bool, token_present: bool, locked: bool) -> GateDecision {
    if loading {
        return GateDecision::Loading;
    }

    if !token_present {
        return GateDecision::RedirectToLogin;
    }

    if locked {
        return GateDecision::ShowLockScreen;
    }

    GateDecision::ShowContent
}

/// Gate for login and registration screens
pub fn public_route(loading: bool, token_present: bool) -> GateDecision {
    if loading {
        return GateDecision::Loading;
    }

    if token_present {
        return GateDecision::RedirectToApp;
    }

    GateDecision::ShowContent
}

impl SessionState {
    /// Evaluates the protected-route gate for this state
    pub fn protected_gate(&self) -> GateDecision {
        protected_route(self.loading, self.is_authenticated(), self.is_locked())
    }

    /// Evaluates the public-route gate for this state
    pub fn public_gate(&self) -> GateDecision {
        public_route(self.loading, self.is_authenticated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_wins_over_everything() {
        for token in [false, true] {
            for locked in [false, true] {
                assert_eq!(protected_route(true, token, locked), GateDecision::Loading);
            }
            assert_eq!(public_route(true, token), GateDecision::Loading);
        }
    }

    #[test]
    fn test_protected_route_decisions() {
        assert_eq!(protected_route(false, false, false), GateDecision::RedirectToLogin);
        assert_eq!(protected_route(false, true, true), GateDecision::ShowLockScreen);
        assert_eq!(protected_route(false, true, false), GateDecision::ShowContent);
    }

    #[test]
    fn test_public_route_inverts_auth_branch() {
        assert_eq!(public_route(false, true), GateDecision::RedirectToApp);
        assert_eq!(public_route(false, false), GateDecision::ShowContent);
    }

    #[test]
    fn test_redirect_targets() {
        assert_eq!(GateDecision::RedirectToLogin.redirect(), Some(Route::Login));
        assert_eq!(GateDecision::RedirectToApp.redirect(), Some(Route::Dashboard));
        assert_eq!(GateDecision::ShowLockScreen.redirect(), None);
    }

    #[test]
    fn test_state_gates() {
        let state = SessionState::default();
        assert_eq!(state.protected_gate(), GateDecision::Loading);

        let ready = SessionState {
            loading: false,
            ..SessionState::default()
        };
        assert_eq!(ready.protected_gate(), GateDecision::RedirectToLogin);
        assert_eq!(ready.public_gate(), GateDecision::ShowContent);
    }

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::PaymentSuccess.path(), "/payment/success");
        assert_eq!(Route::Settings.to_string(), "/settings");
    }
}
