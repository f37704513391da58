/// Authentication primitives shared by the client crates
///
/// # Modules
///
/// - [`gate`]: Route gating decisions over session state
/// - [`entitlement`]: Pro capability checks
/// - [`credentials`]: Identity request payloads and their validation
///
/// # Example
///
/// ```
/// use pennywise_shared::auth::entitlement::Entitlement;
/// use pennywise_shared::auth::gate::GateDecision;
/// use pennywise_shared::models::SessionState;
///
/// let state = SessionState::default();
/// assert_eq!(state.protected_gate(), GateDecision::Loading);
/// assert!(!Entitlement::from_state(&state).is_pro);
/// ```

pub mod credentials;
pub mod entitlement;
pub mod gate;
