/// Client data model
///
/// # Models
///
/// - `user`: Signed-in user identity record
/// - `session`: Session phases, state container and transitions

pub mod session;
pub mod user;

pub use session::{AuthenticatedSession, SessionAction, SessionPhase, SessionState};
pub use user::{User, PIN_MARKER};
