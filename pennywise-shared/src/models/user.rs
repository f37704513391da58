/// User identity record
///
/// This module provides the `User` snapshot the client holds for the signed-in
/// account. The record is owned by the session store: it is replaced wholesale
/// on login, registration and refresh, and patched in place only for a PIN
/// change or a Pro upgrade.
///
/// # Wire Format
///
/// ```json
/// {
///   "id": "3f1c...",
///   "email": "ada@example.com",
///   "name": "Ada",
///   "is_pro": false,
///   "pin": null
/// }
/// ```
///
/// The backend calls the PIN field `pin` and may send the PIN itself. The
/// client only ever looks at its presence: a user with a PIN on file starts
/// every session locked. [`User::redacted`] replaces the value with
/// [`PIN_MARKER`] before a user is held or persisted.
///
/// # Example
///
/// ```
/// use pennywise_shared::models::user::User;
///
/// let user: User = serde_json::from_str(
///     r#"{"id":"u1","email":"ada@example.com","name":"Ada"}"#,
/// ).unwrap();
///
/// assert!(!user.is_pro);
/// assert!(!user.has_pin());
/// ```

use serde::{Deserialize, Serialize};

/// Value held in place of any PIN reported by the backend
pub const PIN_MARKER: &str = "set";

/// Signed-in user as reported by the identity endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque, server-assigned identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Email address used as the login identifier
    pub email: String,

    /// PIN marker
    ///
    /// Presence (not value) drives lock gating on the client.
    #[serde(rename = "pin", default, skip_serializing_if = "Option::is_none")]
    pub pin_hash: Option<String>,

    /// Whether the account holds the Pro entitlement
    #[serde(default)]
    pub is_pro: bool,
}

impl User {
    /// Returns true if the account has a PIN configured
    pub fn has_pin(&self) -> bool {
        self.pin_hash.is_some()
    }

    /// Records that a PIN is configured
    ///
    /// Returns `false` if the marker was already set.
    pub fn mark_pin(&mut self) -> bool {
        if self.pin_hash.as_deref() == Some(PIN_MARKER) {
            return false;
        }
        self.pin_hash = Some(PIN_MARKER.to_string());
        true
    }

    /// Drops the PIN value, keeping only whether one is set
    pub fn redacted(mut self) -> Self {
        if self.pin_hash.is_some() {
            self.pin_hash = Some(PIN_MARKER.to_string());
        }
        self
    }

    /// Marks the account as Pro
    ///
    /// Returns `false` if it already was.
    pub fn grant_pro(&mut self) -> bool {
        if self.is_pro {
            return false;
        }
        self.is_pro = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "user-1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            pin_hash: None,
            is_pro: false,
        }
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"id":"user-1","email":"ada@example.com","name":"Ada"}"#;
        let user: User = serde_json::from_str(json).unwrap();

        assert_eq!(user, sample_user());
    }

    #[test]
    fn test_pin_field_uses_backend_name() {
        let json = r#"{"id":"user-1","email":"a@b.co","name":"A","is_pro":true,"pin":"1234"}"#;
        let user: User = serde_json::from_str(json).unwrap();

        assert!(user.has_pin());
        assert!(user.is_pro);

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["pin"], "1234");
        assert!(back.get("pin_hash").is_none());
    }

    #[test]
    fn test_null_pin_is_absent() {
        let json = r#"{"id":"user-1","email":"a@b.co","name":"A","pin":null}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(!user.has_pin());
    }

    #[test]
    fn test_grant_pro_is_idempotent() {
        let mut user = sample_user();

        assert!(user.grant_pro());
        assert!(!user.grant_pro());
        assert!(user.is_pro);
    }

    #[test]
    fn test_mark_pin() {
        let mut user = sample_user();
        assert!(user.mark_pin());
        assert!(!user.mark_pin());
        assert_eq!(user.pin_hash.as_deref(), Some(PIN_MARKER));
    }

    #[test]
    fn test_redacted_drops_pin_value() {
        let json = r#"{"id":"user-1","email":"a@b.co","name":"A","pin":"4321"}"#;
        let user: User = serde_json::from_str(json).unwrap();

        let redacted = user.redacted();
        assert!(redacted.has_pin());
        assert_eq!(redacted.pin_hash.as_deref(), Some(PIN_MARKER));
        assert!(!serde_json::to_string(&redacted).unwrap().contains("4321"));

        assert_eq!(sample_user().redacted(), sample_user());
    }
}
