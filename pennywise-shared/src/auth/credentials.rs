/// Credential payloads and their client-side validation
///
/// These are the request bodies the session store sends to the identity
/// endpoints. They are validated before any network call so an obviously
/// malformed form never reaches the backend and never touches session state.
///
/// # Rules
///
/// - **email**: syntactically valid address
/// - **password**: non-empty on login, at least 6 characters on registration
/// - **name**: 1 to 100 characters
/// - **pin**: 4 to 6 ASCII digits
///
/// # Example
///
/// ```
/// use pennywise_shared::auth::credentials::{validate_request, LoginRequest};
///
/// let req = LoginRequest::new("not-an-email", "secret");
/// let errors = validate_request(&req).unwrap_err();
/// assert_eq!(errors[0].field, "email");
/// ```

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// `POST /auth/login` body
#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        LoginRequest {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

/// `POST /auth/register` body
#[derive(Debug, Clone, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

impl RegisterRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        RegisterRequest {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

/// `PUT /auth/pin` and `POST /auth/verify-pin` body
#[derive(Debug, Clone, Serialize, Validate)]
pub struct PinRequest {
    #[validate(custom(function = "validate_pin"))]
    pub pin: String,
}

impl PinRequest {
    pub fn new(pin: impl Into<String>) -> Self {
        PinRequest { pin: pin.into() }
    }
}

/// `POST /auth/forgot-password` query
#[derive(Debug, Clone, Serialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn new(email: impl Into<String>) -> Self {
        ForgotPasswordRequest {
            email: email.into().trim().to_string(),
        }
    }
}

fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    let valid_length = (4..=6).contains(&pin.len());
    if !valid_length || !pin.bytes().all(|b| b.is_ascii_digit()) {
        let mut err = ValidationError::new("pin_format");
        err.message = Some("PIN must be 4-6 digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a request, flattening failures into field details
///
/// Details are sorted by field name so the order is stable.
pub fn validate_request<T: Validate>(req: &T) -> Result<(), Vec<ValidationErrorDetail>> {
    req.validate().map_err(|e| {
        let mut errors: Vec<ValidationErrorDetail> = e
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        errors
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_login() {
        let req = LoginRequest::new(" ada@example.com ", "hunter2");
        assert_eq!(req.email, "ada@example.com");
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_login_requires_password() {
        let errors = validate_request(&LoginRequest::new("ada@example.com", "")).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "password");
        assert_eq!(errors[0].message, "Password is required");
    }

    #[test]
    fn test_register_collects_all_errors() {
        let errors = validate_request(&RegisterRequest::new("", "nope", "123")).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "name", "password"]);
    }

    #[test]
    fn test_valid_register() {
        let req = RegisterRequest::new("Ada", "ada@example.com", "correct horse");
        assert!(validate_request(&req).is_ok());
    }

    #[test]
    fn test_pin_rules() {
        for ok in ["1234", "12345", "123456"] {
            assert!(validate_request(&PinRequest::new(ok)).is_ok(), "{ok} should pass");
        }
        for bad in ["123", "1234567", "12a4", "", "١٢٣٤"] {
            let errors = validate_request(&PinRequest::new(bad)).unwrap_err();
            assert_eq!(errors[0].message, "PIN must be 4-6 digits", "{bad} should fail");
        }
    }

    #[test]
    fn test_forgot_password_email() {
        assert!(validate_request(&ForgotPasswordRequest::new(" ada@example.com")).is_ok());
        let errors = validate_request(&ForgotPasswordRequest::new("ada")).unwrap_err();
        assert_eq!(errors[0].field, "email");
    }

    #[test]
    fn test_request_serialization() {
        let json = serde_json::to_value(PinRequest::new("1234")).unwrap();
        assert_eq!(json, serde_json::json!({ "pin": "1234" }));

        let json = serde_json::to_value(RegisterRequest::new("Ada", "a@b.co", "secret1")).unwrap();
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["email"], "a@b.co");
    }
}
