/// Entitlement checks for Pro-only features
///
/// This module derives the user's capability tier from the session and
/// provides the checks that feature screens run before calling a Pro-only
/// backend operation or rendering its controls.
///
/// # Capabilities
///
/// | Capability | Backend operation | Tier |
/// |------------|-------------------|------|
/// | `AiInsights` | `POST /ai/insights` | Pro |
/// | `AutoCategorize` | `POST /ai/categorize` | Pro |
/// | `PdfReport` | `GET /ai/report/pdf` | Pro |
/// | `CsvExport` | `GET /export/csv` | Free |
///
/// The check is advisory: the backend enforces the tier independently.
///
/// # Example
///
/// ```
/// use pennywise_shared::auth::entitlement::{Capability, Entitlement};
/// use pennywise_shared::models::SessionState;
///
/// let state = SessionState::default();
/// let entitlement = Entitlement::from_state(&state);
///
/// assert!(!entitlement.is_pro);
/// assert!(entitlement.require(Capability::CsvExport).is_ok());
/// assert!(entitlement.require(Capability::AiInsights).is_err());
/// ```

use crate::models::SessionState;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Entitlement errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementError {
    /// The capability requires the Pro tier
    #[error("Pro subscription required for {0}")]
    ProRequired(Capability),
}

/// Features whose availability depends on the tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// AI spending insights
    AiInsights,

    /// AI transaction categorization
    AutoCategorize,

    /// PDF monthly report
    PdfReport,

    /// CSV export of transactions
    CsvExport,
}

impl Capability {
    /// Returns true if the capability needs the Pro tier
    pub fn requires_pro(&self) -> bool {
        match self {
            Capability::AiInsights | Capability::AutoCategorize | Capability::PdfReport => true,
            Capability::CsvExport => false,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::AiInsights => write!(f, "ai_insights"),
            Capability::AutoCategorize => write!(f, "auto_categorize"),
            Capability::PdfReport => write!(f, "pdf_report"),
            Capability::CsvExport => write!(f, "csv_export"),
        }
    }
}

/// Read-only entitlement view of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Entitlement {
    /// True when a token is held
    pub is_authenticated: bool,

    /// True when the signed-in user holds Pro
    pub is_pro: bool,
}

impl Entitlement {
    /// Derives the entitlement from session state
    pub fn from_state(state: &SessionState) -> Self {
        Entitlement {
            is_authenticated: state.is_authenticated(),
            is_pro: state.user().is_some_and(|user| user.is_pro),
        }
    }

    /// Returns true if the capability is available
    pub fn allows(&self, capability: Capability) -> bool {
        !capability.requires_pro() || self.is_pro
    }

    /// Checks a capability before invoking it
    ///
    /// # Errors
    ///
    /// Returns `EntitlementError::ProRequired` if the capability is Pro-only
    /// and the user is on the free tier.
    pub fn require(&self, capability: Capability) -> Result<(), EntitlementError> {
        if !self.allows(capability) {
            return Err(EntitlementError::ProRequired(capability));
        }

        Ok(())
    }
}
