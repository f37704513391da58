/// Payment return routing
///
/// After checkout the provider sends the browser back to
/// `/payment/success?session_id=...`. This module decides what that page
/// does: start reconciliation for the carried session id, or leave for the
/// settings page when there is nothing to reconcile.
///
/// # Example
///
/// ```
/// use pennywise_payments::return_route::{parse_return, PaymentReturn};
/// use pennywise_shared::auth::gate::Route;
///
/// assert_eq!(
///     parse_return("https://app.example/payment/success?session_id=cs_123"),
///     PaymentReturn::Reconcile { session_id: "cs_123".to_string() },
/// );
/// assert_eq!(parse_return("/payment/success"), PaymentReturn::Redirect(Route::Settings));
/// ```

use pennywise_shared::auth::gate::Route;
use reqwest::Url;

/// Query parameter carrying the checkout session id
pub const SESSION_ID_PARAM: &str = "session_id";

/// Base used to resolve path-only return URLs
const RELATIVE_BASE: &str = "http://localhost/";

/// What the payment return page should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentReturn {
    /// Reconcile the given checkout session
    Reconcile { session_id: String },

    /// Nothing to reconcile; navigate away
    Redirect(Route),
}

/// Interprets a payment return URL
///
/// Accepts absolute URLs and path-only references. A missing, empty or
/// unparseable `session_id` redirects to settings.
pub fn parse_return(url: &str) -> PaymentReturn {
    let parsed = Url::parse(url).or_else(|_| Url::parse(RELATIVE_BASE).and_then(|b| b.join(url)));

    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::debug!(error = %e, "Unparseable payment return URL");
            return PaymentReturn::Redirect(Route::Settings);
        }
    };

    let session_id = parsed
        .query_pairs()
        .find(|(key, _)| key == SESSION_ID_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty());

    match session_id {
        Some(session_id) => PaymentReturn::Reconcile { session_id },
        None => PaymentReturn::Redirect(Route::Settings),
    }
}
