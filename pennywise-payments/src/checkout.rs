/// Checkout hand-off
///
/// Starts the provider checkout for the Pro subscription. The backend builds
/// the provider's return URL from the origin we send
/// (`{origin}/payment/success?session_id=...`), so the origin must be a bare
/// absolute `http(s)` URL without a trailing slash.
///
/// # Example
///
/// ```
/// use pennywise_payments::checkout::begin_checkout;
/// use pennywise_payments::mock::MockGateway;
///
/// # async fn example() -> Result<(), pennywise_payments::gateway::GatewayError> {
/// let gateway = MockGateway::new().with_checkout_url("https://checkout.example/c/1");
/// let session = begin_checkout(&gateway, "https://app.example/").await?;
/// assert_eq!(session.url, "https://checkout.example/c/1");
/// # Ok(())
/// # }
/// ```

use crate::gateway::{CheckoutSession, GatewayError, PaymentGateway};
use reqwest::Url;

/// Normalizes a client origin for the checkout request
pub fn normalize_origin(origin_url: &str) -> Result<String, GatewayError> {
    let trimmed = origin_url.trim().trim_end_matches('/');

    let parsed = Url::parse(trimmed)
        .map_err(|e| GatewayError::InvalidRequest(format!("Invalid origin URL: {}", e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GatewayError::InvalidRequest(format!(
            "Origin must be http or https, got {}",
            parsed.scheme()
        )));
    }

    Ok(trimmed.to_string())
}

/// Opens a checkout session and returns the redirect target
///
/// # Errors
///
/// - `InvalidRequest` if the origin is not an absolute http(s) URL
/// - `InvalidResponse` if the backend's redirect URL is not a valid URL
/// - any error reported by the gateway
pub async fn begin_checkout(
    gateway: &dyn PaymentGateway,
    origin_url: &str,
) -> Result<CheckoutSession, GatewayError> {
    let origin = normalize_origin(origin_url)?;

    let session = gateway.create_checkout(&origin).await?;

    Url::parse(&session.url).map_err(|e| {
        GatewayError::InvalidResponse(format!("Checkout URL is not a valid URL: {}", e))
    })?;

    tracing::info!(
        checkout_session = ?session.session_id,
        "Checkout session created"
    );

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;

    #[test]
    fn test_normalize_origin() {
        assert_eq!(
            normalize_origin(" https://app.example/// ").unwrap(),
            "https://app.example"
        );
        assert_eq!(
            normalize_origin("http://localhost:3000").unwrap(),
            "http://localhost:3000"
        );
    }

    #[test]
    fn test_normalize_origin_rejects_non_http() {
        assert!(matches!(
            normalize_origin("ftp://files.example"),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            normalize_origin("not a url"),
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_begin_checkout_passes_trimmed_origin() {
        let gateway = MockGateway::new();
        let session = begin_checkout(&gateway, "https://app.example/").await.unwrap();
        assert_eq!(
            session.url,
            "https://checkout.example/pay?return=https://app.example"
        );
    }

    #[tokio::test]
    async fn test_begin_checkout_rejects_bad_redirect() {
        let gateway = MockGateway::new().with_checkout_url("::nope::");
        let result = begin_checkout(&gateway, "https://app.example").await;
        assert!(matches!(result, Err(GatewayError::InvalidResponse(_))));
    }
}
