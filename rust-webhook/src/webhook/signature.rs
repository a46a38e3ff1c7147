//! Webhook payload signature verification.
//!
//! Meta signs every POST with HMAC-SHA256 of the raw body, keyed with the
//! app secret, and sends it as `X-Hub-Signature-256: sha256=<hex>`.
//! Reference: https://developers.facebook.com/docs/graph-api/webhooks/getting-started#event-notifications

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the hex HMAC-SHA256 of `body` keyed with `app_secret`.
pub fn compute_signature(app_secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify an `X-Hub-Signature-256` header value against the raw body.
///
/// Returns `true` only if the header is present, well-formed and matches.
pub fn verify_payload_signature(app_secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let header = match header {
        Some(h) if !h.is_empty() => h,
        _ => {
            warn!("payload_signature_missing");
            return false;
        }
    };

    let provided = match header.strip_prefix(SIGNATURE_PREFIX) {
        Some(sig) => sig,
        None => {
            warn!(header_length = header.len(), "payload_signature_malformed");
            return false;
        }
    };

    let provided = match hex::decode(provided) {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(signature_length = provided.len(), "payload_signature_not_hex");
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("payload_signature_invalid_key");
            return false;
        }
    };
    mac.update(body);

    // verify_slice compares in constant time
    let valid = mac.verify_slice(&provided).is_ok();

    if !valid {
        warn!(actual_length = provided.len(), "payload_signature_mismatch");
    }

    valid
}

/// Check if payload signature verification is enabled.
pub fn is_signature_verification_enabled(app_secret: &Option<String>) -> bool {
    app_secret
        .as_ref()
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "app-secret";
    const BODY: &[u8] = br#"{"object":"whatsapp_business_account","entry":[]}"#;

    fn header_for(body: &[u8]) -> String {
        format!("sha256={}", compute_signature(SECRET, body).unwrap())
    }

    #[test]
    fn test_verify_signature_valid() {
        let header = header_for(BODY);
        assert!(verify_payload_signature(SECRET, BODY, Some(&header)));
    }

    #[test]
    fn test_verify_signature_uppercase_hex() {
        let header = format!(
            "sha256={}",
            compute_signature(SECRET, BODY).unwrap().to_uppercase()
        );
        assert!(verify_payload_signature(SECRET, BODY, Some(&header)));
    }

    #[test]
    fn test_verify_signature_missing() {
        assert!(!verify_payload_signature(SECRET, BODY, None));
        assert!(!verify_payload_signature(SECRET, BODY, Some("")));
    }

    #[test]
    fn test_verify_signature_without_prefix() {
        let sig = compute_signature(SECRET, BODY).unwrap();
        assert!(!verify_payload_signature(SECRET, BODY, Some(&sig)));
    }

    #[test]
    fn test_verify_signature_not_hex() {
        assert!(!verify_payload_signature(SECRET, BODY, Some("sha256=zz-not-hex")));
    }

    #[test]
    fn test_verify_signature_tampered_body() {
        let header = header_for(BODY);
        assert!(!verify_payload_signature(SECRET, b"{\"entry\":[1]}", Some(&header)));
    }

    #[test]
    fn test_verify_signature_wrong_secret() {
        let header = header_for(BODY);
        assert!(!verify_payload_signature("other-secret", BODY, Some(&header)));
    }

    #[test]
    fn test_is_signature_verification_enabled() {
        assert!(!is_signature_verification_enabled(&None));
        assert!(!is_signature_verification_enabled(&Some("".to_string())));
        assert!(!is_signature_verification_enabled(&Some("   ".to_string())));
        assert!(is_signature_verification_enabled(&Some("key123".to_string())));
    }
}
