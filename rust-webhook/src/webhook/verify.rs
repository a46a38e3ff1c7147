//! Subscription handshake for the webhook endpoint.
//!
//! When a webhook is registered, the provider sends
//! `GET ?hub.mode=subscribe&hub.verify_token=<token>&hub.challenge=<n>` and
//! expects the challenge echoed back.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Mode value sent by the provider when subscribing.
pub const SUBSCRIBE_MODE: &str = "subscribe";

const MODE_PARAM: &str = "hub.mode";
const TOKEN_PARAM: &str = "hub.verify_token";
const CHALLENGE_PARAM: &str = "hub.challenge";

/// HMAC key used to turn both tokens into fixed-length tags before comparing.
const TOKEN_TAG_KEY: &[u8] = b"statushook.verify_token";

/// Query parameters of the handshake request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationChallenge {
    pub mode: Option<String>,
    pub token: Option<String>,
    pub challenge: Option<String>,
}

impl VerificationChallenge {
    /// Build from raw query pairs. A repeated key keeps its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                MODE_PARAM => &mut params.mode,
                TOKEN_PARAM => &mut params.token,
                CHALLENGE_PARAM => &mut params.challenge,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }
}

/// Successful handshake outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Echo the challenge back as a JSON number (canonical integer digits)
    Challenge(String),
    /// Mode and token matched but no challenge was sent
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// Mode or token missing, or not matching
    #[error("Invalid verification token")]
    InvalidToken,

    /// Challenge present but not an integer
    #[error("Invalid challenge value")]
    InvalidChallenge(String),
}

/// Validate a handshake request against the configured verify token.
pub fn verify_subscription(
    params: &VerificationChallenge,
    verify_token: &str,
) -> Result<VerificationOutcome, VerificationError> {
    info!(
        mode = ?params.mode,
        has_token = params.token.is_some(),
        token_length = params.token.as_ref().map(|t| t.len()).unwrap_or(0),
        challenge = ?params.challenge,
        "verification_request_received"
    );

    let mode = non_empty(&params.mode);
    let token = non_empty(&params.token);

    let matched = match (mode, token) {
        (Some(mode), Some(token)) => mode == SUBSCRIBE_MODE && tokens_match(token, verify_token),
        _ => false,
    };

    if !matched {
        warn!(
            mode = ?params.mode,
            has_token = params.token.is_some(),
            "verification_token_invalid"
        );
        return Err(VerificationError::InvalidToken);
    }

    match non_empty(&params.challenge) {
        Some(raw) => match canonical_integer(raw) {
            Some(challenge) => {
                info!(challenge = %challenge, "verification_succeeded");
                Ok(VerificationOutcome::Challenge(challenge))
            }
            None => {
                warn!(challenge = %raw, "verification_challenge_invalid");
                Err(VerificationError::InvalidChallenge(raw.to_string()))
            }
        },
        None => {
            info!("verification_succeeded_without_challenge");
            Ok(VerificationOutcome::Acknowledged)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Normalize an integer string of any length into valid JSON number text.
///
/// Accepts surrounding whitespace, an optional sign and leading zeros.
fn canonical_integer(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first()? {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let significant = digits.trim_start_matches('0');
    Some(match (significant.is_empty(), negative) {
        (true, _) => "0".to_string(),
        (false, true) => format!("-{}", significant),
        (false, false) => significant.to_string(),
    })
}

/// Compare tokens via HMAC tags so the check runs in constant time
/// regardless of where or whether the lengths differ.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let tag = |token: &str| match HmacSha256::new_from_slice(TOKEN_TAG_KEY) {
        Ok(mut mac) => {
            mac.update(token.as_bytes());
            Some(mac)
        }
        Err(_) => None,
    };

    match (tag(provided), tag(expected)) {
        (Some(provided), Some(expected)) => provided
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "s3cret";

    fn params(mode: Option<&str>, token: Option<&str>, challenge: Option<&str>) -> VerificationChallenge {
        VerificationChallenge {
            mode: mode.map(str::to_string),
            token: token.map(str::to_string),
            challenge: challenge.map(str::to_string),
        }
    }

    #[test]
    fn test_valid_with_challenge() {
        let result = verify_subscription(
            &params(Some("subscribe"), Some(TOKEN), Some("1234567890")),
            TOKEN,
        );
        assert_eq!(
            result,
            Ok(VerificationOutcome::Challenge("1234567890".to_string()))
        );
    }

    #[test]
    fn test_valid_with_oversized_challenge() {
        let result = verify_subscription(
            &params(Some("subscribe"), Some(TOKEN), Some("123456789012345678901234567890")),
            TOKEN,
        );
        assert_eq!(
            result,
            Ok(VerificationOutcome::Challenge(
                "123456789012345678901234567890".to_string()
            ))
        );
    }

    #[test]
    fn test_valid_without_challenge() {
        let result = verify_subscription(&params(Some("subscribe"), Some(TOKEN), None), TOKEN);
        assert_eq!(result, Ok(VerificationOutcome::Acknowledged));

        let result = verify_subscription(&params(Some("subscribe"), Some(TOKEN), Some("")), TOKEN);
        assert_eq!(result, Ok(VerificationOutcome::Acknowledged));
    }

    #[test]
    fn test_wrong_token() {
        let result = verify_subscription(
            &params(Some("subscribe"), Some("guess"), Some("1")),
            TOKEN,
        );
        assert_eq!(result, Err(VerificationError::InvalidToken));

        let result = verify_subscription(
            &params(Some("subscribe"), Some("s3cret-and-more"), Some("1")),
            TOKEN,
        );
        assert_eq!(result, Err(VerificationError::InvalidToken));
    }

    #[test]
    fn test_wrong_mode() {
        let result = verify_subscription(
            &params(Some("unsubscribe"), Some(TOKEN), Some("1")),
            TOKEN,
        );
        assert_eq!(result, Err(VerificationError::InvalidToken));
    }

    #[test]
    fn test_missing_mode_or_token() {
        assert_eq!(
            verify_subscription(&params(None, Some(TOKEN), Some("1")), TOKEN),
            Err(VerificationError::InvalidToken)
        );
        assert_eq!(
            verify_subscription(&params(Some("subscribe"), None, Some("1")), TOKEN),
            Err(VerificationError::InvalidToken)
        );
        assert_eq!(
            verify_subscription(&params(Some("subscribe"), Some(""), None), ""),
            Err(VerificationError::InvalidToken)
        );
    }

    #[test]
    fn test_non_numeric_challenge() {
        for bad in ["abc", "12a", "-", "1.5"] {
            let result = verify_subscription(
                &params(Some("subscribe"), Some(TOKEN), Some(bad)),
                TOKEN,
            );
            assert_eq!(
                result,
                Err(VerificationError::InvalidChallenge(bad.to_string()))
            );
        }
    }

    #[test]
    fn test_canonical_integer() {
        assert_eq!(canonical_integer(" 42 ").as_deref(), Some("42"));
        assert_eq!(canonical_integer("+7").as_deref(), Some("7"));
        assert_eq!(canonical_integer("007").as_deref(), Some("7"));
        assert_eq!(canonical_integer("-0012").as_deref(), Some("-12"));
        assert_eq!(canonical_integer("-000").as_deref(), Some("0"));
        assert_eq!(canonical_integer("+"), None);
        assert_eq!(canonical_integer(""), None);
    }

    #[test]
    fn test_from_pairs_keeps_last_value() {
        let params = VerificationChallenge::from_pairs(vec![
            ("hub.mode", "unsubscribe"),
            ("hub.mode", "subscribe"),
            ("hub.verify_token", TOKEN),
            ("hub.challenge", "5"),
            ("hub.challenge", "6"),
            ("unrelated", "x"),
        ]);

        assert_eq!(params.mode.as_deref(), Some("subscribe"));
        assert_eq!(params.token.as_deref(), Some(TOKEN));
        assert_eq!(params.challenge.as_deref(), Some("6"));
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", "abcd"));
        assert!(!tokens_match("", "abc"));
    }
}
