use chrono::Utc;
use hmac::{Hmac, Mac};
use log::warn;
use sha2::Sha256;

use crate::errors::ServerError;

type HmacSha256 = Hmac<Sha256>;

/// Notifications older (or newer) than this many seconds fail verification; a replayed signature is only useful to
/// an attacker within this window.
const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

/// Outcome of webhook signature verification. The reason string feeds monitoring; it is never echoed back to the
/// caller verbatim beyond the 401 body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    Invalid(&'static str),
}

/// Verifies the provider's webhook signature scheme.
///
/// The `x-signature` header carries `ts=<unix-ts>,v1=<hex hmac>`. The signed manifest is
/// `id:<data-id>;request-id:<x-request-id>;ts:<ts>;` where the data id is lowercased, and the HMAC key is the
/// webhook secret from the provider dashboard.
pub fn verify_webhook_signature(
    x_signature: Option<&str>,
    x_request_id: Option<&str>,
    data_id: &str,
    secret: &str,
) -> SignatureCheck {
    verify_webhook_signature_at(x_signature, x_request_id, data_id, secret, Utc::now().timestamp())
}

fn verify_webhook_signature_at(
    x_signature: Option<&str>,
    x_request_id: Option<&str>,
    data_id: &str,
    secret: &str,
    now: i64,
) -> SignatureCheck {
    let x_signature = match x_signature {
        Some(s) if !s.is_empty() => s,
        _ => return SignatureCheck::Invalid("missing x-signature header"),
    };
    let mut ts = None;
    let mut hash = None;
    for part in x_signature.split(',') {
        match part.split_once('=') {
            Some((key, value)) if key.trim() == "ts" => ts = Some(value.trim()),
            Some((key, value)) if key.trim() == "v1" => hash = Some(value.trim()),
            _ => {},
        }
    }
    let (ts, hash) = match (ts, hash) {
        (Some(ts), Some(hash)) => (ts, hash),
        _ => return SignatureCheck::Invalid("malformed x-signature header"),
    };
    let ts_num = match ts.parse::<i64>() {
        Ok(n) => n,
        Err(_) => return SignatureCheck::Invalid("invalid timestamp"),
    };
    if (now - ts_num).abs() > SIGNATURE_TOLERANCE_SECONDS {
        return SignatureCheck::Invalid("timestamp outside tolerance");
    }
    let manifest = format!("id:{};request-id:{};ts:{ts};", data_id.to_lowercase(), x_request_id.unwrap_or(""));
    let expected = calculate_hmac(secret, manifest.as_bytes());
    if expected == hash {
        SignatureCheck::Valid
    } else {
        SignatureCheck::Invalid("signature mismatch")
    }
}

/// HMAC-SHA256 over `data`, hex-encoded.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Checkout callback URLs must be publicly resolvable HTTPS URLs. A plain-HTTP or loopback URL is a deployment
/// mistake that the provider would reject (or, worse, silently accept); surface it before any external call.
pub fn validate_callback_url(name: &str, url: &str) -> Result<(), ServerError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ServerError::ConfigurationError(format!("{name} is not configured")));
    }
    let rest = match url.strip_prefix("https://") {
        Some(rest) => rest,
        None => {
            warn!("🔐️ {name} ({url}) is not an https URL");
            return Err(ServerError::ConfigurationError(format!("{name} must be an https URL, got: {url}")));
        },
    };
    let host_port = rest.split(['/', '?', '#']).next().unwrap_or("");
    // Bracketed IPv6 hosts carry colons of their own, so only strip a port from unbracketed hosts.
    let host = if host_port.starts_with('[') {
        host_port.split(']').next().map(|h| h.trim_start_matches('[')).unwrap_or("")
    } else {
        host_port.split(':').next().unwrap_or("")
    };
    let loopback = host.eq_ignore_ascii_case("localhost")
        || host == "0.0.0.0"
        || host == "::1"
        || host.starts_with("127.");
    if host.is_empty() || loopback {
        warn!("🔐️ {name} ({url}) does not resolve publicly");
        return Err(ServerError::ConfigurationError(format!("{name} must be publicly resolvable, got: {url}")));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "super-secret";

    fn signed_header(data_id: &str, request_id: &str, ts: i64) -> String {
        let manifest = format!("id:{};request-id:{request_id};ts:{ts};", data_id.to_lowercase());
        let hash = calculate_hmac(SECRET, manifest.as_bytes());
        format!("ts={ts},v1={hash}")
    }

    #[test]
    fn valid_signature_passes() {
        let now = 1_700_000_000;
        let header = signed_header("12345", "req-1", now);
        let result = verify_webhook_signature_at(Some(&header), Some("req-1"), "12345", SECRET, now + 10);
        assert_eq!(result, SignatureCheck::Valid);
    }

    #[test]
    fn data_id_is_lowercased_before_signing() {
        let now = 1_700_000_000;
        let header = signed_header("ABC123", "req-1", now);
        let result = verify_webhook_signature_at(Some(&header), Some("req-1"), "ABC123", SECRET, now);
        assert_eq!(result, SignatureCheck::Valid);
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let now = 1_700_000_000;
        let header = signed_header("12345", "req-1", now);
        let result = verify_webhook_signature_at(Some(&header), Some("req-1"), "12345", SECRET, now + 301);
        assert_eq!(result, SignatureCheck::Invalid("timestamp outside tolerance"));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let now = 1_700_000_000;
        let header = signed_header("12345", "req-1", now);
        let result = verify_webhook_signature_at(Some(&header), Some("req-1"), "99999", SECRET, now);
        assert_eq!(result, SignatureCheck::Invalid("signature mismatch"));
    }

    #[test]
    fn missing_or_malformed_headers_are_rejected() {
        let now = 1_700_000_000;
        assert_eq!(
            verify_webhook_signature_at(None, Some("req-1"), "1", SECRET, now),
            SignatureCheck::Invalid("missing x-signature header")
        );
        assert_eq!(
            verify_webhook_signature_at(Some("v1=deadbeef"), None, "1", SECRET, now),
            SignatureCheck::Invalid("malformed x-signature header")
        );
        assert_eq!(
            verify_webhook_signature_at(Some("ts=abc,v1=deadbeef"), None, "1", SECRET, now),
            SignatureCheck::Invalid("invalid timestamp")
        );
    }

    #[test]
    fn callback_urls_must_be_public_https() {
        assert!(validate_callback_url("success_url", "https://shop.example.com/checkout/done").is_ok());
        assert!(validate_callback_url("success_url", "http://shop.example.com/done").is_err());
        assert!(validate_callback_url("success_url", "http://localhost/done").is_err());
        assert!(validate_callback_url("success_url", "https://localhost:3000/done").is_err());
        assert!(validate_callback_url("success_url", "https://127.0.0.1/done").is_err());
        assert!(validate_callback_url("success_url", "https://[::1]/done").is_err());
        assert!(validate_callback_url("success_url", "").is_err());
    }
}
