use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Largest accepted gap between Slack's request timestamp and our clock.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

/// Check `X-Slack-Signature` against `v0:{timestamp}:{body}`.
///
/// With no signing secret configured every request passes.
pub fn verify_slack_signature(
    signing_secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
    now_secs: i64,
) -> Result<(), &'static str> {
    let Some(secret) = signing_secret.filter(|value| !value.trim().is_empty()) else {
        return Ok(());
    };
    let signature = headers
        .get("x-slack-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or("missing_signature")?;
    let timestamp = headers
        .get("x-slack-request-timestamp")
        .and_then(|value| value.to_str().ok())
        .ok_or("missing_timestamp")?;
    let timestamp_value: i64 = timestamp.parse().map_err(|_| "invalid_timestamp")?;

    if (now_secs - timestamp_value).abs() > MAX_CLOCK_SKEW_SECS {
        return Err("stale_timestamp");
    }

    let provided = signature
        .strip_prefix("v0=")
        .and_then(|digest| hex::decode(digest).ok())
        .ok_or("invalid_signature")?;
    signature_mac(secret, timestamp, body)
        .ok_or("bad_secret")?
        .verify_slice(&provided)
        .map_err(|_| "invalid_signature")
}

/// `v0=<hex hmac>` for a request body.
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    let mac = signature_mac(secret, timestamp, body)?;
    Some(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

fn signature_mac(secret: &str, timestamp: &str, body: &[u8]) -> Option<Hmac<Sha256>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Some(mac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = br#"{"type":"event_callback"}"#;
    const NOW: i64 = 1_700_000_000;

    fn headers(timestamp: &str, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-slack-request-timestamp",
            HeaderValue::from_str(timestamp).expect("header"),
        );
        headers.insert(
            "x-slack-signature",
            HeaderValue::from_str(signature).expect("header"),
        );
        headers
    }

    #[test]
    fn accepts_matching_signature() {
        let timestamp = NOW.to_string();
        let signature = sign(SECRET, &timestamp, BODY).expect("sign");
        let headers = headers(&timestamp, &signature);
        assert_eq!(verify_slack_signature(Some(SECRET), &headers, BODY, NOW), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let timestamp = NOW.to_string();
        let signature = sign(SECRET, &timestamp, BODY).expect("sign");
        let headers = headers(&timestamp, &signature);
        assert_eq!(
            verify_slack_signature(Some(SECRET), &headers, b"{}", NOW),
            Err("invalid_signature")
        );
    }

    #[test]
    fn rejects_malformed_signature_header() {
        let timestamp = NOW.to_string();
        for signature in ["v0=not-hex", "v1=abcd", "", "v0=abcd"] {
            let headers = headers(&timestamp, signature);
            assert_eq!(
                verify_slack_signature(Some(SECRET), &headers, BODY, NOW),
                Err("invalid_signature"),
                "signature {:?}",
                signature
            );
        }
    }

    #[test]
    fn signs_raw_body_bytes() {
        let timestamp = NOW.to_string();
        let body: &[u8] = b"payload=\xff\xfe";
        let signature = sign(SECRET, &timestamp, body).expect("sign");
        let headers = headers(&timestamp, &signature);
        assert_eq!(verify_slack_signature(Some(SECRET), &headers, body, NOW), Ok(()));
        assert_eq!(
            verify_slack_signature(Some(SECRET), &headers, b"payload=\xef\xbf\xbd", NOW),
            Err("invalid_signature")
        );
    }

    #[test]
    fn rejects_stale_timestamp() {
        let timestamp = (NOW - MAX_CLOCK_SKEW_SECS - 1).to_string();
        let signature = sign(SECRET, &timestamp, BODY).expect("sign");
        let headers = headers(&timestamp, &signature);
        assert_eq!(
            verify_slack_signature(Some(SECRET), &headers, BODY, NOW),
            Err("stale_timestamp")
        );
    }

    #[test]
    fn missing_headers_are_rejected() {
        assert_eq!(
            verify_slack_signature(Some(SECRET), &HeaderMap::new(), BODY, NOW),
            Err("missing_signature")
        );
    }

    #[test]
    fn no_secret_means_no_check() {
        assert_eq!(verify_slack_signature(None, &HeaderMap::new(), BODY, NOW), Ok(()));
        assert_eq!(verify_slack_signature(Some("  "), &HeaderMap::new(), BODY, NOW), Ok(()));
    }
}
