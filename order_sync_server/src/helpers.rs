use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The base64-encoded HMAC-SHA256 of `notification_url` followed by `body`, keyed with `key`.
///
/// This is the signature the gateway attaches to each webhook notification.
pub fn calculate_hmac(key: &str, notification_url: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::default(),
    };
    mac.update(notification_url.as_bytes());
    mac.update(body);
    base64::encode(mac.finalize().into_bytes())
}

/// Checks `signature` (as found in the webhook header) against the expected signature. The comparison is constant
/// time.
pub fn verify_hmac(key: &str, notification_url: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = base64::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(key.as_bytes()) else {
        return false;
    };
    mac.update(notification_url.as_bytes());
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn signature_covers_url_and_body() {
        let sig = calculate_hmac("secret", "https://example.com/gateway/webhook", b"{\"a\":1}");
        assert_eq!(sig.len(), 44);
        assert_eq!(sig, calculate_hmac("secret", "https://example.com/gateway/webhook", b"{\"a\":1}"));
        assert_ne!(sig, calculate_hmac("secret", "https://example.com/other", b"{\"a\":1}"));
        assert_ne!(sig, calculate_hmac("secret", "https://example.com/gateway/webhook", b"{\"a\":2}"));
        assert_ne!(sig, calculate_hmac("other", "https://example.com/gateway/webhook", b"{\"a\":1}"));
    }

    #[test]
    fn signature_matches_concatenated_input() {
        let split = calculate_hmac("k", "https://a.b/hook", b"body");
        let joined = calculate_hmac("k", "", b"https://a.b/hookbody");
        assert_eq!(split, joined);
    }

    #[test]
    fn verification() {
        let url = "https://example.com/gateway/webhook";
        let sig = calculate_hmac("secret", url, b"payload");
        assert!(verify_hmac("secret", url, b"payload", &sig));
        assert!(verify_hmac("secret", url, b"payload", &format!(" {sig} ")));
        assert!(!verify_hmac("secret", url, b"payload2", &sig));
        assert!(!verify_hmac("wrong", url, b"payload", &sig));
        assert!(!verify_hmac("secret", url, b"payload", "not base64!"));
        assert!(!verify_hmac("secret", url, b"payload", ""));
    }
}
