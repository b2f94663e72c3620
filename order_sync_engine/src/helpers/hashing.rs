use blake2::{Blake2s256, Digest};
use gateway_tools::OrderPayload;
use rand::RngCore;

/// Content hash of an order payload, used to detect pushes that would not change anything.
///
/// Metadata maps are ordered, so the JSON encoding (and therefore the hash) is deterministic.
pub fn payload_hash(payload: &OrderPayload) -> String {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    hex::encode(Blake2s256::digest(&bytes))
}

/// The idempotency key for refunding a tender. It is a pure function of the tender id, so repeated refund attempts
/// can never refund the same tender twice.
pub fn refund_idempotency_key(tender_id: &str) -> String {
    let digest = Blake2s256::digest(format!("refund-{tender_id}").as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(40);
    key
}

pub fn new_idempotency_key() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn refund_keys_are_deterministic() {
        let k1 = refund_idempotency_key("T1");
        assert_eq!(k1.len(), 40);
        assert_eq!(k1, refund_idempotency_key("T1"));
        assert_ne!(k1, refund_idempotency_key("T2"));
    }

    #[test]
    fn fresh_keys_differ() {
        assert_ne!(new_idempotency_key(), new_idempotency_key());
    }

    #[test]
    fn payload_hash_tracks_content() {
        let mut payload = OrderPayload { reference_id: "42".into(), ..Default::default() };
        let h1 = payload_hash(&payload);
        assert_eq!(h1, payload_hash(&payload.clone()));
        payload.state = "OPEN".into();
        assert_ne!(h1, payload_hash(&payload));
    }
}
