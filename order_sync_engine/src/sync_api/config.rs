use std::time::Duration;

use log::*;
use sync_common::{parse_env_flag, parse_env_seconds};

/// Tunables for the reconciliation engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// The gateway location orders are pushed to.
    pub location_id: String,
    /// Create local orders for remote orders seen for the first time (point-of-sale style deployments).
    pub inbound_sync: bool,
    /// Refuse to create orders that would sell more tickets than are in stock.
    pub oversell_protection: bool,
    /// Retry ceiling for draining pending webhooks. Applies to both the hold-wait and the backoff path.
    pub max_webhook_retries: u32,
    /// Added to `on_checkout_hold_until` when deferring webhook processing.
    pub hold_backoff: Duration,
    /// Delay before retrying a drain that hit a transient storage failure.
    pub retry_backoff: Duration,
    pub push_verification_delay: Duration,
    pub refund_verification_delay: Duration,
    pub order_cache_ttl: Duration,
    pub customer_cache_ttl: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            location_id: String::default(),
            inbound_sync: false,
            oversell_protection: true,
            max_webhook_retries: 5,
            hold_backoff: Duration::from_secs(60),
            retry_backoff: Duration::from_secs(60),
            push_verification_delay: Duration::from_secs(120),
            refund_verification_delay: Duration::from_secs(20),
            order_cache_ttl: Duration::from_secs(600),
            customer_cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl SyncConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let location_id = std::env::var("OSYNC_GATEWAY_LOCATION_ID").unwrap_or_else(|_| {
            warn!("🪛️ OSYNC_GATEWAY_LOCATION_ID is not set. Orders will be pushed without a location.");
            defaults.location_id.clone()
        });
        let max_webhook_retries = std::env::var("OSYNC_MAX_WEBHOOK_RETRIES")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid OSYNC_MAX_WEBHOOK_RETRIES ({s}): {e}. Using the default."))
                    .ok()
            })
            .unwrap_or(defaults.max_webhook_retries);
        Self {
            location_id,
            inbound_sync: parse_env_flag("OSYNC_INBOUND_SYNC", defaults.inbound_sync),
            oversell_protection: parse_env_flag("OSYNC_OVERSELL_PROTECTION", defaults.oversell_protection),
            max_webhook_retries,
            hold_backoff: parse_env_seconds("OSYNC_HOLD_BACKOFF_SECS", defaults.hold_backoff),
            retry_backoff: parse_env_seconds("OSYNC_RETRY_BACKOFF_SECS", defaults.retry_backoff),
            push_verification_delay: parse_env_seconds(
                "OSYNC_PUSH_VERIFICATION_DELAY_SECS",
                defaults.push_verification_delay,
            ),
            refund_verification_delay: parse_env_seconds(
                "OSYNC_REFUND_VERIFICATION_DELAY_SECS",
                defaults.refund_verification_delay,
            ),
            order_cache_ttl: parse_env_seconds("OSYNC_ORDER_CACHE_TTL_SECS", defaults.order_cache_ttl),
            customer_cache_ttl: parse_env_seconds("OSYNC_CUSTOMER_CACHE_TTL_SECS", defaults.customer_cache_ttl),
        }
    }
}
