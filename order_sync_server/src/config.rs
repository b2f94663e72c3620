use std::env;

use gateway_tools::GatewayConfig;
use log::*;
use order_sync_engine::SyncConfig;
use sync_common::{parse_env_flag, Secret};

use crate::errors::ServerError;

const DEFAULT_OSYNC_HOST: &str = "127.0.0.1";
const DEFAULT_OSYNC_PORT: u16 = 8370;
pub const DEFAULT_HMAC_HEADER: &str = "x-square-hmacsha256-signature";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Connection details for the payment gateway's REST API
    pub gateway: GatewayConfig,
    pub webhooks: WebhookConfig,
    /// The bearer token operators present to the `/api` endpoints
    pub api_token: Secret<String>,
    /// Tunables for the reconciliation engine
    pub sync: SyncConfig,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The key the gateway signs webhook notifications with.
    pub signature_key: Secret<String>,
    /// The URL the gateway delivers notifications to, exactly as registered with the gateway. It is part of the
    /// signed data.
    pub notification_url: String,
    /// The request header carrying the signature.
    pub hmac_header: String,
    /// If false, signatures are not checked at all. **DANGER**
    pub hmac_checks: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signature_key: Secret::default(),
            notification_url: String::default(),
            hmac_header: DEFAULT_HMAC_HEADER.to_string(),
            hmac_checks: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OSYNC_HOST.to_string(),
            port: DEFAULT_OSYNC_PORT,
            database_url: String::default(),
            gateway: GatewayConfig::default(),
            webhooks: WebhookConfig::default(),
            api_token: Secret::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("OSYNC_HOST").ok().unwrap_or_else(|| DEFAULT_OSYNC_HOST.into());
        let port = env::var("OSYNC_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for OSYNC_PORT. {e} Using the default, {DEFAULT_OSYNC_PORT}, \
                         instead."
                    );
                    DEFAULT_OSYNC_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_OSYNC_PORT);
        let database_url = env::var("OSYNC_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ OSYNC_DATABASE_URL is not set. Please set it to the URL for the order sync database.");
            String::default()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        let webhooks = WebhookConfig::from_env_or_default();
        let api_token = env::var("OSYNC_API_TOKEN").ok().unwrap_or_else(|| {
            error!("🪛️ OSYNC_API_TOKEN is not set. The /api endpoints will refuse every request.");
            String::default()
        });
        let sync = SyncConfig::new_from_env_or_default();
        Self { host, port, database_url, gateway, webhooks, api_token: Secret::new(api_token), sync }
    }

    /// Catches settings the server cannot run without.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.database_url.is_empty() {
            return Err(ServerError::ConfigurationError("OSYNC_DATABASE_URL is not set".into()));
        }
        if self.webhooks.hmac_checks && self.webhooks.signature_key.reveal().is_empty() {
            return Err(ServerError::ConfigurationError(
                "OSYNC_WEBHOOK_SIGNATURE_KEY must be set while HMAC checks are enabled".into(),
            ));
        }
        if self.api_token.is_empty() {
            return Err(ServerError::ConfigurationError("OSYNC_API_TOKEN is not set".into()));
        }
        Ok(())
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let signature_key = env::var("OSYNC_WEBHOOK_SIGNATURE_KEY").ok().unwrap_or_else(|| {
            error!(
                "🪛️ OSYNC_WEBHOOK_SIGNATURE_KEY is not set. Please set it to the signature key of your webhook \
                 subscription."
            );
            String::default()
        });
        let notification_url = env::var("OSYNC_WEBHOOK_NOTIFICATION_URL").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ OSYNC_WEBHOOK_NOTIFICATION_URL is not set. Webhook signatures will not validate unless it matches \
                 the URL registered with the gateway."
            );
            String::default()
        });
        let hmac_header = env::var("OSYNC_WEBHOOK_HMAC_HEADER").unwrap_or_else(|_| DEFAULT_HMAC_HEADER.to_string());
        let hmac_checks = parse_env_flag("OSYNC_WEBHOOK_HMAC_CHECKS", true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are disabled. Anyone can trigger order syncs. 🚨️");
        }
        Self { signature_key: Secret::new(signature_key), notification_url, hmac_header, hmac_checks }
    }
}
