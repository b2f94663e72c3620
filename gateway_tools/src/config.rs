use log::*;
use sync_common::Secret;

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub base_url: String,
    pub access_token: Secret<String>,
    pub api_version: String,
    pub location_id: String,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("OSYNC_GATEWAY_URL").unwrap_or_else(|_| {
            warn!("🪛️ OSYNC_GATEWAY_URL not set, using the sandbox gateway as default");
            "https://connect.squareupsandbox.com".to_string()
        });
        let api_version = std::env::var("OSYNC_GATEWAY_API_VERSION").unwrap_or_else(|_| {
            warn!("🪛️ OSYNC_GATEWAY_API_VERSION not set, using 2024-06-04 as default");
            "2024-06-04".to_string()
        });
        let access_token = Secret::new(std::env::var("OSYNC_GATEWAY_ACCESS_TOKEN").unwrap_or_else(|_| {
            warn!("🪛️ OSYNC_GATEWAY_ACCESS_TOKEN not set, using (probably useless) default");
            "EAAA00000000000000".to_string()
        }));
        let location_id = std::env::var("OSYNC_GATEWAY_LOCATION_ID").unwrap_or_else(|_| {
            warn!("🪛️ OSYNC_GATEWAY_LOCATION_ID not set. Orders will be pushed without a location.");
            String::default()
        });
        Self { base_url, access_token, api_version, location_id }
    }
}
