mod api_auth;
mod hmac;

pub use api_auth::{ApiAuthMiddlewareFactory, ApiAuthMiddlewareService};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService};
