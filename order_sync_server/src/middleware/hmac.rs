//! HMAC middleware for Actix Web.
//!
//! The payment gateway signs every webhook notification. The signature is the base64-encoded HMAC-SHA256 of the
//! subscription's notification URL followed by the raw request body, keyed with the subscription's signature key. It
//! arrives in the `x-square-hmacsha256-signature` header by default.
//!
//! Wrap the webhook scope with [`HmacMiddlewareFactory`] to reject unsigned or forged notifications before they reach
//! the handler. The body has to be read to check it, so it is put back on the request afterwards.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden},
    http::header::HeaderMap,
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace, warn};
use sync_common::Secret;

use crate::helpers::verify_hmac;

/// What a notification has to be signed with to be accepted.
struct SignatureCheck {
    header: String,
    key: Secret<String>,
    notification_url: String,
}

impl SignatureCheck {
    fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), Error> {
        let signature = headers.get(&self.header).and_then(|v| v.to_str().ok()).ok_or_else(|| {
            warn!("🔐️ No {} header on webhook request. Denying access.", self.header);
            ErrorForbidden("No HMAC signature found.")
        })?;
        if verify_hmac(self.key.reveal(), &self.notification_url, body, signature) {
            trace!("🔐️ HMAC check for request ✅️");
            Ok(())
        } else {
            warn!("🔐️ Invalid HMAC signature on webhook request. Denying access.");
            Err(ErrorForbidden("Invalid HMAC signature."))
        }
    }
}

pub struct HmacMiddlewareFactory {
    // None when checks are disabled, in which case every request passes
    check: Option<Rc<SignatureCheck>>,
}

impl HmacMiddlewareFactory {
    pub fn new(hmac_header: &str, key: Secret<String>, notification_url: &str, enabled: bool) -> Self {
        let check = enabled.then(|| {
            Rc::new(SignatureCheck {
                header: hmac_header.to_string(),
                key,
                notification_url: notification_url.to_string(),
            })
        });
        Self { check }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService { check: self.check.clone(), service: Rc::new(service) }))
    }
}

pub struct HmacMiddlewareService<S> {
    check: Option<Rc<SignatureCheck>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let Some(check) = self.check.clone() else {
            debug!("🔐️ HMAC checks are disabled. Allowing {}", req.path());
            return Box::pin(service.call(req));
        };
        Box::pin(async move {
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not read webhook body: {e:?}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            check.verify(req.headers(), &body)?;
            req.set_payload(restore_payload(body));
            service.call(req).await
        })
    }
}

fn restore_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
