//! Operator authentication for the `/api` scope.
//!
//! Pushes and re-syncs act on live orders and the gateway, so callers must present the shared operator token as
//! `Authorization: Bearer <token>`. Requests without it, or with the wrong token, get a 401.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    http::header::{HeaderMap, AUTHORIZATION},
    Error,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use subtle::ConstantTimeEq;
use sync_common::Secret;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(|v| v.strip_prefix("Bearer ")).map(str::trim)
}

fn check_token(expected: &Secret<String>, headers: &HeaderMap, path: &str) -> Result<(), Error> {
    let presented = bearer_token(headers).ok_or_else(|| {
        warn!("🔐️ No bearer token on request to {path}. Denying access.");
        ErrorUnauthorized("Missing bearer token.")
    })?;
    let expected = expected.reveal();
    // An empty token would let an empty header through
    if !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        trace!("🔐️ Operator token for {path} ✅️");
        Ok(())
    } else {
        warn!("🔐️ Invalid operator token on request to {path}. Denying access.");
        Err(ErrorUnauthorized("Invalid bearer token."))
    }
}

pub struct ApiAuthMiddlewareFactory {
    token: Rc<Secret<String>>,
}

impl ApiAuthMiddlewareFactory {
    pub fn new(token: Secret<String>) -> Self {
        Self { token: Rc::new(token) }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = ApiAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiAuthMiddlewareService { token: Rc::clone(&self.token), service: Rc::new(service) }))
    }
}

pub struct ApiAuthMiddlewareService<S> {
    token: Rc<Secret<String>>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Err(e) = check_token(&self.token, req.headers(), req.path()) {
            return Box::pin(ready(Err(e)));
        }
        Box::pin(self.service.call(req))
    }
}
