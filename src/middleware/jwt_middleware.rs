/// Bearer Token Middleware
///
/// Verifies the access token from the Authorization header and injects its
/// claims into request extensions for the route handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::error::{AppError, AuthError};
use crate::session::SessionService;

const BEARER_PREFIX: &str = "Bearer ";

/// Guards the routes it wraps; rejects with the uniform 401 body
pub struct JwtMiddleware {
    session: SessionService,
}

impl JwtMiddleware {
    pub fn new(session: SessionService) -> Self {
        Self { session }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            session: self.session.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    session: SessionService,
}

/// Token part of `Authorization: Bearer <token>`
fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let verified = bearer_token(&req)
            .ok_or_else(|| AppError::from(AuthError::MissingToken))
            .and_then(|token| self.session.authenticate(&token));

        match verified {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.sub, "Access token verified");
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => {
                let error = Error::from(e);
                Box::pin(async move { Err::<ServiceResponse<B>, Error>(error) })
            }
        }
    }
}
