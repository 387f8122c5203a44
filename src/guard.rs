//! Bearer-token gate for protected scopes.

use std::future::{ready, Ready};
use std::rc::Rc;

use actix_web::body::EitherBody;
use actix_web::dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, Error, FromRequest, HttpMessage, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use futures_util::future::LocalBoxFuture;

use crate::auth::{Claims, TokenKind};
use crate::error::ApiError;
use crate::routes::AppState;

/// Validate the `Authorization: Bearer` header of `req` as an access token.
fn authorize(req: &HttpRequest) -> Result<Claims, ApiError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        tracing::error!("AppState missing from app data; cannot authorize");
        ApiError::Internal
    })?;
    let bearer = BearerAuth::from_request(req, &mut Payload::None)
        .into_inner()
        .map_err(|_| ApiError::Unauthorized)?;
    Ok(state.tokens.validate(bearer.token(), TokenKind::Access)?)
}

/// Middleware rejecting requests without a valid access token before the
/// wrapped service runs. Verified claims are stored in request extensions.
#[derive(Clone, Default)]
pub struct AuthRequired;

impl<S, B> Transform<S, ServiceRequest> for AuthRequired
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthRequiredMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthRequiredMiddleware { service: Rc::new(service) }))
    }
}

pub struct AuthRequiredMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthRequiredMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        Box::pin(async move {
            match authorize(req.request()) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                    svc.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(e) => {
                    tracing::info!(path = %req.path(), "rejected unauthenticated request");
                    Ok(req.error_response(e).map_into_right_body())
                }
            }
        })
    }
}

/// Extractor yielding validated access-token `Claims`.
///
/// Behind [`AuthRequired`] it reuses the claims the middleware stored;
/// elsewhere it validates the header itself.
pub struct Auth(pub Claims);

impl FromRequest for Auth {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        if let Some(claims) = req.extensions().get::<Claims>() {
            return ready(Ok(Auth(claims.clone())));
        }
        ready(authorize(req).map(Auth).map_err(Error::from))
    }
}
