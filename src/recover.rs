use std::any::Any;
use std::future::{ready, Ready};
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::error::ApiError;

/// Turns a panic anywhere in the wrapped service into [`ApiError::Internal`],
/// rendered by the server as the generic 500 envelope.
#[derive(Clone, Default)]
pub struct Recoverer;

impl<S, B> Transform<S, ServiceRequest> for Recoverer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RecovererMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RecovererMiddleware { service: Rc::new(service) }))
    }
}

pub struct RecovererMiddleware<S> {
    service: Rc<S>,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "panic"
    }
}

impl<S, B> Service<ServiceRequest> for RecovererMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
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
        // Owned copies only: a cloned HttpRequest would keep the router from
        // taking unique access to the request.
        let method = req.method().to_string();
        let path = req.path().to_owned();
        Box::pin(async move {
            match AssertUnwindSafe(async move { svc.call(req).await }).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => {
                    tracing::error!(
                        target: "panic",
                        %method,
                        %path,
                        "handler panicked: {}",
                        panic_message(payload.as_ref())
                    );
                    Err(ApiError::Internal.into())
                }
            }
        })
    }
}
