//! Cross-site request forgery guard.
//!
//! A state-changing request that rides on the session cookie is rejected when
//! its `Origin` (or, lacking that, `Referer`) names a different host than the
//! one the request was sent to. Bearer-token requests carry no ambient
//! credentials and are not checked.

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{Method, header},
};
use std::future::{Future, Ready, ready};
use std::pin::Pin;

use scribe_shared::ErrorResponse;

use super::auth::SESSION_COOKIE;

pub const CSRF_FAILURE: &str = "CSRF verification failed";

pub struct CsrfGuard;

impl<S, B> Transform<S, ServiceRequest> for CsrfGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = CsrfGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CsrfGuardService { service }))
    }
}

pub struct CsrfGuardService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for CsrfGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_cross_site(&req) {
            tracing::warn!(path = %req.path(), "Rejected cross-site request");
            let response = HttpResponse::Forbidden()
                .json(ErrorResponse::forbidden(CSRF_FAILURE).with_instance(req.path()));
            let res = req.into_response(response).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}

fn is_cross_site(req: &ServiceRequest) -> bool {
    let safe = matches!(
        *req.method(),
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    );
    if safe || req.cookie(SESSION_COOKIE).is_none() {
        return false;
    }

    let source = req
        .headers()
        .get(header::ORIGIN)
        .or_else(|| req.headers().get(header::REFERER))
        .and_then(|v| v.to_str().ok());

    match source {
        None => false,
        Some(source) => {
            let conn = req.connection_info();
            host_of(source) != Some(conn.host())
        }
    }
}

/// `host[:port]` of an absolute URL. `None` for opaque origins such as `null`.
fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next()?;
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_is_taken_from_absolute_urls() {
        assert_eq!(host_of("https://blog.example"), Some("blog.example"));
        assert_eq!(
            host_of("http://localhost:8080/posts/1/?page=2"),
            Some("localhost:8080")
        );
        assert_eq!(host_of("null"), None);
        assert_eq!(host_of("http:///"), None);
    }
}
