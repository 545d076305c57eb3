//! Admin token authentication.
//!
//! Requests must carry `Authorization: Bearer <token>` matching the configured
//! admin token. An empty configured token rejects every request.

use axum::{
    body::Body,
    http::{StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Layer guarding routes with the admin bearer token.
#[derive(Clone)]
pub struct AdminTokenLayer {
    token: Arc<str>,
}

impl AdminTokenLayer {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl<S> tower::Layer<S> for AdminTokenLayer {
    type Service = AdminTokenService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdminTokenService {
            inner,
            token: self.token.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AdminTokenService<S> {
    inner: S,
    token: Arc<str>,
}

impl<S> AdminTokenService<S> {
    fn is_authorized<B>(&self, request: &axum::http::Request<B>) -> bool {
        if self.token.is_empty() {
            return false;
        }

        request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|provided| constant_time_eq(provided.as_bytes(), self.token.as_bytes()))
    }
}

impl<S, B> tower::Service<axum::http::Request<B>> for AdminTokenService<S>
where
    S: tower::Service<axum::http::Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: axum::http::Request<B>) -> Self::Future {
        if self.is_authorized(&request) {
            let future = self.inner.call(request);
            return Box::pin(future);
        }

        tracing::warn!(path = %request.uri().path(), "Rejected admin request without valid token");
        Box::pin(async move {
            Ok((StatusCode::UNAUTHORIZED, Body::from("Unauthorized")).into_response())
        })
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
