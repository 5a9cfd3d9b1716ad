//! Authentication middleware
//!
//! Authenticates every request on the protected routes and attaches the
//! resulting [`Subject`] to the request extensions, where handlers pick
//! it up to build the per-request scope.

use crate::{error::ServerError, state::AppState};
use axum::{
    extract::{Request, State},
    http::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Require a valid credential; reject with 401 otherwise.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let authorization = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match state.authenticator.authenticate(authorization) {
        Ok(subject) => {
            req.extensions_mut().insert(subject);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "authentication failed");
            let mut response = ServerError::Unauthenticated.into_response();
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            response
        }
    }
}
