//! Access guard
//!
//! Every route except `/health` takes an [`Authorized`] extractor, so a
//! request with a missing or wrong credential is rejected before the handler
//! runs.

use super::{error::ApiError, state::ServerState};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use subtle::ConstantTimeEq;
use tracing::debug;

pub const AUTHORIZATION_SCHEME: &str = "Bearer ";

/// Proof that the request carried the configured API key
#[derive(Debug, Clone, Copy)]
pub struct Authorized;

/// Extract the bearer token from the `Authorization` header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(AUTHORIZATION_SCHEME))
}

fn credential_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub(crate) fn authorize(headers: &HeaderMap, api_key: &str) -> Result<Authorized, ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::Unauthenticated)?;

    if credential_matches(token, api_key) {
        Ok(Authorized)
    } else {
        Err(ApiError::InvalidCredential)
    }
}

impl FromRequestParts<ServerState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        authorize(&parts.headers, &ctx.config.api_key).inspect_err(|err| {
            debug!("Rejected {} {}: {}", parts.method, parts.uri.path(), err);
        })
    }
}
