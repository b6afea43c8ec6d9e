//! `X-API-Key` authentication (spec.md 6): missing header or mismatch both
//! return 401. The auth model here is a static header comparison rather
//! than a JWT/OAuth flow, so there is no token verification — see
//! SPEC_FULL.md section B for why `jsonwebtoken` was dropped from the
//! dependency graph.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::ApiState;

const API_KEY_HEADER: &str = "x-api-key";

/// Constant-time comparison so key length/prefix timing doesn't leak which
/// byte first differs.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn key_is_valid(configured: &[String], presented: &str) -> bool {
    configured.iter().any(|k| constant_time_eq(k, presented))
}

/// Auth middleware: no-op when no keys are configured (local/dev), else
/// requires a matching `X-API-Key` header on every request.
pub async fn require_api_key(State(state): State<Arc<ApiState>>, request: Request, next: Next) -> Result<Response, StatusCode> {
    if state.config.api_keys.is_empty() {
        return Ok(next.run(request).await);
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if key_is_valid(&state.config.api_keys, key) => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_keys_compare_equal() {
        assert!(constant_time_eq("secret-key", "secret-key"));
    }

    #[test]
    fn different_length_keys_are_unequal() {
        assert!(!constant_time_eq("short", "much-longer-key"));
    }

    #[test]
    fn presented_key_must_match_one_configured_key() {
        let configured = vec!["key-a".to_string(), "key-b".to_string()];
        assert!(key_is_valid(&configured, "key-b"));
        assert!(!key_is_valid(&configured, "key-c"));
    }
}
