//! Bearer token discovery and resolution against the credential store.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use tracing::debug;

use super::{Identity, RoleSet};
use crate::error::{AppError, AppResult};

pub const AUTH_COOKIE: &str = "lendgate.auth.token";
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

/// Durable token -> user mapping. Implementations must not cache across calls.
pub trait CredentialStore: Send + Sync {
    /// `None` for unknown or expired tokens.
    fn identity_for_token(&self, token: &str) -> AppResult<Option<Identity>>;
    /// Current roles of the token's owner, `None` if the token no longer resolves.
    fn roles_for_token(&self, token: &str) -> AppResult<Option<RoleSet>>;
}

/// Token precedence: cookie, then Authorization header, then `access_token` query parameter.
pub fn discover_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let raw = cookie_token(headers)
        .or_else(|| header_token(headers))
        .or_else(|| query.and_then(query_token))?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw.as_str()).trim().to_string();
    if token.is_empty() { None } else { Some(token) }
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    for value in headers.get_all(COOKIE) {
        let Ok(s) = value.to_str() else { continue };
        for part in s.split(';') {
            let p = part.trim();
            if let Some((k, v)) = p.split_once('=') {
                if k == AUTH_COOKIE && !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(AUTHORIZATION)?.to_str().ok()?;
    if v.is_empty() { None } else { Some(v.to_string()) }
}

fn query_token(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == ACCESS_TOKEN_PARAM)
        // Form encoding: `+` is a space.
        .and_then(|(_, v)| urlencoding::decode(&v.replace('+', " ")).ok().map(|d| d.into_owned()))
        .filter(|v| !v.is_empty())
}

/// Resolve the caller or fail with `Unauthenticated`.
pub fn resolve_identity<C>(creds: &C, headers: &HeaderMap, query: Option<&str>) -> AppResult<Identity>
where
    C: CredentialStore + ?Sized,
{
    let Some(token) = discover_token(headers, query) else {
        debug!(target: "lendgate::auth", "no credential supplied");
        return Err(AppError::unauthenticated("missing_token", "authorization header or query is required"));
    };
    match creds.identity_for_token(&token)? {
        Some(identity) => Ok(identity),
        None => {
            debug!(target: "lendgate::auth", "token lookup missed");
            Err(AppError::unauthenticated("invalid_token", "valid authorization token is required"))
        }
    }
}
