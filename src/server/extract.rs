//! Extractors that turn request pieces into domain values, rejecting with `AppError`.

use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::identity::{Identity, KioskState, RequestContext};

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(identity) = parts.extensions.get::<Identity>().cloned() else {
            error!(target: "lendgate::auth", path = %parts.uri.path(), "handler reached without a resolved identity");
            return Err(AppError::internal("identity_missing", "request identity was not resolved"));
        };
        let Some(kiosk) = parts.extensions.get::<KioskState>().copied() else {
            error!(target: "lendgate::kiosk", path = %parts.uri.path(), "handler reached without kiosk context");
            return Err(AppError::internal("kiosk_context_missing", "kiosk context was not resolved"));
        };
        Ok(RequestContext { identity, kiosk })
    }
}

/// UUID path parameter.
pub struct PathId(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for PathId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<Uuid>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(PathId(id)),
            Err(rej) => Err(AppError::validation("invalid_id", rej.body_text())),
        }
    }
}

/// JSON body whose rejections map to `Validation`.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(Payload(v)),
            Err(rej) => Err(AppError::validation("invalid_body", rej.body_text())),
        }
    }
}

/// Parse an optional JSON body; an empty body yields `T::default()`.
pub fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> AppResult<T> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::validation("invalid_body", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::LoanReturn;

    #[test]
    fn empty_optional_body_defaults() {
        let r: LoanReturn = optional_json(b"").unwrap();
        assert_eq!(r.return_notes, "");
        let r: LoanReturn = optional_json(br#"{"returnNotes":"ok"}"#).unwrap();
        assert_eq!(r.return_notes, "ok");
        assert_eq!(optional_json::<LoanReturn>(b"{").unwrap_err().http_status(), 400);
    }
}
