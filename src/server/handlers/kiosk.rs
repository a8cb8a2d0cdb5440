use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::repo::KioskSession;
use crate::security;
use crate::server::extract::Payload;
use crate::server::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskStatusResponse {
    pub is_active: bool,
    pub is_unlocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_until: Option<DateTime<Utc>>,
}

impl KioskStatusResponse {
    fn inactive() -> Self { Self { is_active: false, is_unlocked: false, unlocked_until: None } }

    fn of(session: Option<&KioskSession>, now: DateTime<Utc>) -> Self {
        match session {
            Some(s) => Self { is_active: s.is_active, is_unlocked: s.is_unlocked_at(now), unlocked_until: s.unlocked_until },
            None => Self::inactive(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskUnlockRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

pub async fn status(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<KioskStatusResponse>> {
    let session = state.repos.kiosk.get_by_user(ctx.uid())?;
    Ok(Json(KioskStatusResponse::of(session.as_ref(), state.clock.now())))
}

pub async fn activate(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<KioskStatusResponse>> {
    let session = state.repos.kiosk.activate(ctx.uid())?;
    Ok(Json(KioskStatusResponse::of(Some(&session), state.clock.now())))
}

pub async fn deactivate(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<KioskStatusResponse>> {
    state.repos.kiosk.deactivate(ctx.uid())?;
    Ok(Json(KioskStatusResponse::inactive()))
}

pub async fn lock(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<KioskStatusResponse>> {
    state.repos.kiosk.lock(ctx.uid())?;
    let session = state.repos.kiosk.get_by_user(ctx.uid())?;
    Ok(Json(KioskStatusResponse::of(session.as_ref(), state.clock.now())))
}

/// Re-authenticate with the account password and open a bounded unlock window.
pub async fn unlock(
    State(state): State<AppState>,
    ctx: RequestContext,
    Payload(data): Payload<KioskUnlockRequest>,
) -> AppResult<Json<KioskStatusResponse>> {
    if data.password.is_empty() {
        return Err(AppError::validation("password_required", "password is required"));
    }
    let user = state.repos.users.get_one(ctx.uid())?;
    let Some(hash) = user.password_hash else {
        return Err(AppError::forbidden("password_unavailable", "password verification not available for this account"));
    };
    let password = data.password;
    let valid = tokio::task::spawn_blocking(move || security::verify_password(&hash, &password))
        .await
        .map_err(|e| AppError::internal("verify_join", e.to_string()))?;
    if !valid {
        warn!(target: "lendgate::kiosk", user_id = %ctx.uid(), "kiosk unlock with wrong password");
        return Err(AppError::forbidden("invalid_password", "invalid password"));
    }

    let duration = state.unlock.clamp(data.duration_minutes);
    match state.repos.kiosk.unlock(ctx.uid(), duration)? {
        Some(session) => {
            info!(target: "lendgate::kiosk", user_id = %ctx.uid(), minutes = duration.num_minutes(), "unlock window opened");
            Ok(Json(KioskStatusResponse::of(Some(&session), state.clock.now())))
        }
        None => Err(AppError::conflict("no_active_session", "no active kiosk session to unlock")),
    }
}
