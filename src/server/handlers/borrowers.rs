use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::error::AppResult;
use crate::identity::RequestContext;
use crate::repo::{BorrowerCreate, BorrowerOut, BorrowerSummary, BorrowerUpdate, LoanSummary};
use crate::server::extract::{PathId, Payload};
use crate::server::AppState;

pub async fn list(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<BorrowerSummary>>> {
    Ok(Json(state.repos.borrowers.get_all(ctx.gid())?))
}

pub async fn list_active(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<BorrowerSummary>>> {
    Ok(Json(state.repos.borrowers.get_active(ctx.gid())?))
}

/// Allowed from a locked kiosk; such borrowers are flagged as self-registered.
pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Payload(data): Payload<BorrowerCreate>,
) -> AppResult<(StatusCode, Json<BorrowerOut>)> {
    let borrower = state.repos.borrowers.create(ctx.gid(), ctx.is_kiosk(), data)?;
    Ok((StatusCode::CREATED, Json(borrower)))
}

pub async fn get_one(State(state): State<AppState>, ctx: RequestContext, PathId(id): PathId) -> AppResult<Json<BorrowerOut>> {
    Ok(Json(state.repos.borrowers.get_one_by_group(ctx.gid(), id)?))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    PathId(id): PathId,
    Payload(data): Payload<BorrowerUpdate>,
) -> AppResult<Json<BorrowerOut>> {
    Ok(Json(state.repos.borrowers.update_by_group(ctx.gid(), id, data)?))
}

pub async fn delete(State(state): State<AppState>, ctx: RequestContext, PathId(id): PathId) -> AppResult<StatusCode> {
    state.repos.borrowers.delete_by_group(ctx.gid(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn loans(State(state): State<AppState>, ctx: RequestContext, PathId(id): PathId) -> AppResult<Json<Vec<LoanSummary>>> {
    Ok(Json(state.repos.loans.get_loans_by_borrower(ctx.gid(), id)?))
}
