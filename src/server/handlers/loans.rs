use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::error::AppResult;
use crate::identity::RequestContext;
use crate::repo::{LoanCreate, LoanOut, LoanReturn, LoanSummary, LoanUpdate};
use crate::server::extract::{optional_json, PathId, Payload};
use crate::server::AppState;

pub async fn list_active(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<LoanSummary>>> {
    Ok(Json(state.repos.loans.get_active_loans(ctx.gid())?))
}

pub async fn list_overdue(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<LoanSummary>>> {
    Ok(Json(state.repos.loans.get_overdue_loans(ctx.gid())?))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Payload(data): Payload<LoanCreate>,
) -> AppResult<(StatusCode, Json<LoanOut>)> {
    let loan = state.repos.loans.create(ctx.gid(), ctx.uid(), ctx.is_kiosk(), data)?;
    Ok((StatusCode::CREATED, Json(loan)))
}

pub async fn get_one(State(state): State<AppState>, ctx: RequestContext, PathId(id): PathId) -> AppResult<Json<LoanOut>> {
    Ok(Json(state.repos.loans.get_one_by_group(ctx.gid(), id)?))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    PathId(id): PathId,
    Payload(data): Payload<LoanUpdate>,
) -> AppResult<Json<LoanOut>> {
    Ok(Json(state.repos.loans.update_by_group(ctx.gid(), id, data)?))
}

/// Body is optional; `{"returnNotes": "..."}` when present.
pub async fn return_loan(State(state): State<AppState>, ctx: RequestContext, PathId(id): PathId, body: Bytes) -> AppResult<Json<LoanOut>> {
    let data: LoanReturn = optional_json(&body)?;
    Ok(Json(state.repos.loans.return_loan(ctx.gid(), ctx.uid(), ctx.is_kiosk(), id, data)?))
}

pub async fn delete(State(state): State<AppState>, ctx: RequestContext, PathId(id): PathId) -> AppResult<StatusCode> {
    state.repos.loans.delete_by_group(ctx.gid(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn by_item(State(state): State<AppState>, ctx: RequestContext, PathId(id): PathId) -> AppResult<Json<Vec<LoanSummary>>> {
    Ok(Json(state.repos.loans.get_loans_by_item(ctx.gid(), id)?))
}

/// `null` when the item has no open loan.
pub async fn current_for_item(State(state): State<AppState>, ctx: RequestContext, PathId(id): PathId) -> AppResult<Json<Option<LoanOut>>> {
    Ok(Json(state.repos.loans.get_active_loan_for_item(ctx.gid(), id)?))
}
