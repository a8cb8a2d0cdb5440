//! Request interceptors. Each one either short-circuits with an `AppError` or
//! hands the request to `next`. Order is fixed by `routes::router`:
//! identity resolution, role gate, kiosk context, then the kiosk restriction
//! on routes declared `KioskRestricted`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, error};

use super::AppState;
use crate::error::AppError;
use crate::identity::{self, Identity, KioskState, RoleGate};

fn pipeline_fault(gate: &'static str, needs: &'static str) -> AppError {
    error!(target: "lendgate::auth", gate, needs, "interceptor invoked out of order");
    AppError::internal("pipeline_misordered", format!("{gate} ran before {needs}"))
}

/// Resolve the bearer token to an `Identity` and attach it to the request.
pub async fn resolve_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let identity = identity::resolve_identity(&state.repos.users, req.headers(), req.uri().query())?;
    debug!(target: "lendgate::auth", user_id = %identity.user_id, group_id = %identity.group_id, "identity resolved");
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[derive(Clone)]
pub struct RoleGateState {
    pub app: AppState,
    pub gate: Arc<RoleGate>,
}

impl RoleGateState {
    pub fn new(app: AppState, gate: RoleGate) -> Self { Self { app, gate: Arc::new(gate) } }
}

/// Check the caller's current roles against the gate. Roles are read fresh on every request.
pub async fn require_roles(State(gs): State<RoleGateState>, req: Request, next: Next) -> Result<Response, AppError> {
    let Some(identity) = req.extensions().get::<Identity>() else {
        return Err(pipeline_fault("role gate", "identity resolution"));
    };
    if let Err(e) = gs.gate.enforce(&gs.app.repos.users, &identity.token) {
        debug!(target: "lendgate::auth", user_id = %identity.user_id, "role gate denied request");
        return Err(e);
    }
    Ok(next.run(req).await)
}

/// Derive kiosk flags for the caller. A storage failure here fails the request.
pub async fn kiosk_context(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let Some(user_id) = req.extensions().get::<Identity>().map(|i| i.user_id) else {
        return Err(pipeline_fault("kiosk context", "identity resolution"));
    };
    let kiosk = state.repos.kiosk.kiosk_state(user_id)?;
    req.extensions_mut().insert(kiosk);
    Ok(next.run(req).await)
}

/// Block administrative mutations from a locked kiosk.
pub async fn kiosk_restrict(req: Request, next: Next) -> Result<Response, AppError> {
    let Some(kiosk) = req.extensions().get::<KioskState>().copied() else {
        return Err(pipeline_fault("kiosk restriction", "kiosk context"));
    };
    if let Err(e) = kiosk.ensure_admin_access() {
        debug!(target: "lendgate::kiosk", method = %req.method(), path = %req.uri().path(), "locked kiosk blocked mutation");
        return Err(e);
    }
    Ok(next.run(req).await)
}
