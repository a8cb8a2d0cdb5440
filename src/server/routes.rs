//! Route table. Each route carries its kiosk restriction class as data, and
//! the kiosk restriction interceptor is attached only where the class asks for it.

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put, MethodRouter};
use axum::Router;

use super::handlers::{borrowers, kiosk, loans, status};
use super::middleware::{kiosk_context, kiosk_restrict, require_roles, resolve_identity, RoleGateState};
use super::AppState;
use crate::identity::{Role, RoleGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restriction {
    /// Reads; never blocked.
    Read,
    /// Mutations a locked kiosk may still perform (checkout, return, self-registration, kiosk control).
    KioskExempt,
    /// Administrative mutations; require an unlocked kiosk when kiosk mode is on.
    KioskRestricted,
}

pub struct RouteEntry {
    pub path: &'static str,
    pub handler: MethodRouter<AppState>,
    pub restriction: Restriction,
}

fn entry(path: &'static str, handler: MethodRouter<AppState>, restriction: Restriction) -> RouteEntry {
    RouteEntry { path, handler, restriction }
}

/// All authenticated routes, relative to `/api/v1`.
pub fn api_routes() -> Vec<RouteEntry> {
    use Restriction::*;
    vec![
        entry("/borrowers", get(borrowers::list), Read),
        entry("/borrowers", post(borrowers::create), KioskExempt),
        entry("/borrowers/active", get(borrowers::list_active), Read),
        entry("/borrowers/{id}", get(borrowers::get_one), Read),
        entry("/borrowers/{id}", put(borrowers::update).delete(borrowers::delete), KioskRestricted),
        entry("/borrowers/{id}/loans", get(borrowers::loans), Read),
        entry("/loans", get(loans::list_active), Read),
        entry("/loans", post(loans::create), KioskExempt),
        entry("/loans/overdue", get(loans::list_overdue), Read),
        entry("/loans/{id}", get(loans::get_one), Read),
        entry("/loans/{id}", put(loans::update).delete(loans::delete), KioskRestricted),
        entry("/loans/{id}/return", post(loans::return_loan), KioskExempt),
        entry("/items/{id}/loans", get(loans::by_item), Read),
        entry("/items/{id}/current-loan", get(loans::current_for_item), Read),
        entry("/kiosk/status", get(kiosk::status), Read),
        entry("/kiosk/activate", post(kiosk::activate), KioskExempt),
        entry("/kiosk/deactivate", post(kiosk::deactivate), KioskExempt),
        entry("/kiosk/unlock", post(kiosk::unlock), KioskExempt),
        entry("/kiosk/lock", post(kiosk::lock), KioskExempt),
    ]
}

fn guarded(route: RouteEntry) -> MethodRouter<AppState> {
    match route.restriction {
        Restriction::KioskRestricted => route.handler.layer(from_fn(kiosk_restrict)),
        Restriction::Read | Restriction::KioskExempt => route.handler,
    }
}

pub fn router(state: AppState) -> Router {
    let gate = RoleGateState::new(state.clone(), RoleGate::any(&[Role::User]));
    let api = api_routes()
        .into_iter()
        .fold(Router::new(), |r, route| {
            let path = route.path;
            r.route(path, guarded(route))
        })
        // The last layer added runs first: identity, then roles, then kiosk context.
        .layer(from_fn_with_state(state.clone(), kiosk_context))
        .layer(from_fn_with_state(gate, require_roles))
        .layer(from_fn_with_state(state.clone(), resolve_identity));

    Router::new()
        .route("/api/v1/status", get(status))
        .nest("/api/v1", api)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_edits_are_restricted() {
        let restricted: Vec<&str> = api_routes()
            .into_iter()
            .filter(|r| r.restriction == Restriction::KioskRestricted)
            .map(|r| r.path)
            .collect();
        assert_eq!(restricted, vec!["/borrowers/{id}", "/loans/{id}"]);
    }
}
