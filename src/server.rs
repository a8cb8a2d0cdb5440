//!
//! lendgate HTTP server
//! --------------------
//! Axum router for the lending API. Every `/api/v1` route runs behind the
//! interceptor chain in `middleware`:
//!
//! identity resolution -> role gate -> kiosk context -> kiosk restriction (mutating admin routes only)
//!
//! Handlers receive an immutable `RequestContext` and call into the
//! repositories; repositories publish mutation events on success.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use chrono::Duration;
use tracing::info;

use crate::clock::{SharedClock, SystemClock};
use crate::config::{BootstrapAccount, Config, UnlockPolicy};
use crate::error::AppResult;
use crate::events::EventBus;
use crate::identity::Role;
use crate::repo::{Repos, UserCreate, UserOut};
use crate::storage::SharedStore;

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;

/// Shared server state injected into all handlers and interceptors.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repos,
    pub clock: SharedClock,
    pub unlock: UnlockPolicy,
    pub bus: Option<EventBus>,
}

impl AppState {
    pub fn new(store: SharedStore, clock: SharedClock, unlock: UnlockPolicy, bus: Option<EventBus>) -> Self {
        Self { repos: Repos::new(store, clock.clone(), bus.clone()), clock, unlock, bus }
    }
}

pub fn build_router(state: AppState) -> Router { routes::router(state) }

/// Seed a group, an admin user and a fixed token so a fresh instance is reachable.
pub fn bootstrap(state: &AppState, account: &BootstrapAccount, token_ttl: Duration) -> AppResult<UserOut> {
    let users = &state.repos.users;
    let group = users.create_group("Default")?;
    let user = users.create(UserCreate {
        group_id: group.id,
        name: "Administrator".to_string(),
        email: account.email.clone(),
        password: Some(account.password.clone()),
        roles: vec![Role::User, Role::Admin],
    })?;
    let expires_at = users.insert_token(user.id, &account.token, token_ttl)?;
    info!(target: "lendgate::startup", user_id = %user.id, group_id = %group.id, %expires_at, "bootstrap account ready");
    Ok(user)
}

/// Start the lendgate HTTP server with the given configuration.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let clock: SharedClock = Arc::new(SystemClock);
    let bus = config.events_enabled.then(|| EventBus::new(config.event_capacity));
    let state = AppState::new(SharedStore::new(), clock, config.unlock, bus);

    if let Some(account) = &config.bootstrap {
        bootstrap(&state, account, Duration::hours(config.token_ttl_hours))
            .with_context(|| format!("While seeding bootstrap account {}", account.email))?;
    }

    let app = build_router(state);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {addr}"))?;
    info!(target: "lendgate::startup", "HTTP listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
