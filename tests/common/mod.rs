//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use lendgate::clock::{Clock, ManualClock};
use lendgate::config::UnlockPolicy;
use lendgate::events::EventBus;
use lendgate::identity::Role;
use lendgate::repo::{BorrowerCreate, LoanCreate, LoanOut, Repos, UserCreate};
use lendgate::server::{build_router, AppState};
use lendgate::storage::SharedStore;

pub fn epoch() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 10, 7, 9, 30, 0).unwrap() }

/// One tenant with one operator, one item and a bearer token for the operator.
pub struct Fixture {
    pub store: SharedStore,
    pub clock: Arc<ManualClock>,
    pub bus: EventBus,
    pub state: AppState,
    pub gid: Uuid,
    pub uid: Uuid,
    pub token: String,
    pub item: Uuid,
}

impl Fixture {
    pub fn new() -> Result<Self> { Self::build(None, &[Role::User]) }

    pub fn with_password(password: &str) -> Result<Self> { Self::build(Some(password), &[Role::User]) }

    pub fn build(password: Option<&str>, roles: &[Role]) -> Result<Self> {
        let store = SharedStore::new();
        let clock = Arc::new(ManualClock::new(epoch()));
        let bus = EventBus::new(64);
        let state = AppState::new(store.clone(), clock.clone(), UnlockPolicy::default(), Some(bus.clone()));
        let group = state.repos.users.create_group("Workshop")?;
        let user = state.repos.users.create(UserCreate {
            group_id: group.id,
            name: "Operator".into(),
            email: "operator@workshop.test".into(),
            password: password.map(str::to_string),
            roles: roles.to_vec(),
        })?;
        let token = state.repos.users.issue_token(user.id, Duration::days(365))?;
        let item = state.repos.users.create_item(group.id, "Cordless drill", 1001)?;
        Ok(Self { store, clock, bus, state, gid: group.id, uid: user.id, token, item: item.id })
    }

    pub fn repos(&self) -> &Repos { &self.state.repos }

    pub fn router(&self) -> Router { build_router(self.state.clone()) }

    /// A second tenant sharing the same store: (group, user, token, item).
    pub fn other_tenant(&self) -> Result<(Uuid, Uuid, String, Uuid)> {
        let users = &self.state.repos.users;
        let group = users.create_group("Other")?;
        let user = users.create(UserCreate {
            group_id: group.id,
            name: "Stranger".into(),
            email: "stranger@other.test".into(),
            password: None,
            roles: vec![Role::User],
        })?;
        let token = users.issue_token(user.id, Duration::days(365))?;
        let item = users.create_item(group.id, "Ladder", 7)?;
        Ok((group.id, user.id, token, item.id))
    }

    pub fn borrower(&self, name: &str, email: &str) -> Result<Uuid> {
        let b = self.repos().borrowers.create(
            self.gid,
            false,
            BorrowerCreate { name: name.into(), email: email.into(), ..Default::default() },
        )?;
        Ok(b.summary.id)
    }

    pub fn checkout(&self, borrower: Uuid, due_in: Duration, quantity: Option<i32>) -> Result<LoanOut> {
        Ok(self.repos().loans.create(
            self.gid,
            self.uid,
            false,
            LoanCreate { item_id: self.item, borrower_id: borrower, due_at: self.clock.now() + due_in, notes: String::new(), quantity },
        )?)
    }
}

/// Send one request through the router and decode the JSON body (Null when empty).
pub async fn send(app: &Router, req: Request<Body>) -> Result<(StatusCode, Value)> {
    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = resp.into_body().collect().await?.to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, json))
}

pub fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Result<Request<Body>> {
    let builder = Request::builder().method(method).uri(uri).header("authorization", format!("Bearer {token}"));
    let req = match body {
        Some(v) => builder.header("content-type", "application/json").body(Body::from(serde_json::to_vec(&v)?))?,
        None => builder.body(Body::empty())?,
    };
    Ok(req)
}
