//! Groups, users, auth tokens and the minimal item catalog.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::error::{AppError, AppResult};
use crate::identity::{CredentialStore, Identity, Role, RoleSet};
use crate::security;
use crate::storage::{GroupRow, ItemRow, SharedStore, TokenRow, UserRow};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOut {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOut {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
    #[serde(skip)]
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserCreate {
    pub group_id: Uuid,
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOut {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub asset_id: i64,
}

fn map_user(row: &UserRow) -> UserOut {
    UserOut {
        id: row.id,
        group_id: row.group_id,
        name: row.name.clone(),
        email: row.email.clone(),
        roles: RoleSet::from_names(&row.roles).iter().collect(),
        password_hash: row.password_hash.clone(),
    }
}

fn role_names(roles: &[Role]) -> Vec<String> { roles.iter().map(|r| r.as_str().to_string()).collect() }

#[derive(Clone)]
pub struct UserRepository {
    store: SharedStore,
    clock: SharedClock,
}

impl UserRepository {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self { Self { store, clock } }

    pub fn create_group(&self, name: &str) -> AppResult<GroupOut> {
        let row = GroupRow { id: Uuid::new_v4(), name: name.to_string(), created_at: self.clock.now() };
        let out = GroupOut { id: row.id, name: row.name.clone() };
        self.store.lock().insert_group(row)?;
        Ok(out)
    }

    pub fn create(&self, data: UserCreate) -> AppResult<UserOut> {
        let password_hash = match data.password.as_deref() {
            Some(pw) if !pw.is_empty() => Some(security::hash_password(pw)?),
            _ => None,
        };
        let now = self.clock.now();
        let row = UserRow {
            id: Uuid::new_v4(),
            group_id: data.group_id,
            name: data.name,
            email: data.email,
            password_hash,
            roles: role_names(&data.roles),
            created_at: now,
            updated_at: now,
        };
        let out = map_user(&row);
        self.store.lock().insert_user(row)?;
        info!(target: "lendgate::auth", user_id = %out.id, group_id = %out.group_id, "user created");
        Ok(out)
    }

    pub fn get_one(&self, id: Uuid) -> AppResult<UserOut> {
        let store = self.store.lock();
        store
            .user(id)?
            .map(map_user)
            .ok_or_else(|| AppError::not_found("user_not_found", "user not found"))
    }

    pub fn set_roles(&self, id: Uuid, roles: &[Role]) -> AppResult<()> {
        let now = self.clock.now();
        let names = role_names(roles);
        let n = self.store.lock().update_user(id, |u| {
            u.roles = names;
            u.updated_at = now;
        })?;
        if n == 0 {
            return Err(AppError::not_found("user_not_found", "user not found"));
        }
        Ok(())
    }

    /// Deletes the user together with their tokens and kiosk session.
    pub fn delete(&self, id: Uuid) -> AppResult<()> {
        if self.store.lock().delete_user(id)? == 0 {
            return Err(AppError::not_found("user_not_found", "user not found"));
        }
        Ok(())
    }

    /// Register a caller-chosen token for `user_id`.
    pub fn insert_token(&self, user_id: Uuid, token: &str, ttl: Duration) -> AppResult<DateTime<Utc>> {
        let now = self.clock.now();
        let expires_at = now + ttl;
        self.store.lock().insert_token(TokenRow { token: token.to_string(), user_id, expires_at, created_at: now })?;
        Ok(expires_at)
    }

    pub fn issue_token(&self, user_id: Uuid, ttl: Duration) -> AppResult<String> {
        let token = security::generate_token()?;
        self.insert_token(user_id, &token, ttl)?;
        Ok(token)
    }

    pub fn create_item(&self, group_id: Uuid, name: &str, asset_id: i64) -> AppResult<ItemOut> {
        let row = ItemRow { id: Uuid::new_v4(), group_id, name: name.to_string(), asset_id, created_at: self.clock.now() };
        let out = ItemOut { id: row.id, group_id, name: row.name.clone(), asset_id };
        self.store.lock().insert_item(row)?;
        Ok(out)
    }
}

impl CredentialStore for UserRepository {
    fn identity_for_token(&self, token: &str) -> AppResult<Option<Identity>> {
        let now = self.clock.now();
        let store = self.store.lock();
        let Some(tok) = store.token(token)? else { return Ok(None) };
        if now >= tok.expires_at {
            return Ok(None);
        }
        Ok(store.user(tok.user_id)?.map(|u| Identity {
            user_id: u.id,
            group_id: u.group_id,
            name: u.name.clone(),
            email: u.email.clone(),
            token: token.to_string(),
        }))
    }

    fn roles_for_token(&self, token: &str) -> AppResult<Option<RoleSet>> {
        let now = self.clock.now();
        let store = self.store.lock();
        let Some(tok) = store.token(token)? else { return Ok(None) };
        if now >= tok.expires_at {
            return Ok(None);
        }
        Ok(store.user(tok.user_id)?.map(|u| RoleSet::from_names(&u.roles)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn repo() -> (UserRepository, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        (UserRepository::new(SharedStore::new(), clock.clone()), clock)
    }

    fn user(r: &UserRepository, roles: &[Role]) -> UserOut {
        let g = r.create_group("Home").unwrap();
        r.create(UserCreate {
            group_id: g.id,
            name: "Grace".into(),
            email: "grace@example.com".into(),
            password: None,
            roles: roles.to_vec(),
        })
        .unwrap()
    }

    #[test]
    fn token_expires() {
        let (r, clock) = repo();
        let u = user(&r, &[Role::User]);
        let token = r.issue_token(u.id, Duration::hours(1)).unwrap();
        assert_eq!(r.identity_for_token(&token).unwrap().map(|i| i.user_id), Some(u.id));
        clock.advance(Duration::hours(1));
        assert!(r.identity_for_token(&token).unwrap().is_none());
        assert!(r.roles_for_token(&token).unwrap().is_none());
    }

    #[test]
    fn role_changes_visible_on_next_lookup() {
        let (r, _) = repo();
        let u = user(&r, &[Role::User]);
        r.insert_token(u.id, "tok", Duration::hours(1)).unwrap();
        assert!(r.roles_for_token("tok").unwrap().unwrap().contains(Role::User));
        r.set_roles(u.id, &[Role::Admin]).unwrap();
        let roles = r.roles_for_token("tok").unwrap().unwrap();
        assert!(!roles.contains(Role::User));
        assert!(roles.contains(Role::Admin));
    }

    #[test]
    fn deleting_user_revokes_tokens() {
        let (r, _) = repo();
        let u = user(&r, &[Role::User]);
        r.insert_token(u.id, "tok", Duration::hours(1)).unwrap();
        r.delete(u.id).unwrap();
        assert!(r.identity_for_token("tok").unwrap().is_none());
        assert_eq!(r.delete(u.id).unwrap_err().http_status(), 404);
    }
}
