//!
//! lendgate storage module
//! -----------------------
//! In-process relational store backing every repository. Tables are keyed by
//! primary id and carry the constraints the repositories rely on:
//!
//! - foreign keys checked on insert (loan -> item/borrower/group, session -> user)
//! - a unique index on `kiosk_sessions.user_id`
//! - a positive check on `loans.quantity`
//! - cascading deletes (user -> tokens/sessions, borrower -> loans)
//!
//! Conditional updates take a row predicate and report how many rows they
//! touched, so check-and-set operations run under a single lock acquisition.
//!
//! The public API centers around the `Store` type, which is wrapped in a
//! thread-safe `SharedStore` (`Arc<Mutex<Store>>`) elsewhere in the codebase.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

mod kiosk;
mod lending;
pub mod rows;

pub use rows::{BorrowerRow, GroupRow, ItemRow, KioskSessionRow, LoanRow, TokenRow, UserRow};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated on {table}.{column}")]
    UniqueViolation { table: &'static str, column: &'static str },
    #[error("foreign key violated on {table}.{column}")]
    ForeignKey { table: &'static str, column: &'static str },
    #[error("check constraint violated on {table}.{column}")]
    Check { table: &'static str, column: &'static str },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Default)]
pub struct Store {
    groups: HashMap<Uuid, GroupRow>,
    users: HashMap<Uuid, UserRow>,
    users_by_email: HashMap<String, Uuid>,
    tokens: HashMap<String, TokenRow>,
    items: HashMap<Uuid, ItemRow>,
    borrowers: HashMap<Uuid, BorrowerRow>,
    loans: HashMap<Uuid, LoanRow>,
    kiosk_sessions: HashMap<Uuid, KioskSessionRow>,
    kiosk_by_user: HashMap<Uuid, Uuid>,
    closed: bool,
}

impl Store {
    pub fn new() -> Self { Self::default() }

    /// Refuse all further reads and writes. Used to exercise fail-closed paths.
    pub fn close(&mut self) { self.closed = true; }

    pub(crate) fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Unavailable("store is closed".into()));
        }
        Ok(())
    }

    // ---- groups ----

    pub fn insert_group(&mut self, row: GroupRow) -> StoreResult<()> {
        self.ensure_open()?;
        if self.groups.contains_key(&row.id) {
            return Err(StoreError::UniqueViolation { table: "groups", column: "id" });
        }
        self.groups.insert(row.id, row);
        Ok(())
    }

    pub fn group(&self, id: Uuid) -> StoreResult<Option<&GroupRow>> {
        self.ensure_open()?;
        Ok(self.groups.get(&id))
    }

    // ---- users & tokens ----

    pub fn insert_user(&mut self, row: UserRow) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.groups.contains_key(&row.group_id) {
            return Err(StoreError::ForeignKey { table: "users", column: "group_id" });
        }
        let email = row.email.to_lowercase();
        if self.users.contains_key(&row.id) || self.users_by_email.contains_key(&email) {
            return Err(StoreError::UniqueViolation { table: "users", column: "email" });
        }
        self.users_by_email.insert(email, row.id);
        self.users.insert(row.id, row);
        Ok(())
    }

    pub fn user(&self, id: Uuid) -> StoreResult<Option<&UserRow>> {
        self.ensure_open()?;
        Ok(self.users.get(&id))
    }

    pub fn update_user<F: FnOnce(&mut UserRow)>(&mut self, id: Uuid, apply: F) -> StoreResult<usize> {
        self.ensure_open()?;
        match self.users.get_mut(&id) {
            Some(row) => {
                apply(row);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Delete a user along with their tokens and kiosk session.
    pub fn delete_user(&mut self, id: Uuid) -> StoreResult<usize> {
        self.ensure_open()?;
        let Some(row) = self.users.remove(&id) else { return Ok(0) };
        self.users_by_email.remove(&row.email.to_lowercase());
        self.tokens.retain(|_, t| t.user_id != id);
        if let Some(sid) = self.kiosk_by_user.remove(&id) {
            self.kiosk_sessions.remove(&sid);
        }
        Ok(1)
    }

    pub fn insert_token(&mut self, row: TokenRow) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.users.contains_key(&row.user_id) {
            return Err(StoreError::ForeignKey { table: "auth_tokens", column: "user_id" });
        }
        if self.tokens.contains_key(&row.token) {
            return Err(StoreError::UniqueViolation { table: "auth_tokens", column: "token" });
        }
        self.tokens.insert(row.token.clone(), row);
        Ok(())
    }

    pub fn token(&self, token: &str) -> StoreResult<Option<&TokenRow>> {
        self.ensure_open()?;
        Ok(self.tokens.get(token))
    }

    // ---- items ----

    pub fn insert_item(&mut self, row: ItemRow) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.groups.contains_key(&row.group_id) {
            return Err(StoreError::ForeignKey { table: "items", column: "group_id" });
        }
        if self.items.contains_key(&row.id) {
            return Err(StoreError::UniqueViolation { table: "items", column: "id" });
        }
        self.items.insert(row.id, row);
        Ok(())
    }

    pub fn item(&self, id: Uuid) -> StoreResult<Option<&ItemRow>> {
        self.ensure_open()?;
        Ok(self.items.get(&id))
    }
}

#[derive(Clone, Default)]
pub struct SharedStore(pub Arc<Mutex<Store>>);

impl SharedStore {
    pub fn new() -> Self { Self(Arc::new(Mutex::new(Store::new()))) }

    /// Lock the store. Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Store> { self.0.lock() }
}
