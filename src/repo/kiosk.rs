//! Per-user kiosk session state machine.
//!
//! Observable phases are `NoSession`, `Inactive`, `ActiveLocked` and
//! `ActiveUnlocked`. Only `is_active` and `unlocked_until` are stored; the
//! unlocked flag is always derived from the deadline against the clock.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::error::{AppError, AppResult};
use crate::identity::KioskState;
use crate::storage::{KioskSessionRow, SharedStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlocked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KioskSession {
    /// Unlocked strictly before the deadline; at the deadline the window is closed.
    pub fn is_unlocked_at(&self, now: DateTime<Utc>) -> bool {
        self.unlocked_until.is_some_and(|until| now < until)
    }
}

impl From<&KioskSessionRow> for KioskSession {
    fn from(row: &KioskSessionRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            is_active: row.is_active,
            unlocked_until: row.unlocked_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KioskPhase {
    NoSession,
    Inactive,
    ActiveLocked,
    ActiveUnlocked,
}

impl KioskPhase {
    pub fn of(session: Option<&KioskSession>, now: DateTime<Utc>) -> Self {
        match session {
            None => KioskPhase::NoSession,
            Some(s) if !s.is_active => KioskPhase::Inactive,
            Some(s) if s.is_unlocked_at(now) => KioskPhase::ActiveUnlocked,
            Some(_) => KioskPhase::ActiveLocked,
        }
    }

    pub fn kiosk_state(self) -> KioskState {
        match self {
            KioskPhase::NoSession | KioskPhase::Inactive => KioskState { is_kiosk: false, is_unlocked: false },
            KioskPhase::ActiveLocked => KioskState { is_kiosk: true, is_unlocked: false },
            KioskPhase::ActiveUnlocked => KioskState { is_kiosk: true, is_unlocked: true },
        }
    }
}

#[derive(Clone)]
pub struct KioskSessionRepository {
    store: SharedStore,
    clock: SharedClock,
}

impl KioskSessionRepository {
    pub fn new(store: SharedStore, clock: SharedClock) -> Self { Self { store, clock } }

    /// `None` is the normal answer for a user who never entered kiosk mode.
    pub fn get_by_user(&self, user_id: Uuid) -> AppResult<Option<KioskSession>> {
        Ok(self.store.lock().kiosk_session_by_user(user_id)?.map(KioskSession::from))
    }

    pub fn phase(&self, user_id: Uuid) -> AppResult<KioskPhase> {
        let session = self.get_by_user(user_id)?;
        Ok(KioskPhase::of(session.as_ref(), self.clock.now()))
    }

    /// Request-scoped kiosk flags. Storage failures propagate.
    pub fn kiosk_state(&self, user_id: Uuid) -> AppResult<KioskState> { Ok(self.phase(user_id)?.kiosk_state()) }

    /// Upsert the session as active and locked. Safe to call concurrently for one user:
    /// the unique index on `user_id` decides the race and the loser updates the winner's row.
    pub fn activate(&self, user_id: Uuid) -> AppResult<KioskSession> {
        if let Some(existing) = self.get_by_user(user_id)? {
            return self.reactivate(existing.id);
        }
        let now = self.clock.now();
        let row = KioskSessionRow { id: Uuid::new_v4(), user_id, is_active: true, unlocked_until: None, created_at: now, updated_at: now };
        let inserted = KioskSession::from(&row);
        let outcome = self.store.lock().insert_kiosk_session(row);
        match outcome {
            Ok(()) => {
                info!(target: "lendgate::kiosk", %user_id, "kiosk session created");
                return Ok(inserted);
            }
            Err(StoreError::UniqueViolation { .. }) => {
                debug!(target: "lendgate::kiosk", %user_id, "activation raced an insert; updating existing session");
            }
            Err(e) => return Err(e.into()),
        }
        let existing = self
            .get_by_user(user_id)?
            .ok_or_else(|| AppError::internal("kiosk_session_vanished", "kiosk session disappeared during activation"))?;
        self.reactivate(existing.id)
    }

    fn reactivate(&self, session_id: Uuid) -> AppResult<KioskSession> {
        let now = self.clock.now();
        let mut store = self.store.lock();
        let n = store.update_kiosk_session(session_id, |_| true, |s| {
            s.is_active = true;
            s.unlocked_until = None;
            s.updated_at = now;
        })?;
        if n == 0 {
            return Err(AppError::not_found("kiosk_session_not_found", "kiosk session not found"));
        }
        let session = store
            .kiosk_session(session_id)?
            .map(KioskSession::from)
            .ok_or_else(|| AppError::not_found("kiosk_session_not_found", "kiosk session not found"))?;
        info!(target: "lendgate::kiosk", user_id = %session.user_id, "kiosk session activated");
        Ok(session)
    }

    /// Leave kiosk mode. No session is not an error.
    pub fn deactivate(&self, user_id: Uuid) -> AppResult<()> {
        let now = self.clock.now();
        let mut store = self.store.lock();
        let Some(sid) = store.kiosk_session_by_user(user_id)?.map(|s| s.id) else { return Ok(()) };
        store.update_kiosk_session(sid, |_| true, |s| {
            s.is_active = false;
            s.unlocked_until = None;
            s.updated_at = now;
        })?;
        info!(target: "lendgate::kiosk", %user_id, "kiosk session deactivated");
        Ok(())
    }

    /// Open an unlock window of `duration`. Returns `None` when there is no active session.
    /// The caller owns any ceiling on `duration`.
    pub fn unlock(&self, user_id: Uuid, duration: Duration) -> AppResult<Option<KioskSession>> {
        if duration <= Duration::zero() {
            return Err(AppError::validation("invalid_duration", "unlock duration must be positive"));
        }
        let now = self.clock.now();
        let Some(until) = now.checked_add_signed(duration) else {
            return Err(AppError::validation("invalid_duration", "unlock duration is out of range"));
        };
        let mut store = self.store.lock();
        let Some(sid) = store.kiosk_session_by_user(user_id)?.map(|s| s.id) else { return Ok(None) };
        let n = store.update_kiosk_session(sid, |s| s.is_active, |s| {
            s.unlocked_until = Some(until);
            s.updated_at = now;
        })?;
        if n == 0 {
            return Ok(None);
        }
        info!(target: "lendgate::kiosk", %user_id, unlocked_until = %until, "kiosk unlocked");
        Ok(store.kiosk_session_by_user(user_id)?.map(KioskSession::from))
    }

    /// Close the unlock window but stay in kiosk mode. No session is not an error.
    pub fn lock(&self, user_id: Uuid) -> AppResult<()> {
        let now = self.clock.now();
        let mut store = self.store.lock();
        let Some(sid) = store.kiosk_session_by_user(user_id)?.map(|s| s.id) else { return Ok(()) };
        store.update_kiosk_session(sid, |_| true, |s| {
            s.unlocked_until = None;
            s.updated_at = now;
        })?;
        info!(target: "lendgate::kiosk", %user_id, "kiosk locked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::repo::users::{UserCreate, UserRepository};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn setup() -> (KioskSessionRepository, Arc<ManualClock>, Uuid) {
        let store = SharedStore::new();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()));
        let users = UserRepository::new(store.clone(), clock.clone());
        let g = users.create_group("g").unwrap();
        let u = users
            .create(UserCreate { group_id: g.id, name: "k".into(), email: "k@x.io".into(), password: None, roles: vec![] })
            .unwrap();
        (KioskSessionRepository::new(store, clock.clone()), clock, u.id)
    }

    #[test]
    fn phases_follow_operations() {
        let (repo, clock, uid) = setup();
        assert_eq!(repo.phase(uid).unwrap(), KioskPhase::NoSession);
        repo.activate(uid).unwrap();
        assert_eq!(repo.phase(uid).unwrap(), KioskPhase::ActiveLocked);
        repo.unlock(uid, Duration::minutes(5)).unwrap().unwrap();
        assert_eq!(repo.phase(uid).unwrap(), KioskPhase::ActiveUnlocked);
        clock.advance(Duration::minutes(5));
        assert_eq!(repo.phase(uid).unwrap(), KioskPhase::ActiveLocked);
        repo.deactivate(uid).unwrap();
        assert_eq!(repo.phase(uid).unwrap(), KioskPhase::Inactive);
        assert!(!repo.kiosk_state(uid).unwrap().is_kiosk);
    }

    #[test]
    fn reactivation_clears_unlock_window() {
        let (repo, _, uid) = setup();
        let first = repo.activate(uid).unwrap();
        repo.unlock(uid, Duration::minutes(10)).unwrap();
        let second = repo.activate(uid).unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.unlocked_until.is_none());
    }

    #[test]
    fn no_ceiling_in_state_machine_but_duration_must_be_positive() {
        let (repo, clock, uid) = setup();
        repo.activate(uid).unwrap();
        let s = repo.unlock(uid, Duration::hours(4)).unwrap().unwrap();
        assert_eq!(s.unlocked_until, Some(clock.now() + Duration::hours(4)));
        assert_eq!(repo.unlock(uid, Duration::zero()).unwrap_err().http_status(), 400);
    }

    #[test]
    fn unrepresentable_deadline_is_rejected_and_leaves_session_locked() {
        let (repo, _, uid) = setup();
        repo.activate(uid).unwrap();
        let err = repo.unlock(uid, Duration::MAX).unwrap_err();
        assert_eq!(err.code_str(), "invalid_duration");
        assert_eq!(repo.phase(uid).unwrap(), KioskPhase::ActiveLocked);
        assert!(repo.get_by_user(uid).unwrap().unwrap().unlocked_until.is_none());
    }
}
