//! Kiosk session table with a unique index on `user_id`.

use uuid::Uuid;

use super::{KioskSessionRow, Store, StoreError, StoreResult};

impl Store {
    pub fn kiosk_session_by_user(&self, user_id: Uuid) -> StoreResult<Option<&KioskSessionRow>> {
        self.ensure_open()?;
        Ok(self.kiosk_by_user.get(&user_id).and_then(|sid| self.kiosk_sessions.get(sid)))
    }

    pub fn kiosk_session(&self, id: Uuid) -> StoreResult<Option<&KioskSessionRow>> {
        self.ensure_open()?;
        Ok(self.kiosk_sessions.get(&id))
    }

    pub fn insert_kiosk_session(&mut self, row: KioskSessionRow) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.users.contains_key(&row.user_id) {
            return Err(StoreError::ForeignKey { table: "kiosk_sessions", column: "user_id" });
        }
        if self.kiosk_by_user.contains_key(&row.user_id) {
            return Err(StoreError::UniqueViolation { table: "kiosk_sessions", column: "user_id" });
        }
        self.kiosk_by_user.insert(row.user_id, row.id);
        self.kiosk_sessions.insert(row.id, row);
        Ok(())
    }

    /// Apply `apply` to the session with `id` if `pred` holds for it.
    pub fn update_kiosk_session<P, F>(&mut self, id: Uuid, pred: P, apply: F) -> StoreResult<usize>
    where
        P: Fn(&KioskSessionRow) -> bool,
        F: FnOnce(&mut KioskSessionRow),
    {
        self.ensure_open()?;
        match self.kiosk_sessions.get_mut(&id) {
            Some(row) if pred(row) => {
                apply(row);
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
