//! Loan lifecycle: checkout, extension, return, administrative delete, and the
//! group-scoped queries over open and overdue loans.
//!
//! Every predicate starts with the group id. Overdue is never stored; it is
//! computed from `due_at` against the clock each time a loan is materialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::error::{AppError, AppResult};
use crate::events::{self, EventBus, Topic};
use crate::storage::{LoanRow, SharedStore, Store};

pub const NOTES_MAX: usize = 1000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanCreate {
    pub item_id: Uuid,
    pub borrower_id: Uuid,
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanUpdate {
    pub due_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanReturn {
    #[serde(default)]
    pub return_notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub id: Uuid,
    pub checked_out_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub quantity: i32,
    pub is_overdue: bool,
    pub kiosk_action: bool,
    pub item_id: Uuid,
    pub item_name: String,
    pub borrower_id: Uuid,
    pub borrower_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanOut {
    #[serde(flatten)]
    pub summary: LoanSummary,
    pub notes: String,
    pub return_notes: String,
    pub item_asset_id: i64,
    pub borrower_email: String,
    pub borrower_phone: String,
    pub checked_out_by: Option<Uuid>,
    pub returned_by: Option<Uuid>,
}

fn is_overdue(row: &LoanRow, now: DateTime<Utc>) -> bool { row.returned_at.is_none() && row.due_at < now }

fn map_summary(store: &Store, row: &LoanRow, now: DateTime<Utc>) -> AppResult<LoanSummary> {
    let item_name = store.item(row.item_id)?.map(|i| i.name.clone()).unwrap_or_default();
    let borrower_name = store.borrower(row.borrower_id)?.map(|b| b.name.clone()).unwrap_or_default();
    Ok(LoanSummary {
        id: row.id,
        checked_out_at: row.checked_out_at,
        due_at: row.due_at,
        returned_at: row.returned_at,
        quantity: row.quantity,
        is_overdue: is_overdue(row, now),
        kiosk_action: row.kiosk_action,
        item_id: row.item_id,
        item_name,
        borrower_id: row.borrower_id,
        borrower_name,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn map_out(store: &Store, row: &LoanRow, now: DateTime<Utc>) -> AppResult<LoanOut> {
    let item = store.item(row.item_id)?;
    let borrower = store.borrower(row.borrower_id)?;
    Ok(LoanOut {
        summary: map_summary(store, row, now)?,
        notes: row.notes.clone(),
        return_notes: row.return_notes.clone(),
        item_asset_id: item.map(|i| i.asset_id).unwrap_or_default(),
        borrower_email: borrower.map(|b| b.email.clone()).unwrap_or_default(),
        borrower_phone: borrower.map(|b| b.phone.clone()).unwrap_or_default(),
        checked_out_by: row.checked_out_by,
        returned_by: row.returned_by,
    })
}

fn check_notes(field: &str, value: &str) -> AppResult<()> {
    if value.chars().count() > NOTES_MAX {
        return Err(AppError::validation("field_too_long", format!("{field} must be at most {NOTES_MAX} characters")));
    }
    Ok(())
}

fn loan_not_found() -> AppError { AppError::not_found("loan_not_found", "loan not found") }

#[derive(Clone)]
pub struct LoanRepository {
    store: SharedStore,
    clock: SharedClock,
    bus: Option<EventBus>,
}

impl LoanRepository {
    pub fn new(store: SharedStore, clock: SharedClock, bus: Option<EventBus>) -> Self { Self { store, clock, bus } }

    fn publish_mutation(&self, gid: Uuid) { events::publish(self.bus.as_ref(), Topic::LoanMutation, gid); }

    pub fn get_one_by_group(&self, gid: Uuid, id: Uuid) -> AppResult<LoanOut> {
        let now = self.clock.now();
        let store = self.store.lock();
        match store.loan(id)? {
            Some(row) if row.group_id == gid => map_out(&store, row, now),
            _ => Err(loan_not_found()),
        }
    }

    fn query<P, K>(&self, pred: P, sort_key: K, descending: bool) -> AppResult<Vec<LoanSummary>>
    where
        P: Fn(&LoanRow) -> bool,
        K: Fn(&LoanRow) -> DateTime<Utc>,
    {
        let now = self.clock.now();
        let store = self.store.lock();
        let mut rows = store.select_loans(|l| pred(l))?;
        rows.sort_by_key(|r| sort_key(r));
        if descending {
            rows.reverse();
        }
        rows.iter().map(|r| map_summary(&store, r, now)).collect()
    }

    /// Open loans, soonest due first.
    pub fn get_active_loans(&self, gid: Uuid) -> AppResult<Vec<LoanSummary>> {
        self.query(|l| l.group_id == gid && l.returned_at.is_none(), |l| l.due_at, false)
    }

    /// Open loans whose due date has passed, most overdue first.
    pub fn get_overdue_loans(&self, gid: Uuid) -> AppResult<Vec<LoanSummary>> {
        let now = self.clock.now();
        self.query(|l| l.group_id == gid && is_overdue(l, now), |l| l.due_at, false)
    }

    pub fn get_loans_by_borrower(&self, gid: Uuid, borrower_id: Uuid) -> AppResult<Vec<LoanSummary>> {
        self.query(|l| l.group_id == gid && l.borrower_id == borrower_id, |l| l.checked_out_at, true)
    }

    pub fn get_loans_by_item(&self, gid: Uuid, item_id: Uuid) -> AppResult<Vec<LoanSummary>> {
        self.query(|l| l.group_id == gid && l.item_id == item_id, |l| l.checked_out_at, true)
    }

    /// The open loan for an item, if any. Several open loans on one item return the newest.
    pub fn get_active_loan_for_item(&self, gid: Uuid, item_id: Uuid) -> AppResult<Option<LoanOut>> {
        let now = self.clock.now();
        let store = self.store.lock();
        let mut rows = store.select_loans(|l| l.group_id == gid && l.item_id == item_id && l.returned_at.is_none())?;
        rows.sort_by_key(|r| r.checked_out_at);
        match rows.last() {
            Some(row) => Ok(Some(map_out(&store, row, now)?)),
            None => Ok(None),
        }
    }

    /// Check an item out to a borrower. Item and borrower must both live in `gid`.
    pub fn create(&self, gid: Uuid, acting_user: Uuid, kiosk_action: bool, data: LoanCreate) -> AppResult<LoanOut> {
        check_notes("notes", &data.notes)?;
        let quantity = match data.quantity {
            None | Some(0) => 1,
            Some(q) if q < 0 => return Err(AppError::validation("invalid_quantity", "quantity must be positive")),
            Some(q) => q,
        };
        let now = self.clock.now();
        let out = {
            let mut store = self.store.lock();
            if !store.item(data.item_id)?.is_some_and(|i| i.group_id == gid) {
                return Err(AppError::not_found("item_not_found", "item not found"));
            }
            if !store.borrower(data.borrower_id)?.is_some_and(|b| b.group_id == gid) {
                return Err(AppError::not_found("borrower_not_found", "borrower not found"));
            }
            let row = LoanRow {
                id: Uuid::new_v4(),
                group_id: gid,
                item_id: data.item_id,
                borrower_id: data.borrower_id,
                checked_out_at: now,
                due_at: data.due_at,
                returned_at: None,
                notes: data.notes,
                return_notes: String::new(),
                quantity,
                kiosk_action,
                checked_out_by: Some(acting_user),
                returned_by: None,
                created_at: now,
                updated_at: now,
            };
            let out = map_out(&store, &row, now);
            store.insert_loan(row)?;
            out?
        };
        info!(target: "lendgate::loans", loan_id = %out.summary.id, group_id = %gid, user_id = %acting_user, kiosk_action, "loan created");
        self.publish_mutation(gid);
        Ok(out)
    }

    /// Close an open loan. The open-state check and the write happen in one
    /// conditional update, so of two concurrent returns exactly one succeeds.
    pub fn return_loan(&self, gid: Uuid, acting_user: Uuid, kiosk_action: bool, id: Uuid, data: LoanReturn) -> AppResult<LoanOut> {
        check_notes("returnNotes", &data.return_notes)?;
        let now = self.clock.now();
        let out = {
            let mut store = self.store.lock();
            let notes = data.return_notes;
            let affected = store.update_loans(
                |l| l.group_id == gid && l.id == id && l.returned_at.is_none(),
                |l| {
                    l.returned_at = Some(now);
                    l.return_notes = notes.clone();
                    l.returned_by = Some(acting_user);
                    l.kiosk_action = l.kiosk_action || kiosk_action;
                    l.updated_at = now;
                },
            )?;
            if affected == 0 {
                let exists = store.count_loans(|l| l.group_id == gid && l.id == id)? > 0;
                return Err(if exists {
                    AppError::conflict("loan_already_returned", "loan already returned")
                } else {
                    loan_not_found()
                });
            }
            match store.loan(id)? {
                Some(row) => map_out(&store, row, now)?,
                None => return Err(loan_not_found()),
            }
        };
        info!(target: "lendgate::loans", loan_id = %id, group_id = %gid, user_id = %acting_user, "loan returned");
        self.publish_mutation(gid);
        Ok(out)
    }

    /// Extend or annotate a loan. Only `due_at` and `notes` change.
    pub fn update_by_group(&self, gid: Uuid, id: Uuid, data: LoanUpdate) -> AppResult<LoanOut> {
        check_notes("notes", &data.notes)?;
        let now = self.clock.now();
        let affected = self.store.lock().update_loans(
            |l| l.group_id == gid && l.id == id,
            |l| {
                l.due_at = data.due_at;
                l.notes = data.notes.clone();
                l.updated_at = now;
            },
        )?;
        if affected == 0 {
            return Err(loan_not_found());
        }
        self.publish_mutation(gid);
        self.get_one_by_group(gid, id)
    }

    /// Hard delete regardless of loan state.
    pub fn delete_by_group(&self, gid: Uuid, id: Uuid) -> AppResult<()> {
        let deleted = self.store.lock().delete_loans(|l| l.group_id == gid && l.id == id)?;
        if deleted == 0 {
            return Err(loan_not_found());
        }
        info!(target: "lendgate::loans", loan_id = %id, group_id = %gid, "loan deleted");
        self.publish_mutation(gid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::repo::Repos;
    use crate::repo::borrowers::BorrowerCreate;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    struct Fx {
        repos: Repos,
        clock: Arc<ManualClock>,
        gid: Uuid,
        uid: Uuid,
        item: Uuid,
        borrower: Uuid,
        bus: EventBus,
    }

    fn fx() -> Fx {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 9, 2, 8, 0, 0).unwrap()));
        let bus = EventBus::new(16);
        let repos = Repos::new(SharedStore::new(), clock.clone(), Some(bus.clone()));
        let g = repos.users.create_group("lab").unwrap();
        let u = repos
            .users
            .create(crate::repo::users::UserCreate { group_id: g.id, name: "op".into(), email: "op@lab.io".into(), password: None, roles: vec![] })
            .unwrap();
        let item = repos.users.create_item(g.id, "Oscilloscope", 42).unwrap();
        let b = repos
            .borrowers
            .create(g.id, false, BorrowerCreate { name: "Ada".into(), email: "a@x.com".into(), ..Default::default() })
            .unwrap();
        Fx { repos, clock, gid: g.id, uid: u.id, item: item.id, borrower: b.summary.id, bus }
    }

    fn checkout(f: &Fx, quantity: Option<i32>) -> AppResult<LoanOut> {
        f.repos.loans.create(
            f.gid,
            f.uid,
            false,
            LoanCreate { item_id: f.item, borrower_id: f.borrower, due_at: f.clock.now() + Duration::days(7), notes: String::new(), quantity },
        )
    }

    #[test]
    fn quantity_defaults_and_rejects_negative() {
        let f = fx();
        assert_eq!(checkout(&f, None).unwrap().summary.quantity, 1);
        assert_eq!(checkout(&f, Some(0)).unwrap().summary.quantity, 1);
        assert_eq!(checkout(&f, Some(3)).unwrap().summary.quantity, 3);
        assert_eq!(checkout(&f, Some(-1)).unwrap_err().http_status(), 400);
    }

    #[test]
    fn create_materializes_joined_fields() {
        let f = fx();
        let loan = checkout(&f, Some(2)).unwrap();
        assert_eq!(loan.summary.item_name, "Oscilloscope");
        assert_eq!(loan.item_asset_id, 42);
        assert_eq!(loan.summary.borrower_name, "Ada");
        assert_eq!(loan.borrower_email, "a@x.com");
        assert_eq!(loan.checked_out_by, Some(f.uid));
        assert!(!loan.summary.is_overdue);
    }

    #[test]
    fn update_touches_only_due_date_and_notes() {
        let f = fx();
        let loan = checkout(&f, None).unwrap();
        let new_due = f.clock.now() + Duration::days(30);
        let updated = f
            .repos
            .loans
            .update_by_group(f.gid, loan.summary.id, LoanUpdate { due_at: new_due, notes: "extended".into() })
            .unwrap();
        assert_eq!(updated.summary.due_at, new_due);
        assert_eq!(updated.notes, "extended");
        assert_eq!(updated.summary.item_id, loan.summary.item_id);
        assert_eq!(updated.summary.returned_at, None);
    }

    #[test]
    fn return_twice_conflicts_and_keeps_first_values() {
        let f = fx();
        let loan = checkout(&f, None).unwrap();
        let first = f.repos.loans.return_loan(f.gid, f.uid, false, loan.summary.id, LoanReturn { return_notes: "ok".into() }).unwrap();
        f.clock.advance(Duration::minutes(1));
        let err = f
            .repos
            .loans
            .return_loan(f.gid, f.uid, false, loan.summary.id, LoanReturn { return_notes: "again".into() })
            .unwrap_err();
        assert_eq!(err.http_status(), 409);
        let now = f.repos.loans.get_one_by_group(f.gid, loan.summary.id).unwrap();
        assert_eq!(now.summary.returned_at, first.summary.returned_at);
        assert_eq!(now.return_notes, "ok");
    }

    #[test]
    fn unknown_loan_is_not_found_everywhere() {
        let f = fx();
        let id = Uuid::new_v4();
        assert_eq!(f.repos.loans.return_loan(f.gid, f.uid, false, id, LoanReturn::default()).unwrap_err().http_status(), 404);
        assert_eq!(f.repos.loans.delete_by_group(f.gid, id).unwrap_err().http_status(), 404);
        assert_eq!(
            f.repos.loans.update_by_group(f.gid, id, LoanUpdate { due_at: f.clock.now(), notes: String::new() }).unwrap_err().http_status(),
            404
        );
    }

    #[test]
    fn events_only_on_success() {
        let f = fx();
        let mut rx = f.bus.subscribe();
        assert!(f.repos.loans.delete_by_group(f.gid, Uuid::new_v4()).is_err());
        assert!(rx.try_recv().is_err());
        checkout(&f, None).unwrap();
        let ev = rx.try_recv().unwrap();
        assert_eq!(ev.topic, Topic::LoanMutation);
        assert_eq!(ev.data.gid, f.gid);
    }

    #[test]
    fn history_is_newest_first() {
        let f = fx();
        let a = checkout(&f, None).unwrap();
        f.clock.advance(Duration::hours(1));
        let b = checkout(&f, None).unwrap();
        let ids: Vec<Uuid> = f.repos.loans.get_loans_by_item(f.gid, f.item).unwrap().into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![b.summary.id, a.summary.id]);
        let current = f.repos.loans.get_active_loan_for_item(f.gid, f.item).unwrap().unwrap();
        assert_eq!(current.summary.id, b.summary.id);
    }
}
