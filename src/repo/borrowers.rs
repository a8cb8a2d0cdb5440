//! Borrower directory: loan counterparties that are not system users.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::error::{AppError, AppResult};
use crate::events::{self, EventBus, Topic};
use crate::storage::{BorrowerRow, SharedStore, Store};

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerCreate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerUpdate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub notes: String,
    /// Left unchanged when absent.
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// List shape; leaves out notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub organization: String,
    pub student_id: String,
    pub is_active: bool,
    pub self_registered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerOut {
    #[serde(flatten)]
    pub summary: BorrowerSummary,
    pub notes: String,
    pub active_loans: usize,
    pub total_loans: usize,
}

struct Fields<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    organization: &'a str,
    student_id: &'a str,
    notes: &'a str,
}

fn max_len(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::validation("field_too_long", format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

fn validate(f: &Fields<'_>) -> AppResult<()> {
    if f.name.trim().is_empty() {
        return Err(AppError::validation("name_required", "name is required"));
    }
    max_len("name", f.name, 255)?;
    if f.email.trim().is_empty() {
        return Err(AppError::validation("email_required", "email is required"));
    }
    max_len("email", f.email, 255)?;
    if !EMAIL_RE.as_ref().is_some_and(|re| re.is_match(f.email.trim())) {
        return Err(AppError::validation("invalid_email", "email is not a valid address"));
    }
    max_len("phone", f.phone, 50)?;
    max_len("organization", f.organization, 255)?;
    max_len("studentId", f.student_id, 100)?;
    max_len("notes", f.notes, 1000)
}

fn map_summary(row: &BorrowerRow) -> BorrowerSummary {
    BorrowerSummary {
        id: row.id,
        name: row.name.clone(),
        email: row.email.clone(),
        phone: row.phone.clone(),
        organization: row.organization.clone(),
        student_id: row.student_id.clone(),
        is_active: row.is_active,
        self_registered: row.self_registered,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn map_out(store: &Store, row: &BorrowerRow) -> AppResult<BorrowerOut> {
    let gid = row.group_id;
    let bid = row.id;
    Ok(BorrowerOut {
        summary: map_summary(row),
        notes: row.notes.clone(),
        active_loans: store.count_loans(|l| l.group_id == gid && l.borrower_id == bid && l.returned_at.is_none())?,
        total_loans: store.count_loans(|l| l.group_id == gid && l.borrower_id == bid)?,
    })
}

fn borrower_not_found() -> AppError { AppError::not_found("borrower_not_found", "borrower not found") }

#[derive(Clone)]
pub struct BorrowerRepository {
    store: SharedStore,
    clock: SharedClock,
    bus: Option<EventBus>,
}

impl BorrowerRepository {
    pub fn new(store: SharedStore, clock: SharedClock, bus: Option<EventBus>) -> Self { Self { store, clock, bus } }

    fn publish_mutation(&self, gid: Uuid) { events::publish(self.bus.as_ref(), Topic::BorrowerMutation, gid); }

    fn list<P: Fn(&BorrowerRow) -> bool>(&self, pred: P) -> AppResult<Vec<BorrowerSummary>> {
        let mut rows = self.store.lock().select_borrowers(pred)?;
        rows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()).then(a.created_at.cmp(&b.created_at)));
        Ok(rows.iter().map(map_summary).collect())
    }

    pub fn get_all(&self, gid: Uuid) -> AppResult<Vec<BorrowerSummary>> { self.list(|b| b.group_id == gid) }

    pub fn get_active(&self, gid: Uuid) -> AppResult<Vec<BorrowerSummary>> { self.list(|b| b.group_id == gid && b.is_active) }

    pub fn get_one_by_group(&self, gid: Uuid, id: Uuid) -> AppResult<BorrowerOut> {
        let store = self.store.lock();
        match store.borrower(id)? {
            Some(row) if row.group_id == gid => map_out(&store, row),
            _ => Err(borrower_not_found()),
        }
    }

    /// `self_registered` marks borrowers created from a kiosk terminal.
    pub fn create(&self, gid: Uuid, self_registered: bool, data: BorrowerCreate) -> AppResult<BorrowerOut> {
        validate(&Fields {
            name: &data.name,
            email: &data.email,
            phone: &data.phone,
            organization: &data.organization,
            student_id: &data.student_id,
            notes: &data.notes,
        })?;
        let now = self.clock.now();
        let row = BorrowerRow {
            id: Uuid::new_v4(),
            group_id: gid,
            name: data.name.trim().to_string(),
            email: data.email.trim().to_string(),
            phone: data.phone,
            organization: data.organization,
            student_id: data.student_id,
            notes: data.notes,
            is_active: true,
            self_registered,
            created_at: now,
            updated_at: now,
        };
        let out = BorrowerOut { summary: map_summary(&row), notes: row.notes.clone(), active_loans: 0, total_loans: 0 };
        self.store.lock().insert_borrower(row)?;
        info!(target: "lendgate::borrowers", borrower_id = %out.summary.id, group_id = %gid, self_registered, "borrower created");
        self.publish_mutation(gid);
        Ok(out)
    }

    pub fn update_by_group(&self, gid: Uuid, id: Uuid, data: BorrowerUpdate) -> AppResult<BorrowerOut> {
        validate(&Fields {
            name: &data.name,
            email: &data.email,
            phone: &data.phone,
            organization: &data.organization,
            student_id: &data.student_id,
            notes: &data.notes,
        })?;
        let now = self.clock.now();
        let affected = self.store.lock().update_borrowers(
            |b| b.group_id == gid && b.id == id,
            |b| {
                b.name = data.name.trim().to_string();
                b.email = data.email.trim().to_string();
                b.phone = data.phone.clone();
                b.organization = data.organization.clone();
                b.student_id = data.student_id.clone();
                b.notes = data.notes.clone();
                if let Some(active) = data.is_active {
                    b.is_active = active;
                }
                b.updated_at = now;
            },
        )?;
        if affected == 0 {
            return Err(borrower_not_found());
        }
        self.publish_mutation(gid);
        self.get_one_by_group(gid, id)
    }

    /// Deactivate or reactivate without touching other fields.
    pub fn set_active(&self, gid: Uuid, id: Uuid, active: bool) -> AppResult<BorrowerOut> {
        let now = self.clock.now();
        let affected = self.store.lock().update_borrowers(
            |b| b.group_id == gid && b.id == id,
            |b| {
                b.is_active = active;
                b.updated_at = now;
            },
        )?;
        if affected == 0 {
            return Err(borrower_not_found());
        }
        self.publish_mutation(gid);
        self.get_one_by_group(gid, id)
    }

    /// Deletes the borrower and every loan that references it.
    pub fn delete_by_group(&self, gid: Uuid, id: Uuid) -> AppResult<()> {
        let deleted = self.store.lock().delete_borrowers(|b| b.group_id == gid && b.id == id)?;
        if deleted == 0 {
            return Err(borrower_not_found());
        }
        info!(target: "lendgate::borrowers", borrower_id = %id, group_id = %gid, "borrower deleted");
        self.publish_mutation(gid);
        Ok(())
    }
}
