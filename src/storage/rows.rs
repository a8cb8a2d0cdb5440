use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Tenant. Every business row hangs off exactly one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub email: String,
    /// PHC-formatted argon2 hash; `None` for accounts that cannot re-authenticate.
    pub password_hash: Option<String>,
    /// Raw role names as persisted; unknown names are ignored on read.
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRow {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub asset_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowerRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub organization: String,
    pub student_id: String,
    pub notes: String,
    pub is_active: bool,
    pub self_registered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub item_id: Uuid,
    pub borrower_id: Uuid,
    pub checked_out_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub return_notes: String,
    pub quantity: i32,
    pub kiosk_action: bool,
    pub checked_out_by: Option<Uuid>,
    pub returned_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KioskSessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_active: bool,
    pub unlocked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
