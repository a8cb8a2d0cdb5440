use tracing::debug;

use super::{CredentialStore, Role, RoleSet};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMode {
    /// Any one of the required roles suffices.
    Or,
    /// Every required role must be held.
    And,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    pub mode: RoleMode,
    pub required: Vec<Role>,
}

impl RoleGate {
    pub fn any(required: &[Role]) -> Self { Self { mode: RoleMode::Or, required: required.to_vec() } }
    pub fn all(required: &[Role]) -> Self { Self { mode: RoleMode::And, required: required.to_vec() } }

    pub fn check(&self, held: &RoleSet) -> AppResult<()> {
        let allowed = match self.mode {
            RoleMode::Or => self.required.iter().any(|r| held.contains(*r)),
            RoleMode::And => {
                if let Some(missing) = self.required.iter().find(|r| !held.contains(**r)) {
                    debug!(target: "lendgate::auth", role = missing.as_str(), "missing required role");
                    false
                } else {
                    true
                }
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(AppError::forbidden("missing_role", "user does not have the required roles"))
        }
    }

    /// Fetch the token's roles fresh from the credential store and check them.
    pub fn enforce<C: CredentialStore + ?Sized>(&self, creds: &C, token: &str) -> AppResult<()> {
        let held = creds.roles_for_token(token)?.unwrap_or_default();
        self.check(&held)
    }
}
