use uuid::Uuid;

use super::Identity;
use crate::error::{AppError, AppResult};

/// Kiosk flags derived for the current request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KioskState {
    pub is_kiosk: bool,
    pub is_unlocked: bool,
}

impl KioskState {
    pub fn is_restricted(&self) -> bool { self.is_kiosk && !self.is_unlocked }

    /// Kiosk restriction gate: a locked kiosk may not perform administrative mutations.
    pub fn ensure_admin_access(&self) -> AppResult<()> {
        if self.is_restricted() {
            return Err(AppError::forbidden(
                "kiosk_locked",
                "this action requires admin access - please unlock to continue",
            ));
        }
        Ok(())
    }
}

/// Everything the business layer needs to know about the caller.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub kiosk: KioskState,
}

impl RequestContext {
    pub fn uid(&self) -> Uuid { self.identity.user_id }
    pub fn gid(&self) -> Uuid { self.identity.group_id }
    pub fn is_kiosk(&self) -> bool { self.kiosk.is_kiosk }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_locked_kiosk_is_restricted() {
        assert!(KioskState::default().ensure_admin_access().is_ok());
        assert!(KioskState { is_kiosk: true, is_unlocked: true }.ensure_admin_access().is_ok());
        let err = KioskState { is_kiosk: true, is_unlocked: false }.ensure_admin_access().unwrap_err();
        assert_eq!(err.http_status(), 403);
    }
}
