//! Request identity: token resolution, role gating and the per-request context.
//! Keep the public surface thin and split implementation across sub-modules.

mod authorizer;
mod principal;
mod request_context;
mod resolver;

pub use authorizer::{RoleGate, RoleMode};
pub use principal::{Identity, Role, RoleSet};
pub use request_context::{KioskState, RequestContext};
pub use resolver::{discover_token, resolve_identity, CredentialStore, ACCESS_TOKEN_PARAM, AUTH_COOKIE};
