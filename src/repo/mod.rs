//! Repositories over the shared store. Each one is cheap to clone and takes
//! the store lock only for the duration of a single call.

pub mod borrowers;
pub mod kiosk;
pub mod loans;
pub mod users;

use crate::clock::SharedClock;
use crate::events::EventBus;
use crate::storage::SharedStore;

pub use borrowers::{BorrowerCreate, BorrowerOut, BorrowerRepository, BorrowerSummary, BorrowerUpdate};
pub use kiosk::{KioskPhase, KioskSession, KioskSessionRepository};
pub use loans::{LoanCreate, LoanOut, LoanRepository, LoanReturn, LoanSummary, LoanUpdate};
pub use users::{GroupOut, ItemOut, UserCreate, UserOut, UserRepository};

#[derive(Clone)]
pub struct Repos {
    pub users: UserRepository,
    pub kiosk: KioskSessionRepository,
    pub loans: LoanRepository,
    pub borrowers: BorrowerRepository,
}

impl Repos {
    pub fn new(store: SharedStore, clock: SharedClock, bus: Option<EventBus>) -> Self {
        Self {
            users: UserRepository::new(store.clone(), clock.clone()),
            kiosk: KioskSessionRepository::new(store.clone(), clock.clone()),
            loans: LoanRepository::new(store.clone(), clock.clone(), bus.clone()),
            borrowers: BorrowerRepository::new(store, clock, bus),
        }
    }
}
