//! Kiosk session state machine: activation upsert, unlock windows, lock, and
//! concurrent activation against the unique index on the owning user.

mod common;

use std::sync::Barrier;

use anyhow::Result;
use chrono::Duration;

use common::Fixture;
use lendgate::clock::Clock;
use lendgate::repo::KioskPhase;

#[test]
fn activate_then_get_is_active_and_locked() -> Result<()> {
    let fx = Fixture::new()?;
    let kiosk = &fx.repos().kiosk;
    kiosk.activate(fx.uid)?;
    let session = kiosk.get_by_user(fx.uid)?.expect("session exists");
    assert!(session.is_active);
    assert!(!session.is_unlocked_at(fx.clock.now()));
    assert_eq!(kiosk.phase(fx.uid)?, KioskPhase::ActiveLocked);
    Ok(())
}

#[test]
fn unlock_window_closes_exactly_at_deadline() -> Result<()> {
    let fx = Fixture::new()?;
    let kiosk = &fx.repos().kiosk;
    for minutes in [1, 5, 17, 30] {
        kiosk.activate(fx.uid)?;
        let start = fx.clock.now();
        let session = kiosk.unlock(fx.uid, Duration::minutes(minutes))?.expect("active session");
        let until = start + Duration::minutes(minutes);
        assert_eq!(session.unlocked_until, Some(until));
        assert!(session.is_unlocked_at(start));

        fx.clock.set(until - Duration::seconds(1));
        assert_eq!(kiosk.phase(fx.uid)?, KioskPhase::ActiveUnlocked);
        fx.clock.set(until);
        assert_eq!(kiosk.phase(fx.uid)?, KioskPhase::ActiveLocked);
        fx.clock.set(until + Duration::minutes(1));
        assert!(!kiosk.kiosk_state(fx.uid)?.is_unlocked);
    }
    Ok(())
}

#[test]
fn unlock_without_active_session_is_soft() -> Result<()> {
    let fx = Fixture::new()?;
    let kiosk = &fx.repos().kiosk;
    assert!(kiosk.unlock(fx.uid, Duration::minutes(5))?.is_none());
    assert!(kiosk.get_by_user(fx.uid)?.is_none());

    kiosk.activate(fx.uid)?;
    kiosk.deactivate(fx.uid)?;
    assert!(kiosk.unlock(fx.uid, Duration::minutes(5))?.is_none());
    assert_eq!(kiosk.phase(fx.uid)?, KioskPhase::Inactive);
    Ok(())
}

#[test]
fn lock_revokes_unlock_but_stays_active() -> Result<()> {
    let fx = Fixture::new()?;
    let kiosk = &fx.repos().kiosk;
    kiosk.activate(fx.uid)?;
    kiosk.unlock(fx.uid, Duration::minutes(10))?;
    kiosk.lock(fx.uid)?;
    let session = kiosk.get_by_user(fx.uid)?.expect("session exists");
    assert!(session.is_active);
    assert!(session.unlocked_until.is_none());
    assert_eq!(kiosk.phase(fx.uid)?, KioskPhase::ActiveLocked);
    Ok(())
}

#[test]
fn lock_and_deactivate_without_session_are_noops() -> Result<()> {
    let fx = Fixture::new()?;
    let kiosk = &fx.repos().kiosk;
    kiosk.lock(fx.uid)?;
    kiosk.deactivate(fx.uid)?;
    assert_eq!(kiosk.phase(fx.uid)?, KioskPhase::NoSession);
    Ok(())
}

#[test]
fn activate_is_idempotent() -> Result<()> {
    let fx = Fixture::new()?;
    let kiosk = &fx.repos().kiosk;
    let first = kiosk.activate(fx.uid)?;
    let second = kiosk.activate(fx.uid)?;
    assert_eq!(first.id, second.id);
    assert_eq!((first.is_active, first.unlocked_until), (second.is_active, second.unlocked_until));
    Ok(())
}

#[test]
fn concurrent_activation_yields_one_session() -> Result<()> {
    let fx = Fixture::new()?;
    let kiosk = fx.repos().kiosk.clone();
    let uid = fx.uid;
    let workers = 8;
    let barrier = Barrier::new(workers);

    let ids = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let kiosk = kiosk.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    kiosk.activate(uid)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().expect("worker panicked")).collect::<Vec<_>>()
    });

    let stored = kiosk.get_by_user(uid)?.expect("session exists");
    for res in ids {
        let session = res?;
        assert_eq!(session.id, stored.id);
        assert!(session.is_active);
    }
    Ok(())
}

#[test]
fn deleting_user_removes_session() -> Result<()> {
    let fx = Fixture::new()?;
    fx.repos().kiosk.activate(fx.uid)?;
    fx.repos().users.delete(fx.uid)?;
    assert!(fx.repos().kiosk.get_by_user(fx.uid)?.is_none());
    Ok(())
}
