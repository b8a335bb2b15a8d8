//! debug build bookkeeping of which session lock the current thread holds. The live table is
//! always taken first and the checking queue second. Facade lookups never hold both, only the
//! handoffs between the two collections nest them (checking inside live).

use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LockDomain {
    Live,
    Checking,
}

impl LockDomain {
    fn bit(self) -> u8 {
        match self {
            LockDomain::Live => 0b01,
            LockDomain::Checking => 0b10,
        }
    }
}

thread_local! {
    static HELD: Cell<u8> = const { Cell::new(0) };
}

/// marks the domain as held until dropped. Create it right before taking the lock so it is
/// dropped after the guard.
pub(crate) struct Held(LockDomain);

/// for a lock taken on its own.
pub(crate) fn acquire(domain: LockDomain) -> Held {
    enter(domain, false)
}

/// for the checking queue taken while already holding the live table.
pub(crate) fn acquire_nested(domain: LockDomain) -> Held {
    enter(domain, true)
}

fn enter(domain: LockDomain, nested: bool) -> Held {
    if cfg!(debug_assertions) {
        HELD.with(|held| {
            let current = held.get();
            let allowed = match (domain, nested) {
                (_, false) => current == 0,
                (LockDomain::Checking, true) => current == LockDomain::Live.bit(),
                (LockDomain::Live, true) => false,
            };
            assert!(
                allowed,
                "lock order violation: taking {domain:?} lock while holding {current:#04b}"
            );
            held.set(current | domain.bit());
        });
    }
    Held(domain)
}

impl Drop for Held {
    fn drop(&mut self) {
        if cfg!(debug_assertions) {
            HELD.with(|held| held.set(held.get() & !self.0.bit()));
        }
    }
}
