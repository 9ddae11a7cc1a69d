//! Poison-tolerant guards for the cache locks.
//!
//! A panic while holding a cache lock poisons it; the cached projections
//! are rebuilt from the database on the next miss anyway, so recovery is
//! always safe here. Each recovery is logged with the family and
//! operation that hit it.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    family: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(family, op, access = "read", "recovered a poisoned cache lock");
        poisoned.into_inner()
    })
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    family: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(family, op, access = "write", "recovered a poisoned cache lock");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_survive_a_poisoned_lock() {
        let lock = RwLock::new(1u8);
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.write().unwrap();
            panic!("poison the lock");
        }));
        assert!(lock.is_poisoned());

        *rw_write(&lock, "cache::store", "test_write") = 2;
        assert_eq!(*rw_read(&lock, "cache::store", "test_read"), 2);
    }
}
