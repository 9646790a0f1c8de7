use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(super) fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!(
            target = "chirp::query_cache",
            op,
            lock_kind = "rwlock.read",
            "recovered poisoned query cache lock"
        );
        poisoned.into_inner()
    })
}

pub(super) fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!(
            target = "chirp::query_cache",
            op,
            lock_kind = "rwlock.write",
            "recovered poisoned query cache lock"
        );
        poisoned.into_inner()
    })
}
