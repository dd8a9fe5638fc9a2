use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, taking the data back if a previous holder panicked.
///
/// Every structure guarded this way stays consistent between statements, so a
/// panic in one channel must not take the shared state down for the others.
pub(crate) fn lock_or_recover<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(context, "mutex poisoned; recovering");
            poisoned.into_inner()
        }
    }
}
