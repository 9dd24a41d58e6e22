//! Lock acquisition helpers that recover from poisoning.
//!
//! A poisoned lock means a thread panicked while holding the guard. The
//! protected state here (listener registries, in-memory caches) stays
//! structurally valid across panics, so recovery is preferable to
//! propagating the poison to every caller.

use std::sync::Mutex;
use std::sync::MutexGuard;

use tracing::warn;

pub fn mutex_lock_or_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!("recovering from poisoned mutex");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutex_recovers_after_panic() {
        let lock = std::sync::Arc::new(Mutex::new(1u32));

        let poisoner = std::sync::Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        let guard = mutex_lock_or_recover(&lock);
        assert_eq!(*guard, 1);
    }

    #[test]
    fn test_mutex_passes_through_unpoisoned() {
        let lock = Mutex::new(vec![1, 2, 3]);
        mutex_lock_or_recover(&lock).push(4);
        assert_eq!(mutex_lock_or_recover(&lock).len(), 4);
    }
}
