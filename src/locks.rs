use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-auditorium mutual exclusion for check-then-write sequences.
///
/// Schedule checks, seat grid resizes, reservations and auditorium deletes
/// all read state of one auditorium and then write based on it. Holding the
/// auditorium's guard for the whole unit of work keeps two such sequences
/// from interleaving. Take the guard before beginning the unit of work.
#[derive(Clone, Default)]
pub struct AuditoriumLocks {
    slots: Arc<Mutex<HashMap<i32, Arc<Mutex<()>>>>>,
}

pub struct AuditoriumGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl AuditoriumLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, auditorium_id: i32) -> AuditoriumGuard {
        self.lock_many([auditorium_id]).await
    }

    /// Locks every listed auditorium. Ids are acquired in ascending order so
    /// overlapping callers cannot deadlock.
    pub async fn lock_many(&self, ids: impl IntoIterator<Item = i32>) -> AuditoriumGuard {
        let mut ids: Vec<i32> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut slots = self.slots.lock().await;
            ids.iter().map(|id| slots.entry(*id).or_default().clone()).collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        AuditoriumGuard { _guards: guards }
    }
}
