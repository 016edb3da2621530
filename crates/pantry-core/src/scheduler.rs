//! Periodic persistence of dirty pantry state
//!
//! Every period the scheduler checks the session's dirty flag and the live
//! authenticated signal. When both are set it clears the flag, snapshots the
//! available ids and writes them to the [`UserPantryStore`]. The flag is
//! cleared before the write, so a toggle made while the write is in flight is
//! picked up by the next tick. A failed write is logged and not retried until
//! the pantry is dirtied again.

use crate::error::PantryError;
use crate::pantry::Pantry;
use crate::source::UserPantryStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Unsaved-mutation marker shared by the session and the scheduler
#[derive(Debug, Default)]
pub struct DirtyFlag(AtomicBool);

impl DirtyFlag {
    /// Create a clean flag
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local mutation
    #[inline]
    pub fn mark(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a mutation is pending
    #[inline]
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set
    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Result of one scheduler tick
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing changed since the last flush
    Clean,
    /// Changes pending but the user is not authenticated
    Unauthenticated,
    /// Snapshot of `ids` available ingredients written
    Flushed {
        /// Number of ids written
        ids: usize,
    },
    /// Flush attempted and failed; the flag stays cleared
    Failed(PantryError),
}

impl TickOutcome {
    /// Whether a write reached the store
    #[inline]
    #[must_use]
    pub fn is_flushed(&self) -> bool {
        matches!(self, Self::Flushed { .. })
    }
}

/// Fixed-period flusher of the session's pantry
#[derive(Debug)]
pub struct PersistenceScheduler<U> {
    pantry: Arc<RwLock<Pantry>>,
    dirty: Arc<DirtyFlag>,
    authenticated: watch::Receiver<bool>,
    store: U,
    period: Duration,
}

impl<U: UserPantryStore> PersistenceScheduler<U> {
    /// Create a scheduler over shared session state
    #[must_use]
    pub fn new(
        pantry: Arc<RwLock<Pantry>>,
        dirty: Arc<DirtyFlag>,
        authenticated: watch::Receiver<bool>,
        store: U,
        period: Duration,
    ) -> Self {
        Self {
            pantry,
            dirty,
            authenticated,
            store,
            period,
        }
    }

    /// Run one flush check
    pub async fn tick(&self) -> TickOutcome {
        if !self.dirty.is_set() {
            return TickOutcome::Clean;
        }
        if !*self.authenticated.borrow() {
            return TickOutcome::Unauthenticated;
        }
        if !self.dirty.take() {
            return TickOutcome::Clean;
        }

        let snapshot = self.pantry.read().available_ingredient_ids();
        let ids = match snapshot {
            Ok(ids) => ids,
            Err(err) => {
                tracing::error!(error = %err, "dirty pantry without availability map");
                debug_assert!(!err.is_invariant_violation(), "{err}");
                return TickOutcome::Failed(err);
            }
        };

        let count = ids.len();
        match self.store.set_user_pantry(ids).await {
            Ok(()) => {
                tracing::debug!(ids = count, "pantry flushed");
                TickOutcome::Flushed { ids: count }
            }
            Err(err) => {
                tracing::warn!(error = %err, "pantry flush failed");
                TickOutcome::Failed(PantryError::RemoteWrite(err))
            }
        }
    }

    /// Tick every period until `shutdown` changes or its sender goes away
    ///
    /// The first flush happens one full period after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        tracing::info!(period_ms = self.period.as_millis(), "persistence scheduler started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcome = self.tick().await;
                    tracing::trace!(?outcome, "scheduler tick");
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("persistence scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryPantryStore;
    use crate::types::IngredientRecord;
    use std::collections::BTreeSet;

    struct Harness {
        pantry: Arc<RwLock<Pantry>>,
        dirty: Arc<DirtyFlag>,
        auth: watch::Sender<bool>,
        store: Arc<InMemoryPantryStore>,
        scheduler: PersistenceScheduler<Arc<InMemoryPantryStore>>,
    }

    fn harness(authenticated: bool) -> Harness {
        let pantry = Arc::new(RwLock::new(Pantry::assemble(
            vec![(
                "Baking".to_string(),
                vec![
                    IngredientRecord::new("flour", 20081, 1),
                    IngredientRecord::new("sugar", 19335, 1),
                ],
            )],
            "Pantry Essentials",
        )));
        let dirty = Arc::new(DirtyFlag::new());
        let (auth, auth_rx) = watch::channel(authenticated);
        let store = Arc::new(InMemoryPantryStore::new());
        let scheduler = PersistenceScheduler::new(
            Arc::clone(&pantry),
            Arc::clone(&dirty),
            auth_rx,
            Arc::clone(&store),
            Duration::from_secs(20),
        );
        Harness {
            pantry,
            dirty,
            auth,
            store,
            scheduler,
        }
    }

    fn toggle(h: &Harness, idx: usize) {
        let mut pantry = h.pantry.write();
        let ingredient = pantry.all_ingredients()[idx].clone();
        pantry.toggle_availability(&ingredient).unwrap();
        h.dirty.mark();
    }

    #[test]
    fn dirty_flag_take_clears() {
        let flag = DirtyFlag::new();
        assert!(!flag.take());
        flag.mark();
        assert!(flag.is_set());
        assert!(flag.take());
        assert!(!flag.is_set());
    }

    #[tokio::test]
    async fn clean_tick_is_noop() {
        let h = harness(true);
        assert!(matches!(h.scheduler.tick().await, TickOutcome::Clean));
        assert_eq!(h.store.write_count(), 0);
    }

    #[tokio::test]
    async fn dirty_tick_flushes_and_clears() {
        let h = harness(true);
        toggle(&h, 0);

        let outcome = h.scheduler.tick().await;
        assert!(matches!(outcome, TickOutcome::Flushed { ids: 1 }));
        assert!(!h.dirty.is_set());
        assert_eq!(h.store.writes(), vec![BTreeSet::from([20081])]);

        assert!(matches!(h.scheduler.tick().await, TickOutcome::Clean));
        assert_eq!(h.store.write_count(), 1);
    }

    #[tokio::test]
    async fn unauthenticated_tick_keeps_flag() {
        let h = harness(false);
        toggle(&h, 1);

        for _ in 0..3 {
            assert!(matches!(h.scheduler.tick().await, TickOutcome::Unauthenticated));
        }
        assert!(h.dirty.is_set());
        assert_eq!(h.store.write_count(), 0);

        h.auth.send_replace(true);
        assert!(h.scheduler.tick().await.is_flushed());
        assert_eq!(h.store.writes(), vec![BTreeSet::from([19335])]);
    }

    #[tokio::test]
    async fn failed_write_is_not_retried_until_dirty_again() {
        let h = harness(true);
        h.store.fail_next_writes(1);
        toggle(&h, 0);

        let outcome = h.scheduler.tick().await;
        assert!(matches!(outcome, TickOutcome::Failed(PantryError::RemoteWrite(_))));
        assert!(!h.dirty.is_set());
        assert!(matches!(h.scheduler.tick().await, TickOutcome::Clean));
        assert_eq!(h.store.write_count(), 0);

        toggle(&h, 1);
        assert!(h.scheduler.tick().await.is_flushed());
        assert_eq!(h.store.writes(), vec![BTreeSet::from([20081, 19335])]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_flushes_each_period_until_shutdown() {
        let h = harness(true);
        let Harness {
            pantry,
            dirty,
            auth: _auth,
            store,
            scheduler,
        } = h;
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(scheduler.run(stop_rx));

        {
            let mut guard = pantry.write();
            let flour = guard.all_ingredients()[0].clone();
            guard.toggle_availability(&flour).unwrap();
            dirty.mark();
        }

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert_eq!(store.write_count(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.write_count(), 1);

        stop.send_replace(true);
        task.await.unwrap();

        dirty.mark();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.write_count(), 1);
    }
}
