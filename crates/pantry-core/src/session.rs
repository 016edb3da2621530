//! Pantry session
//!
//! Owns the pantry and the dirty flag for one user session and runs the two
//! background tasks that keep it in sync:
//! - hydration, triggered once by the [`AuthGate`]
//! - the [`PersistenceScheduler`]
//!
//! # Ordering
//!
//! Both tasks start before the catalog load so no auth emission is missed.
//! Hydration that fires before the catalog is installed hits
//! [`PantryError::PantryNotInitialized`] and is deferred until the
//! catalog-ready signal flips. The scheduler only writes when dirty, and the
//! pantry can only become dirty through a successful toggle, which itself
//! requires an installed catalog.
//!
//! Dropping a session without [`PantrySession::stop`] closes the shutdown
//! signal, which ends both tasks as well.

use crate::auth_gate::{AuthGate, GateOutcome};
use crate::catalog::CatalogLoader;
use crate::config::SessionConfig;
use crate::error::PantryError;
use crate::pantry::Pantry;
use crate::scheduler::{DirtyFlag, PersistenceScheduler};
use crate::source::{AuthProvider, CatalogSource, UserPantryStore};
use crate::types::Ingredient;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How the hydration task ended
#[derive(Debug)]
pub enum HydrationOutcome {
    /// Persisted availability applied; `matched` ingredients set available
    Hydrated {
        /// Ingredients whose external id was in the persisted record
        matched: usize,
    },
    /// Auth signals closed without the user becoming authenticated
    NotAuthenticated,
    /// Reading the persisted record failed on every attempt
    Failed(PantryError),
    /// Session stopped first
    Cancelled,
}

/// One user's pantry plus its sync tasks
#[derive(Debug)]
pub struct PantrySession {
    config: SessionConfig,
    pantry: Arc<RwLock<Pantry>>,
    dirty: Arc<DirtyFlag>,
    shutdown: watch::Sender<bool>,
    // Kept so late hydration never sees the signal close
    _catalog_ready: watch::Sender<bool>,
    hydration: Option<JoinHandle<HydrationOutcome>>,
    scheduler: JoinHandle<()>,
}

impl PantrySession {
    /// Start a session and load its catalog
    ///
    /// # Workflow
    /// 1. Validate the configuration
    /// 2. Spawn hydration (waiting on the auth gate) and the scheduler
    /// 3. Load the catalog and install it
    ///
    /// # Errors
    /// - `PantryError::Config` for an invalid configuration
    /// - `PantryError::CatalogFetch` if the catalog cannot be loaded; the
    ///   background tasks are stopped and no pantry is published
    pub async fn open<C, A, U>(
        config: SessionConfig,
        catalog: C,
        auth: &A,
        store: Arc<U>,
    ) -> Result<Self, PantryError>
    where
        C: CatalogSource,
        A: AuthProvider + ?Sized,
        U: UserPantryStore + 'static,
    {
        config.validate()?;

        let pantry = Arc::new(RwLock::new(Pantry::new()));
        let dirty = Arc::new(DirtyFlag::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (catalog_ready, ready_rx) = watch::channel(false);

        let hydration = tokio::spawn(run_hydration(
            AuthGate::new(auth),
            Arc::clone(&store),
            Arc::clone(&pantry),
            ready_rx,
            shutdown_rx.clone(),
            config.hydration_attempts,
            config.hydration_retry_delay(),
        ));

        let scheduler = PersistenceScheduler::new(
            Arc::clone(&pantry),
            Arc::clone(&dirty),
            auth.authenticated(),
            store,
            config.flush_interval(),
        );
        let scheduler = tokio::spawn(scheduler.run(shutdown_rx));

        let loader = CatalogLoader::new(catalog).with_essentials_group(config.essentials_group.clone());
        match loader.load().await {
            Ok(loaded) => {
                *pantry.write() = loaded;
                catalog_ready.send_replace(true);
            }
            Err(err) => {
                tracing::error!(error = %err, "catalog load failed, closing session");
                shutdown.send_replace(true);
                let _ = hydration.await;
                let _ = scheduler.await;
                return Err(err);
            }
        }

        tracing::info!("pantry session open");
        Ok(Self {
            config,
            pantry,
            dirty,
            shutdown,
            _catalog_ready: catalog_ready,
            hydration: Some(hydration),
            scheduler,
        })
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Flip an ingredient's availability and mark the session dirty
    ///
    /// Returns the new availability.
    ///
    /// # Errors
    /// `UnknownIngredient` if the ingredient is not part of this session's
    /// catalog. The pantry and the dirty flag are left untouched.
    ///
    /// # Panics
    /// In debug builds, on any rejected toggle.
    pub fn toggle_ingredient(&self, ingredient: &Ingredient) -> Result<bool, PantryError> {
        let toggled = self.pantry.write().toggle_availability(ingredient);
        match toggled {
            Ok(available) => {
                self.dirty.mark();
                tracing::debug!(
                    ingredient = %ingredient.name,
                    external_id = ingredient.external_id,
                    available,
                    "ingredient toggled"
                );
                Ok(available)
            }
            Err(err) => {
                tracing::error!(error = %err, "toggle rejected");
                debug_assert!(!err.is_invariant_violation(), "{err}");
                Err(err)
            }
        }
    }

    /// Read access to the pantry
    pub fn with_pantry<R>(&self, f: impl FnOnce(&Pantry) -> R) -> R {
        f(&self.pantry.read())
    }

    /// Whether local changes are waiting for a flush
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_set()
    }

    /// Wait for the hydration task to finish
    ///
    /// Returns `None` once the outcome has already been taken.
    pub async fn hydration(&mut self) -> Option<HydrationOutcome> {
        let handle = self.hydration.take()?;
        Some(handle.await.unwrap_or(HydrationOutcome::Cancelled))
    }

    /// Stop both background tasks and wait for them
    ///
    /// A flush already in flight completes first; pending changes are not
    /// flushed.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);
        if let Some(hydration) = self.hydration {
            let _ = hydration.await;
        }
        let _ = self.scheduler.await;
        tracing::info!(dirty = self.dirty.is_set(), "pantry session stopped");
    }
}

async fn run_hydration<U: UserPantryStore>(
    gate: AuthGate,
    store: Arc<U>,
    pantry: Arc<RwLock<Pantry>>,
    ready: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
    attempts: u32,
    retry_delay: Duration,
) -> HydrationOutcome {
    tokio::select! {
        outcome = hydrate(gate, store, pantry, ready, attempts, retry_delay) => outcome,
        _ = shutdown.changed() => HydrationOutcome::Cancelled,
    }
}

async fn hydrate<U: UserPantryStore>(
    gate: AuthGate,
    store: Arc<U>,
    pantry: Arc<RwLock<Pantry>>,
    mut ready: watch::Receiver<bool>,
    attempts: u32,
    retry_delay: Duration,
) -> HydrationOutcome {
    if gate.wait().await == GateOutcome::Closed {
        tracing::info!("auth signals closed before sign-in, skipping hydration");
        return HydrationOutcome::NotAuthenticated;
    }

    let mut attempt = 0;
    let record = loop {
        attempt += 1;
        match store.get_user_pantry().await {
            Ok(record) => break record,
            Err(err) if attempt < attempts => {
                tracing::warn!(attempt, error = %err, "pantry read failed, retrying");
                tokio::time::sleep(retry_delay).await;
            }
            Err(err) => {
                tracing::warn!(attempt, error = %err, "pantry read failed, giving up");
                return HydrationOutcome::Failed(PantryError::RemoteRead(err));
            }
        }
    };

    loop {
        let applied = pantry.write().set_available_ingredients_by_id(&record.pantry);
        match applied {
            Ok(matched) => {
                tracing::info!(matched, persisted = record.pantry.len(), "pantry hydrated");
                return HydrationOutcome::Hydrated { matched };
            }
            Err(PantryError::PantryNotInitialized) => {
                tracing::debug!("catalog not loaded yet, deferring hydration");
                if ready.wait_for(|loaded| *loaded).await.is_err() {
                    return HydrationOutcome::Cancelled;
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "hydration rejected");
                debug_assert!(!err.is_invariant_violation(), "{err}");
                return HydrationOutcome::Failed(err);
            }
        }
    }
}
