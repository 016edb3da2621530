//! Pantry Core - pantry state synchronization
//!
//! Keeps a user's ingredient availability in sync with a remote store:
//! - Loads the ingredient catalog and synthesizes the essentials group
//! - Hydrates persisted availability once authentication settles
//! - Tracks local toggles with a dirty flag
//! - Periodically flushes dirty state while the user is authenticated
//!
//! # Example
//!
//! ```rust,ignore
//! use pantry_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), PantryError> {
//! let auth = ManualAuth::new(true, false);
//! let store = Arc::new(InMemoryPantryStore::new());
//! let session = PantrySession::open(SessionConfig::new(), catalog, &auth, store).await?;
//!
//! let onion = session.with_pantry(|p| p.all_ingredients()[0].clone());
//! session.toggle_ingredient(&onion)?;
//! auth.set_loading(false);
//! auth.set_authenticated(true);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod auth_gate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod memory;
pub mod pantry;
pub mod scheduler;
pub mod session;
pub mod source;
pub mod types;

pub use auth_gate::{AuthGate, GateOutcome, GatePhase, GateState};
pub use catalog::CatalogLoader;
pub use config::{SessionConfig, ESSENTIALS_GROUP};
pub use error::{PantryError, SourceError};
pub use memory::{CatalogFixture, FixtureGroup, InMemoryCatalog, InMemoryPantryStore, ManualAuth};
pub use pantry::Pantry;
pub use scheduler::{DirtyFlag, PersistenceScheduler, TickOutcome};
pub use session::{HydrationOutcome, PantrySession};
pub use source::{AuthProvider, CatalogSource, UserPantryStore};
pub use types::{
    ExternalId, GroupRecord, Ingredient, IngredientGroup, IngredientKey, IngredientRecord,
    PantryRecord,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with a pantry session
    pub use crate::{
        AuthProvider, CatalogSource, InMemoryCatalog, InMemoryPantryStore, Ingredient,
        ManualAuth, Pantry, PantryError, PantrySession, SessionConfig, UserPantryStore,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
