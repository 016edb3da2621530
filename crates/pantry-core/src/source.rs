//! Seams to the external collaborators
//!
//! The transport, the authentication provider and the remote pantry endpoint
//! live outside this crate; the session only talks to them through these traits.

use crate::error::SourceError;
use crate::types::{ExternalId, GroupRecord, IngredientRecord, PantryRecord};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Remote ingredient catalog
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the ordered list of ingredient groups
    async fn fetch_groups(&self) -> Result<Vec<GroupRecord>, SourceError>;

    /// Fetch the ingredients of one group, in display order
    async fn fetch_ingredients(&self, group_id: i64) -> Result<Vec<IngredientRecord>, SourceError>;
}

/// Authentication provider
///
/// Both signals deliver their current value immediately on subscription and
/// every later change at least once.
pub trait AuthProvider: Send + Sync {
    /// `true` while the provider is still resolving the session
    fn loading(&self) -> watch::Receiver<bool>;

    /// `true` while the user is authenticated
    fn authenticated(&self) -> watch::Receiver<bool>;
}

/// Remote store of the user's pantry
#[async_trait]
pub trait UserPantryStore: Send + Sync {
    /// Read the persisted availability record
    async fn get_user_pantry(&self) -> Result<PantryRecord, SourceError>;

    /// Replace the persisted availability record
    async fn set_user_pantry(&self, ids: BTreeSet<ExternalId>) -> Result<(), SourceError>;
}

#[async_trait]
impl<T: CatalogSource + ?Sized> CatalogSource for Arc<T> {
    async fn fetch_groups(&self) -> Result<Vec<GroupRecord>, SourceError> {
        (**self).fetch_groups().await
    }

    async fn fetch_ingredients(&self, group_id: i64) -> Result<Vec<IngredientRecord>, SourceError> {
        (**self).fetch_ingredients(group_id).await
    }
}

#[async_trait]
impl<T: UserPantryStore + ?Sized> UserPantryStore for Arc<T> {
    async fn get_user_pantry(&self) -> Result<PantryRecord, SourceError> {
        (**self).get_user_pantry().await
    }

    async fn set_user_pantry(&self, ids: BTreeSet<ExternalId>) -> Result<(), SourceError> {
        (**self).set_user_pantry(ids).await
    }
}
