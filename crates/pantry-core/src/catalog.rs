//! Catalog loading
//!
//! Fetches the group list, then every group's ingredients concurrently, and
//! assembles a fully keyed [`Pantry`]. Any failed fetch aborts the whole load.

use crate::config::ESSENTIALS_GROUP;
use crate::error::PantryError;
use crate::pantry::Pantry;
use crate::source::CatalogSource;
use futures::future::try_join_all;

/// Builds a [`Pantry`] from a [`CatalogSource`]
#[derive(Debug, Clone)]
pub struct CatalogLoader<S> {
    source: S,
    essentials_group: String,
}

impl<S: CatalogSource> CatalogLoader<S> {
    /// Create a loader with the default essentials group description
    #[inline]
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            essentials_group: ESSENTIALS_GROUP.to_string(),
        }
    }

    /// With essentials group description
    #[inline]
    #[must_use]
    pub fn with_essentials_group(mut self, description: impl Into<String>) -> Self {
        self.essentials_group = description.into();
        self
    }

    /// Fetch and assemble the catalog
    ///
    /// Group order in the result equals the order of the group list,
    /// independent of which per-group fetch finishes first.
    ///
    /// # Errors
    /// `PantryError::CatalogFetch` if the group list or any group's
    /// ingredients cannot be fetched. Nothing is published in that case.
    pub async fn load(&self) -> Result<Pantry, PantryError> {
        let groups = self
            .source
            .fetch_groups()
            .await
            .map_err(|e| PantryError::catalog(None, e))?;
        tracing::debug!(groups = groups.len(), "fetched ingredient groups");

        let fetched = try_join_all(groups.into_iter().map(|group| async move {
            let records = self
                .source
                .fetch_ingredients(group.group_id)
                .await
                .map_err(|e| PantryError::catalog(Some(group.group_id), e))?;
            Ok::<_, PantryError>((group.description, records))
        }))
        .await?;

        let pantry = Pantry::assemble(fetched, &self.essentials_group);
        tracing::info!(
            groups = pantry.groups().len(),
            ingredients = pantry.all_ingredients().len(),
            "catalog loaded"
        );
        Ok(pantry)
    }
}
