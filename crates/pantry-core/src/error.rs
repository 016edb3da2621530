//! Error types for pantry synchronization
//!
//! Two layers:
//! - [`SourceError`] is what the external collaborators (catalog, auth, store) report
//! - [`PantryError`] is what the pantry, its loader and its session surface

/// Failure reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Caller is not authorized for the resource
    #[error("unauthorized")]
    Unauthorized,
}

/// Main pantry error type
#[derive(Debug, thiserror::Error)]
pub enum PantryError {
    /// Group list or a per-group ingredient fetch failed
    #[error("catalog fetch failed{}: {source}", group_suffix(.group_id))]
    CatalogFetch {
        /// Group whose ingredient fetch failed (`None` for the group list itself)
        group_id: Option<i64>,
        /// Underlying collaborator failure
        #[source]
        source: SourceError,
    },

    /// Availability map does not exist yet
    #[error("pantry not initialized: catalog has not been loaded")]
    PantryNotInitialized,

    /// Ingredient is not a key of the availability map
    #[error("unknown ingredient: {name} (external id {external_id})")]
    UnknownIngredient {
        /// Ingredient name
        name: String,
        /// External catalog identifier
        external_id: i64,
    },

    /// Reading the persisted user pantry failed
    #[error("remote read failed: {0}")]
    RemoteRead(#[source] SourceError),

    /// Writing the user pantry failed
    #[error("remote write failed: {0}")]
    RemoteWrite(#[source] SourceError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl PantryError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CatalogFetch { source, .. }
            | Self::RemoteRead(source)
            | Self::RemoteWrite(source) => !matches!(source, SourceError::Unauthorized),
            _ => false,
        }
    }

    /// Check if error signals an ordering bug rather than an external failure
    ///
    /// Debug builds panic on these; release builds log and carry on.
    #[inline]
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::PantryNotInitialized | Self::UnknownIngredient { .. }
        )
    }

    pub(crate) fn catalog(group_id: Option<i64>, source: SourceError) -> Self {
        Self::CatalogFetch { group_id, source }
    }
}

fn group_suffix(group_id: &Option<i64>) -> String {
    group_id.map_or_else(String::new, |id| format!(" for group {id}"))
}
