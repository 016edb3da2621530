//! Core types for the pantry
//!
//! Defines:
//! - Ingredient catalog entities ([`Ingredient`], [`IngredientGroup`])
//! - Wire records exchanged with the catalog source and the user pantry store

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// External catalog identifier of an ingredient
pub type ExternalId = i64;

/// Identity of one ingredient occurrence within a loaded catalog
///
/// Assigned by the catalog loader in flattening order. Two fetched ingredients
/// with the same external id get distinct keys; a copy placed into the
/// essentials group keeps the key of its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IngredientKey(pub usize);

impl std::fmt::Display for IngredientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable ingredient value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ingredient {
    key: IngredientKey,
    /// Display name
    pub name: String,
    /// External catalog identifier (persisted remotely)
    pub external_id: ExternalId,
    /// Group the catalog assigns this ingredient to
    pub group_id: i64,
    /// Whether the ingredient belongs in the essentials group
    pub is_essential: bool,
}

impl Ingredient {
    /// Build an ingredient from its wire record
    #[inline]
    #[must_use]
    pub fn from_record(key: IngredientKey, record: IngredientRecord) -> Self {
        Self {
            key,
            name: record.name,
            external_id: record.external_id,
            group_id: record.group_id,
            is_essential: record.is_essential,
        }
    }

    /// Catalog-local identity
    #[inline]
    #[must_use]
    pub fn key(&self) -> IngredientKey {
        self.key
    }
}

/// Named, ordered group of ingredients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientGroup {
    /// Group description (also the group's display name)
    pub description: String,
    /// Ingredients in display order
    pub ingredients: Vec<Ingredient>,
}

impl IngredientGroup {
    /// Create an empty group
    #[inline]
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ingredients: Vec::new(),
        }
    }

    /// Number of ingredients
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    /// Check if group has no ingredients
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}

/// Group entry as served by the catalog source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Catalog group id
    #[serde(rename = "ingredientGroupId")]
    pub group_id: i64,
    /// Group description
    #[serde(rename = "ingredientGroupDescription")]
    pub description: String,
}

impl GroupRecord {
    /// Create a group record
    #[inline]
    #[must_use]
    pub fn new(group_id: i64, description: impl Into<String>) -> Self {
        Self {
            group_id,
            description: description.into(),
        }
    }
}

/// Ingredient entry as served by the catalog source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientRecord {
    /// Ingredient name
    #[serde(rename = "ingredientName")]
    pub name: String,
    /// External catalog identifier
    #[serde(rename = "ingredientSpoonacularId")]
    pub external_id: ExternalId,
    /// Owning group id
    #[serde(rename = "ingredientGroupId")]
    pub group_id: i64,
    /// Essential flag
    #[serde(rename = "ingredientEssentialFlg", default)]
    pub is_essential: bool,
}

impl IngredientRecord {
    /// Create an ingredient record
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, external_id: ExternalId, group_id: i64) -> Self {
        Self {
            name: name.into(),
            external_id,
            group_id,
            is_essential: false,
        }
    }

    /// Mark as essential
    #[inline]
    #[must_use]
    pub fn essential(mut self) -> Self {
        self.is_essential = true;
        self
    }
}

/// Persisted availability record of a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PantryRecord {
    /// External ids of every ingredient the user marked available
    #[serde(default)]
    pub pantry: BTreeSet<ExternalId>,
}

impl PantryRecord {
    /// Create a record from any id collection
    #[must_use]
    pub fn new(ids: impl IntoIterator<Item = ExternalId>) -> Self {
        Self {
            pantry: ids.into_iter().collect(),
        }
    }
}
