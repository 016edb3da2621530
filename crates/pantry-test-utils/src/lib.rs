//! Testing utilities for the pantry sync workspace
//!
//! Shared catalogs, configs and lookups.

#![allow(missing_docs)]

use pantry_core::{
    GroupRecord, InMemoryCatalog, Ingredient, IngredientRecord, Pantry, SessionConfig,
    ESSENTIALS_GROUP,
};
use std::time::Duration;

pub const FLUSH_PERIOD: Duration = Duration::from_secs(20);

/// Groups as `(id, description, [(name, external id, essential)])`
pub type GroupSpec<'a> = (i64, &'a str, &'a [(&'a str, i64, bool)]);

pub fn catalog_from(groups: &[GroupSpec<'_>]) -> InMemoryCatalog {
    groups
        .iter()
        .fold(InMemoryCatalog::new(), |catalog, (group_id, description, items)| {
            let records: Vec<IngredientRecord> = items
                .iter()
                .map(|(name, external_id, essential)| {
                    let record = IngredientRecord::new(*name, *external_id, *group_id);
                    if *essential {
                        record.essential()
                    } else {
                        record
                    }
                })
                .collect();
            catalog.with_group(GroupRecord::new(*group_id, *description), records)
        })
}

/// Produce, essentials (holding one essential of its own) and dairy
pub fn sample_catalog() -> InMemoryCatalog {
    catalog_from(&[
        (
            1,
            "Produce",
            &[("onion", 11282, true), ("kale", 11233, false), ("garlic", 11215, true)],
        ),
        (2, ESSENTIALS_GROUP, &[("salt", 2047, true)]),
        (3, "Dairy", &[("butter", 1001, true), ("milk", 1077, false)]),
    ])
}

pub fn test_config() -> SessionConfig {
    SessionConfig::new()
        .with_flush_interval(FLUSH_PERIOD)
        .with_hydration_retry(3, Duration::from_millis(50))
}

pub fn ingredient(pantry: &Pantry, name: &str) -> Ingredient {
    pantry
        .all_ingredients()
        .iter()
        .find(|i| i.name == name)
        .cloned()
        .unwrap_or_else(|| panic!("no ingredient named {name}"))
}

pub fn names(ingredients: &[Ingredient]) -> Vec<&str> {
    ingredients.iter().map(|i| i.name.as_str()).collect()
}
