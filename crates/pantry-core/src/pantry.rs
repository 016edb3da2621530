//! Pantry aggregate: catalog structure plus ingredient availability
//!
//! A [`Pantry`] starts out empty and uninitialized. Installing a catalog (see
//! [`crate::catalog::CatalogLoader`]) builds the groups, the flattened
//! ingredient list and the availability map in one step. Every mutation or
//! availability query before that fails with
//! [`PantryError::PantryNotInitialized`].

use crate::error::PantryError;
use crate::types::{ExternalId, Ingredient, IngredientGroup, IngredientKey, IngredientRecord};
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Ingredient groups with per-ingredient availability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pantry {
    ingredient_groups: Vec<IngredientGroup>,
    all_ingredients: Vec<Ingredient>,
    /// Keyed in `all_ingredients` order; `None` until a catalog is installed
    ingredient_availability: Option<IndexMap<IngredientKey, bool>>,
    essentials_index: Option<usize>,
}

impl Pantry {
    /// Create an empty, uninitialized pantry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a pantry from fetched groups
    ///
    /// `fetched` holds `(description, ingredients)` per group in fetch order.
    /// Keys are assigned in flattening order, so `all_ingredients[k.0]` is the
    /// ingredient with key `k`. The essentials group is located by
    /// description (appended empty if missing) and receives every
    /// essential-flagged fetched ingredient, including the ones it already
    /// held itself.
    #[must_use]
    pub fn assemble(fetched: Vec<(String, Vec<IngredientRecord>)>, essentials: &str) -> Self {
        let mut next_key = 0usize;
        let mut groups = Vec::with_capacity(fetched.len() + 1);
        for (description, records) in fetched {
            let mut group = IngredientGroup::new(description);
            group.ingredients.reserve(records.len());
            for record in records {
                group
                    .ingredients
                    .push(Ingredient::from_record(IngredientKey(next_key), record));
                next_key += 1;
            }
            groups.push(group);
        }

        let essentials_index = match groups.iter().position(|g| g.description == essentials) {
            Some(idx) => idx,
            None => {
                groups.push(IngredientGroup::new(essentials));
                groups.len() - 1
            }
        };

        let all_ingredients: Vec<Ingredient> = groups
            .iter()
            .flat_map(|g| g.ingredients.iter().cloned())
            .collect();

        let essential_copies = all_ingredients.iter().filter(|i| i.is_essential).cloned();
        groups[essentials_index].ingredients.extend(essential_copies);

        let availability = all_ingredients.iter().map(|i| (i.key(), false)).collect();

        tracing::debug!(
            groups = groups.len(),
            ingredients = all_ingredients.len(),
            essentials = groups[essentials_index].len(),
            "pantry assembled"
        );

        Self {
            ingredient_groups: groups,
            all_ingredients,
            ingredient_availability: Some(availability),
            essentials_index: Some(essentials_index),
        }
    }

    /// Whether the availability map exists
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.ingredient_availability.is_some()
    }

    /// Groups in fetch order, essentials group included
    #[inline]
    #[must_use]
    pub fn groups(&self) -> &[IngredientGroup] {
        &self.ingredient_groups
    }

    /// Every fetched ingredient, flattened in group order
    #[inline]
    #[must_use]
    pub fn all_ingredients(&self) -> &[Ingredient] {
        &self.all_ingredients
    }

    /// The synthesized essentials group
    #[inline]
    #[must_use]
    pub fn essentials(&self) -> Option<&IngredientGroup> {
        self.essentials_index.map(|idx| &self.ingredient_groups[idx])
    }

    /// Look up an ingredient by catalog key
    #[inline]
    #[must_use]
    pub fn ingredient(&self, key: IngredientKey) -> Option<&Ingredient> {
        self.all_ingredients.get(key.0)
    }

    /// Every ingredient occurrence carrying `external_id`
    pub fn find_by_external_id(&self, external_id: ExternalId) -> impl Iterator<Item = &Ingredient> {
        self.all_ingredients
            .iter()
            .filter(move |i| i.external_id == external_id)
    }

    /// Availability of an ingredient, `None` if unknown or uninitialized
    #[must_use]
    pub fn is_available(&self, ingredient: &Ingredient) -> Option<bool> {
        self.ingredient_availability
            .as_ref()?
            .get(&ingredient.key())
            .copied()
    }

    /// Flip the availability of `ingredient` and return the new value
    ///
    /// # Errors
    /// - `PantryNotInitialized` before a catalog is installed
    /// - `UnknownIngredient` if the ingredient is not part of this catalog
    pub fn toggle_availability(&mut self, ingredient: &Ingredient) -> Result<bool, PantryError> {
        let availability = self
            .ingredient_availability
            .as_mut()
            .ok_or(PantryError::PantryNotInitialized)?;

        let owned = self.all_ingredients.get(ingredient.key().0) == Some(ingredient);
        let slot = owned
            .then(|| availability.get_mut(&ingredient.key()))
            .flatten()
            .ok_or_else(|| PantryError::UnknownIngredient {
                name: ingredient.name.clone(),
                external_id: ingredient.external_id,
            })?;

        *slot = !*slot;
        Ok(*slot)
    }

    /// Available ingredients in availability-map order
    ///
    /// # Errors
    /// `PantryNotInitialized` before a catalog is installed.
    pub fn available_ingredients(&self) -> Result<Vec<&Ingredient>, PantryError> {
        let availability = self
            .ingredient_availability
            .as_ref()
            .ok_or(PantryError::PantryNotInitialized)?;

        Ok(availability
            .iter()
            .filter(|(_, available)| **available)
            .filter_map(|(key, _)| self.ingredient(*key))
            .collect())
    }

    /// External ids of every available ingredient, the persisted wire format
    ///
    /// # Errors
    /// `PantryNotInitialized` before a catalog is installed.
    pub fn available_ingredient_ids(&self) -> Result<BTreeSet<ExternalId>, PantryError> {
        Ok(self
            .available_ingredients()?
            .into_iter()
            .map(|i| i.external_id)
            .collect())
    }

    /// Mark every ingredient whose external id is in `ids` as available
    ///
    /// Other ingredients keep their current value and ids with no matching
    /// ingredient are ignored. Returns the number of matched ingredients.
    ///
    /// # Errors
    /// `PantryNotInitialized` before a catalog is installed.
    pub fn set_available_ingredients_by_id(
        &mut self,
        ids: &BTreeSet<ExternalId>,
    ) -> Result<usize, PantryError> {
        let availability = self
            .ingredient_availability
            .as_mut()
            .ok_or(PantryError::PantryNotInitialized)?;

        let mut matched = 0;
        for ingredient in &self.all_ingredients {
            if ids.contains(&ingredient.external_id) {
                if let Some(slot) = availability.get_mut(&ingredient.key()) {
                    *slot = true;
                    matched += 1;
                }
            }
        }

        let unmatched = ids
            .iter()
            .filter(|id| !self.all_ingredients.iter().any(|i| i.external_id == **id))
            .count();
        if unmatched > 0 {
            tracing::debug!(unmatched, "ignoring persisted ids missing from catalog");
        }

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rec(name: &str, id: i64, group: i64) -> IngredientRecord {
        IngredientRecord::new(name, id, group)
    }

    fn sample() -> Pantry {
        Pantry::assemble(
            vec![
                (
                    "Produce".to_string(),
                    vec![rec("onion", 11282, 1).essential(), rec("kale", 11233, 1)],
                ),
                ("Pantry Essentials".to_string(), vec![rec("salt", 2047, 2).essential()]),
                (
                    "Dairy".to_string(),
                    vec![rec("butter", 1001, 3).essential(), rec("milk", 1077, 3)],
                ),
            ],
            "Pantry Essentials",
        )
    }

    fn names(group: &IngredientGroup) -> Vec<&str> {
        group.ingredients.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn new_pantry_is_uninitialized() {
        let mut pantry = Pantry::new();
        assert!(!pantry.is_initialized());
        assert!(matches!(
            pantry.available_ingredients(),
            Err(PantryError::PantryNotInitialized)
        ));
        assert!(matches!(
            pantry.set_available_ingredients_by_id(&BTreeSet::from([1])),
            Err(PantryError::PantryNotInitialized)
        ));

        let stray = Ingredient::from_record(IngredientKey(0), rec("salt", 1, 1));
        assert!(matches!(
            pantry.toggle_availability(&stray),
            Err(PantryError::PantryNotInitialized)
        ));
        assert_eq!(pantry.is_available(&stray), None);
    }

    #[test]
    fn all_ingredients_follow_group_order() {
        let pantry = sample();
        let all: Vec<&str> = pantry.all_ingredients().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(all, vec!["onion", "kale", "salt", "butter", "milk"]);
        for (idx, ingredient) in pantry.all_ingredients().iter().enumerate() {
            assert_eq!(ingredient.key(), IngredientKey(idx));
        }
    }

    #[test]
    fn essentials_group_collects_flagged_ingredients_with_self_inclusion() {
        let pantry = sample();
        let essentials = pantry.essentials().unwrap();
        assert_eq!(essentials.description, "Pantry Essentials");
        // salt was already fetched into the essentials group and is appended again
        assert_eq!(names(essentials), vec!["salt", "onion", "salt", "butter"]);
        assert_eq!(pantry.groups().len(), 3);
    }

    #[test]
    fn missing_essentials_group_is_synthesized_last() {
        let pantry = Pantry::assemble(
            vec![("Produce".to_string(), vec![rec("garlic", 11215, 1).essential()])],
            "Pantry Essentials",
        );
        assert_eq!(pantry.groups().len(), 2);
        assert_eq!(pantry.groups()[1].description, "Pantry Essentials");
        assert_eq!(names(pantry.essentials().unwrap()), vec!["garlic"]);
        assert_eq!(pantry.all_ingredients().len(), 1);
    }

    #[test]
    fn availability_defaults_to_false() {
        let pantry = sample();
        assert!(pantry.available_ingredients().unwrap().is_empty());
        assert!(pantry.available_ingredient_ids().unwrap().is_empty());
        for ingredient in pantry.all_ingredients() {
            assert_eq!(pantry.is_available(ingredient), Some(false));
        }
    }

    #[test]
    fn toggle_flips_and_reports() {
        let mut pantry = sample();
        let kale = pantry.all_ingredients()[1].clone();

        assert!(pantry.toggle_availability(&kale).unwrap());
        assert_eq!(pantry.is_available(&kale), Some(true));
        assert_eq!(pantry.available_ingredient_ids().unwrap(), BTreeSet::from([11233]));

        assert!(!pantry.toggle_availability(&kale).unwrap());
        assert!(pantry.available_ingredients().unwrap().is_empty());
    }

    #[test]
    fn toggle_through_essentials_copy_hits_origin() {
        let mut pantry = sample();
        let onion_copy = pantry.essentials().unwrap().ingredients[1].clone();
        pantry.toggle_availability(&onion_copy).unwrap();
        assert_eq!(pantry.is_available(&pantry.all_ingredients()[0].clone()), Some(true));
    }

    #[test]
    fn toggle_foreign_ingredient_is_unknown() {
        let mut pantry = sample();
        let foreign = Ingredient::from_record(IngredientKey(0), rec("truffle", 999, 9));
        let err = pantry.toggle_availability(&foreign).unwrap_err();
        assert!(matches!(err, PantryError::UnknownIngredient { external_id: 999, .. }));

        let out_of_range = Ingredient::from_record(IngredientKey(42), rec("onion", 11282, 1));
        assert!(pantry.toggle_availability(&out_of_range).is_err());
    }

    #[test]
    fn available_ingredients_follow_insertion_order() {
        let mut pantry = sample();
        let milk = pantry.all_ingredients()[4].clone();
        let onion = pantry.all_ingredients()[0].clone();
        pantry.toggle_availability(&milk).unwrap();
        pantry.toggle_availability(&onion).unwrap();

        let available: Vec<&str> = pantry
            .available_ingredients()
            .unwrap()
            .into_iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(available, vec!["onion", "milk"]);
    }

    #[test]
    fn hydration_ignores_unmatched_ids() {
        let mut pantry = sample();
        let butter = pantry.all_ingredients()[3].clone();
        pantry.toggle_availability(&butter).unwrap();

        let matched = pantry
            .set_available_ingredients_by_id(&BTreeSet::from([2047, 424_242]))
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(
            pantry.available_ingredient_ids().unwrap(),
            BTreeSet::from([1001, 2047])
        );
    }

    #[test]
    fn hydration_marks_every_occurrence_of_an_id() {
        let mut pantry = Pantry::assemble(
            vec![
                ("A".to_string(), vec![rec("rice", 20444, 1)]),
                ("B".to_string(), vec![rec("rice", 20444, 2)]),
            ],
            "Pantry Essentials",
        );
        let matched = pantry
            .set_available_ingredients_by_id(&BTreeSet::from([20444]))
            .unwrap();
        assert_eq!(matched, 2);
        assert_eq!(pantry.available_ingredients().unwrap().len(), 2);
        assert_eq!(pantry.find_by_external_id(20444).count(), 2);
    }

    #[test]
    fn availability_size_is_fixed() {
        let mut pantry = sample();
        let before = pantry.all_ingredients().len();
        let kale = pantry.all_ingredients()[1].clone();
        pantry.toggle_availability(&kale).unwrap();
        pantry
            .set_available_ingredients_by_id(&BTreeSet::from([1, 2, 3]))
            .unwrap();
        assert_eq!(pantry.ingredient_availability.as_ref().unwrap().len(), before);
    }
}
