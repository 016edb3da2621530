//! Scripted pantry session over in-memory collaborators

use anyhow::{Context, Result};
use pantry_core::{
    HydrationOutcome, InMemoryCatalog, InMemoryPantryStore, ManualAuth, PantryRecord,
    PantrySession, SessionConfig,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// What to simulate
#[derive(Debug, Clone)]
pub(crate) struct SimOptions {
    pub(crate) config: SessionConfig,
    pub(crate) catalog: InMemoryCatalog,
    /// External ids already persisted for the user
    pub(crate) stored: Vec<i64>,
    /// External ids toggled right after the catalog loads
    pub(crate) toggles: Vec<i64>,
    /// Flush periods to let elapse
    pub(crate) ticks: u32,
    pub(crate) signed_in: bool,
}

/// Summary of a finished simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SimReport {
    pub(crate) groups: Vec<GroupSummary>,
    pub(crate) ingredients: usize,
    pub(crate) hydrated: Option<usize>,
    pub(crate) unknown_toggles: Vec<i64>,
    pub(crate) available: BTreeSet<i64>,
    pub(crate) writes: Vec<BTreeSet<i64>>,
    pub(crate) dirty_at_stop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct GroupSummary {
    pub(crate) description: String,
    pub(crate) ingredients: usize,
}

impl SimReport {
    pub(crate) fn generate_text(&self) -> String {
        let mut out = String::from("Pantry Simulation Report\n========================\n\n");
        for group in &self.groups {
            out.push_str(&format!("  {:<24} {:>4} ingredients\n", group.description, group.ingredients));
        }
        out.push_str(&format!("\nCatalog ingredients: {}\n", self.ingredients));
        match self.hydrated {
            Some(matched) => out.push_str(&format!("Hydrated: {matched} ingredients\n")),
            None => out.push_str("Hydrated: no\n"),
        }
        if !self.unknown_toggles.is_empty() {
            out.push_str(&format!("Unknown toggles: {:?}\n", self.unknown_toggles));
        }
        out.push_str(&format!("Available: {:?}\n", self.available));
        out.push_str(&format!("Writes: {}\n", self.writes.len()));
        for (idx, write) in self.writes.iter().enumerate() {
            out.push_str(&format!("  #{}: {:?}\n", idx + 1, write));
        }
        out.push_str(&format!("Dirty at stop: {}\n", self.dirty_at_stop));
        out
    }
}

pub(crate) async fn simulate(options: SimOptions) -> Result<SimReport> {
    let SimOptions {
        config,
        catalog,
        stored,
        toggles,
        ticks,
        signed_in,
    } = options;

    let period = config.flush_interval();
    let auth = ManualAuth::new(true, false);
    let store = Arc::new(InMemoryPantryStore::with_record(PantryRecord::new(stored)));
    let mut session = PantrySession::open(config, catalog, &auth, Arc::clone(&store))
        .await
        .context("failed to open pantry session")?;

    let mut unknown_toggles = Vec::new();
    for id in toggles {
        let target = session.with_pantry(|p| p.find_by_external_id(id).next().cloned());
        match target {
            Some(ingredient) => {
                session.toggle_ingredient(&ingredient)?;
            }
            None => {
                tracing::warn!(external_id = id, "no ingredient with this id");
                unknown_toggles.push(id);
            }
        }
    }

    auth.set_loading(false);
    auth.set_authenticated(signed_in);

    let hydrated = if signed_in {
        match session.hydration().await {
            Some(HydrationOutcome::Hydrated { matched }) => Some(matched),
            other => {
                tracing::warn!(outcome = ?other, "hydration did not complete");
                None
            }
        }
    } else {
        None
    };

    tokio::time::sleep(period * ticks + Duration::from_millis(1)).await;

    let (groups, ingredients, available) = session.with_pantry(|p| {
        let groups = p
            .groups()
            .iter()
            .map(|g| GroupSummary {
                description: g.description.clone(),
                ingredients: g.len(),
            })
            .collect();
        (groups, p.all_ingredients().len(), p.available_ingredient_ids())
    });
    let dirty_at_stop = session.is_dirty();
    session.stop().await;

    Ok(SimReport {
        groups,
        ingredients,
        hydrated,
        unknown_toggles,
        available: available?,
        writes: store.writes(),
        dirty_at_stop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantry_core::{GroupRecord, IngredientRecord};
    use pretty_assertions::assert_eq;

    fn options() -> SimOptions {
        SimOptions {
            config: SessionConfig::new().with_flush_interval(Duration::from_secs(1)),
            catalog: InMemoryCatalog::new().with_group(
                GroupRecord::new(1, "Spices"),
                vec![
                    IngredientRecord::new("salt", 2047, 1).essential(),
                    IngredientRecord::new("cumin", 1014, 1),
                ],
            ),
            stored: vec![1014],
            toggles: vec![2047, 5],
            ticks: 2,
            signed_in: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn signed_in_run_hydrates_and_flushes_once() {
        let report = simulate(options()).await.unwrap();

        assert_eq!(report.hydrated, Some(1));
        assert_eq!(report.unknown_toggles, vec![5]);
        assert_eq!(report.available, BTreeSet::from([1014, 2047]));
        assert_eq!(report.writes, vec![BTreeSet::from([1014, 2047])]);
        assert!(!report.dirty_at_stop);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[1].ingredients, 1);
        assert!(report.generate_text().contains("Writes: 1"));
    }

    #[tokio::test(start_paused = true)]
    async fn signed_out_run_never_writes() {
        let report = simulate(SimOptions {
            signed_in: false,
            ..options()
        })
        .await
        .unwrap();

        assert_eq!(report.hydrated, None);
        assert!(report.writes.is_empty());
        assert!(report.dirty_at_stop);
        assert_eq!(report.available, BTreeSet::from([2047]));
    }
}
