//! In-memory collaborators
//!
//! Process-local implementations of [`CatalogSource`], [`AuthProvider`] and
//! [`UserPantryStore`] for simulation and tests.

use crate::error::SourceError;
use crate::source::{AuthProvider, CatalogSource, UserPantryStore};
use crate::types::{ExternalId, GroupRecord, IngredientRecord, PantryRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::watch;

/// Catalog fixture document
///
/// ```json
/// { "groups": [ { "ingredientGroupId": 1, "ingredientGroupDescription": "Dairy",
///                 "ingredients": [ { "ingredientName": "milk", ... } ] } ] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFixture {
    /// Groups in serving order
    pub groups: Vec<FixtureGroup>,
}

/// One group of a [`CatalogFixture`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureGroup {
    /// Group header
    #[serde(flatten)]
    pub group: GroupRecord,
    /// Group contents
    #[serde(default)]
    pub ingredients: Vec<IngredientRecord>,
}

/// Catalog served from memory, with optional latency and failures per group
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    groups: Vec<(GroupRecord, Vec<IngredientRecord>)>,
    groups_error: Option<SourceError>,
    group_errors: HashMap<i64, SourceError>,
    delays: HashMap<i64, Duration>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON [`CatalogFixture`]
    ///
    /// # Errors
    /// `SourceError::Decode` if the document does not match the fixture shape.
    pub fn from_json(input: &str) -> Result<Self, SourceError> {
        let fixture: CatalogFixture =
            serde_json::from_str(input).map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(fixture
            .groups
            .into_iter()
            .fold(Self::new(), |catalog, g| catalog.with_group(g.group, g.ingredients)))
    }

    /// Append a group
    #[must_use]
    pub fn with_group(mut self, group: GroupRecord, ingredients: Vec<IngredientRecord>) -> Self {
        self.groups.push((group, ingredients));
        self
    }

    /// Delay the ingredient fetch of one group
    #[must_use]
    pub fn with_delay(mut self, group_id: i64, delay: Duration) -> Self {
        self.delays.insert(group_id, delay);
        self
    }

    /// Fail the group list fetch
    #[must_use]
    pub fn failing_groups(mut self, error: SourceError) -> Self {
        self.groups_error = Some(error);
        self
    }

    /// Fail the ingredient fetch of one group
    #[must_use]
    pub fn failing_group(mut self, group_id: i64, error: SourceError) -> Self {
        self.group_errors.insert(group_id, error);
        self
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn fetch_groups(&self) -> Result<Vec<GroupRecord>, SourceError> {
        if let Some(err) = &self.groups_error {
            return Err(err.clone());
        }
        Ok(self.groups.iter().map(|(g, _)| g.clone()).collect())
    }

    async fn fetch_ingredients(&self, group_id: i64) -> Result<Vec<IngredientRecord>, SourceError> {
        if let Some(delay) = self.delays.get(&group_id) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(err) = self.group_errors.get(&group_id) {
            return Err(err.clone());
        }
        self.groups
            .iter()
            .find(|(g, _)| g.group_id == group_id)
            .map(|(_, ingredients)| ingredients.clone())
            .ok_or_else(|| SourceError::Transport(format!("no such group: {group_id}")))
    }
}

/// Authentication signals driven by hand
///
/// Dropping it closes both signals.
#[derive(Debug)]
pub struct ManualAuth {
    loading: watch::Sender<bool>,
    authenticated: watch::Sender<bool>,
}

impl ManualAuth {
    /// Create with initial signal values
    #[inline]
    #[must_use]
    pub fn new(loading: bool, authenticated: bool) -> Self {
        Self {
            loading: watch::Sender::new(loading),
            authenticated: watch::Sender::new(authenticated),
        }
    }

    /// Settled and signed in
    #[inline]
    #[must_use]
    pub fn signed_in() -> Self {
        Self::new(false, true)
    }

    /// Publish a loading value
    #[inline]
    pub fn set_loading(&self, loading: bool) {
        self.loading.send_replace(loading);
    }

    /// Publish an authenticated value
    #[inline]
    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.send_replace(authenticated);
    }
}

impl Default for ManualAuth {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl AuthProvider for ManualAuth {
    fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    fn authenticated(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }
}

/// User pantry store kept in memory, recording every write
#[derive(Debug, Default)]
pub struct InMemoryPantryStore {
    stored: Mutex<PantryRecord>,
    writes: Mutex<Vec<BTreeSet<ExternalId>>>,
    reads: Mutex<usize>,
    failing_reads: Mutex<u32>,
    failing_writes: Mutex<u32>,
    write_delay: Option<Duration>,
}

impl InMemoryPantryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a persisted record
    #[must_use]
    pub fn with_record(record: PantryRecord) -> Self {
        Self {
            stored: Mutex::new(record),
            ..Self::default()
        }
    }

    /// Hold every write for `delay` before it lands
    #[must_use]
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Fail the next `count` reads
    pub fn fail_next_reads(&self, count: u32) {
        *self.failing_reads.lock() = count;
    }

    /// Fail the next `count` writes
    pub fn fail_next_writes(&self, count: u32) {
        *self.failing_writes.lock() = count;
    }

    /// Currently persisted record
    #[must_use]
    pub fn stored(&self) -> PantryRecord {
        self.stored.lock().clone()
    }

    /// Every successful write, oldest first
    #[must_use]
    pub fn writes(&self) -> Vec<BTreeSet<ExternalId>> {
        self.writes.lock().clone()
    }

    /// Number of successful writes
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Number of read attempts, failed ones included
    #[must_use]
    pub fn read_count(&self) -> usize {
        *self.reads.lock()
    }
}

fn take_failure(counter: &Mutex<u32>) -> bool {
    let mut remaining = counter.lock();
    if *remaining == 0 {
        return false;
    }
    *remaining -= 1;
    true
}

#[async_trait]
impl UserPantryStore for InMemoryPantryStore {
    async fn get_user_pantry(&self) -> Result<PantryRecord, SourceError> {
        *self.reads.lock() += 1;
        if take_failure(&self.failing_reads) {
            return Err(SourceError::Transport("read failed".into()));
        }
        Ok(self.stored())
    }

    async fn set_user_pantry(&self, ids: BTreeSet<ExternalId>) -> Result<(), SourceError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        if take_failure(&self.failing_writes) {
            return Err(SourceError::Transport("write failed".into()));
        }
        self.stored.lock().pantry.clone_from(&ids);
        self.writes.lock().push(ids);
        Ok(())
    }
}
