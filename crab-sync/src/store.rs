//! Generic resource store
//!
//! One [`ResourceStore`] per resource type. `by_id` and `all_ids` always
//! hold the same id set; the by-outlet index is maintained on every
//! insert, replace and removal.

use chrono::{DateTime, Utc};
use shared::{Entity, ResourceType};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::merge::{MergeOutcome, incoming_wins};

/// Counts from a batch merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub retained: usize,
    pub removed: usize,
}

impl MergeSummary {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Replaced => self.replaced += 1,
            MergeOutcome::Retained => self.retained += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.replaced + self.retained
    }
}

#[derive(Debug)]
pub struct ResourceStore<E: Entity> {
    by_id: HashMap<String, E>,
    all_ids: Vec<String>,
    by_outlet: HashMap<String, BTreeSet<String>>,
    last_sync_timestamp: Option<DateTime<Utc>>,
    syncing: bool,
    error: Option<String>,
}

impl<E: Entity> Default for ResourceStore<E> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            all_ids: Vec::new(),
            by_outlet: HashMap::new(),
            last_sync_timestamp: None,
            syncing: false,
            error: None,
        }
    }
}

impl<E: Entity> ResourceStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Reads ==========

    pub fn get(&self, id: &str) -> Option<&E> {
        self.by_id.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Ids in insertion order
    pub fn ids(&self) -> &[String] {
        &self.all_ids
    }

    /// Entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.all_ids.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn for_outlet<'a>(&'a self, outlet_id: &str) -> impl Iterator<Item = &'a E> + 'a {
        self.by_outlet
            .get(outlet_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.all_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all_ids.is_empty()
    }

    pub fn last_sync_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_sync_timestamp
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// `by_id`, `all_ids` and the outlet index describe the same entities
    pub fn is_consistent(&self) -> bool {
        let unique: HashSet<&String> = self.all_ids.iter().collect();
        let indexed: usize = self.by_outlet.values().map(BTreeSet::len).sum();
        unique.len() == self.all_ids.len()
            && self.all_ids.len() == self.by_id.len()
            && self.all_ids.iter().all(|id| self.by_id.contains_key(id))
            && indexed == self.by_id.len()
            && self.by_id.values().all(|entity| {
                self.by_outlet
                    .get(entity.outlet_id())
                    .is_some_and(|ids| ids.contains(entity.id()))
            })
    }

    // ========== Writes ==========

    /// Merge a single entity with last-writer-wins
    pub fn upsert(&mut self, incoming: E) -> MergeOutcome {
        let id = incoming.id().to_string();
        match self.by_id.get(&id) {
            Some(existing) if !incoming_wins(existing, &incoming) => MergeOutcome::Retained,
            Some(existing) => {
                let previous_outlet = existing.outlet_id().to_string();
                if previous_outlet != incoming.outlet_id() {
                    self.unindex(&previous_outlet, &id);
                    self.index(incoming.outlet_id().to_string(), id.clone());
                }
                self.by_id.insert(id, incoming);
                MergeOutcome::Replaced
            }
            None => {
                self.index(incoming.outlet_id().to_string(), id.clone());
                self.all_ids.push(id.clone());
                self.by_id.insert(id, incoming);
                MergeOutcome::Inserted
            }
        }
    }

    /// Merge each entity; new ids are appended, nothing is removed
    pub fn merge_batch(&mut self, incoming: Vec<E>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for entity in incoming {
            summary.record(self.upsert(entity));
        }
        summary
    }

    /// Make the store hold exactly the fetched set
    ///
    /// Entities absent from `fetched` are removed; entities present are
    /// still merged so a stale copy cannot overwrite a newer pushed one.
    /// `all_ids` follows the fetched order.
    pub fn replace_view(&mut self, fetched: Vec<E>) -> MergeSummary {
        let mut keep: HashSet<String> = fetched.iter().map(|e| e.id().to_string()).collect();
        let dropped: Vec<String> = self
            .by_id
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();

        let mut summary = MergeSummary::default();
        for id in dropped {
            // all_ids is rebuilt below
            if let Some(entity) = self.by_id.remove(&id) {
                self.unindex(entity.outlet_id(), &id);
                summary.removed += 1;
            }
        }

        // `keep` doubles as the first-seen set for duplicate ids in `fetched`
        let mut order = Vec::with_capacity(keep.len());
        for entity in fetched {
            let id = entity.id().to_string();
            summary.record(self.upsert(entity));
            if keep.remove(&id) {
                order.push(id);
            }
        }
        self.all_ids = order;
        summary
    }

    pub fn remove(&mut self, id: &str) -> Option<E> {
        let entity = self.by_id.remove(id)?;
        self.all_ids.retain(|existing| existing != id);
        self.unindex(entity.outlet_id(), id);
        Some(entity)
    }

    fn index(&mut self, outlet_id: String, id: String) {
        self.by_outlet.entry(outlet_id).or_default().insert(id);
    }

    fn unindex(&mut self, outlet_id: &str, id: &str) {
        if let Some(ids) = self.by_outlet.get_mut(outlet_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_outlet.remove(outlet_id);
            }
        }
    }
}

/// Type-erased store operations used by the reconciler and the engine
pub trait StoreControl: Send + Sync {
    fn resource(&self) -> ResourceType;
    fn len(&self) -> usize;
    fn is_syncing(&self) -> bool;
    /// Set the syncing guard; `false` if a sync is already in flight
    fn begin_sync(&mut self) -> bool;
    fn end_sync(&mut self);
    fn last_sync_timestamp(&self) -> Option<DateTime<Utc>>;
    /// `max(current, reported)`
    fn advance_sync_timestamp(&mut self, reported: DateTime<Utc>);
    fn error(&self) -> Option<&str>;
    fn set_error(&mut self, error: Option<String>);
    /// Back to the empty, never-synced state
    fn reset(&mut self);
}

impl<E: Entity> StoreControl for ResourceStore<E> {
    fn resource(&self) -> ResourceType {
        E::RESOURCE
    }

    fn len(&self) -> usize {
        self.all_ids.len()
    }

    fn is_syncing(&self) -> bool {
        self.syncing
    }

    fn begin_sync(&mut self) -> bool {
        if self.syncing {
            return false;
        }
        self.syncing = true;
        true
    }

    fn end_sync(&mut self) {
        self.syncing = false;
    }

    fn last_sync_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_sync_timestamp
    }

    fn advance_sync_timestamp(&mut self, reported: DateTime<Utc>) {
        self.last_sync_timestamp = Some(match self.last_sync_timestamp {
            Some(current) => current.max(reported),
            None => reported,
        });
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::MenuItem;

    fn item(id: &str, outlet: &str, updated_at: &str, name: &str) -> MenuItem {
        let at: DateTime<Utc> = updated_at.parse().unwrap();
        MenuItem {
            id: id.into(),
            outlet_id: outlet.into(),
            created_at: at,
            updated_at: at,
            sequence_id: None,
            name: name.into(),
            description: None,
            category_id: None,
            price: Default::default(),
            is_available: true,
            image_url: None,
        }
    }

    #[test]
    fn test_upsert_and_outlet_index() {
        let mut store = ResourceStore::new();
        assert_eq!(
            store.upsert(item("mi-1", "o-1", "2024-05-01T10:00:00Z", "Dosa")),
            MergeOutcome::Inserted
        );
        assert_eq!(
            store.upsert(item("mi-1", "o-2", "2024-05-01T10:01:00Z", "Dosa")),
            MergeOutcome::Replaced
        );

        assert_eq!(store.for_outlet("o-1").count(), 0);
        assert_eq!(store.for_outlet("o-2").count(), 1);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_merge_batch_never_removes() {
        let mut store = ResourceStore::new();
        store.merge_batch(vec![
            item("mi-1", "o-1", "2024-05-01T10:00:00Z", "Dosa"),
            item("mi-2", "o-1", "2024-05-01T10:00:00Z", "Idli"),
        ]);
        let summary = store.merge_batch(vec![
            item("mi-3", "o-1", "2024-05-01T10:00:00Z", "Vada"),
            item("mi-1", "o-1", "2024-05-01T09:00:00Z", "Old Dosa"),
        ]);

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.retained, 1);
        assert_eq!(store.ids(), ["mi-1", "mi-2", "mi-3"]);
        assert_eq!(store.get("mi-1").unwrap().name, "Dosa");
        assert!(store.is_consistent());
    }

    #[test]
    fn test_replace_view_keeps_only_fetched() {
        let mut store = ResourceStore::new();
        store.merge_batch(vec![
            item("mi-1", "o-1", "2024-05-01T10:00:00Z", "Dosa"),
            item("mi-2", "o-1", "2024-05-01T10:00:00Z", "Idli"),
            item("mi-3", "o-2", "2024-05-01T10:00:00Z", "Vada"),
        ]);

        let summary = store.replace_view(vec![
            item("mi-3", "o-2", "2024-05-01T10:00:00Z", "Vada"),
            item("mi-1", "o-1", "2024-05-01T09:00:00Z", "Stale Dosa"),
        ]);

        assert_eq!(summary.removed, 1);
        assert_eq!(store.ids(), ["mi-3", "mi-1"]);
        assert!(!store.contains("mi-2"));
        assert_eq!(store.get("mi-1").unwrap().name, "Dosa");
        assert!(store.is_consistent());
    }

    #[test]
    fn test_replace_view_large_with_duplicates() {
        let mut store = ResourceStore::new();
        store.merge_batch(
            (0..5_000)
                .map(|i| item(&format!("old-{i}"), "o-1", "2024-05-01T10:00:00Z", "Old"))
                .collect(),
        );

        let mut fetched: Vec<MenuItem> = (0..20_000)
            .map(|i| item(&format!("mi-{i}"), "o-1", "2024-05-01T10:00:00Z", "New"))
            .collect();
        fetched.push(item("mi-7", "o-1", "2024-05-01T11:00:00Z", "Newer"));

        let summary = store.replace_view(fetched);

        assert_eq!(summary.removed, 5_000);
        assert_eq!(store.len(), 20_000);
        assert_eq!(store.ids().len(), 20_000);
        assert_eq!(store.ids()[7], "mi-7");
        assert_eq!(store.get("mi-7").unwrap().name, "Newer");
        assert_eq!(store.for_outlet("o-1").count(), 20_000);
        assert!(store.is_consistent());
    }

    #[test]
    fn test_sync_guard_and_timestamp() {
        let mut store: ResourceStore<MenuItem> = ResourceStore::new();
        assert!(store.begin_sync());
        assert!(!store.begin_sync());
        store.end_sync();
        assert!(store.begin_sync());

        let t1: DateTime<Utc> = "2024-05-01T12:00:00Z".parse().unwrap();
        let t0: DateTime<Utc> = "2024-05-01T11:00:00Z".parse().unwrap();
        store.advance_sync_timestamp(t1);
        store.advance_sync_timestamp(t0);
        assert_eq!(store.last_sync_timestamp(), Some(t1));

        StoreControl::reset(&mut store);
        assert!(!store.is_syncing());
        assert_eq!(store.last_sync_timestamp(), None);
    }
}
