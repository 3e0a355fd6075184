//! In-memory record store
//!
//! Keeps collections in a `Mutex`-guarded map and evaluates filters
//! locally. Used by tests and for exercising runs without a network.
//! Failures can be injected per record title or for every query.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{Fields, Filter, Icon, Record, RecordStore};
use crate::error::RecordStoreError;

#[derive(Debug, Default)]
struct State {
    collections: BTreeMap<String, Vec<Record>>,
    next_id: u64,
    failing_titles: HashSet<String>,
    fail_queries: bool,
    query_budget: Option<usize>,
    queries: usize,
    creates: usize,
    updates: usize,
}

impl State {
    fn assign_id(&mut self) -> String {
        self.next_id += 1;
        format!("rec-{}", self.next_id)
    }
}

/// Record store backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    state: Mutex<State>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a record directly, bypassing failure injection and counters.
    pub fn insert(&self, collection_id: &str, fields: Fields, icon: Option<Icon>) -> String {
        let mut state = self.lock();
        let id = state.assign_id();
        state
            .collections
            .entry(collection_id.to_string())
            .or_default()
            .push(Record {
                id: id.clone(),
                fields,
                icon,
            });
        id
    }

    /// Snapshot of every record in a collection, in creation order.
    #[must_use]
    pub fn records(&self, collection_id: &str) -> Vec<Record> {
        self.lock()
            .collections
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Look up a record by id in any collection.
    #[must_use]
    pub fn get(&self, record_id: &str) -> Option<Record> {
        self.lock()
            .collections
            .values()
            .flatten()
            .find(|r| r.id == record_id)
            .cloned()
    }

    /// Make every `create_record` whose `Name` title equals `title` fail.
    pub fn fail_creates_titled(&self, title: &str) {
        self.lock().failing_titles.insert(title.to_string());
    }

    /// Make every subsequent `query` fail.
    pub fn fail_queries(&self) {
        self.lock().fail_queries = true;
    }

    /// Let the next `n` queries succeed, then fail every one after them.
    pub fn fail_queries_after(&self, n: usize) {
        let mut state = self.lock();
        state.query_budget = Some(state.queries + n);
    }

    /// Number of `query` calls served so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.lock().queries
    }

    /// Number of successful `create_record` calls so far.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.lock().creates
    }

    /// Number of successful `update_record` calls so far.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.lock().updates
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(
        &self,
        collection_id: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<Record>, RecordStoreError> {
        let mut state = self.lock();
        state.queries += 1;
        if state.fail_queries || state.query_budget.is_some_and(|budget| state.queries > budget) {
            return Err(RecordStoreError::Api {
                status: 503,
                message: format!("query against '{collection_id}' failed"),
            });
        }

        let records = state
            .collections
            .get(collection_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| filter.is_none_or(|f| f.matches(&r.fields)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn create_record(
        &self,
        collection_id: &str,
        fields: Fields,
        icon: Option<Icon>,
    ) -> Result<Record, RecordStoreError> {
        let mut state = self.lock();
        let title = match fields.get("Name") {
            Some(super::FieldValue::Title(title)) => Some(title.as_str()),
            _ => None,
        };
        if let Some(title) = title.filter(|t| state.failing_titles.contains(*t)) {
            return Err(RecordStoreError::Rejected(format!(
                "create of '{title}' rejected"
            )));
        }

        let record = Record {
            id: state.assign_id(),
            fields,
            icon,
        };
        state
            .collections
            .entry(collection_id.to_string())
            .or_default()
            .push(record.clone());
        state.creates += 1;
        Ok(record)
    }

    async fn update_record(
        &self,
        record_id: &str,
        fields: Fields,
    ) -> Result<(), RecordStoreError> {
        let mut state = self.lock();
        let record = state
            .collections
            .values_mut()
            .flatten()
            .find(|r| r.id == record_id)
            .ok_or_else(|| RecordStoreError::NotFound(record_id.to_string()))?;
        record.fields.extend(fields);
        state.updates += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldValue;

    fn named(name: &str, status: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("Name".to_string(), FieldValue::Title(name.to_string()));
        fields.insert("Status".to_string(), FieldValue::Select(status.to_string()));
        fields
    }

    #[tokio::test]
    async fn test_create_assigns_distinct_ids() {
        let store = InMemoryRecordStore::new();
        let a = store.create_record("db", named("a", "On"), None).await.unwrap();
        let b = store.create_record("db", named("b", "On"), None).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.records("db").len(), 2);
        assert_eq!(store.create_count(), 2);
    }

    #[tokio::test]
    async fn test_query_applies_filter() {
        let store = InMemoryRecordStore::new();
        store.insert("db", named("a", "Active"), None);
        store.insert("db", named("b", "Archive"), None);

        let filter = Filter::select_equals("Status", "Active");
        let found = store.query("db", Some(&filter)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title("Name"), Some("a"));

        let all = store.query("db", None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_query_unknown_collection_is_empty() {
        let store = InMemoryRecordStore::new();
        assert!(store.query("missing", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = InMemoryRecordStore::new();
        let id = store.insert("db", named("a", "Upcoming"), None);

        let mut patch = Fields::new();
        patch.insert("Status".to_string(), FieldValue::Select("Active".to_string()));
        store.update_record(&id, patch).await.unwrap();

        let record = store.get(&id).unwrap();
        assert_eq!(record.select("Status"), Some("Active"));
        assert_eq!(record.title("Name"), Some("a"));
        assert_eq!(store.update_count(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_record_fails() {
        let store = InMemoryRecordStore::new();
        let err = store.update_record("nope", Fields::new()).await.unwrap_err();
        assert!(matches!(err, RecordStoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_create_failure() {
        let store = InMemoryRecordStore::new();
        store.fail_creates_titled("broken");

        assert!(store.create_record("db", named("broken", "On"), None).await.is_err());
        assert!(store.create_record("db", named("fine", "On"), None).await.is_ok());
        assert_eq!(store.records("db").len(), 1);
    }

    #[tokio::test]
    async fn test_injected_query_failure() {
        let store = InMemoryRecordStore::new();
        store.fail_queries();
        let err = store.query("db", None).await.unwrap_err();
        assert!(matches!(err, RecordStoreError::Api { status: 503, .. }));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_query_failure_after_budget() {
        let store = InMemoryRecordStore::new();
        store.query("db", None).await.unwrap();
        store.fail_queries_after(2);

        assert!(store.query("db", None).await.is_ok());
        assert!(store.query("db", None).await.is_ok());
        assert!(store.query("db", None).await.is_err());
        assert!(store.query("db", None).await.is_err());
    }
}
