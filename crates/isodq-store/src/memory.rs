//! # In-Memory Store
//!
//! Backs tests and embedding callers that already hold their inputs.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use isodq_core::{FamilyId, Message, MessageId, Report, RuleSet};

use crate::error::StoreError;
use crate::{MessageSource, ReportSink, RuleSource};

/// Thread-safe, cloneable ordered key-value store.
///
/// The lock is `parking_lot` and is never held across an `.await`, so a
/// panicking writer does not poison it.
#[derive(Debug)]
pub struct KeyedStore<K: Ord + Clone, V: Clone> {
    data: Arc<RwLock<BTreeMap<K, V>>>,
}

impl<K: Ord + Clone, V: Clone> Clone for KeyedStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Ord + Clone, V: Clone> Default for KeyedStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V: Clone> KeyedStore<K, V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Insert a value, returning the previous one if the key existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.write().insert(key, value)
    }

    /// Value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    /// All values in key order.
    pub fn list(&self) -> Vec<V> {
        self.data.read().values().cloned().collect()
    }

    /// All entries in key order.
    pub fn entries(&self) -> BTreeMap<K, V> {
        self.data.read().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Messages, rule sets, and reports held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    messages: KeyedStore<MessageId, Message>,
    rule_sets: KeyedStore<FamilyId, RuleSet>,
    reports: KeyedStore<MessageId, Report>,
    flushes: Arc<RwLock<usize>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a source message.
    pub fn add_message(&self, message: Message) {
        self.messages.insert(message.id.clone(), message);
    }

    /// Add or replace a family's rule set.
    pub fn add_rule_set(&self, rules: RuleSet) {
        self.rule_sets.insert(rules.family.clone(), rules);
    }

    /// The stored report for `id`.
    pub fn report(&self, id: &MessageId) -> Option<Report> {
        self.reports.get(id)
    }

    /// Every stored report, ordered by message id.
    pub fn reports(&self) -> Vec<Report> {
        self.reports.list()
    }

    /// How many times the sink was flushed.
    pub fn flush_count(&self) -> usize {
        *self.flushes.read()
    }
}

impl MessageSource for MemoryStore {
    fn read_all_messages(&self) -> Result<Vec<Message>, StoreError> {
        Ok(self.messages.list())
    }
}

impl RuleSource for MemoryStore {
    fn read_rule_sets(&self) -> Result<BTreeMap<FamilyId, RuleSet>, StoreError> {
        Ok(self.rule_sets.entries())
    }
}

impl ReportSink for MemoryStore {
    fn upsert(&self, report: Report) -> Result<(), StoreError> {
        self.reports.insert(report.message_id.clone(), report);
        Ok(())
    }

    fn flush(&self) -> Result<usize, StoreError> {
        *self.flushes.write() += 1;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_store_replaces_on_insert() {
        let store: KeyedStore<String, u32> = KeyedStore::new();
        assert!(store.insert("a".into(), 1).is_none());
        assert_eq!(store.insert("a".into(), 2), Some(1));
        assert_eq!(store.get(&"a".to_string()), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        other.add_message(Message::new("m1", "<Document/>", "pacs.008"));
        assert_eq!(store.read_all_messages().unwrap().len(), 1);
    }

    #[test]
    fn reports_upsert_by_message_id() {
        let store = MemoryStore::new();
        let first = Report::failed(MessageId::from("m1"), FamilyId::from("pacs.008"), String::new(), "a");
        let second = Report::failed(MessageId::from("m1"), FamilyId::from("pacs.008"), String::new(), "b");
        store.upsert(first).unwrap();
        store.upsert(second.clone()).unwrap();
        assert_eq!(store.reports(), vec![second]);
        store.flush().unwrap();
        assert_eq!(store.flush_count(), 1);
    }

    #[test]
    fn rule_sets_are_keyed_by_family() {
        let store = MemoryStore::new();
        store.add_rule_set(RuleSet::empty(FamilyId::from("pain.001")));
        store.add_rule_set(RuleSet::empty(FamilyId::from("camt.053")));
        let keys: Vec<String> = store
            .read_rule_sets()
            .unwrap()
            .into_keys()
            .map(|f| f.to_string())
            .collect();
        assert_eq!(keys, vec!["camt.053", "pain.001"]);
    }
}
