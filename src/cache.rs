//! Per-screen asset document cache.
//!
//! Maps a screen name to the latest document fetched for each profile type.
//! A key exists only after at least one successful fetch; an entry holding a
//! single document (the screen listing) is not yet complete.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::catalog::ProfileType;

/// Documents of one screen, keyed by profile.
pub type ProfileDocuments = HashMap<ProfileType, Arc<Value>>;

#[derive(Default)]
pub struct AssetCache {
    screens: Mutex<HashMap<String, ProfileDocuments>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProfileDocuments>> {
        self.screens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `document` for one profile, keeping the screen's other documents.
    pub fn upsert(&self, screen_name: &str, profile: ProfileType, document: Value) {
        self.lock()
            .entry(screen_name.to_string())
            .or_default()
            .insert(profile, Arc::new(document));
    }

    /// Like [`upsert`](Self::upsert), but never creates a screen; returns
    /// false when the screen has been pruned.
    pub fn update_existing(&self, screen_name: &str, profile: ProfileType, document: Value) -> bool {
        match self.lock().get_mut(screen_name) {
            Some(docs) => {
                docs.insert(profile, Arc::new(document));
                true
            }
            None => false,
        }
    }

    pub fn snapshot_keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Copy of every entry, ordered by screen name. Documents are shared, not cloned.
    pub fn snapshot_all(&self) -> BTreeMap<String, ProfileDocuments> {
        self.lock()
            .iter()
            .map(|(name, docs)| (name.clone(), docs.clone()))
            .collect()
    }

    /// Drops every screen not in `screen_names`; returns how many were removed.
    pub fn retain(&self, screen_names: &HashSet<String>) -> usize {
        let mut screens = self.lock();
        let before = screens.len();
        screens.retain(|name, _| screen_names.contains(name));
        before - screens.len()
    }

    /// True when some screen only has its screen document so far.
    pub fn has_incomplete(&self) -> bool {
        self.lock().values().any(|docs| docs.len() == 1)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_upsert_preserves_other_profiles() {
        let cache = AssetCache::new();
        cache.upsert("Lobby", ProfileType::NovastarScreen, json!([{"a": 1}]));
        assert!(cache.has_incomplete());

        cache.upsert("Lobby", ProfileType::NovastarReceiver, json!([]));
        cache.upsert("Lobby", ProfileType::NovastarReceiver, json!([{"b": 2}]));

        let all = cache.snapshot_all();
        let docs = &all["Lobby"];
        assert_eq!(docs.len(), 2);
        assert_eq!(*docs[&ProfileType::NovastarReceiver], json!([{"b": 2}]));
        assert!(!cache.has_incomplete());
    }

    #[test]
    fn test_update_existing_ignores_pruned_screens() {
        let cache = AssetCache::new();
        assert!(!cache.update_existing("Hall", ProfileType::NovastarReceiver, json!([])));
        assert!(cache.is_empty());

        cache.upsert("Lobby", ProfileType::NovastarScreen, json!([]));
        assert!(cache.update_existing("Lobby", ProfileType::NovastarReceiver, json!([{"b": 2}])));
        assert_eq!(cache.snapshot_all()["Lobby"].len(), 2);

        cache.retain(&HashSet::new());
        assert!(!cache.update_existing("Lobby", ProfileType::NovastarSender, json!([])));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_retain_and_clear() {
        let cache = AssetCache::new();
        for name in ["A", "B", "C"] {
            cache.upsert(name, ProfileType::NovastarScreen, json!([]));
        }
        let keep: HashSet<String> = ["B".to_string()].into_iter().collect();
        assert_eq!(cache.retain(&keep), 2);
        assert_eq!(cache.snapshot_keys(), vec!["B".to_string()]);

        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.has_incomplete());
    }

    #[test]
    fn test_concurrent_upserts() {
        let cache = Arc::new(AssetCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let name = format!("screen-{}", i % 4);
                    cache.upsert(&name, ProfileType::NovastarScreen, json!([]));
                    cache.upsert(&name, ProfileType::NovastarSender, json!([i]));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 4);
        assert!(cache.snapshot_all().values().all(|docs| docs.len() == 2));
    }
}
