//! Named, durable collections (sets, lists, maps) with whole-store
//! backup/restore.
//!
//! Values are kept as JSON so any serde type can live in a collection and
//! round-trip through a backup as its own kind. `commit()` is the only
//! durability boundary: mutations through the handles are in-memory until
//! then.

mod backend;
mod handle;
mod snapshot;

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Mutex, MutexGuard},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{domain::ChatId, errors::Error, Result};

pub use backend::{JsonFileBackend, MemoryBackend, StoreBackend};
pub use handle::{ListHandle, MapHandle, SetHandle};
pub use snapshot::Snapshot;

pub const ADMINS: &str = "ADMINS";
pub const USERS: &str = "USERS";
pub const BLACKLIST: &str = "BLACKLIST";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionKind {
    Set,
    List,
    Map,
}

impl CollectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Set => "Set",
            CollectionKind::List => "List",
            CollectionKind::Map => "Map",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named collection.
///
/// Sets keep unique members in insertion order, but compare order-insensitively.
/// Map entries are `[key, value]` pairs so keys may be any serializable type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Collection {
    Set { items: Vec<Value> },
    List { items: Vec<Value> },
    Map { entries: Vec<(Value, Value)> },
}

impl Collection {
    pub fn empty(kind: CollectionKind) -> Self {
        match kind {
            CollectionKind::Set => Collection::Set { items: Vec::new() },
            CollectionKind::List => Collection::List { items: Vec::new() },
            CollectionKind::Map => Collection::Map {
                entries: Vec::new(),
            },
        }
    }

    pub fn kind(&self) -> CollectionKind {
        match self {
            Collection::Set { .. } => CollectionKind::Set,
            Collection::List { .. } => CollectionKind::List,
            Collection::Map { .. } => CollectionKind::Map,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Collection::Set { items } | Collection::List { items } => items.len(),
            Collection::Map { entries } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        match self {
            Collection::Set { items } | Collection::List { items } => items.clear(),
            Collection::Map { entries } => entries.clear(),
        }
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Collection::List { items: a }, Collection::List { items: b }) => a == b,
            (Collection::Set { items: a }, Collection::Set { items: b }) => {
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (Collection::Map { entries: a }, Collection::Map { entries: b }) => {
                a.len() == b.len() && a.iter().all(|e| b.contains(e))
            }
            _ => false,
        }
    }
}

pub(crate) type Collections = BTreeMap<String, Collection>;

/// The persistent associative store shared by the dispatcher and handlers.
pub struct Store {
    state: Mutex<Collections>,
    commit_lock: Mutex<()>,
    backend: Box<dyn StoreBackend>,
}

impl Store {
    /// Open a store over `backend`, loading whatever it last committed.
    pub fn open(backend: impl StoreBackend + 'static) -> Result<Self> {
        let state = match backend.load()? {
            Some(text) => snapshot::decode(&text)?.collections,
            None => Collections::new(),
        };
        tracing::info!(collections = state.len(), "store opened");
        Ok(Self {
            state: Mutex::new(state),
            commit_lock: Mutex::new(()),
            backend: Box::new(backend),
        })
    }

    /// Volatile store for tests and offline runs.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(Collections::new()),
            commit_lock: Mutex::new(()),
            backend: Box::new(MemoryBackend::default()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Collections> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ensure `name` exists as a `kind` collection (created empty on first use).
    fn ensure(&self, name: &str, kind: CollectionKind) -> Result<()> {
        let mut state = self.lock();
        let coll = state
            .entry(name.to_string())
            .or_insert_with(|| Collection::empty(kind));
        if coll.kind() != kind {
            return Err(Error::KindMismatch {
                name: name.to_string(),
                expected: kind.as_str(),
                found: coll.kind().as_str(),
            });
        }
        Ok(())
    }

    pub fn set<T>(&self, name: &str) -> Result<SetHandle<'_, T>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.ensure(name, CollectionKind::Set)?;
        Ok(SetHandle::new(self, name))
    }

    pub fn list<T>(&self, name: &str) -> Result<ListHandle<'_, T>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.ensure(name, CollectionKind::List)?;
        Ok(ListHandle::new(self, name))
    }

    pub fn map<K, V>(&self, name: &str) -> Result<MapHandle<'_, K, V>>
    where
        K: Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned,
    {
        self.ensure(name, CollectionKind::Map)?;
        Ok(MapHandle::new(self, name))
    }

    pub fn group_set<T>(&self, name: &str, chat_id: ChatId) -> Result<SetHandle<'_, T>>
    where
        T: Serialize + DeserializeOwned,
    {
        self.set(&group_name(name, chat_id))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.exists(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// One-line `NAME - Kind - size` description.
    pub fn describe(&self, name: &str) -> Result<String> {
        let state = self.lock();
        let coll = state
            .get(name)
            .ok_or_else(|| Error::UnknownCollection(name.to_string()))?;
        Ok(describe_line(name, coll))
    }

    /// `describe` lines for every collection, sorted by name.
    pub fn summary(&self) -> String {
        self.lock()
            .iter()
            .map(|(name, coll)| describe_line(name, coll))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Deep copy of every collection (not a live view).
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.lock().clone())
    }

    pub fn commit(&self) -> Result<()> {
        let _guard = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        let text = self.snapshot().encode()?;
        self.backend.save(&text)?;
        tracing::debug!(bytes = text.len(), "store committed");
        Ok(())
    }

    /// Empty every collection (names are kept) and commit.
    pub fn clear(&self) -> Result<()> {
        {
            let mut state = self.lock();
            for coll in state.values_mut() {
                coll.clear();
            }
        }
        self.commit()
    }

    /// Serialize the whole store to the self-describing backup format.
    pub fn backup_all(&self) -> Result<String> {
        self.snapshot().encode()
    }

    /// Replace the store's contents with a backup.
    ///
    /// Existing collections are emptied and repopulated by kind. If the input
    /// cannot be applied, or the restored state cannot be committed, the
    /// pre-call state is put back. Returns whether the backup was applied and
    /// committed.
    pub fn restore_all(&self, data: &str) -> bool {
        let rollback = {
            let mut state = self.lock();
            let rollback = state.clone();
            match snapshot::apply(&mut state, data) {
                Ok(count) => {
                    tracing::info!(collections = count, "store restored from backup");
                    rollback
                }
                Err(e) => {
                    tracing::error!(error = %e, "could not restore store from backup; rolling back");
                    *state = rollback;
                    drop(state);
                    if let Err(e) = self.commit() {
                        tracing::error!(error = %e, "commit after rollback failed");
                    }
                    return false;
                }
            }
        };

        match self.commit() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "commit after restore failed; rolling back");
                *self.lock() = rollback;
                false
            }
        }
    }
}

pub(crate) fn group_name(name: &str, chat_id: ChatId) -> String {
    format!("{name}-{}", chat_id.0)
}

fn describe_line(name: &str, coll: &Collection) -> String {
    format!("{name} - {} - {}", coll.kind(), coll.len())
}
