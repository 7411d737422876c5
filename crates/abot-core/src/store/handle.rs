//! Typed live views over named collections.
//!
//! A handle is just a name plus a borrow of the store: two handles for the
//! same name always see the same data.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{Collection, CollectionKind, Store};
use crate::{errors::Error, Result};

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T> {
    Ok(serde_json::from_value(value.clone())?)
}

fn with_collection<R>(
    store: &Store,
    name: &str,
    kind: CollectionKind,
    f: impl FnOnce(&mut Collection) -> R,
) -> Result<R> {
    let mut state = store.lock();
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
    Ok(f(coll))
}

fn with_items<R>(
    store: &Store,
    name: &str,
    kind: CollectionKind,
    f: impl FnOnce(&mut Vec<Value>) -> R,
) -> Result<R> {
    with_collection(store, name, kind, |coll| match coll {
        Collection::Set { items } | Collection::List { items } => Some(f(items)),
        Collection::Map { .. } => None,
    })?
    .ok_or_else(|| Error::KindMismatch {
        name: name.to_string(),
        expected: kind.as_str(),
        found: CollectionKind::Map.as_str(),
    })
}

pub struct SetHandle<'a, T> {
    store: &'a Store,
    name: String,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T> SetHandle<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    pub(super) fn new(store: &'a Store, name: &str) -> Self {
        Self {
            store,
            name: name.to_string(),
            _item: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `false` if the member was already present.
    pub fn insert(&self, item: &T) -> Result<bool> {
        let v = encode(item)?;
        with_items(self.store, &self.name, CollectionKind::Set, |items| {
            if items.contains(&v) {
                false
            } else {
                items.push(v);
                true
            }
        })
    }

    /// Returns `false` if the member was absent.
    pub fn remove(&self, item: &T) -> Result<bool> {
        let v = encode(item)?;
        with_items(self.store, &self.name, CollectionKind::Set, |items| {
            let before = items.len();
            items.retain(|x| x != &v);
            items.len() != before
        })
    }

    pub fn contains(&self, item: &T) -> Result<bool> {
        let v = encode(item)?;
        with_items(self.store, &self.name, CollectionKind::Set, |items| {
            items.contains(&v)
        })
    }

    pub fn members(&self) -> Result<Vec<T>> {
        let raw = with_items(self.store, &self.name, CollectionKind::Set, |items| {
            items.clone()
        })?;
        raw.iter().map(decode).collect()
    }

    /// First member matching `pred`.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Result<Option<T>> {
        Ok(self.members()?.into_iter().find(|m| pred(m)))
    }

    pub fn len(&self) -> usize {
        with_items(self.store, &self.name, CollectionKind::Set, |items| items.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<()> {
        with_items(self.store, &self.name, CollectionKind::Set, |items| {
            items.clear()
        })
    }
}

pub struct ListHandle<'a, T> {
    store: &'a Store,
    name: String,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T> ListHandle<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    pub(super) fn new(store: &'a Store, name: &str) -> Self {
        Self {
            store,
            name: name.to_string(),
            _item: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&self, item: &T) -> Result<()> {
        let v = encode(item)?;
        with_items(self.store, &self.name, CollectionKind::List, |items| {
            items.push(v)
        })
    }

    pub fn get(&self, index: usize) -> Result<Option<T>> {
        let raw = with_items(self.store, &self.name, CollectionKind::List, |items| {
            items.get(index).cloned()
        })?;
        raw.as_ref().map(decode).transpose()
    }

    pub fn remove(&self, index: usize) -> Result<Option<T>> {
        let raw = with_items(self.store, &self.name, CollectionKind::List, |items| {
            (index < items.len()).then(|| items.remove(index))
        })?;
        raw.as_ref().map(decode).transpose()
    }

    pub fn items(&self) -> Result<Vec<T>> {
        let raw = with_items(self.store, &self.name, CollectionKind::List, |items| {
            items.clone()
        })?;
        raw.iter().map(decode).collect()
    }

    pub fn len(&self) -> usize {
        with_items(self.store, &self.name, CollectionKind::List, |items| items.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<()> {
        with_items(self.store, &self.name, CollectionKind::List, |items| {
            items.clear()
        })
    }
}

pub struct MapHandle<'a, K, V> {
    store: &'a Store,
    name: String,
    _entry: PhantomData<fn() -> (K, V)>,
}

impl<'a, K, V> MapHandle<'a, K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub(super) fn new(store: &'a Store, name: &str) -> Self {
        Self {
            store,
            name: name.to_string(),
            _entry: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut Vec<(Value, Value)>) -> R) -> Result<R> {
        with_collection(self.store, &self.name, CollectionKind::Map, |coll| match coll {
            Collection::Map { entries } => Some(f(entries)),
            _ => None,
        })?
        .ok_or_else(|| Error::KindMismatch {
            name: self.name.clone(),
            expected: CollectionKind::Map.as_str(),
            found: CollectionKind::Set.as_str(),
        })
    }

    /// Insert or replace; returns the previous value.
    pub fn insert(&self, key: &K, value: &V) -> Result<Option<V>> {
        let k = encode(key)?;
        let v = encode(value)?;
        let prev = self.with_entries(|entries| {
            match entries.iter_mut().find(|(ek, _)| ek == &k) {
                Some(entry) => Some(std::mem::replace(&mut entry.1, v)),
                None => {
                    entries.push((k, v));
                    None
                }
            }
        })?;
        prev.as_ref().map(decode).transpose()
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let k = encode(key)?;
        let raw = self.with_entries(|entries| {
            entries
                .iter()
                .find(|(ek, _)| ek == &k)
                .map(|(_, v)| v.clone())
        })?;
        raw.as_ref().map(decode).transpose()
    }

    pub fn remove(&self, key: &K) -> Result<Option<V>> {
        let k = encode(key)?;
        let raw = self.with_entries(|entries| {
            let idx = entries.iter().position(|(ek, _)| ek == &k)?;
            Some(entries.remove(idx).1)
        })?;
        raw.as_ref().map(decode).transpose()
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        let k = encode(key)?;
        self.with_entries(|entries| entries.iter().any(|(ek, _)| ek == &k))
    }

    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        let raw = self.with_entries(|entries| entries.clone())?;
        raw.iter()
            .map(|(k, v)| Ok((decode(k)?, decode(v)?)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.with_entries(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<()> {
        self.with_entries(|entries| entries.clear())
    }
}
