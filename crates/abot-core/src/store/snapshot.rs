use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Collection, CollectionKind, Collections, ADMINS, BLACKLIST, USERS};
use crate::{
    domain::{EndUser, UserId},
    errors::Error,
    Result,
};

const FORMAT_VERSION: u32 = 1;

/// A deep copy of every collection in the store.
///
/// Encoded as `{"version": 1, "collections": {NAME: {"kind": ..., ...}}}`.
/// Unknown top-level fields are ignored so newer writers stay readable.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub version: u32,
    pub collections: Collections,
}

#[derive(Deserialize)]
struct WireSnapshot {
    #[serde(default)]
    version: u32,
    collections: BTreeMap<String, Value>,
}

impl Snapshot {
    pub(crate) fn new(collections: Collections) -> Self {
        Self {
            version: FORMAT_VERSION,
            collections,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn decode(text: &str) -> Result<Snapshot> {
    let mut collections = Collections::new();
    apply(&mut collections, text)?;
    Ok(Snapshot::new(collections))
}

/// Empty `state` and repopulate it from `text`, kind by kind.
///
/// Entries with an unrecognized kind are skipped; a malformed entry of a known
/// kind, or a bot collection of the wrong shape, is an error and leaves `state`
/// partially written (callers roll back).
pub(crate) fn apply(state: &mut Collections, text: &str) -> Result<usize> {
    let wire: WireSnapshot = serde_json::from_str(text)?;
    if wire.version > FORMAT_VERSION {
        tracing::warn!(
            version = wire.version,
            "backup written by a newer format version; reading known kinds only"
        );
    }

    for coll in state.values_mut() {
        coll.clear();
    }

    let mut restored = 0usize;
    for (name, raw) in wire.collections {
        match raw.get("kind").and_then(Value::as_str) {
            Some("set" | "list" | "map") => {
                let coll = match serde_json::from_value::<Collection>(raw)? {
                    Collection::Set { items } => Collection::Set {
                        items: dedup(items),
                    },
                    Collection::Map { entries } => Collection::Map {
                        entries: dedup_keys(entries),
                    },
                    other => other,
                };
                check_reserved(&name, &coll)?;
                state.insert(name, coll);
                restored += 1;
            }
            other => {
                tracing::error!(
                    collection = %name,
                    kind = ?other,
                    "unable to identify collection kind during recovery; skipped"
                );
            }
        }
    }
    Ok(restored)
}

fn dedup(items: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for v in items {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Later entries for an existing key overwrite it in place.
fn dedup_keys(entries: Vec<(Value, Value)>) -> Vec<(Value, Value)> {
    let mut out: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        match out.iter_mut().find(|(existing, _)| *existing == k) {
            Some(slot) => slot.1 = v,
            None => out.push((k, v)),
        }
    }
    out
}

/// The dispatcher reads `USERS`, `BLACKLIST` and the admin sets on every
/// update, so they must come back as sets of the right element type.
fn check_reserved(name: &str, coll: &Collection) -> Result<()> {
    let is_admins = name == ADMINS
        || name
            .strip_prefix(ADMINS)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|chat| chat.parse::<i64>().is_ok());
    if name != USERS && name != BLACKLIST && !is_admins {
        return Ok(());
    }

    let items = match coll {
        Collection::Set { items } => items,
        other => {
            return Err(Error::KindMismatch {
                name: name.to_string(),
                expected: CollectionKind::Set.as_str(),
                found: other.kind().as_str(),
            })
        }
    };
    for item in items {
        if name == USERS {
            serde_json::from_value::<EndUser>(item.clone())?;
        } else {
            serde_json::from_value::<UserId>(item.clone())?;
        }
    }
    Ok(())
}
