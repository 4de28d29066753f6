//! Id-to-name lookups for the entities referenced by write-off documents.
//!
//! Each dictionary is built once from a bulk listing and is read-only afterwards. Lookups are
//! total: an unknown id, or a dictionary that was never loaded, resolves to a fallback label.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

const UNKNOWN: &str = "Неизвестно";
const NO_CONCEPTION: &str = "Без концепции";

/// The kinds of entities that can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Store,
    Account,
    Conception,
    Product,
}

serde_plain::derive_display_from_serialize!(EntityKind);

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Store,
        EntityKind::Account,
        EntityKind::Conception,
        EntityKind::Product,
    ];

    /// The label used when an id cannot be resolved.
    pub fn fallback(self) -> &'static str {
        match self {
            EntityKind::Conception => NO_CONCEPTION,
            _ => UNKNOWN,
        }
    }

    /// Whether a listing entry belongs in this kind's dictionary. Stores come from the account
    /// listing and are the `INVENTORY_ASSETS` accounts; conceptions must be tagged as such.
    fn accepts(self, entry: &serde_json::Map<String, Value>) -> bool {
        match self {
            EntityKind::Store => {
                entry.get("type").and_then(Value::as_str) == Some("INVENTORY_ASSETS")
            }
            EntityKind::Conception => {
                entry.get("rootType").and_then(Value::as_str) == Some("Conception")
            }
            EntityKind::Account | EntityKind::Product => true,
        }
    }
}

/// An immutable id -> display name map for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceDictionary {
    names: HashMap<String, String>,
}

impl ReferenceDictionary {
    /// Builds the dictionary for `kind` from a bulk listing: an array of `{id, name, ...}`
    /// objects. Entries without both an `id` and a `name`, or filtered out by the kind's tag,
    /// are skipped. Anything that is not an array yields an empty dictionary.
    pub fn from_listing(kind: EntityKind, listing: &Value) -> Self {
        let names: HashMap<String, String> = listing
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
            .filter(|entry| kind.accepts(entry))
            .filter_map(|entry| {
                let id = id_string(entry.get("id")?)?;
                let name = entry.get("name")?.as_str()?.to_string();
                Some((id, name))
            })
            .collect();
        debug!("Loaded {} {kind} names", names.len());
        Self { names }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ReferenceDictionary
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Ids are strings in practice, but numeric ids are accepted and rendered as JSON shows them.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The four dictionaries for one reporting session.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    dictionaries: HashMap<EntityKind, ReferenceDictionary>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resolver with `dictionary` installed for `kind`.
    pub fn with(mut self, kind: EntityKind, dictionary: ReferenceDictionary) -> Self {
        self.dictionaries.insert(kind, dictionary);
        self
    }

    #[cfg(test)]
    pub fn is_loaded(&self, kind: EntityKind) -> bool {
        self.dictionaries.contains_key(&kind)
    }

    /// Resolves `id` to a display name, or to the kind's fallback label.
    pub fn resolve(&self, kind: EntityKind, id: Option<&str>) -> &str {
        id.and_then(|id| self.dictionaries.get(&kind)?.get(id))
            .unwrap_or_else(|| kind.fallback())
    }
}
