//! Sets of values with a total order.
//!
//! Elements are kept sorted by `(type name, canonical JSON form, bincode
//! form)` and deduplicated on that key, so two sets holding the same elements
//! compare equal regardless of insertion order. JSON renders every non-finite
//! float as `null`; the bincode form keeps their bit patterns apart.

use super::Value;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Value>", into = "Vec<Value>")]
pub struct ValueSet(Vec<Value>);

/// Ordering key for an element
pub(crate) fn sort_key(value: &Value) -> (&'static str, String, Vec<u8>) {
    let canonical = serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"));
    let exact = bincode::serialize(value).unwrap_or_default();
    (value.type_name(), canonical, exact)
}

impl ValueSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element, returning false if an equal element was present
    pub fn insert(&mut self, value: impl Into<Value>) -> bool {
        let value = value.into();
        let key = sort_key(&value);
        match self.0.binary_search_by(|probe| sort_key(probe).cmp(&key)) {
            Ok(_) => false,
            Err(position) => {
                self.0.insert(position, value);
                true
            }
        }
    }

    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        let key = sort_key(value);
        self.0
            .binary_search_by(|probe| sort_key(probe).cmp(&key))
            .is_ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for ValueSet {
    fn from(items: Vec<Value>) -> Self {
        let mut keyed: Vec<_> = items.into_iter().map(|v| (sort_key(&v), v)).collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.0 == b.0);
        Self(keyed.into_iter().map(|(_, v)| v).collect())
    }
}

impl From<ValueSet> for Vec<Value> {
    fn from(set: ValueSet) -> Self {
        set.0
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
