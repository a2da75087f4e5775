use std::collections::HashMap;

use serde::Serialize;
use shared::domain::{KeyedItem, SlotCatalogEntry};

/// One display row: a slot key and the resolved labels of its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRow {
    pub key: String,
    pub ordinal: Option<i64>,
    pub items: Vec<String>,
}

/// Orders keyed slot data by the catalog's ordinals.
///
/// Keys the catalog does not know have no ordinal; they are kept and placed
/// after every catalogued key. The sort is stable, so ties (equal ordinals, or
/// several unknown keys) keep the order in which the data iterated them.
#[derive(Debug, Clone, Default)]
pub struct SlotOrderingProjector {
    ordinals: HashMap<String, i64>,
}

impl SlotOrderingProjector {
    /// Duplicate catalog ids resolve to the last entry seen, including one without an ordinal.
    pub fn new(catalog: &[SlotCatalogEntry]) -> Self {
        let mut ordinals = HashMap::with_capacity(catalog.len());
        for slot in catalog {
            match slot.ordinal {
                Some(ordinal) => ordinals.insert(slot.id.clone(), ordinal),
                None => ordinals.remove(&slot.id),
            };
        }
        Self { ordinals }
    }

    pub fn ordinal(&self, key: &str) -> Option<i64> {
        self.ordinals.get(key).copied()
    }

    pub fn project<'a, I>(&self, data: I) -> Vec<SlotRow>
    where
        I: IntoIterator<Item = (&'a String, &'a Vec<KeyedItem>)>,
    {
        let mut rows: Vec<SlotRow> = data
            .into_iter()
            .map(|(key, items)| SlotRow {
                key: key.clone(),
                ordinal: self.ordinal(key),
                items: items.iter().map(|item| item.label().to_string()).collect(),
            })
            .collect();

        rows.sort_by_key(|row| (row.ordinal.is_none(), row.ordinal));
        rows
    }
}

pub fn project<'a, I>(catalog: &[SlotCatalogEntry], data: I) -> Vec<SlotRow>
where
    I: IntoIterator<Item = (&'a String, &'a Vec<KeyedItem>)>,
{
    SlotOrderingProjector::new(catalog).project(data)
}

#[cfg(test)]
#[path = "tests/projection_tests.rs"]
mod tests;
