//! Deduplicated string tables.
//!
//! Each table is sorted and unique, so an index is stable for a given input
//! and independent of insertion order.

use std::collections::BTreeMap;

use serde::Serialize;

/// Sorted unique strings plus a reverse lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StringTable {
    entries: Vec<String>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

impl StringTable {
    /// Build a table whose first index is `base`.
    fn with_base<'s>(items: impl IntoIterator<Item = &'s str>, base: usize) -> Self {
        let mut index: BTreeMap<String, usize> = items.into_iter().map(|s| (s.to_string(), 0)).collect();
        for (i, slot) in index.values_mut().enumerate() {
            *slot = base + i;
        }
        Self { entries: index.keys().cloned().collect(), index }
    }

    pub fn new<'s>(items: impl IntoIterator<Item = &'s str>) -> Self {
        Self::with_base(items, 0)
    }

    pub fn get(&self, s: &str) -> Option<usize> {
        self.index.get(s).copied()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// --- Name fragments ----------------------------------------------------------

/// Fragments shorter than this are not worth a table slot.
const MIN_FRAGMENT_LEN: usize = 4;
/// A fragment must occur at least this often.
const MIN_FRAGMENT_COUNT: usize = 4;
/// Fragment codes are the control characters `\x01..=\x1f`.
pub(crate) const MAX_FRAGMENTS: usize = 31;

/// Leading `component/` pieces of a name, excluding the last component.
fn fragments_of(name: &str) -> impl Iterator<Item = &str> {
    let end = name.rfind('/').map_or(0, |i| i + 1);
    name[..end].split_inclusive('/')
}

/// Table of recurring name fragments; indices start at 1 so that a
/// compressed name never contains NUL.
pub(crate) fn fragment_table<'s>(names: impl IntoIterator<Item = &'s str>) -> StringTable {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in names {
        for fragment in fragments_of(name).filter(|f| f.len() >= MIN_FRAGMENT_LEN) {
            *counts.entry(fragment).or_default() += 1;
        }
    }
    let frequent = counts.into_iter().filter(|&(_, count)| count >= MIN_FRAGMENT_COUNT).map(|(f, _)| f);
    StringTable::with_base(frequent, 1)
}

/// Replace every known leading fragment with its one-character code.
pub(crate) fn compress_name(name: &str, fragments: &StringTable) -> String {
    let end = name.rfind('/').map_or(0, |i| i + 1);
    let mut out = String::with_capacity(name.len());
    for fragment in fragments_of(name) {
        match fragments.get(fragment).and_then(|i| char::from_u32(i as u32)) {
            Some(code) => out.push(code),
            None => out.push_str(fragment),
        }
    }
    out.push_str(&name[end..]);
    out
}
