//! Auxiliary secondary indexes.
//!
//! Every index kind the catalog can carry is a variant of [`AuxIndex`] and
//! exposes the same two capabilities: remove every entry for a rid, and
//! rebuild the entry for a rid from a live object. The internal layout per
//! kind differs considerably, so removal is implemented per kind rather
//! than over a common storage shape.

use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::Rid;
use crate::error::{CatalogDoctorError, Result};
use crate::pathutil::segments;
use crate::site::SiteObject;

/// Return all keys in a rid-set valued map whose row contains `rid`.
fn keys_pointing_to_rid<K: Ord + Clone>(map: &BTreeMap<K, BTreeSet<Rid>>, rid: Rid) -> Vec<K> {
    map.iter()
        .filter(|(_, rids)| rids.contains(&rid))
        .map(|(key, _)| key.clone())
        .collect()
}

/// Remove `rid` from every row of a rid-set valued map, dropping rows that
/// become empty. Returns the number of rows dropped.
fn remove_rid_from_rows<K: Ord + Clone>(map: &mut BTreeMap<K, BTreeSet<Rid>>, rid: Rid) -> i64 {
    let mut dropped = 0;
    for key in keys_pointing_to_rid(map, rid) {
        if let Some(row) = map.get_mut(&key) {
            row.remove(&rid);
            if row.is_empty() {
                map.remove(&key);
                dropped += 1;
            }
        }
    }
    dropped
}

/// Unique-value index: one external value maps to exactly one rid.
///
/// The forward half (`index`) and reverse half (`unindex`) must point at
/// each other; the health check cross-references both against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UuidIndex {
    pub index: BTreeMap<String, Rid>,
    pub unindex: BTreeMap<Rid, String>,
    pub length: i64,
}

impl UuidIndex {
    pub fn remove_rid(&mut self, rid: Rid) {
        let keys: Vec<String> = self
            .index
            .iter()
            .filter(|(_, entry)| **entry == rid)
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            self.index.remove(&key);
            self.length -= 1;
        }
        self.unindex.remove(&rid);
    }

    pub fn index_object(&mut self, rid: Rid, object: &SiteObject) {
        self.remove_rid(rid);
        self.index.insert(object.uuid.clone(), rid);
        self.length += 1;
        self.unindex.insert(rid, object.uuid.clone());
    }
}

/// Simple forward/reverse index over a single string attribute. Rows in the
/// forward half are rid sets; the length counter tracks distinct keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldIndex {
    pub index: BTreeMap<String, BTreeSet<Rid>>,
    pub unindex: BTreeMap<Rid, String>,
    pub length: i64,
}

impl FieldIndex {
    pub fn remove_rid(&mut self, rid: Rid) {
        self.length -= remove_rid_from_rows(&mut self.index, rid);
        self.unindex.remove(&rid);
    }

    pub fn index_object(&mut self, rid: Rid, object: &SiteObject) {
        self.remove_rid(rid);
        let value = object.title.clone();
        let row = self.index.entry(value.clone()).or_default();
        if row.is_empty() {
            self.length += 1;
        }
        row.insert(rid);
        self.unindex.insert(rid, value);
    }
}

/// Multi-valued variant of [`FieldIndex`]: the reverse half stores the full
/// keyword set per rid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordIndex {
    pub index: BTreeMap<String, BTreeSet<Rid>>,
    pub unindex: BTreeMap<Rid, BTreeSet<String>>,
    pub length: i64,
}

impl KeywordIndex {
    pub fn remove_rid(&mut self, rid: Rid) {
        self.length -= remove_rid_from_rows(&mut self.index, rid);
        self.unindex.remove(&rid);
    }

    pub fn index_object(&mut self, rid: Rid, object: &SiteObject) {
        self.remove_rid(rid);
        for subject in &object.subjects {
            let row = self.index.entry(subject.clone()).or_default();
            if row.is_empty() {
                self.length += 1;
            }
            row.insert(rid);
        }
        if !object.subjects.is_empty() {
            self.unindex.insert(rid, object.subjects.clone());
        }
    }
}

/// Date range index: rids with no range at all live in `always`, bounded
/// rids are spread over four timestamp keyed structures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRangeIndex {
    pub always: BTreeSet<Rid>,
    pub since_only: BTreeMap<i64, BTreeSet<Rid>>,
    pub until_only: BTreeMap<i64, BTreeSet<Rid>>,
    pub since: BTreeMap<i64, BTreeSet<Rid>>,
    pub until: BTreeMap<i64, BTreeSet<Rid>>,
    pub unindex: BTreeMap<Rid, (Option<i64>, Option<i64>)>,
}

impl DateRangeIndex {
    pub fn remove_rid(&mut self, rid: Rid) {
        self.always.remove(&rid);
        remove_rid_from_rows(&mut self.since_only, rid);
        remove_rid_from_rows(&mut self.until_only, rid);
        remove_rid_from_rows(&mut self.since, rid);
        remove_rid_from_rows(&mut self.until, rid);
        self.unindex.remove(&rid);
    }

    pub fn index_object(&mut self, rid: Rid, object: &SiteObject) {
        self.remove_rid(rid);
        match (object.effective, object.expires) {
            (None, None) => {
                self.always.insert(rid);
            }
            (Some(effective), None) => {
                self.since_only.entry(effective).or_default().insert(rid);
            }
            (None, Some(expires)) => {
                self.until_only.entry(expires).or_default().insert(rid);
            }
            (Some(effective), Some(expires)) => {
                self.since.entry(effective).or_default().insert(rid);
                self.until.entry(expires).or_default().insert(rid);
            }
        }
        self.unindex.insert(rid, (object.effective, object.expires));
    }
}

/// Path index with the extended helper structures: per segment and depth
/// rid sets, an exact path map and a parent path map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedPathIndex {
    pub index: BTreeMap<String, BTreeMap<usize, BTreeSet<Rid>>>,
    pub index_items: BTreeMap<String, Rid>,
    pub index_parents: BTreeMap<String, BTreeSet<Rid>>,
    pub unindex: BTreeMap<Rid, String>,
    pub length: i64,
}

impl ExtendedPathIndex {
    pub fn remove_rid(&mut self, rid: Rid) {
        let mut components_with_rid = Vec::new();
        for (component, level_to_rids) in &self.index {
            for (level, rids) in level_to_rids {
                if rids.contains(&rid) {
                    components_with_rid.push((component.clone(), *level));
                }
            }
        }
        for (component, level) in components_with_rid {
            if let Some(level_to_rids) = self.index.get_mut(&component) {
                if let Some(rids) = level_to_rids.get_mut(&level) {
                    rids.remove(&rid);
                    if rids.is_empty() {
                        level_to_rids.remove(&level);
                    }
                }
                if level_to_rids.is_empty() {
                    self.index.remove(&component);
                }
            }
        }

        let item_keys: Vec<String> = self
            .index_items
            .iter()
            .filter(|(_, entry)| **entry == rid)
            .map(|(key, _)| key.clone())
            .collect();
        for key in item_keys {
            self.index_items.remove(&key);
        }

        remove_rid_from_rows(&mut self.index_parents, rid);

        if self.unindex.remove(&rid).is_some() {
            self.length -= 1;
        }
    }

    pub fn index_object(&mut self, rid: Rid, object: &SiteObject) {
        self.remove_rid(rid);
        let path = object.path.clone();
        let parts = segments(&path);
        for (level, component) in parts.iter().enumerate() {
            self.index
                .entry((*component).to_string())
                .or_default()
                .entry(level)
                .or_default()
                .insert(rid);
        }
        self.index_items.insert(path.clone(), rid);
        if parts.len() > 1 {
            let parent = format!("/{}", parts[..parts.len() - 1].join("/"));
            self.index_parents.entry(parent).or_default().insert(rid);
        }
        self.unindex.insert(rid, path);
        self.length += 1;
    }
}

/// Boolean index: the forward half only materializes the true rids, the
/// reverse half stores every indexed value. Two separate length counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanIndex {
    pub index: BTreeSet<Rid>,
    pub unindex: BTreeMap<Rid, bool>,
    pub length: i64,
    pub index_length: i64,
}

impl BooleanIndex {
    pub fn remove_rid(&mut self, rid: Rid) {
        if self.unindex.remove(&rid).is_some() {
            self.length -= 1;
        }
        if self.index.remove(&rid) {
            self.index_length -= 1;
        }
    }

    pub fn index_object(&mut self, rid: Rid, object: &SiteObject) {
        self.remove_rid(rid);
        self.unindex.insert(rid, object.is_folderish);
        self.length += 1;
        if object.is_folderish {
            self.index.insert(rid);
            self.index_length += 1;
        }
    }
}

/// Full text index. Removal goes through the index's own unindexing API
/// instead of reaching into its internals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextIndex {
    pub docwords: BTreeMap<Rid, BTreeSet<String>>,
}

impl TextIndex {
    pub fn unindex_object(&mut self, rid: Rid) {
        self.docwords.remove(&rid);
    }

    pub fn index_object(&mut self, rid: Rid, object: &SiteObject) {
        let words: BTreeSet<String> = object
            .title
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        self.docwords.insert(rid, words);
    }

    pub fn has_doc(&self, rid: Rid) -> bool {
        self.docwords.contains_key(&rid)
    }
}

/// A catalog index. Closed enumeration: every kind the doctor can operate
/// on has a variant, and [`AuxIndex::Unsupported`] keeps the unregistered
/// kind failure an explicit, catchable error instead of a silent skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuxIndex {
    Uuid(UuidIndex),
    Field(FieldIndex),
    Keyword(KeywordIndex),
    DateRange(DateRangeIndex),
    Path(ExtendedPathIndex),
    Boolean(BooleanIndex),
    Text(TextIndex),
    /// Ordering helper that stores no data of its own; removal and rebuild
    /// are deliberate no-ops.
    Position,
    /// An index kind without a registered removal strategy.
    Unsupported(String),
}

impl AuxIndex {
    pub fn type_name(&self) -> &str {
        match self {
            AuxIndex::Uuid(_) => "UuidIndex",
            AuxIndex::Field(_) => "FieldIndex",
            AuxIndex::Keyword(_) => "KeywordIndex",
            AuxIndex::DateRange(_) => "DateRangeIndex",
            AuxIndex::Path(_) => "ExtendedPathIndex",
            AuxIndex::Boolean(_) => "BooleanIndex",
            AuxIndex::Text(_) => "TextIndex",
            AuxIndex::Position => "PositionIndex",
            AuxIndex::Unsupported(name) => name,
        }
    }

    /// Remove every entry for `rid` from this index.
    pub fn remove_rid(&mut self, rid: Rid) -> Result<()> {
        match self {
            AuxIndex::Uuid(index) => index.remove_rid(rid),
            AuxIndex::Field(index) => index.remove_rid(rid),
            AuxIndex::Keyword(index) => index.remove_rid(rid),
            AuxIndex::DateRange(index) => index.remove_rid(rid),
            AuxIndex::Path(index) => index.remove_rid(rid),
            AuxIndex::Boolean(index) => index.remove_rid(rid),
            AuxIndex::Text(index) => index.unindex_object(rid),
            AuxIndex::Position => {}
            AuxIndex::Unsupported(name) => {
                return Err(CatalogDoctorError::UnhandledIndexType {
                    type_name: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Rebuild this index's entry for `rid` from a live object.
    pub fn index_object(&mut self, rid: Rid, object: &SiteObject) -> Result<()> {
        match self {
            AuxIndex::Uuid(index) => index.index_object(rid, object),
            AuxIndex::Field(index) => index.index_object(rid, object),
            AuxIndex::Keyword(index) => index.index_object(rid, object),
            AuxIndex::DateRange(index) => index.index_object(rid, object),
            AuxIndex::Path(index) => index.index_object(rid, object),
            AuxIndex::Boolean(index) => index.index_object(rid, object),
            AuxIndex::Text(index) => index.index_object(rid, object),
            AuxIndex::Position => {}
            AuxIndex::Unsupported(name) => {
                return Err(CatalogDoctorError::UnhandledIndexType {
                    type_name: name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn as_uuid(&self) -> Option<&UuidIndex> {
        match self {
            AuxIndex::Uuid(index) => Some(index),
            _ => None,
        }
    }

    pub fn as_uuid_mut(&mut self) -> Option<&mut UuidIndex> {
        match self {
            AuxIndex::Uuid(index) => Some(index),
            _ => None,
        }
    }
}
