//! The multi-structure index store the doctor operates on.
//!
//! A catalog holds a forward mapping (path to rid), a reverse mapping (rid
//! to path), a metadata table and a set of named auxiliary indexes, plus an
//! independently tracked claimed-length counter. All structures are mirrors
//! of the same record universe and must stay mutually consistent; the
//! counter is not derived from enumeration and can drift, which is itself a
//! consistency signal.
//!
//! The catalog is always passed into the engines explicitly. Nothing in
//! this crate reaches for ambient process-wide state.

pub mod index;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::site::SiteObject;
pub use index::{
    AuxIndex, BooleanIndex, DateRangeIndex, ExtendedPathIndex, FieldIndex, KeywordIndex, TextIndex,
    UuidIndex,
};

/// Internal record identifier, the primary key record data is stored under.
pub type Rid = i64;

/// Cached metadata payload for one rid.
pub type Record = BTreeMap<String, String>;

/// Name of the auxiliary UUID index cross-checked by the health check.
pub const UID_INDEX: &str = "UID";

/// The catalog store handle.
///
/// Fields are public on purpose: the health check reads the raw structures
/// and the surgeries apply minimal targeted edits to them. Transactional
/// discipline around a check-then-repair cycle is the caller's contract.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Claimed record count, tracked independently of the mappings.
    length: i64,
    next_rid: Rid,
    /// Forward mapping, path -> rid. Admission uses this mapping to decide
    /// insert-vs-update, which makes its value set the authoritative
    /// registered-rid universe.
    pub uids: BTreeMap<String, Rid>,
    /// Reverse mapping, rid -> path.
    pub paths: BTreeMap<Rid, String>,
    /// Metadata table, rid -> cached record.
    pub data: BTreeMap<Rid, Record>,
    /// Auxiliary indexes by name.
    pub indexes: BTreeMap<String, AuxIndex>,
}

impl Catalog {
    /// An empty catalog carrying the standard index set.
    pub fn new() -> Self {
        let mut indexes = BTreeMap::new();
        indexes.insert(UID_INDEX.to_string(), AuxIndex::Uuid(UuidIndex::default()));
        indexes.insert(
            "sortable_title".to_string(),
            AuxIndex::Field(FieldIndex::default()),
        );
        indexes.insert(
            "Subject".to_string(),
            AuxIndex::Keyword(KeywordIndex::default()),
        );
        indexes.insert(
            "effectiveRange".to_string(),
            AuxIndex::DateRange(DateRangeIndex::default()),
        );
        indexes.insert(
            "path".to_string(),
            AuxIndex::Path(ExtendedPathIndex::default()),
        );
        indexes.insert(
            "is_folderish".to_string(),
            AuxIndex::Boolean(BooleanIndex::default()),
        );
        indexes.insert(
            "SearchableText".to_string(),
            AuxIndex::Text(TextIndex::default()),
        );
        indexes.insert("getObjPositionInParent".to_string(), AuxIndex::Position);

        Self {
            length: 0,
            next_rid: 97,
            uids: BTreeMap::new(),
            paths: BTreeMap::new(),
            data: BTreeMap::new(),
            indexes,
        }
    }

    /// The claimed record count.
    pub fn claimed_length(&self) -> i64 {
        self.length
    }

    /// Adjust the claimed-length counter by `delta`.
    pub fn change_length(&mut self, delta: i64) {
        self.length += delta;
    }

    /// The UUID index, when the catalog carries one.
    pub fn uuid_index(&self) -> Option<&UuidIndex> {
        self.indexes.get(UID_INDEX).and_then(AuxIndex::as_uuid)
    }

    pub fn uuid_index_mut(&mut self) -> Option<&mut UuidIndex> {
        self.indexes
            .get_mut(UID_INDEX)
            .and_then(AuxIndex::as_uuid_mut)
    }

    /// Reserve a rid that is not referenced by any structure yet.
    fn fresh_rid(&mut self) -> Rid {
        let mut rid = self.next_rid;
        while self.paths.contains_key(&rid) || self.data.contains_key(&rid) {
            rid += 1;
        }
        self.next_rid = rid + 1;
        rid
    }

    /// Admit an object into every catalog structure.
    ///
    /// If the forward mapping already knows the object's canonical path the
    /// existing rid is refreshed in place; otherwise a fresh rid is
    /// assigned and the claimed length grows by one. Returns the rid used.
    pub fn catalog_object(&mut self, object: &SiteObject) -> Result<Rid> {
        let path = object.path.clone();
        let (rid, fresh) = match self.uids.get(&path) {
            Some(&rid) => (rid, false),
            None => (self.fresh_rid(), true),
        };
        debug!(rid, path = %path, fresh, "catalog object");

        self.uids.insert(path.clone(), rid);
        self.paths.insert(rid, path);
        self.data.insert(rid, object.metadata());
        for aux in self.indexes.values_mut() {
            aux.index_object(rid, object)?;
        }
        if fresh {
            self.length += 1;
        }
        Ok(rid)
    }

    /// Remove the record at `path` from every catalog structure. Returns
    /// the removed rid, or `None` if the path was not cataloged.
    pub fn uncatalog_object(&mut self, path: &str) -> Result<Option<Rid>> {
        let Some(rid) = self.uids.remove(path) else {
            return Ok(None);
        };
        debug!(rid, path = %path, "uncatalog object");
        self.paths.remove(&rid);
        self.data.remove(&rid);
        for aux in self.indexes.values_mut() {
            aux.remove_rid(rid)?;
        }
        self.length -= 1;
        Ok(Some(rid))
    }
}
