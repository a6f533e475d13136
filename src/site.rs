//! The object retrieval collaborator.
//!
//! The doctor never owns the objects a catalog describes; it only needs to
//! ask "is there still an object at this path, and where does it really
//! live". That surface is the [`ObjectSite`] trait. An in-memory
//! implementation is provided for tests and embedders; production callers
//! wrap their own object store.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Record;
use crate::pathutil::is_shorter_path;

/// A live content object as seen by the catalog.
///
/// Carries the canonical path plus every attribute the auxiliary indexes
/// consume when an entry is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteObject {
    /// Canonical physical path of the object.
    pub path: String,
    /// Stable unique identifier, indexed by the UID index.
    pub uuid: String,
    pub title: String,
    /// Keyword values, indexed by the Subject index.
    pub subjects: BTreeSet<String>,
    pub is_folderish: bool,
    /// Effective date as a unix timestamp, start of the date range.
    pub effective: Option<i64>,
    /// Expiration date as a unix timestamp, end of the date range.
    pub expires: Option<i64>,
}

impl SiteObject {
    pub fn new(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            uuid: Uuid::new_v4().to_string(),
            title: title.into(),
            subjects: BTreeSet::new(),
            is_folderish: false,
            effective: None,
            expires: None,
        }
    }

    pub fn with_subjects<I, S>(mut self, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subjects = subjects.into_iter().map(Into::into).collect();
        self
    }

    pub fn folderish(mut self) -> Self {
        self.is_folderish = true;
        self
    }

    pub fn with_effective_range(mut self, effective: Option<i64>, expires: Option<i64>) -> Self {
        self.effective = effective;
        self.expires = expires;
        self
    }

    /// The metadata record cached for this object in the catalog.
    pub fn metadata(&self) -> Record {
        let mut record = Record::new();
        record.insert("path".to_string(), self.path.clone());
        record.insert("UID".to_string(), self.uuid.clone());
        record.insert("Title".to_string(), self.title.clone());
        record
    }
}

/// Path based object lookup.
pub trait ObjectSite {
    /// Return the live object for `path`, or `None` if nothing is
    /// reachable there.
    ///
    /// Implementations may employ an ancestor fallback: when nothing lives
    /// at the exact path, an object at a shorter path with the same final
    /// segment may be returned instead. Callers detect this by comparing
    /// the returned object's canonical [`SiteObject::path`] against the
    /// path they asked for.
    fn traverse(&self, path: &str) -> Option<SiteObject>;
}

/// In-memory [`ObjectSite`] keyed by canonical path.
///
/// Traversal falls back to the nearest shorter-path object with a matching
/// final segment, mimicking how a relocated object stays reachable under
/// its stale, longer path.
#[derive(Debug, Default, Clone)]
pub struct InMemorySite {
    objects: BTreeMap<String, SiteObject>,
}

impl InMemorySite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object under its canonical path, replacing any previous one.
    pub fn add(&mut self, object: SiteObject) {
        self.objects.insert(object.path.clone(), object);
    }

    /// Remove the object at `path`, returning it if present.
    pub fn remove(&mut self, path: &str) -> Option<SiteObject> {
        self.objects.remove(path)
    }

    /// Relocate the object at `old_path` to `new_path`, keeping its uuid
    /// and attributes. Returns whether an object was moved.
    pub fn relocate(&mut self, old_path: &str, new_path: &str) -> bool {
        match self.objects.remove(old_path) {
            Some(mut object) => {
                object.path = new_path.to_string();
                self.add(object);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectSite for InMemorySite {
    fn traverse(&self, path: &str) -> Option<SiteObject> {
        if let Some(object) = self.objects.get(path) {
            return Some(object.clone());
        }

        // Ancestor fallback: the object may have been moved up the tree
        // while the catalog still records the longer path. Prefer the
        // candidate closest to the requested path.
        self.objects
            .values()
            .filter(|object| is_shorter_path(&object.path, path))
            .max_by_key(|object| crate::pathutil::segments(&object.path).len())
            .cloned()
    }
}
