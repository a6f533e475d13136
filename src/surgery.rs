//! Repair procedures and the symptom-signature dispatcher.
//!
//! A surgery is a minimal targeted mutation for one rid. The dispatcher
//! maps a rid's exact sorted symptom tuple to the one procedure known to
//! cure it; unknown tuples get no surgery at all. Matching is strictly
//! exact, never subset or superset based, so an unfamiliar corruption
//! pattern is left untouched rather than half-repaired.
//!
//! Procedures run in two phases. The primary mutation edits only the
//! catalog and returns any follow-up [`PostOp`]s; the scheduler executes
//! those after every primary mutation in the run has completed, so a
//! readmitted object never collides with a rid that is still scheduled for
//! removal.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::debug;

use crate::catalog::{Catalog, Rid, UID_INDEX};
use crate::error::{CatalogDoctorError, Result};
use crate::healthcheck::{Symptom, UnhealthyRid};
use crate::pathutil::is_shorter_path;
use crate::report::ReportSink;
use crate::site::ObjectSite;

/// The repair procedures the doctor knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SurgeryKind {
    /// Drop a superseded rid that lost the forward-mapping race for its
    /// path, typically left behind by a move.
    RemoveExtraRid,
    /// Drop a rid no forward-mapping entry points at anymore.
    RemoveOrphanedRid,
    /// Rebuild a rid's missing UUID index entry from the live object.
    ReindexMissingUuid,
    /// Remove the rid if its object is gone or reachable at a shorter
    /// path, otherwise reindex the object in place.
    RemoveRidOrReindexObject,
}

impl SurgeryKind {
    pub fn name(self) -> &'static str {
        match self {
            SurgeryKind::RemoveExtraRid => "RemoveExtraRid",
            SurgeryKind::RemoveOrphanedRid => "RemoveOrphanedRid",
            SurgeryKind::ReindexMissingUuid => "ReindexMissingUuid",
            SurgeryKind::RemoveRidOrReindexObject => "RemoveRidOrReindexObject",
        }
    }
}

impl std::fmt::Display for SurgeryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Deferred follow-up produced by a primary mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PostOp {
    /// Catalog the object at `path` again under a fresh rid.
    ReadmitObject { path: String },
    /// Rebuild every index entry for the object at `path` in place.
    ReindexObject { path: String },
}

/// Record of one performed surgery: what ran, what it logged, and which
/// follow-ups the scheduler still owes.
#[derive(Debug, Clone, Serialize)]
pub struct SurgeryOutcome {
    pub rid: Rid,
    pub kind: SurgeryKind,
    pub log: Vec<String>,
    pub post_ops: Vec<PostOp>,
}

impl SurgeryOutcome {
    pub fn write_result(&self, sink: &mut dyn ReportSink) {
        sink.info(&format!("rid: {} ({}):", self.rid, self.kind));
        for line in &self.log {
            sink.info(&format!("\t- {line}"));
        }
    }
}

fn signature(symptoms: &[Symptom]) -> Vec<Symptom> {
    let mut signature = symptoms.to_vec();
    signature.sort_unstable();
    signature.dedup();
    signature
}

/// Exact-match dispatch table, keyed by sorted deduplicated symptom
/// tuples. Extending the doctor means registering a new tuple here.
static SURGERY_CATALOG: Lazy<HashMap<Vec<Symptom>, SurgeryKind>> = Lazy::new(|| {
    let mut catalog = HashMap::new();
    catalog.insert(
        signature(&[
            Symptom::ForwardTupleMismatchesReverseTuple,
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::ReverseKeyMissingFromForwardValues,
        ]),
        SurgeryKind::RemoveExtraRid,
    );
    catalog.insert(
        signature(&[
            Symptom::ForwardTupleMismatchesReverseTuple,
            Symptom::InUuidUnindexNotInRegisteredRids,
            Symptom::InUuidUnindexNotInUuidIndex,
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::ReverseKeyMissingFromForwardValues,
        ]),
        SurgeryKind::RemoveExtraRid,
    );
    catalog.insert(
        signature(&[
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::ReverseKeyMissingFromForwardValues,
            Symptom::ReverseValueMissingFromForwardKeys,
        ]),
        SurgeryKind::RemoveOrphanedRid,
    );
    catalog.insert(
        signature(&[
            Symptom::InUuidUnindexNotInRegisteredRids,
            Symptom::InUuidUnindexNotInUuidIndex,
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::ReverseKeyMissingFromForwardValues,
            Symptom::ReverseValueMissingFromForwardKeys,
        ]),
        SurgeryKind::RemoveOrphanedRid,
    );
    catalog.insert(
        signature(&[
            Symptom::InUuidUnindexNotInUuidIndex,
            Symptom::NotInUuidIndex,
        ]),
        SurgeryKind::ReindexMissingUuid,
    );
    catalog.insert(
        signature(&[Symptom::NotInUuidIndex, Symptom::NotInUuidUnindex]),
        SurgeryKind::RemoveRidOrReindexObject,
    );
    catalog
});

/// Decides on and performs the surgery for one unhealthy rid.
///
/// Dispatch happens at construction: whether a repair is registered for
/// the rid's symptom tuple is known before anything mutates.
pub struct CatalogDoctor<'a> {
    unhealthy: &'a UnhealthyRid,
    kind: Option<SurgeryKind>,
}

impl<'a> CatalogDoctor<'a> {
    pub fn new(unhealthy: &'a UnhealthyRid) -> Self {
        let kind = SURGERY_CATALOG.get(&unhealthy.symptoms()).copied();
        Self { unhealthy, kind }
    }

    /// The symptom registry this doctor was built for.
    pub fn unhealthy(&self) -> &'a UnhealthyRid {
        self.unhealthy
    }

    /// The surgery registered for this rid's exact symptom tuple, if any.
    pub fn surgery_kind(&self) -> Option<SurgeryKind> {
        self.kind
    }

    pub fn can_perform_surgery(&self) -> bool {
        self.surgery_kind().is_some()
    }

    /// Perform the registered surgery, if one exists.
    ///
    /// Returns `Ok(None)` when no surgery is registered for the symptom
    /// tuple. A violated procedure precondition surfaces as
    /// [`CatalogDoctorError::CannotPerformSurgery`] and leaves any partial
    /// edits in place; callers are expected to run inside a transaction
    /// they roll back on failure.
    pub fn perform_surgery(
        &self,
        catalog: &mut Catalog,
        site: &dyn ObjectSite,
    ) -> Result<Option<SurgeryOutcome>> {
        let Some(kind) = self.kind else {
            return Ok(None);
        };
        debug!(rid = self.unhealthy.rid(), surgery = %kind, "perform surgery");
        let surgery = Surgery::new(catalog, site, self.unhealthy);
        surgery.perform(kind).map(Some)
    }
}

/// Execution frame for one surgery: the shared mutation primitives, the
/// audit log, and the post-ops accumulated so far.
struct Surgery<'a> {
    catalog: &'a mut Catalog,
    site: &'a dyn ObjectSite,
    unhealthy: &'a UnhealthyRid,
    log: Vec<String>,
    post_ops: Vec<PostOp>,
}

impl<'a> Surgery<'a> {
    fn new(catalog: &'a mut Catalog, site: &'a dyn ObjectSite, unhealthy: &'a UnhealthyRid) -> Self {
        Self {
            catalog,
            site,
            unhealthy,
            log: Vec::new(),
            post_ops: Vec::new(),
        }
    }

    fn perform(mut self, kind: SurgeryKind) -> Result<SurgeryOutcome> {
        match kind {
            SurgeryKind::RemoveExtraRid => self.remove_extra_rid()?,
            SurgeryKind::RemoveOrphanedRid => self.remove_orphaned_rid()?,
            SurgeryKind::ReindexMissingUuid => self.reindex_missing_uuid()?,
            SurgeryKind::RemoveRidOrReindexObject => self.remove_rid_or_reindex_object()?,
        }
        Ok(SurgeryOutcome {
            rid: self.unhealthy.rid(),
            kind,
            log: self.log,
            post_ops: self.post_ops,
        })
    }

    fn rid(&self) -> Rid {
        self.unhealthy.rid()
    }

    /// The single path recorded for this rid. Every current procedure
    /// requires exactly one.
    fn the_one_path(&self) -> Result<String> {
        let paths = self.unhealthy.paths();
        match paths.as_slice() {
            [path] => Ok((*path).to_string()),
            [] => Err(CatalogDoctorError::cannot_perform(format!(
                "expected exactly one affected path for rid {}, got none",
                self.rid()
            ))),
            many => Err(CatalogDoctorError::cannot_perform(format!(
                "expected exactly one affected path for rid {}, got: {}",
                self.rid(),
                many.join(", ")
            ))),
        }
    }

    fn surgery_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    fn unindex_rid_from_all_catalog_indexes(&mut self) -> Result<()> {
        let rid = self.rid();
        for aux in self.catalog.indexes.values_mut() {
            aux.remove_rid(rid)?;
        }
        self.surgery_log("Removed rid from all catalog indexes.");
        Ok(())
    }

    fn delete_rid_from_paths(&mut self) -> Result<()> {
        let rid = self.rid();
        if self.catalog.paths.remove(&rid).is_none() {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "expected rid {rid} in the rid->path mapping"
            )));
        }
        self.surgery_log("Removed rid from paths (the rid->path mapping).");
        Ok(())
    }

    fn delete_rid_from_metadata(&mut self) -> Result<()> {
        let rid = self.rid();
        if self.catalog.data.remove(&rid).is_none() {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "expected rid {rid} in the catalog metadata"
            )));
        }
        self.surgery_log("Removed rid from catalog metadata.");
        Ok(())
    }

    fn delete_path_from_uids(&mut self, path: &str) -> Result<()> {
        if self.catalog.uids.remove(path).is_none() {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "expected path {path} in the path->rid mapping"
            )));
        }
        self.surgery_log("Removed path from uids (the path->rid mapping).");
        Ok(())
    }

    /// The rid lost the forward-mapping race for its path, a different rid
    /// now owns the entry. Drop everything recorded under this rid; the
    /// forward mapping stays untouched.
    fn remove_extra_rid(&mut self) -> Result<()> {
        let path = self.the_one_path()?;
        match self.catalog.uids.get(&path) {
            None => {
                return Err(CatalogDoctorError::cannot_perform(format!(
                    "expected path {path} in the path->rid mapping"
                )));
            }
            Some(&owner) if owner == self.rid() => {
                return Err(CatalogDoctorError::cannot_perform(format!(
                    "expected a different rid to own path {path}, found rid {owner}"
                )));
            }
            Some(_) => {}
        }

        self.unindex_rid_from_all_catalog_indexes()?;
        self.delete_rid_from_paths()?;
        self.delete_rid_from_metadata()?;
        self.catalog.change_length(-1);
        Ok(())
    }

    /// No forward-mapping entry points at the rid anymore. Drop it; if a
    /// live object still sits at the exact recorded path, schedule it for
    /// readmission under a fresh rid once the run's removals are done.
    fn remove_orphaned_rid(&mut self) -> Result<()> {
        let path = self.the_one_path()?;
        if self.catalog.uids.contains_key(&path) {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "expected path {path} to be absent from the path->rid mapping"
            )));
        }

        if let Some(object) = self.site.traverse(&path) {
            if object.path == path {
                self.post_ops.push(PostOp::ReadmitObject { path: path.clone() });
                self.surgery_log(format!("Scheduled object at '{path}' for recataloging."));
            }
        }

        self.unindex_rid_from_all_catalog_indexes()?;
        self.delete_rid_from_paths()?;
        self.delete_rid_from_metadata()?;
        self.catalog.change_length(-1);
        Ok(())
    }

    /// The rid's UUID index entry is missing or stale. Rebuild it from the
    /// live object and refresh the cached metadata.
    fn reindex_missing_uuid(&mut self) -> Result<()> {
        let path = self.the_one_path()?;
        let Some(object) = self.site.traverse(&path) else {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "missing object at {path}"
            )));
        };
        // An ancestor-fallback hit would stamp a different object's uuid
        // onto this rid.
        if object.path != path {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "expected object at {path}, traversal found it at {}",
                object.path
            )));
        }

        let rid = self.rid();
        let Some(uuid_index) = self.catalog.indexes.get_mut(UID_INDEX) else {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "catalog has no {UID_INDEX} index"
            )));
        };
        uuid_index.remove_rid(rid)?;
        uuid_index.index_object(rid, &object)?;
        self.catalog.data.insert(rid, object.metadata());
        self.surgery_log("Reindexed UID index and updated metadata.");
        Ok(())
    }

    /// The rid is fully recorded but absent from the UUID index. Whether
    /// that means a dead entry or a stale one depends on what traversal
    /// finds at the recorded path.
    fn remove_rid_or_reindex_object(&mut self) -> Result<()> {
        let rid = self.rid();
        let path = self.the_one_path()?;
        if !self.catalog.data.contains_key(&rid) {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "expected rid {rid} in the catalog metadata"
            )));
        }
        if !self.catalog.paths.contains_key(&rid) {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "expected rid {rid} in the rid->path mapping"
            )));
        }
        if !self.catalog.uids.contains_key(&path) {
            return Err(CatalogDoctorError::cannot_perform(format!(
                "expected path {path} in the path->rid mapping"
            )));
        }

        match self.site.traverse(&path) {
            None => self.remove_rid_entirely(&path),
            Some(object) if object.path == path => {
                self.unindex_rid_from_all_catalog_indexes()?;
                self.post_ops.push(PostOp::ReindexObject { path: path.clone() });
                self.surgery_log(format!("Scheduled object at '{path}' for reindexing."));
                Ok(())
            }
            Some(object) if is_shorter_path(&object.path, &path) => {
                self.surgery_log(format!(
                    "Object found at shorter path '{}', removing superseded entry.",
                    object.path
                ));
                self.remove_rid_entirely(&path)
            }
            Some(object) => Err(CatalogDoctorError::cannot_perform(format!(
                "object path after traversing {} differs from recorded path {path} \
                 and is not a shorter path to the same object",
                object.path
            ))),
        }
    }

    fn remove_rid_entirely(&mut self, path: &str) -> Result<()> {
        self.unindex_rid_from_all_catalog_indexes()?;
        self.delete_rid_from_paths()?;
        self.delete_rid_from_metadata()?;
        self.delete_path_from_uids(path)?;
        self.catalog.change_length(-1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::healthcheck::HealthCheckResult;

    fn unhealthy(symptoms: &[Symptom]) -> UnhealthyRid {
        let mut result = HealthCheckResult::default();
        for &symptom in symptoms {
            result.report_symptom(symptom, 42, None);
        }
        result.unhealthy_rid(42).expect("registry").clone()
    }

    #[test]
    fn test_exact_signature_dispatches() {
        let rid = unhealthy(&[
            Symptom::NotInUuidIndex,
            Symptom::NotInUuidUnindex,
        ]);
        let doctor = CatalogDoctor::new(&rid);
        assert_eq!(
            doctor.surgery_kind(),
            Some(SurgeryKind::RemoveRidOrReindexObject)
        );
    }

    #[test]
    fn test_symptom_order_does_not_matter() {
        let reversed = unhealthy(&[
            Symptom::ReverseKeyMissingFromForwardValues,
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::ForwardTupleMismatchesReverseTuple,
        ]);
        let doctor = CatalogDoctor::new(&reversed);
        assert_eq!(doctor.surgery_kind(), Some(SurgeryKind::RemoveExtraRid));
    }

    #[test]
    fn test_subset_of_signature_does_not_dispatch() {
        let rid = unhealthy(&[Symptom::NotInUuidIndex]);
        assert!(!CatalogDoctor::new(&rid).can_perform_surgery());
    }

    #[test]
    fn test_superset_of_signature_does_not_dispatch() {
        let rid = unhealthy(&[
            Symptom::NotInUuidIndex,
            Symptom::NotInUuidUnindex,
            Symptom::MetadataKeyMissingFromReverseKeys,
        ]);
        assert!(!CatalogDoctor::new(&rid).can_perform_surgery());
    }

    #[test]
    fn test_unknown_tuple_performs_nothing() {
        let rid = unhealthy(&[Symptom::MetadataKeyMissingFromReverseKeys]);
        let doctor = CatalogDoctor::new(&rid);
        let mut catalog = Catalog::new();
        let site = crate::site::InMemorySite::new();
        let outcome = doctor
            .perform_surgery(&mut catalog, &site)
            .expect("no surgery is not an error");
        assert!(outcome.is_none());
    }

    #[test]
    fn test_every_registered_signature_is_sorted_and_deduplicated() {
        for key in SURGERY_CATALOG.keys() {
            let normalized = signature(key);
            assert_eq!(&normalized, key);
        }
        assert_eq!(SURGERY_CATALOG.len(), 6);
    }
}
