//! Health check engine: cross-references the catalog's mappings, metadata
//! table and UUID index and reports a symptom registry per inconsistent
//! rid.
//!
//! The scan is a pure read, O(N) over the mappings and the metadata table.
//! Symptom names are permanently defined and stable across runs: the
//! surgery dispatcher matches on exact sorted symptom tuples.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Catalog, Rid};
use crate::report::ReportSink;

/// A named structural anomaly detected for one rid.
///
/// Closed enumeration. Variants are declared in name order so the derived
/// `Ord` sorts the same way the wire names do, which is what the exact
/// tuple keys in the surgery catalog rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symptom {
    /// A forward-mapping key does not occur among the reverse-mapping
    /// values.
    ForwardKeyMissingFromReverseValues,
    /// The forward mapping points at a different rid than the reverse
    /// mapping records for this path.
    ForwardTupleMismatchesReverseTuple,
    ForwardValueMissingFromMetadataKeys,
    ForwardValueMissingFromReverseKeys,
    /// A UUID-index forward entry references a rid outside the registered
    /// rid set.
    InUuidIndexNotInRegisteredRids,
    /// A UUID-index forward entry has no matching reverse entry (absent or
    /// pointing at a different uuid).
    InUuidIndexNotInUuidUnindex,
    InUuidUnindexNotInRegisteredRids,
    InUuidUnindexNotInUuidIndex,
    MetadataKeyMissingFromForwardValues,
    MetadataKeyMissingFromReverseKeys,
    /// A registered rid is missing from the UUID index's forward half.
    NotInUuidIndex,
    NotInUuidUnindex,
    ReverseKeyMissingFromForwardValues,
    ReverseKeyMissingFromMetadataKeys,
    /// The reverse mapping records a different path than the forward
    /// mapping's tuple for this rid.
    ReverseTupleMismatchesForwardTuple,
    ReverseValueMissingFromForwardKeys,
}

impl Symptom {
    /// Stable wire name, identical to the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Symptom::ForwardKeyMissingFromReverseValues => "forward_key_missing_from_reverse_values",
            Symptom::ForwardTupleMismatchesReverseTuple => "forward_tuple_mismatches_reverse_tuple",
            Symptom::ForwardValueMissingFromMetadataKeys => {
                "forward_value_missing_from_metadata_keys"
            }
            Symptom::ForwardValueMissingFromReverseKeys => "forward_value_missing_from_reverse_keys",
            Symptom::InUuidIndexNotInRegisteredRids => "in_uuid_index_not_in_registered_rids",
            Symptom::InUuidIndexNotInUuidUnindex => "in_uuid_index_not_in_uuid_unindex",
            Symptom::InUuidUnindexNotInRegisteredRids => "in_uuid_unindex_not_in_registered_rids",
            Symptom::InUuidUnindexNotInUuidIndex => "in_uuid_unindex_not_in_uuid_index",
            Symptom::MetadataKeyMissingFromForwardValues => {
                "metadata_key_missing_from_forward_values"
            }
            Symptom::MetadataKeyMissingFromReverseKeys => "metadata_key_missing_from_reverse_keys",
            Symptom::NotInUuidIndex => "not_in_uuid_index",
            Symptom::NotInUuidUnindex => "not_in_uuid_unindex",
            Symptom::ReverseKeyMissingFromForwardValues => "reverse_key_missing_from_forward_values",
            Symptom::ReverseKeyMissingFromMetadataKeys => "reverse_key_missing_from_metadata_keys",
            Symptom::ReverseTupleMismatchesForwardTuple => "reverse_tuple_mismatches_forward_tuple",
            Symptom::ReverseValueMissingFromForwardKeys => "reverse_value_missing_from_forward_keys",
        }
    }
}

impl std::fmt::Display for Symptom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Groups every symptom and every originating path observed for one rid
/// during a health check run.
///
/// Created lazily the first time an anomaly is reported for the rid, never
/// removed during a run. Both sets are deduplicated; the symptom tuple is
/// exposed sorted because the dispatcher keys on its exact value.
#[derive(Debug, Clone, Serialize)]
pub struct UnhealthyRid {
    rid: Rid,
    paths: BTreeSet<String>,
    symptoms: BTreeSet<Symptom>,
}

impl UnhealthyRid {
    fn new(rid: Rid) -> Self {
        Self {
            rid,
            paths: BTreeSet::new(),
            symptoms: BTreeSet::new(),
        }
    }

    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn attach_path(&mut self, path: &str) {
        self.paths.insert(path.to_string());
    }

    pub fn report_symptom(&mut self, symptom: Symptom) {
        self.symptoms.insert(symptom);
    }

    /// Sorted, deduplicated symptom tuple.
    pub fn symptoms(&self) -> Vec<Symptom> {
        self.symptoms.iter().copied().collect()
    }

    /// Sorted, deduplicated originating paths.
    pub fn paths(&self) -> Vec<&str> {
        self.paths.iter().map(String::as_str).collect()
    }

    pub fn write_result(&self, sink: &mut dyn ReportSink) {
        let paths = if self.paths.is_empty() {
            "--no path--".to_string()
        } else {
            self.paths
                .iter()
                .map(|p| format!("'{p}'"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        sink.info(&format!("rid: {} ({})", self.rid, paths));
        for symptom in &self.symptoms {
            sink.info(&format!("\t- {symptom}"));
        }
    }
}

/// Length counters observed for one health check run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LengthStats {
    /// The catalog's claimed record count (independently tracked).
    pub claimed: i64,
    pub uids: usize,
    pub paths: usize,
    pub data: usize,
    /// Forward half of the UUID index, `None` if the catalog carries none.
    pub uuid_index: Option<usize>,
    pub uuid_unindex: Option<usize>,
}

impl LengthStats {
    fn is_consistent(&self) -> bool {
        let reference = self.uids as i64;
        if self.claimed != reference
            || self.paths as i64 != reference
            || self.data as i64 != reference
        {
            return false;
        }
        if let Some(n) = self.uuid_index {
            if n as i64 != reference {
                return false;
            }
        }
        if let Some(n) = self.uuid_unindex {
            if n as i64 != reference {
                return false;
            }
        }
        true
    }
}

/// Result of one health check run.
///
/// Owns all symptom registries. Read-only after the run, except that test
/// and debug code may inject additional symptoms through
/// [`HealthCheckResult::report_symptom`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthCheckResult {
    unhealthy_rids: BTreeMap<Rid, UnhealthyRid>,
    lengths: LengthStats,
}

impl HealthCheckResult {
    pub fn lengths(&self) -> LengthStats {
        self.lengths
    }

    /// All unhealthy rids, in rid order.
    pub fn unhealthy_rids(&self) -> impl Iterator<Item = &UnhealthyRid> {
        self.unhealthy_rids.values()
    }

    pub fn unhealthy_rid(&self, rid: Rid) -> Option<&UnhealthyRid> {
        self.unhealthy_rids.get(&rid)
    }

    pub fn unhealthy_rid_count(&self) -> usize {
        self.unhealthy_rids.len()
    }

    /// Sorted symptom tuple for `rid`, if it is unhealthy.
    pub fn symptoms(&self, rid: Rid) -> Option<Vec<Symptom>> {
        self.unhealthy_rids.get(&rid).map(UnhealthyRid::symptoms)
    }

    /// Record a symptom for `rid`, creating its registry on first use.
    pub fn report_symptom(&mut self, symptom: Symptom, rid: Rid, path: Option<&str>) {
        let entry = self
            .unhealthy_rids
            .entry(rid)
            .or_insert_with(|| UnhealthyRid::new(rid));
        if let Some(path) = path {
            entry.attach_path(path);
        }
        entry.report_symptom(symptom);
    }

    pub fn is_healthy(&self) -> bool {
        self.is_index_data_healthy() && self.is_length_healthy()
    }

    pub fn is_index_data_healthy(&self) -> bool {
        self.unhealthy_rids.is_empty()
    }

    pub fn is_length_healthy(&self) -> bool {
        self.lengths.is_consistent()
    }

    pub fn write_result(&self, sink: &mut dyn ReportSink) {
        sink.info("Catalog health check report:");

        if self.is_length_healthy() {
            sink.info(&format!(
                "Catalog length is consistent at {}.",
                self.lengths.claimed
            ));
        } else {
            sink.info("Inconsistent catalog length:");
            sink.info(&format!(" claimed length: {}", self.lengths.claimed));
            sink.info(&format!(" uids length: {}", self.lengths.uids));
            sink.info(&format!(" paths length: {}", self.lengths.paths));
            sink.info(&format!(" metadata length: {}", self.lengths.data));
            if let Some(n) = self.lengths.uuid_index {
                sink.info(&format!(" uuid index length: {n}"));
            }
            if let Some(n) = self.lengths.uuid_unindex {
                sink.info(&format!(" uuid unindex length: {n}"));
            }
        }

        if self.is_index_data_healthy() {
            sink.info("Index data is healthy.");
        } else {
            sink.info(&format!(
                "Index data is unhealthy, found {} unhealthy rids:",
                self.unhealthy_rids.len()
            ));
            for unhealthy in self.unhealthy_rids.values() {
                unhealthy.write_result(sink);
                sink.info("");
            }
        }
    }
}

/// Runs the consistency scan for one catalog.
pub struct CatalogHealthCheck<'a> {
    catalog: &'a Catalog,
}

impl<'a> CatalogHealthCheck<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Run the full symptom catalog over the store. Pure read scan; a
    /// well-formed store never makes this raise.
    pub fn run(&self) -> HealthCheckResult {
        let catalog = self.catalog;
        let mut result = HealthCheckResult::default();

        let uids = &catalog.uids;
        let paths = &catalog.paths;
        let data = &catalog.data;
        let paths_values: BTreeSet<&String> = paths.values().collect();
        // Admission decides insert-vs-update through the forward mapping,
        // so its value set is the authoritative registered-rid universe.
        let registered: BTreeSet<Rid> = uids.values().copied().collect();
        let mut registered_paths: BTreeMap<Rid, &String> = BTreeMap::new();
        for (path, &rid) in uids {
            registered_paths.insert(rid, path);
        }

        result.lengths = LengthStats {
            claimed: catalog.claimed_length(),
            uids: uids.len(),
            paths: paths.len(),
            data: data.len(),
            uuid_index: catalog.uuid_index().map(|i| i.index.len()),
            uuid_unindex: catalog.uuid_index().map(|i| i.unindex.len()),
        };

        for (path, &rid) in uids {
            match paths.get(&rid) {
                None => result.report_symptom(
                    Symptom::ForwardValueMissingFromReverseKeys,
                    rid,
                    Some(path),
                ),
                Some(reverse_path) if reverse_path != path => result.report_symptom(
                    Symptom::ReverseTupleMismatchesForwardTuple,
                    rid,
                    Some(path),
                ),
                Some(_) => {}
            }

            if !paths_values.contains(path) {
                result.report_symptom(Symptom::ForwardKeyMissingFromReverseValues, rid, Some(path));
            }

            if !data.contains_key(&rid) {
                result.report_symptom(
                    Symptom::ForwardValueMissingFromMetadataKeys,
                    rid,
                    Some(path),
                );
            }
        }

        for (&rid, path) in paths {
            match uids.get(path) {
                None => result.report_symptom(
                    Symptom::ReverseValueMissingFromForwardKeys,
                    rid,
                    Some(path),
                ),
                Some(&forward_rid) if forward_rid != rid => result.report_symptom(
                    Symptom::ForwardTupleMismatchesReverseTuple,
                    rid,
                    Some(path),
                ),
                Some(_) => {}
            }

            if !registered.contains(&rid) {
                result.report_symptom(Symptom::ReverseKeyMissingFromForwardValues, rid, Some(path));
            }

            if !data.contains_key(&rid) {
                result.report_symptom(Symptom::ReverseKeyMissingFromMetadataKeys, rid, Some(path));
            }
        }

        for &rid in data.keys() {
            if !paths.contains_key(&rid) {
                result.report_symptom(Symptom::MetadataKeyMissingFromReverseKeys, rid, None);
            }
            if !registered.contains(&rid) {
                result.report_symptom(Symptom::MetadataKeyMissingFromForwardValues, rid, None);
            }
        }

        if let Some(uuid_index) = catalog.uuid_index() {
            let uuid_values: BTreeSet<Rid> = uuid_index.index.values().copied().collect();

            // The examined key here is a uuid; the closest path at hand
            // is the rid's recorded one.
            let recorded_path = |rid: Rid| {
                paths
                    .get(&rid)
                    .map(String::as_str)
                    .or_else(|| registered_paths.get(&rid).map(|p| p.as_str()))
            };

            for (uuid, &rid) in &uuid_index.index {
                let path = recorded_path(rid);
                match uuid_index.unindex.get(&rid) {
                    Some(unindex_uuid) if unindex_uuid == uuid => {}
                    _ => result.report_symptom(Symptom::InUuidIndexNotInUuidUnindex, rid, path),
                }
                if !registered.contains(&rid) {
                    result.report_symptom(Symptom::InUuidIndexNotInRegisteredRids, rid, path);
                }
            }

            for (&rid, uuid) in &uuid_index.unindex {
                let path = recorded_path(rid);
                match uuid_index.index.get(uuid) {
                    Some(&forward_rid) if forward_rid == rid => {}
                    _ => result.report_symptom(Symptom::InUuidUnindexNotInUuidIndex, rid, path),
                }
                if !registered.contains(&rid) {
                    result.report_symptom(Symptom::InUuidUnindexNotInRegisteredRids, rid, path);
                }
            }

            for &rid in &registered {
                let path = registered_paths.get(&rid).map(|p| p.as_str());
                if !uuid_values.contains(&rid) {
                    result.report_symptom(Symptom::NotInUuidIndex, rid, path);
                }
                if !uuid_index.unindex.contains_key(&rid) {
                    result.report_symptom(Symptom::NotInUuidUnindex, rid, path);
                }
            }
        }

        debug!(
            unhealthy = result.unhealthy_rids.len(),
            claimed = result.lengths.claimed,
            "health check complete"
        );
        result
    }
}
