//! Integration tests for the health check engine: symptom detection,
//! length accounting and report output.

mod common;

use catalog_doctor::{
    Catalog, CatalogHealthCheck, MemoryReport, Record, SiteObject, Symptom,
};
use common::{
    choose_unused_rid, drop_uuid_entry_entirely, drop_uuid_forward_entry, healthy_site_and_catalog,
    plant_extra_rid, plant_orphaned_rid,
};

#[test]
fn healthy_catalog_reports_no_symptoms() {
    let (_site, catalog) = healthy_site_and_catalog(5);
    let result = CatalogHealthCheck::new(&catalog).run();

    assert!(result.is_healthy());
    assert!(result.is_length_healthy());
    assert!(result.is_index_data_healthy());
    assert_eq!(result.unhealthy_rid_count(), 0);
    assert_eq!(result.lengths().claimed, 5);
}

#[test]
fn empty_catalog_is_healthy() {
    let result = CatalogHealthCheck::new(&Catalog::new()).run();
    assert!(result.is_healthy());
    assert_eq!(result.lengths().claimed, 0);
}

/// A rid present only in the metadata table yields exactly the two
/// metadata symptoms and records no path.
#[test]
fn dangling_metadata_rid_symptoms() {
    let (_site, mut catalog) = healthy_site_and_catalog(2);
    let rid = choose_unused_rid(&catalog);
    catalog.data.insert(rid, Record::new());

    let result = CatalogHealthCheck::new(&catalog).run();
    assert!(!result.is_healthy());
    assert_eq!(result.unhealthy_rid_count(), 1);
    assert_eq!(
        result.symptoms(rid).unwrap(),
        vec![
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::MetadataKeyMissingFromReverseKeys,
        ]
    );
    assert!(result.unhealthy_rid(rid).unwrap().paths().is_empty());
}

/// A forward-mapping entry with no backing structures at all yields the
/// three forward symptoms plus both UUID absence symptoms.
#[test]
fn stray_forward_mapping_entry_symptoms() {
    let (_site, mut catalog) = healthy_site_and_catalog(2);
    let rid = choose_unused_rid(&catalog);
    catalog.uids.insert("/foo".to_string(), rid);

    let result = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(
        result.symptoms(rid).unwrap(),
        vec![
            Symptom::ForwardKeyMissingFromReverseValues,
            Symptom::ForwardValueMissingFromMetadataKeys,
            Symptom::ForwardValueMissingFromReverseKeys,
            Symptom::NotInUuidIndex,
            Symptom::NotInUuidUnindex,
        ]
    );
    assert_eq!(result.unhealthy_rid(rid).unwrap().paths(), vec!["/foo"]);

    let lengths = result.lengths();
    assert_eq!(lengths.uids, lengths.paths + 1);
    assert_eq!(lengths.uids, lengths.data + 1);
}

/// Crossed UUID-index halves still record the rid's recorded path, even
/// though the loops examine uuids rather than paths.
#[test]
fn stale_uuid_unindex_value_records_the_path() {
    let (_site, mut catalog) = healthy_site_and_catalog(2);
    let rid = *catalog.uids.get("/plone/doc-0").unwrap();
    catalog
        .uuid_index_mut()
        .unwrap()
        .unindex
        .insert(rid, "bogus-uuid".to_string());

    let result = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(
        result.symptoms(rid).unwrap(),
        vec![
            Symptom::InUuidIndexNotInUuidUnindex,
            Symptom::InUuidUnindexNotInUuidIndex,
        ]
    );
    assert_eq!(
        result.unhealthy_rid(rid).unwrap().paths(),
        vec!["/plone/doc-0"]
    );
}

/// Two runs over the same store yield identical results.
#[test]
fn health_check_is_deterministic() {
    let (site, mut catalog) = healthy_site_and_catalog(4);
    plant_extra_rid(&site, &mut catalog, "/plone/doc-0", false);
    plant_orphaned_rid(&mut catalog, "/plone/doc-1", true);

    let first = CatalogHealthCheck::new(&catalog).run();
    let second = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[test]
fn extra_rid_after_move_symptoms() {
    let (site, mut catalog) = healthy_site_and_catalog(3);
    let (extra, usurper) = plant_extra_rid(&site, &mut catalog, "/plone/doc-0", false);

    let result = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(result.unhealthy_rid_count(), 1);
    assert!(result.unhealthy_rid(usurper).is_none());
    assert_eq!(
        result.symptoms(extra).unwrap(),
        vec![
            Symptom::ForwardTupleMismatchesReverseTuple,
            Symptom::InUuidUnindexNotInRegisteredRids,
            Symptom::InUuidUnindexNotInUuidIndex,
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::ReverseKeyMissingFromForwardValues,
        ]
    );
}

#[test]
fn extra_rid_with_clean_uuid_unindex_symptoms() {
    let (site, mut catalog) = healthy_site_and_catalog(3);
    let (extra, _) = plant_extra_rid(&site, &mut catalog, "/plone/doc-1", true);

    let result = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(
        result.symptoms(extra).unwrap(),
        vec![
            Symptom::ForwardTupleMismatchesReverseTuple,
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::ReverseKeyMissingFromForwardValues,
        ]
    );
}

#[test]
fn orphaned_rid_symptoms() {
    let (_site, mut catalog) = healthy_site_and_catalog(3);
    let rid = plant_orphaned_rid(&mut catalog, "/plone/doc-2", false);

    let result = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(
        result.symptoms(rid).unwrap(),
        vec![
            Symptom::InUuidUnindexNotInRegisteredRids,
            Symptom::InUuidUnindexNotInUuidIndex,
            Symptom::MetadataKeyMissingFromForwardValues,
            Symptom::ReverseKeyMissingFromForwardValues,
            Symptom::ReverseValueMissingFromForwardKeys,
        ]
    );
}

#[test]
fn missing_uuid_forward_entry_symptoms() {
    let (_site, mut catalog) = healthy_site_and_catalog(3);
    let rid = drop_uuid_forward_entry(&mut catalog, "/plone/doc-0");

    let result = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(
        result.symptoms(rid).unwrap(),
        vec![
            Symptom::InUuidUnindexNotInUuidIndex,
            Symptom::NotInUuidIndex,
        ]
    );
    // The dropped forward entry also shows up as a length discrepancy.
    assert!(!result.is_length_healthy());
    assert!(!result.is_index_data_healthy());
}

#[test]
fn missing_uuid_entry_entirely_symptoms() {
    let (_site, mut catalog) = healthy_site_and_catalog(3);
    let rid = drop_uuid_entry_entirely(&mut catalog, "/plone/doc-1");

    let result = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(
        result.symptoms(rid).unwrap(),
        vec![Symptom::NotInUuidIndex, Symptom::NotInUuidUnindex]
    );
    assert_eq!(
        result.unhealthy_rid(rid).unwrap().paths(),
        vec!["/plone/doc-1"]
    );
}

/// Mismatching tuples in both mapping directions are reported on both
/// involved rids.
#[test]
fn crossed_mappings_report_both_rids() {
    let (_site, mut catalog) = healthy_site_and_catalog(2);
    let rid_a = *catalog.uids.get("/plone/doc-0").unwrap();
    let rid_b = *catalog.uids.get("/plone/doc-1").unwrap();
    catalog.paths.insert(rid_a, "/plone/doc-1".to_string());
    catalog.paths.insert(rid_b, "/plone/doc-0".to_string());

    let result = CatalogHealthCheck::new(&catalog).run();
    assert_eq!(result.unhealthy_rid_count(), 2);
    for rid in [rid_a, rid_b] {
        let symptoms = result.symptoms(rid).unwrap();
        assert!(symptoms.contains(&Symptom::ReverseTupleMismatchesForwardTuple));
        assert!(symptoms.contains(&Symptom::ForwardTupleMismatchesReverseTuple));
    }
}

/// Without a UUID index the aux checks are skipped and the aux length
/// counters are absent.
#[test]
fn catalog_without_uuid_index_skips_aux_checks() {
    let (_site, mut catalog) = healthy_site_and_catalog(3);
    catalog.indexes.remove("UID");

    let result = CatalogHealthCheck::new(&catalog).run();
    assert!(result.is_healthy());
    assert_eq!(result.lengths().uuid_index, None);
    assert_eq!(result.lengths().uuid_unindex, None);
}

#[test]
fn claimed_length_drift_is_unhealthy_on_its_own() {
    let (_site, mut catalog) = healthy_site_and_catalog(3);
    catalog.change_length(2);

    let result = CatalogHealthCheck::new(&catalog).run();
    assert!(!result.is_healthy());
    assert!(!result.is_length_healthy());
    assert!(result.is_index_data_healthy());
}

#[test]
fn healthy_report_output() {
    let (_site, catalog) = healthy_site_and_catalog(2);
    let result = CatalogHealthCheck::new(&catalog).run();

    let mut sink = MemoryReport::new();
    result.write_result(&mut sink);
    assert_eq!(
        sink.lines(),
        [
            "Catalog health check report:",
            "Catalog length is consistent at 2.",
            "Index data is healthy.",
        ]
    );
}

#[test]
fn unhealthy_report_output() {
    let mut catalog = Catalog::new();
    catalog.catalog_object(&SiteObject::new("/plone/doc", "Doc")).unwrap();
    let rid = choose_unused_rid(&catalog);
    catalog.data.insert(rid, Record::new());

    let result = CatalogHealthCheck::new(&catalog).run();
    let mut sink = MemoryReport::new();
    result.write_result(&mut sink);

    let lines = sink.lines();
    assert_eq!(lines[0], "Catalog health check report:");
    assert_eq!(lines[1], "Inconsistent catalog length:");
    assert_eq!(lines[2], " claimed length: 1");
    assert_eq!(lines[3], " uids length: 1");
    assert_eq!(lines[4], " paths length: 1");
    assert_eq!(lines[5], " metadata length: 2");
    assert_eq!(lines[6], " uuid index length: 1");
    assert_eq!(lines[7], " uuid unindex length: 1");
    assert_eq!(lines[8], "Index data is unhealthy, found 1 unhealthy rids:");
    assert_eq!(lines[9], format!("rid: {rid} (--no path--)"));
    assert_eq!(lines[10], "\t- metadata_key_missing_from_forward_values");
    assert_eq!(lines[11], "\t- metadata_key_missing_from_reverse_keys");
    assert_eq!(lines[12], "");
}

/// The result serializes with the stable snake_case symptom names.
#[test]
fn result_serializes_with_stable_symptom_names() {
    let (_site, mut catalog) = healthy_site_and_catalog(1);
    drop_uuid_entry_entirely(&mut catalog, "/plone/doc-0");

    let result = CatalogHealthCheck::new(&catalog).run();
    let json = serde_json::to_value(&result).unwrap();
    let rids = json.get("unhealthy_rids").unwrap().as_object().unwrap();
    let entry = rids.values().next().unwrap();
    assert_eq!(
        entry.get("symptoms").unwrap(),
        &serde_json::json!(["not_in_uuid_index", "not_in_uuid_unindex"])
    );
}
