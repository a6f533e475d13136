//! Shared fixtures: a healthy site/catalog pair plus corruption helpers
//! that reproduce the known breakage patterns.
#![allow(dead_code)]

use catalog_doctor::{Catalog, CatalogHealthCheck, InMemorySite, Rid, SiteObject};

/// Build a site with `count` documents and a catalog admitting all of
/// them. The pair is healthy by construction.
pub fn healthy_site_and_catalog(count: usize) -> (InMemorySite, Catalog) {
    let mut site = InMemorySite::new();
    let mut catalog = Catalog::new();
    for i in 0..count {
        let object = SiteObject::new(format!("/plone/doc-{i}"), format!("Document {i}"))
            .with_subjects([format!("topic-{}", i % 3)]);
        catalog.catalog_object(&object).unwrap();
        site.add(object);
    }

    let result = CatalogHealthCheck::new(&catalog).run();
    assert!(result.is_healthy(), "fixture must start healthy");
    (site, catalog)
}

/// A rid guaranteed to collide with nothing in the catalog. Randomized so
/// tests never depend on the internal rid sequence.
pub fn choose_unused_rid(catalog: &Catalog) -> Rid {
    let ceiling = catalog
        .paths
        .keys()
        .chain(catalog.data.keys())
        .chain(catalog.uids.values())
        .max()
        .copied()
        .unwrap_or(0);
    ceiling + 1 + i64::from(fastrand::u16(..))
}

/// Reproduce a move race: a second rid takes over the path's forward
/// mapping and UUID index entry while the superseded rid lingers in the
/// reverse structures. Returns `(extra_rid, usurper_rid)`.
///
/// With `scrub_uuid_unindex` the lingering reverse UUID entry is dropped
/// too, leaving only mapping and metadata symptoms.
pub fn plant_extra_rid(
    site: &InMemorySite,
    catalog: &mut Catalog,
    path: &str,
    scrub_uuid_unindex: bool,
) -> (Rid, Rid) {
    let extra = *catalog.uids.get(path).unwrap();
    let object = site.traverse_exact(path);
    let usurper = choose_unused_rid(catalog);

    catalog.uids.insert(path.to_string(), usurper);
    catalog.paths.insert(usurper, path.to_string());
    catalog.data.insert(usurper, object.metadata());
    let uuid_index = catalog.uuid_index_mut().unwrap();
    uuid_index.index.insert(object.uuid.clone(), usurper);
    uuid_index.unindex.insert(usurper, object.uuid.clone());
    if scrub_uuid_unindex {
        uuid_index.unindex.remove(&extra);
    }
    catalog.change_length(1);

    (extra, usurper)
}

/// Reproduce an interrupted uncatalog: the forward mapping and the UUID
/// index's forward half already dropped the rid, the reverse structures
/// still carry it. Returns the orphaned rid.
///
/// With `scrub_uuid_unindex` the interruption happened one step later and
/// the reverse UUID entry is gone as well.
pub fn plant_orphaned_rid(
    catalog: &mut Catalog,
    path: &str,
    scrub_uuid_unindex: bool,
) -> Rid {
    let rid = catalog.uids.remove(path).unwrap();
    let uuid_index = catalog.uuid_index_mut().unwrap();
    let uuid = uuid_index.unindex.get(&rid).unwrap().clone();
    uuid_index.index.remove(&uuid);
    if scrub_uuid_unindex {
        uuid_index.unindex.remove(&rid);
    }
    // The claimed length keeps the stale count, the interruption happened
    // before the counter update.
    rid
}

/// Drop the rid's forward UUID index entry only, leaving the reverse
/// entry stale.
pub fn drop_uuid_forward_entry(catalog: &mut Catalog, path: &str) -> Rid {
    let rid = *catalog.uids.get(path).unwrap();
    let uuid_index = catalog.uuid_index_mut().unwrap();
    let uuid = uuid_index.unindex.get(&rid).unwrap().clone();
    uuid_index.index.remove(&uuid);
    rid
}

/// Drop the rid from both halves of the UUID index.
pub fn drop_uuid_entry_entirely(catalog: &mut Catalog, path: &str) -> Rid {
    let rid = *catalog.uids.get(path).unwrap();
    catalog.uuid_index_mut().unwrap().remove_rid(rid);
    rid
}

/// Exact-path lookup on the site, panicking when the object is missing.
pub trait TraverseExact {
    fn traverse_exact(&self, path: &str) -> SiteObject;
}

impl TraverseExact for InMemorySite {
    fn traverse_exact(&self, path: &str) -> SiteObject {
        use catalog_doctor::ObjectSite;
        let object = self.traverse(path).unwrap();
        assert_eq!(object.path, path, "expected an exact traversal hit");
        object
    }
}
