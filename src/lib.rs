#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: Many internal/self-documenting functions don't need extensive docs.
// Public APIs should still have proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: length counters are i64 to make drift arithmetic explicit, while the
// underlying maps report usize lengths. The comparisons are bounded by real catalog
// sizes; try_into() everywhere would add noise without safety benefits here.
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Pattern matching: These pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Performance/ergonomics trade-offs that are acceptable for this codebase:
#![allow(clippy::return_self_not_must_use)] // Builder patterns don't need must_use on every method
#![allow(clippy::must_use_candidate)]
//
// Low-value pedantic lints that add noise:
#![allow(clippy::len_without_is_empty)] // Many index types don't need is_empty()
#![allow(clippy::default_trait_access)]
#![allow(clippy::implicit_hasher)]

/// The catalog-doctor crate version (matches `Cargo.toml`).
pub const CATALOG_DOCTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod catalog;
pub mod error;
pub mod healthcheck;
pub mod pathutil;
pub mod report;
pub mod scheduler;
pub mod site;
pub mod surgery;

pub use catalog::{AuxIndex, Catalog, Record, Rid, UID_INDEX, UuidIndex};
pub use error::{CatalogDoctorError, Result};
pub use healthcheck::{CatalogHealthCheck, HealthCheckResult, LengthStats, Symptom, UnhealthyRid};
pub use pathutil::is_shorter_path;
pub use report::{ConsoleReport, MemoryReport, ReportSink};
pub use scheduler::SurgeryScheduler;
pub use site::{InMemorySite, ObjectSite, SiteObject};
pub use surgery::{CatalogDoctor, PostOp, SurgeryKind, SurgeryOutcome};
