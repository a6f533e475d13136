//! Drives one whole repair run over a health check result.
//!
//! The scheduler doctors every unhealthy rid up front, runs all primary
//! mutations, then executes the deferred post-ops, and finally reports
//! what was fixed and what was not. Precondition failures inside a
//! procedure demote the rid to unfixable instead of aborting the run;
//! structural failures such as an unhandled index type abort immediately.

use tracing::{debug, warn};

use crate::catalog::{Catalog, Rid};
use crate::error::{CatalogDoctorError, Result};
use crate::healthcheck::{HealthCheckResult, UnhealthyRid};
use crate::report::ReportSink;
use crate::site::ObjectSite;
use crate::surgery::{CatalogDoctor, PostOp, SurgeryOutcome};

/// An unhealthy rid the run could not repair, with the precondition
/// failure that stopped it when there was one.
struct Unfixable<'a> {
    unhealthy: &'a UnhealthyRid,
    reason: Option<String>,
}

/// Schedules and performs surgeries for every unhealthy rid in a health
/// check result.
pub struct SurgeryScheduler<'a> {
    /// One doctor per unhealthy rid, built at construction. Which rids
    /// lack a registered repair is known before any mutation begins.
    plan: Vec<CatalogDoctor<'a>>,
    outcomes: Vec<SurgeryOutcome>,
    unfixable: Vec<Unfixable<'a>>,
    performed: bool,
}

impl<'a> SurgeryScheduler<'a> {
    pub fn new(result: &'a HealthCheckResult) -> Self {
        let plan: Vec<CatalogDoctor<'a>> =
            result.unhealthy_rids().map(CatalogDoctor::new).collect();
        Self {
            plan,
            outcomes: Vec::new(),
            unfixable: Vec::new(),
            performed: false,
        }
    }

    /// Rids whose symptom tuple has no registered surgery. Available
    /// immediately after construction, in rid order.
    pub fn rids_without_registered_surgery(&self) -> Vec<Rid> {
        self.plan
            .iter()
            .filter(|doctor| !doctor.can_perform_surgery())
            .map(|doctor| doctor.unhealthy().rid())
            .collect()
    }

    /// Perform all surgeries the dispatch table registers for the result's
    /// unhealthy rids.
    ///
    /// Primary mutations run first, in rid order; the post-ops they emit
    /// run only after every primary mutation has completed, so readmission
    /// and reindexing always observe the fully cleaned catalog. A rid with
    /// no registered surgery, or whose surgery hits a violated
    /// precondition, lands in the unfixable set. Errors that indicate the
    /// doctor itself cannot operate on this catalog propagate.
    pub fn perform_surgeries(
        &mut self,
        catalog: &mut Catalog,
        site: &dyn ObjectSite,
    ) -> Result<()> {
        self.outcomes.clear();
        self.unfixable.clear();
        self.performed = true;

        for index in 0..self.plan.len() {
            let doctor = &self.plan[index];
            let unhealthy = doctor.unhealthy();
            if !doctor.can_perform_surgery() {
                debug!(rid = unhealthy.rid(), "no surgery registered");
                self.unfixable.push(Unfixable {
                    unhealthy,
                    reason: None,
                });
                continue;
            }

            match doctor.perform_surgery(catalog, site) {
                Ok(Some(outcome)) => self.outcomes.push(outcome),
                Ok(None) => self.unfixable.push(Unfixable {
                    unhealthy,
                    reason: None,
                }),
                Err(CatalogDoctorError::CannotPerformSurgery { reason }) => {
                    warn!(rid = unhealthy.rid(), %reason, "cannot perform surgery");
                    self.unfixable.push(Unfixable {
                        unhealthy,
                        reason: Some(reason),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        for index in 0..self.outcomes.len() {
            let post_ops = std::mem::take(&mut self.outcomes[index].post_ops);
            for post_op in post_ops {
                match Self::execute_post_op(catalog, site, &post_op) {
                    Ok(lines) => self.outcomes[index].log.extend(lines),
                    // A failed follow-up leaves the catalog consistent but
                    // incomplete; the next health check run surfaces it.
                    Err(err) => {
                        warn!(rid = self.outcomes[index].rid, %err, "post-op failed");
                        self.outcomes[index]
                            .log
                            .push(format!("Follow-up failed: {err}"));
                    }
                }
            }
        }

        debug!(
            performed = self.outcomes.len(),
            unfixable = self.unfixable.len(),
            "surgery run complete"
        );
        Ok(())
    }

    fn execute_post_op(
        catalog: &mut Catalog,
        site: &dyn ObjectSite,
        post_op: &PostOp,
    ) -> Result<Vec<String>> {
        match post_op {
            PostOp::ReadmitObject { path } => match site.traverse(path) {
                Some(object) if object.path == *path => {
                    let rid = catalog.catalog_object(&object)?;
                    Ok(vec![format!(
                        "Recataloged object at '{path}' under rid {rid}."
                    )])
                }
                _ => Ok(vec![format!(
                    "Object at '{path}' is gone, skipped recataloging."
                )]),
            },
            PostOp::ReindexObject { path } => match site.traverse(path) {
                // An acquisition-fallback hit must not be recataloged
                // under its new canonical path while the stale forward
                // entry survives.
                Some(object) if object.path == *path => {
                    catalog.catalog_object(&object)?;
                    Ok(vec![format!("Reindexed object at '{path}'.")])
                }
                _ => Ok(vec![format!(
                    "Object at '{path}' vanished before reindexing."
                )]),
            },
        }
    }

    /// Whether the run repaired every unhealthy rid.
    pub fn is_successful(&self) -> bool {
        self.performed && self.unfixable.is_empty()
    }

    /// Outcomes of the surgeries performed so far, in rid order.
    pub fn outcomes(&self) -> &[SurgeryOutcome] {
        &self.outcomes
    }

    pub fn write_result(&self, sink: &mut dyn ReportSink) {
        sink.info("Surgery report:");
        for outcome in &self.outcomes {
            outcome.write_result(sink);
            sink.info("");
        }

        if self.unfixable.is_empty() {
            sink.info("All unhealthy rids were fixed.");
        } else {
            sink.warning("Not fixable:");
            for entry in &self.unfixable {
                entry.unhealthy.write_result(sink);
                if let Some(reason) = &entry.reason {
                    sink.warning(&format!("\t  cannot perform surgery: {reason}"));
                }
                sink.info("");
            }
        }
    }
}
