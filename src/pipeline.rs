//! Orchestrator: sequences parse -> validate -> synthesize -> reconcile
//! -> apply and surfaces a structured report.
//!
//! Failure policy:
//! - parse/validation defects abort before any asset-store call; the
//!   pipeline is read-only up to that point and nothing is mutated
//! - a synthesis key collision is fatal for the whole run (it signals a
//!   synthesizer bug, not a bad document)
//! - apply failures are per-asset: one asset failing does not abort the
//!   independent assets in the same batch
//!
//! Target-asset resolution: one asset per ability id. Reconcile+apply
//! for each asset runs under that asset's lock (single-writer).

use crate::asset::{AssetLocks, AssetMutator};
use crate::graph::synth::{resolve_effective, synthesize};
use crate::registry::{AttributeCatalog, TagRegistry};
use crate::reconcile::{PlanCounts, reconcile};
use crate::report::{AssetReport, RunOutcome, RunReport};
use crate::spec::model::AbilitySpec;
use crate::spec::{parse, validate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Reject unknown fields in the document.
    pub strict: bool,
    /// Compute edit plans but apply nothing.
    pub dry_run: bool,
}

/// Parse and validate only. Never touches the asset store.
pub fn check(
    document: &str,
    tags: &dyn TagRegistry,
    attributes: &dyn AttributeCatalog,
    strict: bool,
) -> RunReport {
    match parse_and_validate(document, tags, attributes, strict) {
        Ok(_) => RunReport {
            outcome: RunOutcome::Checked,
            errors: Vec::new(),
            assets: Vec::new(),
        },
        Err(errors) => RunReport::validation_failed(errors),
    }
}

/// Run the full generation pipeline for one document.
pub fn run(
    document: &str,
    tags: &dyn TagRegistry,
    attributes: &dyn AttributeCatalog,
    store: &dyn AssetMutator,
    locks: &AssetLocks,
    options: PipelineOptions,
) -> anyhow::Result<RunReport> {
    // 1) Parse + validate. Fail closed: no asset-store call yet.
    let specs = match parse_and_validate(document, tags, attributes, options.strict) {
        Ok(specs) => specs,
        Err(errors) => return Ok(RunReport::validation_failed(errors)),
    };

    let by_id: BTreeMap<String, AbilitySpec> =
        specs.iter().map(|s| (s.id.clone(), s.clone())).collect();

    // 2) Per ability, in document order: synthesize, reconcile, apply.
    let mut assets = Vec::with_capacity(specs.len());
    let mut any_failed = false;

    for spec in &specs {
        let asset_id = spec.id.as_str();

        // Synthesis is pure; collisions are fatal for the whole run.
        let effective = resolve_effective(&by_id, asset_id)?;
        let desired = synthesize(&effective)?;

        // Single-writer scope around read-existing + apply.
        let _lock = locks.acquire(asset_id);

        let existing = match store.read_existing(asset_id) {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(asset_id, error = %err, "failed to read existing asset");
                any_failed = true;
                assets.push(AssetReport {
                    asset_id: asset_id.to_string(),
                    counts: PlanCounts::default(),
                    applied: false,
                    error: Some(err.to_string()),
                });
                continue;
            }
        };

        let ops = reconcile(&desired, &existing)?;
        let counts = PlanCounts::of(&ops);

        if options.dry_run {
            tracing::info!(asset_id, changes = counts.changes(), "dry run, plan not applied");
            assets.push(AssetReport {
                asset_id: asset_id.to_string(),
                counts,
                applied: false,
                error: None,
            });
            continue;
        }

        match store.apply(asset_id, &ops) {
            Ok(report) => {
                tracing::info!(
                    asset_id,
                    created = report.created,
                    updated = report.updated,
                    deleted = report.deleted,
                    preserved = report.preserved,
                    "applied"
                );
                assets.push(AssetReport {
                    asset_id: asset_id.to_string(),
                    counts: report,
                    applied: true,
                    error: None,
                });
            }
            Err(err) => {
                // Per-asset atomicity: this asset rolled back, the rest
                // of the batch continues.
                tracing::warn!(asset_id, error = %err, "apply failed");
                any_failed = true;
                assets.push(AssetReport {
                    asset_id: asset_id.to_string(),
                    counts,
                    applied: false,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    let outcome = if any_failed {
        RunOutcome::PartialFailure
    } else if options.dry_run {
        RunOutcome::DryRun
    } else {
        RunOutcome::Applied
    };

    Ok(RunReport {
        outcome,
        errors: Vec::new(),
        assets,
    })
}

fn parse_and_validate(
    document: &str,
    tags: &dyn TagRegistry,
    attributes: &dyn AttributeCatalog,
    strict: bool,
) -> Result<Vec<AbilitySpec>, Vec<String>> {
    let specs = parse(document, strict).map_err(|e| vec![e.to_string()])?;
    validate(&specs, tags, attributes)
        .map_err(|errors| errors.iter().map(|e| e.to_string()).collect::<Vec<_>>())?;
    Ok(specs)
}
