//! Run report: the structured outcome of one generation run, returned
//! to the caller (CLI or automation script).

use crate::reconcile::PlanCounts;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Validate-only run, document is clean. Nothing was changed.
    Checked,
    /// Parse or validation failed. Nothing was changed.
    ValidationFailed,
    /// Plans were computed but not applied.
    DryRun,
    /// Every asset in the batch applied fully.
    Applied,
    /// Some assets applied, others failed. Each asset is itself atomic.
    PartialFailure,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetReport {
    pub asset_id: String,
    pub counts: PlanCounts,
    pub applied: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,

    /// Complete defect list when parse/validation failed. Never
    /// truncated.
    pub errors: Vec<String>,

    pub assets: Vec<AssetReport>,
}

impl RunReport {
    pub fn validation_failed(errors: Vec<String>) -> Self {
        Self {
            outcome: RunOutcome::ValidationFailed,
            errors,
            assets: Vec::new(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            RunOutcome::Checked | RunOutcome::DryRun | RunOutcome::Applied => 0,
            RunOutcome::ValidationFailed => 2,
            RunOutcome::PartialFailure => 3,
        }
    }

    /// Human-readable summary for terminal output.
    pub fn summary(&self) -> String {
        let mut out = String::new();

        match self.outcome {
            RunOutcome::Checked => out.push_str("document is valid\n"),
            RunOutcome::ValidationFailed => {
                out.push_str(&format!(
                    "validation failed: {} error(s), nothing was changed\n",
                    self.errors.len()
                ));
                for err in &self.errors {
                    out.push_str(&format!("  - {err}\n"));
                }
            }
            RunOutcome::DryRun => out.push_str("dry run, nothing was changed\n"),
            RunOutcome::Applied => out.push_str("fully applied\n"),
            RunOutcome::PartialFailure => {
                out.push_str("partial failure: some assets were changed, others failed\n");
            }
        }

        for asset in &self.assets {
            let c = &asset.counts;
            out.push_str(&format!(
                "{}: +{} ~{} -{} ={}",
                asset.asset_id, c.created, c.updated, c.deleted, c.preserved
            ));
            match (&asset.error, asset.applied) {
                (Some(err), _) => out.push_str(&format!(" FAILED: {err}\n")),
                (None, true) => out.push_str(" applied\n"),
                (None, false) => out.push_str(" planned\n"),
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exit_codes_follow_outcome() {
        assert_eq!(RunReport::validation_failed(vec![]).exit_code(), 2);

        let applied = RunReport {
            outcome: RunOutcome::Applied,
            errors: vec![],
            assets: vec![],
        };
        assert_eq!(applied.exit_code(), 0);

        let partial = RunReport {
            outcome: RunOutcome::PartialFailure,
            errors: vec![],
            assets: vec![],
        };
        assert_eq!(partial.exit_code(), 3);
    }

    #[test]
    fn summary_lists_every_validation_error() {
        let report = RunReport::validation_failed(vec![
            "first defect".to_string(),
            "second defect".to_string(),
        ]);
        let text = report.summary();
        assert!(text.contains("first defect"));
        assert!(text.contains("second defect"));
        assert!(text.contains("nothing was changed"));
    }
}
