//! Machine-readable record of one pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockcast_core::{PlanningConfig, ProductIssue, RunId, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: PlanningConfig,
    pub products_seen: usize,
    pub products_planned: usize,
    pub products_skipped: usize,
    pub forecast_rows: usize,
    pub plan_rows: usize,
    /// `None` when no actuals were supplied.
    pub evaluation_rows: Option<usize>,
    pub issues: Vec<ProductIssue>,
}

impl RunSummary {
    pub fn errors(&self) -> impl Iterator<Item = &ProductIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ProductIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }
}
