//! Recorded errors and warnings surfaced in the run summary.

use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::id::ProductKey;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InputContractViolation,
    Configuration,
    /// A provider failed but others were usable.
    ProviderFailure,
    /// All provider errors were equal (uniform weights used).
    EqualProviderErrors,
    /// Demand std was zero (zero safety stock).
    ZeroVariance,
    /// Forecast rows without a matching actual.
    UnmatchedEvaluationRows,
}

/// A non-silent record of something that went wrong or looked degenerate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub product: Option<ProductKey>,
    pub message: String,
}

impl ProductIssue {
    pub fn warning(
        kind: IssueKind,
        product: Option<&ProductKey>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            product: product.cloned(),
            message: message.into(),
        }
    }

    pub fn error(
        kind: IssueKind,
        product: Option<&ProductKey>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            product: product.cloned(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&PlanError> for ProductIssue {
    fn from(err: &PlanError) -> Self {
        let kind = match err {
            PlanError::InputContractViolation { .. } | PlanError::InvalidId(_) => {
                IssueKind::InputContractViolation
            }
            PlanError::Configuration(_) => IssueKind::Configuration,
        };
        ProductIssue::error(kind, err.product(), err.to_string())
    }
}
