//! Planning error model.

use thiserror::Error;

use crate::id::ProductKey;

/// Result type used across the planning layer.
pub type PlanResult<T> = Result<T, PlanError>;

/// Planning-level error.
///
/// The variants split by blast radius: an input contract violation costs one
/// product, a configuration error costs the whole run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    /// Per-product input did not satisfy its contract (the product is skipped).
    #[error("input contract violated for product {product}: {reason}")]
    InputContractViolation { product: ProductKey, reason: String },

    /// Run-level configuration is invalid (nothing is processed).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An identifier was invalid (e.g. empty product key).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl PlanError {
    pub fn input_contract(product: &ProductKey, reason: impl Into<String>) -> Self {
        Self::InputContractViolation {
            product: product.clone(),
            reason: reason.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Product the error is scoped to, if any.
    pub fn product(&self) -> Option<&ProductKey> {
        match self {
            PlanError::InputContractViolation { product, .. } => Some(product),
            PlanError::Configuration(_) | PlanError::InvalidId(_) => None,
        }
    }

    /// Whether the error must abort the whole run.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, PlanError::Configuration(_))
    }
}
