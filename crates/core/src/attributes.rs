//! Per-product static attributes carried from the latest master-data record.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};
use crate::id::ProductKey;

/// Optional-field product record with explicit fallbacks.
///
/// Every field may be missing upstream; accessors resolve the documented
/// default instead of probing keys at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductAttributes {
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub stock_quantity: Option<f64>,
    pub reorder_level: Option<f64>,
    pub reorder_quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub lead_time_days: Option<f64>,
}

impl ProductAttributes {
    /// Current stock on hand (0 when unknown).
    pub fn stock_or_default(&self) -> f64 {
        self.stock_quantity.unwrap_or(0.0)
    }

    /// Configured reorder level (0 when unknown).
    pub fn reorder_level_or_default(&self) -> f64 {
        self.reorder_level.unwrap_or(0.0)
    }

    /// Configured reorder quantity (0 when unknown).
    pub fn reorder_quantity_or_default(&self) -> f64 {
        self.reorder_quantity.unwrap_or(0.0)
    }

    /// Check the fields that are present.
    pub fn validate(&self, product: &ProductKey) -> PlanResult<()> {
        if let Some(lead) = self.lead_time_days {
            if !(lead.is_finite() && lead > 0.0) {
                return Err(PlanError::input_contract(
                    product,
                    format!("lead_time_days must be a finite positive number (got {lead})"),
                ));
            }
        }

        let non_negative = [
            ("stock_quantity", self.stock_quantity),
            ("reorder_level", self.reorder_level),
            ("reorder_quantity", self.reorder_quantity),
            ("unit_price", self.unit_price),
        ];
        for (field, value) in non_negative {
            if let Some(v) = value {
                if !(v.is_finite() && v >= 0.0) {
                    return Err(PlanError::input_contract(
                        product,
                        format!("{field} must be finite and non-negative (got {v})"),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_resolve_to_defaults() {
        let attrs = ProductAttributes::default();
        assert_eq!(attrs.stock_or_default(), 0.0);
        assert_eq!(attrs.reorder_level_or_default(), 0.0);
        assert_eq!(attrs.reorder_quantity_or_default(), 0.0);
        assert!(attrs.lead_time_days.is_none());
        assert!(attrs.unit_price.is_none());
    }

    #[test]
    fn validate_rejects_non_positive_lead_time() {
        let key: ProductKey = "P1".parse().unwrap();
        let attrs = ProductAttributes {
            lead_time_days: Some(0.0),
            ..Default::default()
        };
        assert!(attrs.validate(&key).is_err());
    }

    #[test]
    fn validate_rejects_negative_stock() {
        let key: ProductKey = "P1".parse().unwrap();
        let attrs = ProductAttributes {
            stock_quantity: Some(-4.0),
            ..Default::default()
        };
        let err = attrs.validate(&key).unwrap_err();
        assert!(err.to_string().contains("stock_quantity"));
    }
}
