use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::debug;

use stockcast_core::config::{validate_lead_days, validate_service_level};
use stockcast_core::{
    stats, IssueKind, PlanError, PlanResult, ProductIssue, ProductKey,
};
use stockcast_forecast::BlendedForecastRow;

/// Reorder recommendation for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderPlanRow {
    pub product_id: Option<String>,
    #[serde(rename = "product_item")]
    pub product: ProductKey,
    pub product_name: Option<String>,
    pub service_level: f64,
    pub lead_time_days: f64,
    pub mean_daily_forecast: f64,
    pub demand_std: f64,
    pub z_score: f64,
    pub lead_time_demand: f64,
    pub safety_stock: f64,
    pub reorder_point: f64,
    pub current_stock: f64,
    pub reorder_quantity: f64,
    pub needs_reorder: bool,
    pub estimated_order_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanOutcome {
    /// One row per product, in first-appearance order.
    pub rows: Vec<ReorderPlanRow>,
    /// Skipped products (errors) and degenerate inputs (warnings).
    pub issues: Vec<ProductIssue>,
}

/// Inverse standard normal CDF at `service_level`.
pub fn z_score(service_level: f64) -> PlanResult<f64> {
    validate_service_level(service_level)?;
    let normal = Normal::new(0.0, 1.0).map_err(|e| PlanError::configuration(e.to_string()))?;
    Ok(normal.inverse_cdf(service_level))
}

/// Compute safety stock, reorder point and order quantity per product.
///
/// Invalid `service_level` or `default_lead` abort with a configuration
/// error; a product with a non-positive lead time is skipped and reported.
pub fn compute_plan(
    rows: &[BlendedForecastRow],
    service_level: f64,
    default_lead: f64,
) -> PlanResult<PlanOutcome> {
    validate_lead_days(default_lead)?;
    let z = z_score(service_level)?;

    let mut outcome = PlanOutcome::default();
    for group in group_by_product(rows) {
        match plan_product(&group, service_level, z, default_lead) {
            Ok((row, warning)) => {
                debug!(
                    product = %row.product,
                    reorder_point = row.reorder_point,
                    reorder_quantity = row.reorder_quantity,
                    "planned product"
                );
                outcome.issues.extend(warning);
                outcome.rows.push(row);
            }
            Err(err) => outcome.issues.push(ProductIssue::from(&err)),
        }
    }
    Ok(outcome)
}

fn group_by_product(rows: &[BlendedForecastRow]) -> Vec<Vec<&BlendedForecastRow>> {
    let mut index: HashMap<&ProductKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<&BlendedForecastRow>> = Vec::new();
    for row in rows {
        let i = *index.entry(&row.product).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[i].push(row);
    }
    groups
}

fn plan_product(
    group: &[&BlendedForecastRow],
    service_level: f64,
    z: f64,
    default_lead: f64,
) -> PlanResult<(ReorderPlanRow, Option<ProductIssue>)> {
    // Groups are never empty.
    let first = group[0];
    let product = &first.product;

    let lead = match first.lead_time_days {
        Some(days) if !(days.is_finite() && days > 0.0) => {
            return Err(PlanError::input_contract(
                product,
                format!("lead time must be positive, got {days}"),
            ));
        }
        Some(days) => days,
        None => default_lead,
    };

    let forecasts: Vec<f64> = group.iter().map(|r| r.forecast).collect();
    let mean_daily = stats::mean(&forecasts);
    let demand_std = if forecasts.len() >= 2 {
        stats::stddev_sample(&forecasts).unwrap_or(0.0)
    } else {
        first.hist_std.unwrap_or(0.0)
    };

    let lead_time_demand = (mean_daily * lead).max(0.0);
    let safety_stock = (z * demand_std * lead.sqrt()).max(0.0);
    let reorder_point = lead_time_demand + safety_stock;
    let current_stock = first.stock_quantity;

    let raw = (reorder_point - current_stock).max(0.0);
    let reorder_quantity = if raw > 0.0 && first.reorder_quantity > 0.0 {
        raw.max(first.reorder_quantity)
    } else {
        raw
    };

    let warning = (demand_std == 0.0).then(|| {
        ProductIssue::warning(
            IssueKind::ZeroVariance,
            Some(product),
            "zero demand variability, safety stock is zero",
        )
    });

    Ok((
        ReorderPlanRow {
            product_id: first.product_id.clone(),
            product: product.clone(),
            product_name: first.product_name.clone(),
            service_level,
            lead_time_days: lead,
            mean_daily_forecast: mean_daily,
            demand_std,
            z_score: z,
            lead_time_demand,
            safety_stock,
            reorder_point,
            current_stock,
            reorder_quantity,
            needs_reorder: current_stock <= reorder_point,
            estimated_order_value: first.unit_price.map(|p| reorder_quantity * p),
        },
        warning,
    ))
}
