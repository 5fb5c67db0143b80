use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockcast_core::{stats, DemandSeries, ProductAttributes, ProductKey, ProviderName};

use crate::blend::BlendOutcome;

/// One row of the forecast table: a product on one future date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendedForecastRow {
    pub date: NaiveDate,
    pub product_id: Option<String>,
    #[serde(rename = "product_item")]
    pub product: ProductKey,
    pub product_name: Option<String>,
    /// Blended forecast, never negative.
    pub forecast: f64,
    pub hist_mean: f64,
    /// Sample std of the history; empty below two observations.
    pub hist_std: Option<f64>,
    pub stock_quantity: f64,
    pub reorder_level: f64,
    pub reorder_quantity: f64,
    pub unit_price: Option<f64>,
    pub lead_time_days: Option<f64>,
    pub w_arima: f64,
    pub w_lstm: f64,
    pub w_xgb: f64,
}

/// Expand a blend outcome into one row per future date.
///
/// Attributes come from the product's latest record; weights are rounded to
/// three decimals for the table.
pub fn forecast_rows(
    series: &DemandSeries,
    attributes: &ProductAttributes,
    outcome: &BlendOutcome,
) -> Vec<BlendedForecastRow> {
    let dates = series.future_dates(outcome.blended.len());
    let hist_mean = series.mean();
    let hist_std = series.std();
    let weight = |name: &ProviderName| stats::round_to(outcome.weights.get(name), 3);

    dates
        .into_iter()
        .zip(&outcome.blended)
        .map(|(date, yhat)| BlendedForecastRow {
            date,
            product_id: attributes.product_id.clone(),
            product: series.product().clone(),
            product_name: attributes.product_name.clone(),
            forecast: yhat.max(0.0),
            hist_mean,
            hist_std,
            stock_quantity: attributes.stock_or_default(),
            reorder_level: attributes.reorder_level_or_default(),
            reorder_quantity: attributes.reorder_quantity_or_default(),
            unit_price: attributes.unit_price,
            lead_time_days: attributes.lead_time_days,
            w_arima: weight(&ProviderName::ARIMA),
            w_lstm: weight(&ProviderName::LSTM),
            w_xgb: weight(&ProviderName::XGB),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::BlendEngine;
    use crate::result::ForecastSet;
    use stockcast_core::DemandPoint;

    #[test]
    fn rows_carry_attributes_and_rounded_weights() {
        let key: ProductKey = "P1".parse().unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let points = [4.0, 6.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, q)| DemandPoint {
                date: start + chrono::Days::new(i as u64),
                quantity: *q,
            })
            .collect();
        let series = DemandSeries::new(key.clone(), points).unwrap();
        let attrs = ProductAttributes {
            product_name: Some("Widget".into()),
            stock_quantity: Some(12.0),
            unit_price: Some(2.5),
            ..Default::default()
        };

        let set = ForecastSet::new(2)
            .with_forecast(ProviderName::ARIMA, vec![5.0, 5.0])
            .with_forecast(ProviderName::LSTM, vec![5.0, 5.0])
            .with_forecast(ProviderName::XGB, vec![5.0, 5.0]);
        let outcome = BlendEngine::default()
            .blend(&key, &set, series.values(), 28)
            .unwrap();

        let rows = forecast_rows(&series, &attrs, &outcome);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(rows[0].product_name.as_deref(), Some("Widget"));
        assert_eq!(rows[0].stock_quantity, 12.0);
        assert_eq!(rows[0].reorder_quantity, 0.0);
        assert_eq!(rows[0].hist_mean, 5.0);
        assert_eq!(rows[0].hist_std, Some(1.0));
        assert_eq!(rows[0].w_arima, 0.333);
        assert_eq!(rows[0].w_xgb, 0.333);
    }
}
