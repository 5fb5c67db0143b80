//! End-to-end planning run: forecast, blend, plan, evaluate.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use stockcast_core::{IssueKind, PlanError, PlanningConfig, ProductIssue, RunId};
use stockcast_forecast::{
    evaluate, forecast_rows, match_rows, ActualRow, BlendEngine, BlendedForecastRow,
    ProviderRegistry,
};
use stockcast_inventory::compute_plan;

use crate::io::{DemandTable, IoError, ProductHistory};
use crate::sink::PlanSink;
use crate::summary::RunSummary;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Io(#[from] IoError),
}

/// A configured planning run.
///
/// Products are processed one after another; a bad product is recorded and
/// skipped, while configuration and output errors abort.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PlanningConfig,
    registry: ProviderRegistry,
    engine: BlendEngine,
}

impl Pipeline {
    /// Validate `config` and resolve its provider names.
    pub fn new(config: PlanningConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let registry = ProviderRegistry::from_names(&config.providers)?;
        Ok(Self::assemble(config, registry))
    }

    /// Use an explicit registry instead of the configured provider names.
    pub fn with_registry(
        config: PlanningConfig,
        registry: ProviderRegistry,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        if registry.is_empty() {
            return Err(PlanError::configuration("provider registry is empty").into());
        }
        Ok(Self::assemble(config, registry))
    }

    fn assemble(config: PlanningConfig, registry: ProviderRegistry) -> Self {
        let engine = BlendEngine::from_config(&config);
        Self {
            config,
            registry,
            engine,
        }
    }

    pub fn config(&self) -> &PlanningConfig {
        &self.config
    }

    pub fn run(
        &self,
        demand: &DemandTable,
        actuals: Option<&[ActualRow]>,
        sink: &dyn PlanSink,
    ) -> Result<RunSummary, PipelineError> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            products = demand.products_seen(),
            providers = ?self.registry.names(),
            "planning run started"
        );

        let mut issues: Vec<ProductIssue> =
            demand.rejected.iter().map(ProductIssue::from).collect();
        let mut all_rows: Vec<BlendedForecastRow> = Vec::new();

        for product in &demand.products {
            match self.forecast_product(product) {
                Ok((rows, warnings)) => {
                    issues.extend(warnings);
                    all_rows.extend(rows);
                }
                Err(err) => issues.push(ProductIssue::from(&err)),
            }
        }
        sink.emit_forecasts(&all_rows)?;

        let plan = compute_plan(
            &all_rows,
            self.config.service_level,
            self.config.default_lead_days,
        )?;
        issues.extend(plan.issues.iter().cloned());
        sink.emit_plan(&plan.rows)?;

        let evaluation_rows = match actuals {
            Some(actuals) => {
                let matched = match_rows(actuals, &all_rows);
                if matched.unmatched_forecasts > 0 || matched.unmatched_actuals > 0 {
                    issues.push(ProductIssue::warning(
                        IssueKind::UnmatchedEvaluationRows,
                        None,
                        format!(
                            "{} forecast rows without actuals, {} actuals without forecasts",
                            matched.unmatched_forecasts, matched.unmatched_actuals
                        ),
                    ));
                }
                let rows = evaluate(&matched.rows).rows();
                sink.emit_evaluation(&rows)?;
                Some(rows.len())
            }
            None => None,
        };

        for issue in &issues {
            let product = issue.product.as_ref().map(|p| p.as_str()).unwrap_or("-");
            if issue.is_error() {
                error!(run_id = %run_id, product, kind = ?issue.kind, "{}", issue.message);
            } else {
                warn!(run_id = %run_id, product, kind = ?issue.kind, "{}", issue.message);
            }
        }

        let products_seen = demand.products_seen();
        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            config: self.config.clone(),
            products_seen,
            products_planned: plan.rows.len(),
            products_skipped: products_seen.saturating_sub(plan.rows.len()),
            forecast_rows: all_rows.len(),
            plan_rows: plan.rows.len(),
            evaluation_rows,
            issues,
        };

        info!(
            run_id = %run_id,
            planned = summary.products_planned,
            skipped = summary.products_skipped,
            errors = summary.errors().count(),
            warnings = summary.warnings().count(),
            "planning run finished"
        );
        Ok(summary)
    }

    fn forecast_product(
        &self,
        product: &ProductHistory,
    ) -> Result<(Vec<BlendedForecastRow>, Vec<ProductIssue>), PlanError> {
        let series = &product.series;
        let window = self.config.effective_window(series.len());

        let set = self.registry.forecast(series, self.config.horizon, window);
        let outcome = self
            .engine
            .blend(series.product(), &set, series.tail(window), window)?;

        let rows = forecast_rows(series, &product.attributes, &outcome);
        Ok((rows, outcome.warnings))
    }
}
