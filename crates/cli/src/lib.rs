//! `stockcast` command line: argument parsing and config resolution.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use stockcast_core::PlanningConfig;
use stockcast_infra::{
    load_actuals, load_config, load_demand, write_summary, CsvPlanSink, Pipeline, RunSummary,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "stockcast")]
#[command(about = "Blend demand forecasts and plan inventory reorders", long_about = None)]
pub struct Args {
    /// Demand history CSV
    #[arg(long)]
    pub demand: PathBuf,

    /// Observed demand CSV for evaluating the forecast (optional)
    #[arg(long)]
    pub actuals: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Forecast horizon in days
    #[arg(long)]
    pub horizon: Option<usize>,

    /// Service level in (0, 1)
    #[arg(long)]
    pub service_level: Option<f64>,

    /// Lead time for products without their own
    #[arg(long)]
    pub lead_time_days: Option<f64>,

    /// Trailing periods used to weight providers
    #[arg(long)]
    pub window: Option<usize>,

    #[arg(long, default_value = "outputs/forecasts/forecast.csv")]
    pub out_forecast: PathBuf,

    #[arg(long, default_value = "outputs/reports/reorder_plan.csv")]
    pub out_reorder: PathBuf,

    #[arg(long, default_value = "outputs/reports/evaluation.csv")]
    pub out_evaluation: PathBuf,

    /// Run summary JSON (optional)
    #[arg(long)]
    pub out_summary: Option<PathBuf>,
}

/// Defaults, then the config file, then flags.
pub fn resolve_config(args: &Args) -> anyhow::Result<PlanningConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => PlanningConfig::default(),
    };
    if let Some(h) = args.horizon {
        config = config.with_horizon(h);
    }
    if let Some(sl) = args.service_level {
        config = config.with_service_level(sl);
    }
    if let Some(lead) = args.lead_time_days {
        config = config.with_default_lead_days(lead);
    }
    if let Some(w) = args.window {
        config = config.with_window(w);
    }
    Ok(config)
}

/// Load inputs, run the pipeline and write every output.
pub fn run(args: &Args) -> anyhow::Result<RunSummary> {
    let config = resolve_config(args)?;
    let pipeline = Pipeline::new(config).context("invalid configuration")?;

    let demand = load_demand(&args.demand)?;
    let actuals = args.actuals.as_deref().map(load_actuals).transpose()?;
    info!(
        demand = %args.demand.display(),
        products = demand.products_seen(),
        actuals = actuals.as_ref().map(Vec::len),
        "inputs loaded"
    );

    let sink = CsvPlanSink::new(&args.out_forecast, &args.out_reorder, &args.out_evaluation);
    let summary = pipeline.run(&demand, actuals.as_deref(), &sink)?;

    if let Some(path) = &args.out_summary {
        write_summary(path, &summary)?;
    }
    Ok(summary)
}
