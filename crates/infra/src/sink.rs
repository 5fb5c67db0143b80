use std::path::PathBuf;
use std::sync::Mutex;

use stockcast_forecast::{BlendedForecastRow, EvaluationRow};
use stockcast_inventory::ReorderPlanRow;

use crate::io::{write_csv, IoError};

/// Destination for the tables a run produces.
///
/// Each table is emitted once, complete.
pub trait PlanSink: Send + Sync + 'static {
    fn emit_forecasts(&self, rows: &[BlendedForecastRow]) -> Result<(), IoError>;

    fn emit_plan(&self, rows: &[ReorderPlanRow]) -> Result<(), IoError>;

    fn emit_evaluation(&self, rows: &[EvaluationRow]) -> Result<(), IoError>;
}

/// Writes each table to its own CSV file.
#[derive(Debug, Clone)]
pub struct CsvPlanSink {
    pub forecast_path: PathBuf,
    pub plan_path: PathBuf,
    pub evaluation_path: PathBuf,
}

impl CsvPlanSink {
    pub fn new(
        forecast_path: impl Into<PathBuf>,
        plan_path: impl Into<PathBuf>,
        evaluation_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            forecast_path: forecast_path.into(),
            plan_path: plan_path.into(),
            evaluation_path: evaluation_path.into(),
        }
    }
}

impl PlanSink for CsvPlanSink {
    fn emit_forecasts(&self, rows: &[BlendedForecastRow]) -> Result<(), IoError> {
        write_csv(&self.forecast_path, rows)
    }

    fn emit_plan(&self, rows: &[ReorderPlanRow]) -> Result<(), IoError> {
        write_csv(&self.plan_path, rows)
    }

    fn emit_evaluation(&self, rows: &[EvaluationRow]) -> Result<(), IoError> {
        write_csv(&self.evaluation_path, rows)
    }
}

/// Everything an [`InMemoryPlanSink`] received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkContents {
    pub forecasts: Vec<BlendedForecastRow>,
    pub plan: Vec<ReorderPlanRow>,
    pub evaluation: Option<Vec<EvaluationRow>>,
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryPlanSink {
    inner: Mutex<SinkContents>,
}

impl InMemoryPlanSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> SinkContents {
        self.inner.lock().unwrap().clone()
    }
}

impl PlanSink for InMemoryPlanSink {
    fn emit_forecasts(&self, rows: &[BlendedForecastRow]) -> Result<(), IoError> {
        self.inner.lock().unwrap().forecasts.extend_from_slice(rows);
        Ok(())
    }

    fn emit_plan(&self, rows: &[ReorderPlanRow]) -> Result<(), IoError> {
        self.inner.lock().unwrap().plan.extend_from_slice(rows);
        Ok(())
    }

    fn emit_evaluation(&self, rows: &[EvaluationRow]) -> Result<(), IoError> {
        self.inner
            .lock()
            .unwrap()
            .evaluation
            .get_or_insert_with(Vec::new)
            .extend_from_slice(rows);
        Ok(())
    }
}
