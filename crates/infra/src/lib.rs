//! Infrastructure layer: table IO, output sinks and the pipeline driver.

pub mod io;
pub mod pipeline;
pub mod sink;
pub mod summary;

pub use io::{
    load_actuals, load_config, load_demand, write_csv, write_summary, DemandTable, IoError,
    ProductHistory,
};
pub use pipeline::{Pipeline, PipelineError};
pub use sink::{CsvPlanSink, InMemoryPlanSink, PlanSink, SinkContents};
pub use summary::RunSummary;
