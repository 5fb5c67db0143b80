//! `stockcast-core`: planning building blocks.
//!
//! Pure types shared by the forecasting, inventory and infrastructure crates
//! (no IO).

pub mod attributes;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod id;
pub mod series;
pub mod stats;

pub use attributes::ProductAttributes;
pub use config::PlanningConfig;
pub use diagnostics::{IssueKind, ProductIssue, Severity};
pub use error::{PlanError, PlanResult};
pub use id::{ProductKey, ProviderName, RunId};
pub use series::{DemandPoint, DemandSeries};
