//! Inventory planning (safety stock and reorder points).
//!
//! Turns blended forecast rows into one reorder recommendation per product,
//! implemented purely as deterministic logic (no IO, no storage).

pub mod planner;

pub use planner::{compute_plan, z_score, PlanOutcome, ReorderPlanRow};
