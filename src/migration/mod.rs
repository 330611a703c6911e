//! Migrations: planned DDL awaiting approval and execution

mod lifecycle;
mod models;
mod planner;
mod store;

pub use lifecycle::{LifecycleAction, LifecycleError, MigrationPhase};
pub use models::{Migration, MigrationSpec};
pub use planner::MigrationPlanner;
pub use store::MigrationStore;
