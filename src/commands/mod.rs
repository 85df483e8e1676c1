//! Command implementations
//!
//! Each module corresponds to one thing the CLI can do.

pub mod harvest;

pub use harvest::{run as harvest_run, HarvestArgs, HarvestOptions, HarvestOutcome};
