pub mod batcher;
pub mod harvester;

pub use batcher::Batcher;
pub use harvester::{CycleOutcome, HarvestError, Harvester};
