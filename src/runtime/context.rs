use crate::delivery::DeliveryQueue;
use crate::runtime::Stats;
use crate::storage::BatchStore;
use std::sync::Arc;

/// Handles shared by the harvest and delivery loops
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub queue: Arc<DeliveryQueue>,
    pub batches: BatchStore,
    pub stats: Arc<Stats>,
}

impl EngineContext {
    pub fn new(batches: BatchStore) -> Self {
        Self {
            queue: Arc::new(DeliveryQueue::new()),
            batches,
            stats: Arc::new(Stats::default()),
        }
    }
}
