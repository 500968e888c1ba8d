pub mod flush;
pub mod queue;
pub mod transport;
pub mod worker;

pub use flush::{flush_pending, FlushError};
pub use queue::DeliveryQueue;
pub use transport::{DeliveryOutcome, HttpTransport, Transport, TransportError};
pub use worker::{DeliveryCycle, DeliveryWorker};
