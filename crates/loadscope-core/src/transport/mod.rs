pub mod file;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::model::DoneEvent;

/// One unit of delivery from the broker, acknowledged explicitly.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub body: Vec<u8>,
}

/// A consumable channel of deliveries. Implementations wrap whatever broker
/// the deployment uses; the worker only relies on deadline-bounded receive
/// and explicit ack/nack, and acknowledges a delivery strictly after it has
/// been persisted.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait up to `wait` for the next delivery. `Ok(None)` means the
    /// deadline elapsed with nothing to consume.
    async fn recv(&mut self, wait: Duration) -> Result<Option<Delivery>, TransportError>;

    async fn ack(&mut self, delivery: &Delivery) -> Result<(), TransportError>;

    /// Reject without redelivery.
    async fn nack(&mut self, delivery: &Delivery) -> Result<(), TransportError>;

    /// Throw away everything currently queued; returns how many were
    /// dropped. Used between sessions so stale batches cannot leak into
    /// the next collection cycle.
    async fn drain(&mut self) -> Result<usize, TransportError>;
}

/// Outbound side: exactly one finished event per session attempt.
#[async_trait]
pub trait DoneSink: Send {
    async fn publish(&mut self, event: &DoneEvent) -> Result<(), TransportError>;
}
