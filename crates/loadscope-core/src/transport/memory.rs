use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Delivery, DoneSink, MessageSource};
use crate::errors::TransportError;
use crate::model::DoneEvent;

/// In-process source backed by an unbounded channel. Once every producer
/// handle is gone it behaves like an idle broker, so a consumer's
/// inactivity window can still run out normally.
pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    next_tag: u64,
    acked: Arc<AtomicU64>,
    nacked: Arc<AtomicU64>,
}

/// Producer side of a [`MemorySource`]; also exposes the ack/nack counters
/// the consumer has recorded so far.
#[derive(Clone)]
pub struct MemoryHandle {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    acked: Arc<AtomicU64>,
    nacked: Arc<AtomicU64>,
}

pub fn channel() -> (MemoryHandle, MemorySource) {
    let (tx, rx) = mpsc::unbounded_channel();
    let acked = Arc::new(AtomicU64::new(0));
    let nacked = Arc::new(AtomicU64::new(0));
    (
        MemoryHandle {
            tx,
            acked: acked.clone(),
            nacked: nacked.clone(),
        },
        MemorySource {
            rx,
            next_tag: 0,
            acked,
            nacked,
        },
    )
}

impl MemoryHandle {
    pub fn send(&self, body: impl Into<Vec<u8>>) {
        let _ = self.tx.send(body.into());
    }

    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::SeqCst)
    }

    pub fn nacked(&self) -> u64 {
        self.nacked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn recv(&mut self, wait: Duration) -> Result<Option<Delivery>, TransportError> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Err(_) => Ok(None),
            Ok(Some(body)) => {
                self.next_tag += 1;
                Ok(Some(Delivery {
                    tag: self.next_tag,
                    body,
                }))
            }
            Ok(None) => {
                // channel closed and empty: idle out the rest of the wait
                tokio::time::sleep(wait).await;
                Ok(None)
            }
        }
    }

    async fn ack(&mut self, _delivery: &Delivery) -> Result<(), TransportError> {
        self.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn nack(&mut self, _delivery: &Delivery) -> Result<(), TransportError> {
        self.nacked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn drain(&mut self) -> Result<usize, TransportError> {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        Ok(dropped)
    }
}

/// Collects published done events in memory; clone a handle to read them
/// back after the worker is finished with its side.
#[derive(Clone, Default)]
pub struct MemoryDoneSink {
    events: Arc<Mutex<Vec<DoneEvent>>>,
}

impl MemoryDoneSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DoneEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl DoneSink for MemoryDoneSink {
    async fn publish(&mut self, event: &DoneEvent) -> Result<(), TransportError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
