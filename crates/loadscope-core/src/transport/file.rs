use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use super::{Delivery, MessageSource};
use crate::errors::TransportError;

/// Replays captured raw traffic from a JSONL file, one delivery per line.
/// Once the file runs dry the source looks like an idle broker, so a
/// replayed session ends through the usual inactivity window.
pub struct FileSource {
    queued: VecDeque<Vec<u8>>,
    next_tag: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let mut queued = VecDeque::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                queued.push_back(line.into_bytes());
            }
        }
        Ok(Self {
            queued,
            next_tag: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}

#[async_trait]
impl MessageSource for FileSource {
    async fn recv(&mut self, wait: Duration) -> Result<Option<Delivery>, TransportError> {
        match self.queued.pop_front() {
            Some(body) => {
                self.next_tag += 1;
                Ok(Some(Delivery {
                    tag: self.next_tag,
                    body,
                }))
            }
            None => {
                tokio::time::sleep(wait).await;
                Ok(None)
            }
        }
    }

    async fn ack(&mut self, _delivery: &Delivery) -> Result<(), TransportError> {
        Ok(())
    }

    async fn nack(&mut self, _delivery: &Delivery) -> Result<(), TransportError> {
        Ok(())
    }

    async fn drain(&mut self) -> Result<usize, TransportError> {
        let dropped = self.queued.len();
        self.queued.clear();
        Ok(dropped)
    }
}
