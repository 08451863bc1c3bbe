use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::aggregate::compute_session_aggregates;
use crate::config::WorkerConfig;
use crate::errors::{MaterializeError, SinkError};
use crate::materialize::SessionMaterializer;
use crate::model::{decode_batch, DoneEvent, SessionStatus, StartSignal};
use crate::report::{render_session_report, write_report};
use crate::sink::RawResultSink;
use crate::storage::Store;
use crate::tracker::{CompletionReason, DepthTracker};
use crate::transport::{DoneSink, MessageSource};

/// How often the idle wait for a start signal wakes up.
const START_POLL: Duration = Duration::from_millis(200);

/// The sequential analysis loop: wait for a start signal, collect raw
/// batches for exactly one session, materialize and aggregate it, publish
/// one done event, repeat. No state survives from one cycle into the next.
pub struct AnalysisWorker {
    store: Store,
    config: WorkerConfig,
    start_source: Box<dyn MessageSource>,
    raw_source: Box<dyn MessageSource>,
    done_sink: Box<dyn DoneSink>,
}

impl AnalysisWorker {
    pub fn new(
        store: Store,
        config: WorkerConfig,
        start_source: Box<dyn MessageSource>,
        raw_source: Box<dyn MessageSource>,
        done_sink: Box<dyn DoneSink>,
    ) -> Self {
        Self {
            store,
            config,
            start_source,
            raw_source,
            done_sink,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            self.run_one_session().await?;
        }
    }

    /// One full start→done cycle. Exactly one done event comes out of it,
    /// successful or failed.
    pub async fn run_one_session(&mut self) -> anyhow::Result<DoneEvent> {
        let start = self.wait_for_start().await?;
        info!(
            description = %start.description,
            total_depth = start.total_depth,
            "collection started"
        );

        // anything still queued belongs to an earlier window
        let stale = self.raw_source.drain().await?;
        if stale > 0 {
            debug!(stale, "dropped stale raw batches");
        }

        let (jobs, reason) = self.collect(&start).await?;
        debug!(?reason, jobs = jobs.len(), "collection finished");

        let event = self.finalize(&start, jobs).await?;

        // late arrivals must not resurrect this session
        self.raw_source.drain().await?;
        self.done_sink.publish(&event).await?;
        Ok(event)
    }

    async fn wait_for_start(&mut self) -> anyhow::Result<StartSignal> {
        loop {
            let Some(delivery) = self.start_source.recv(START_POLL).await? else {
                continue;
            };
            match StartSignal::from_bytes(&delivery.body) {
                Ok(signal) => {
                    self.start_source.ack(&delivery).await?;
                    return Ok(signal);
                }
                Err(e) => {
                    warn!(error = %e, "rejecting malformed start signal");
                    self.start_source.nack(&delivery).await?;
                }
            }
        }
    }

    /// Collect raw batches until every known job reaches the target depth
    /// or nothing arrives for the whole inactivity window. The deadline on
    /// the receive is the only cancellation mechanism there is.
    async fn collect(
        &mut self,
        start: &StartSignal,
    ) -> anyhow::Result<(BTreeMap<i64, u32>, CompletionReason)> {
        let sink = RawResultSink::new(&self.store);
        let mut tracker = DepthTracker::new(start.total_depth, self.config.inactivity_timeout);

        loop {
            let wait = tracker.remaining(Instant::now());
            let Some(delivery) = self.raw_source.recv(wait).await? else {
                if tracker.timed_out(Instant::now()) {
                    info!(jobs = tracker.jobs().len(), "inactivity window elapsed");
                    return Ok((tracker.into_jobs(), CompletionReason::ByTimeout));
                }
                continue;
            };

            let ingested = decode_batch(&delivery.body)
                .map_err(SinkError::from)
                .and_then(|records| sink.ingest_batch(&records));
            match ingested {
                Ok(results) => {
                    tracker.observe_batch(&results);
                    self.raw_source.ack(&delivery).await?;
                    debug!(jobs = ?tracker.jobs(), "depth updated");
                    if tracker.complete_by_depth() {
                        info!("every job reached target depth");
                        return Ok((tracker.into_jobs(), CompletionReason::ByDepth));
                    }
                }
                Err(SinkError::Validation(e)) => {
                    // rejected without redelivery; the inactivity clock and
                    // the depth mapping stay untouched
                    warn!(error = %e, "rejecting malformed raw batch");
                    self.raw_source.nack(&delivery).await?;
                }
                Err(SinkError::Storage(e)) => {
                    // left unacknowledged so the broker can redeliver it
                    return Err(anyhow::Error::from(e).context("persisting raw batch"));
                }
            }
        }
    }

    async fn finalize(
        &mut self,
        start: &StartSignal,
        jobs: BTreeMap<i64, u32>,
    ) -> anyhow::Result<DoneEvent> {
        let materializer = SessionMaterializer::new(&self.store);
        let session_id = match materializer.materialize(
            Some(start.description.as_str()),
            start.total_depth,
            &jobs,
            SessionStatus::Done,
        ) {
            Ok(id) => id,
            Err(MaterializeError::EmptyMapping) => {
                warn!("collection window closed with no raw data");
                return Ok(DoneEvent::failure(&start.description, "No RAW data received"));
            }
            Err(MaterializeError::Storage(e)) => {
                return Err(anyhow::Error::from(e).context("materializing session"));
            }
        };

        compute_session_aggregates(&self.store, Some(&[session_id]), self.config.bucket_seconds)
            .context("computing session aggregates")?;

        let report = render_session_report(&self.store, session_id, self.config.bucket_seconds)?;
        let artifact = write_report(&self.config.reports_dir, session_id, &report)?;
        info!(
            session_id,
            filename = %artifact.filename,
            bytes = artifact.bytes.len(),
            "report written"
        );

        Ok(DoneEvent::success(
            &start.description,
            session_id,
            jobs.len(),
            start.total_depth,
            artifact.filename,
            &artifact.bytes,
        ))
    }
}
