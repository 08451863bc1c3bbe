use std::time::Duration;

use anyhow::Context;
use loadscope_core::config::WorkerConfig;
use loadscope_core::model::StartSignal;
use loadscope_core::storage::Store;
use loadscope_core::transport::file::FileSource;
use loadscope_core::transport::memory;
use loadscope_core::worker::AnalysisWorker;

use crate::cli::args::ReplayArgs;

pub async fn cmd_replay(args: ReplayArgs) -> anyhow::Result<i32> {
    let store = Store::open(&args.db)
        .with_context(|| format!("opening database {}", args.db.display()))?;
    store.init_schema().context("initializing schema")?;

    let mut config = WorkerConfig::from_env();
    config.db_path = args.db.clone();
    config.reports_dir = args.reports_dir.clone();
    config.bucket_seconds = args.bucket_seconds;
    config.inactivity_timeout = Duration::from_secs_f64(args.timeout_seconds);

    let raw_source = FileSource::open(&args.input)
        .with_context(|| format!("opening capture {}", args.input.display()))?;
    tracing::info!(batches = raw_source.len(), "replaying capture");

    let (start_handle, start_source) = memory::channel();
    start_handle.send(serde_json::to_vec(&StartSignal {
        description: args.description.clone(),
        total_depth: args.depth,
    })?);

    let mut worker = AnalysisWorker::new(
        store,
        config,
        Box::new(start_source),
        Box::new(raw_source),
        Box::new(memory::MemoryDoneSink::new()),
    );
    let event = worker.run_one_session().await?;

    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(if event.ok { 0 } else { 1 })
}
