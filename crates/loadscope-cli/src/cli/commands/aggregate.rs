use anyhow::Context;
use loadscope_core::aggregate::compute_session_aggregates;
use loadscope_core::storage::Store;

use crate::cli::args::AggregateArgs;

pub fn cmd_aggregate(args: AggregateArgs) -> anyhow::Result<i32> {
    let store = Store::open(&args.db)
        .with_context(|| format!("opening database {}", args.db.display()))?;
    store.init_schema().context("initializing schema")?;

    let ids = match args.session {
        Some(id) => compute_session_aggregates(&store, Some(&[id]), args.bucket_seconds)?,
        None => compute_session_aggregates(&store, None, args.bucket_seconds)?,
    };
    println!("aggregated {} session(s): {:?}", ids.len(), ids);
    Ok(0)
}
