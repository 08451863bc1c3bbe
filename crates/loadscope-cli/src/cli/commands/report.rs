use anyhow::Context;
use loadscope_core::report::{render_session_report, write_report};
use loadscope_core::storage::Store;

use crate::cli::args::ReportArgs;

pub fn cmd_report(args: ReportArgs) -> anyhow::Result<i32> {
    let store = Store::open(&args.db)
        .with_context(|| format!("opening database {}", args.db.display()))?;
    store.init_schema().context("initializing schema")?;

    let content = render_session_report(&store, args.session, args.bucket_seconds)?;
    if args.stdout {
        print!("{content}");
        return Ok(0);
    }

    let artifact = write_report(&args.out, args.session, &content)?;
    println!("wrote {}", artifact.path.display());
    Ok(0)
}
