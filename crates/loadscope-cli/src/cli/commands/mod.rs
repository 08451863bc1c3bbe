pub mod aggregate;
pub mod replay;
pub mod report;

use crate::cli::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Replay(args) => replay::cmd_replay(args).await,
        Command::Aggregate(args) => aggregate::cmd_aggregate(args),
        Command::Report(args) => report::cmd_report(args),
    }
}
