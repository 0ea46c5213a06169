use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use oa_console_sidebar::{ApplicationBootstrap, RunMode};

#[derive(Parser, Debug)]
#[command(name = "oa-console-sidebar")]
#[command(about = "Conversation sidebar reconciliation and unread timers for the OA admin console")]
struct Cli {
    /// Replay a newline-delimited script on a manual clock instead of bridging stdin/stdout
    #[arg(long, value_name = "FILE", conflicts_with = "commands")]
    script: Option<PathBuf>,

    /// Read local commands (one JSON object per line) from a file or named pipe
    #[arg(long, value_name = "FILE")]
    commands: Option<PathBuf>,
}

impl Cli {
    fn run_mode(self) -> RunMode {
        match self.script {
            Some(script) => RunMode::Replay { script },
            None => RunMode::Bridge {
                commands: self.commands,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ApplicationBootstrap::run(cli.run_mode()).await
}
