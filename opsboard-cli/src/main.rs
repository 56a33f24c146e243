mod cache;
mod client;
mod commands;
mod coordinator;
mod remote;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::events::EventsAction;
use commands::tasks::TasksAction;

const DEFAULT_SERVER: &str = "http://127.0.0.1:4117";

#[derive(Parser)]
#[command(name = "opsboard")]
#[command(about = "Interact with the opsboard events calendar and daily-task report")]
struct Cli {
    /// Base URL of the opsboard server
    #[arg(long, global = true, default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calendar events
    Events {
        #[command(subcommand)]
        action: EventsAction,
    },
    /// Daily report tasks
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Events { action } => commands::events::run(&cli.server, action).await,
        Commands::Tasks { action } => commands::tasks::run(&cli.server, action).await,
    }
}
