//! Ratify CLI entry point.

use clap::Parser;

use ratify::cli::{Cli, Commands};
use ratify::infrastructure::config::ConfigLoader;
use ratify::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() {
    // Logging comes up before the full context so config errors are visible.
    let logging = ConfigLoader::load().map(|c| c.logging).unwrap_or_default();
    let _guard = init_logging(&logging);

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init(args) => ratify::cli::commands::init::execute(args, cli.json).await,
        Commands::Definition(args) => ratify::cli::commands::definition::execute(args, cli.json).await,
        Commands::Workflow(args) => ratify::cli::commands::workflow::execute(args, cli.json).await,
        Commands::Tasks(args) => ratify::cli::commands::tasks::execute(args, cli.json).await,
        Commands::Delegation(args) => ratify::cli::commands::delegation::execute(args, cli.json).await,
        Commands::Sweep(args) => ratify::cli::commands::sweep::execute(args, cli.json).await,
        Commands::Report(args) => ratify::cli::commands::report::execute(args, cli.json).await,
        Commands::Directory(args) => ratify::cli::commands::directory::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        ratify::cli::handle_error(err, cli.json);
    }
}
