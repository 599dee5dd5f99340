//! Tungs CLI entry point.
//!
//! Binary name: `tungs`
//!
//! Parses CLI arguments, sets up tracing, restores the cached session, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tungs_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut tracing_options = TracingOptions::for_verbosity(cli.verbose, cli.quiet);
    tracing_options.json = cli.log_json;
    tracing_options.otel = cli.otel;
    init_tracing(&tracing_options)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tungs", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(cli.backend_url).await?;

    match cli.command {
        Commands::Login {
            email,
            id,
            name,
            local,
        } => {
            cli::account::login(
                &state,
                &email,
                id.as_deref(),
                name.as_deref(),
                local,
                cli.json,
            )
            .await?;
        }

        Commands::Logout => {
            cli::account::logout(&state, cli.json).await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Send { count } => {
            cli::usage::send(&state, count, cli.json).await?;
        }

        Commands::Sync => {
            cli::usage::sync(&state, cli.json).await?;
        }

        Commands::Watch => {
            cli::watch::watch(&state, cli.json).await?;
        }

        Commands::Config => {
            cli::config::show(&state, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
