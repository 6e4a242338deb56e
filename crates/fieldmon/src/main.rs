mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::Ctx;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // stderr keeps stdout clean for `-o json` pipelines
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Config(ref args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(ref args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "fieldmon", &mut std::io::stdout());
            Ok(())
        }

        // Everything else targets a gateway
        cmd => {
            let cfg = config::load(&cli.global)?;
            let target = config::resolve_target(&cli.global, &cfg)?;
            let ctx = Ctx {
                output: config::output_format(&cli.global, &cfg),
                color: output::should_color(cli.global.color),
                quiet: cli.global.quiet,
                handshake_timeout: cli.global.handshake_timeout,
            };

            tracing::debug!(command = ?cmd, profile = %target.profile, "dispatching command");
            commands::dispatch(&cmd, &target, &ctx).await
        }
    }
}
