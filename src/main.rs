//! infraplan CLI — topology and least-privilege policy planning for ECS web apps.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "infraplan",
    version,
    about = "Resolve an ECS web-app topology and its least-privilege IAM policies"
)]
struct Cli {
    #[command(subcommand)]
    command: infraplan::cli::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = infraplan::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
