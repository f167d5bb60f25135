mod cli;
mod core;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "usagebar", about = "Claude usage and rate-limit monitor", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Emit JSON instead of text
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose output and debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and display current usage (default)
    Usage,
    /// Poll usage on an interval and raise threshold notifications
    Watch {
        /// Poll interval in seconds
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
    /// Send a one-off desktop notification with the current reading
    Summary,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "usagebar=debug"
    } else {
        "usagebar=warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output_opts =
        cli::output::OutputOptions::from_flags(cli.json, cli.pretty, cli.no_color, cli.verbose);

    match cli.command {
        None | Some(Commands::Usage) => cli::usage_cmd::run(&output_opts).await?,
        Some(Commands::Watch { interval }) => {
            cli::watch_cmd::run(interval, &output_opts).await?
        }
        Some(Commands::Summary) => cli::usage_cmd::summary().await?,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&output_opts)?,
        },
    }

    Ok(())
}
