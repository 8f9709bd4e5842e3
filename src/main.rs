use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use vendor_health::cli::compare::SortKey;
use vendor_health::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for vendor_health::AppCommand {
    fn from(cmd: Commands) -> vendor_health::AppCommand {
        match cmd {
            Commands::Setup => vendor_health::AppCommand::Setup,
            Commands::Serve => vendor_health::AppCommand::Serve,
            Commands::Summary { ticker } => vendor_health::AppCommand::Summary { ticker },
            Commands::Compare { sort, ascending } => {
                vendor_health::AppCommand::Compare { sort, ascending }
            }
            Commands::Trends { ticker } => vendor_health::AppCommand::Trends { ticker },
            Commands::Refresh { ticker } => vendor_health::AppCommand::Refresh { ticker },
            Commands::Init => vendor_health::AppCommand::Init,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the HTTP API
    Serve,
    /// Display the latest financial health summary for a vendor
    Summary { ticker: String },
    /// Compare the configured vendors side by side
    Compare {
        /// Metric to sort by
        #[arg(short, long, value_enum)]
        sort: Option<SortKey>,
        /// Sort ascending instead of descending
        #[arg(short, long)]
        ascending: bool,
    },
    /// Display yearly income trends for a vendor
    Trends { ticker: String },
    /// Fetch fresh data for a vendor
    Refresh { ticker: String },
    /// Fetch fresh data for every configured vendor
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = match cli.command {
        Some(Commands::Serve) => LevelFilter::INFO,
        _ => LevelFilter::OFF,
    };
    init_logging(cli.verbose, default_level);

    let result = match cli.command {
        Some(cmd) => vendor_health::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
