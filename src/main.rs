use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fundwatch::core::log::init_logging;
use fundwatch::core::result::ItemAction;

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

impl From<Commands> for fundwatch::AppCommand {
    fn from(cmd: Commands) -> fundwatch::AppCommand {
        match cmd {
            Commands::Search { query } => {
                fundwatch::AppCommand::Search(query.unwrap_or_default())
            }
            Commands::Watch => fundwatch::AppCommand::Watch,
            Commands::Add { code } => fundwatch::AppCommand::Add(code),
            Commands::Remove { code } => fundwatch::AppCommand::Remove(code),
            Commands::List => fundwatch::AppCommand::List,
            Commands::Item { code, action } => fundwatch::AppCommand::Item { code, action },
            Commands::Refresh => fundwatch::AppCommand::Refresh,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Search funds by code or name and show live valuations
    Search {
        /// Fund code or part of a fund name
        query: Option<String>,
    },
    /// Show live valuations for the watchlist
    Watch,
    /// Add a fund code to the watchlist
    Add { code: String },
    /// Remove a fund code from the watchlist
    Remove { code: String },
    /// List the codes in the watchlist
    List,
    /// Show or run the actions for a single fund
    Item {
        code: String,
        /// One of save, remove or open
        #[arg(short, long)]
        action: Option<ItemAction>,
    },
    /// Download the fund catalog again
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(cli.config_path.as_deref()),
        Some(cmd) => fundwatch::run_command(cmd.into(), cli.config_path.as_deref()).await,
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

fn setup(config_path: Option<&str>) -> Result<()> {
    let path = match config_path {
        Some(path) => {
            fundwatch::cli::setup::setup_at_path(path)?;
            std::path::PathBuf::from(path)
        }
        None => fundwatch::cli::setup::setup()?,
    };
    println!("Created default configuration at {}", path.display());
    Ok(())
}
