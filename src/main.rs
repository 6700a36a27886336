use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use moneta::cli::invest::InvestCommand;
use moneta::cli::ledger::{AccountCommand, CategoryCommand, TxCommand};
use moneta::cli::salary::SalaryCommand;
use moneta::core::log::init_logging;

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

impl From<Commands> for moneta::AppCommand {
    fn from(cmd: Commands) -> moneta::AppCommand {
        match cmd {
            Commands::Run => moneta::AppCommand::Run,
            Commands::Account(c) => moneta::AppCommand::Account(c),
            Commands::Category(c) => moneta::AppCommand::Category(c),
            Commands::Tx(c) => moneta::AppCommand::Tx(c),
            Commands::Salary(c) => moneta::AppCommand::Salary(c),
            Commands::Invest(c) => moneta::AppCommand::Invest(c),
            Commands::Refresh { ticker } => moneta::AppCommand::Refresh { ticker },
            Commands::Quote { ticker } => moneta::AppCommand::Quote { ticker },
            Commands::Search { query } => moneta::AppCommand::Search { query },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the salary scheduler and price auto-refresh in the foreground
    Run,
    /// Manage accounts
    #[command(subcommand)]
    Account(AccountCommand),
    /// Manage transaction categories
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Manage transactions
    #[command(subcommand)]
    Tx(TxCommand),
    /// Configure and pay the monthly salary
    #[command(subcommand)]
    Salary(SalaryCommand),
    /// Manage investments and their prices
    #[command(subcommand)]
    Invest(InvestCommand),
    /// Refresh prices for one ticker, or for the whole portfolio
    Refresh { ticker: Option<String> },
    /// Look up a price without saving it
    Quote { ticker: String },
    /// Search tickers by name or code
    Search { query: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, matches!(cli.command, Some(Commands::Run)));

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => moneta::cli::setup::setup_at_path(path),
            None => moneta::cli::setup::setup(),
        },
        Some(cmd) => moneta::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
        if e
            .downcast_ref::<moneta::core::Error>()
            .is_some_and(moneta::core::Error::retry_later)
        {
            eprintln!("{e}. This is temporary, try again later.");
        }
    }
    result
}
