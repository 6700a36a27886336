pub mod cli;
pub mod core;
pub mod investments;
pub mod ledger;
pub mod providers;
pub mod salary;
pub mod store;
pub mod sync;
pub mod tasks;

use crate::cli::invest::InvestCommand;
use crate::cli::ledger::{AccountCommand, CategoryCommand, TxCommand};
use crate::cli::salary::SalaryCommand;
use crate::core::config::AppConfig;
use crate::investments::InvestmentService;
use crate::ledger::Ledger;
use crate::providers::ProviderChain;
use crate::providers::status_invest::StatusInvestProvider;
use crate::salary::SalaryScheduler;
use crate::store::Store;
use crate::sync::{PriceSyncEngine, SyncSettings};
use anyhow::Result;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Long-running mode with the background salary and price tasks
    Run,
    Account(AccountCommand),
    Category(CategoryCommand),
    Tx(TxCommand),
    Salary(SalaryCommand),
    Invest(InvestCommand),
    Refresh { ticker: Option<String> },
    Quote { ticker: String },
    Search { query: String },
}

/// Every service wired over one store.
#[derive(Clone)]
pub struct App {
    pub config: AppConfig,
    pub store: Store,
    pub ledger: Ledger,
    pub salary: SalaryScheduler,
    pub sync: PriceSyncEngine,
    pub investments: InvestmentService,
    pub status_invest: StatusInvestProvider,
}

impl App {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let path = config.database_file()?;
        let store = Store::open(
            &path,
            Duration::from_millis(config.database.busy_timeout_ms),
        )?;
        let chain = providers::build_chain(&config);
        info!(providers = ?chain.provider_ids(), "Quote chain ready");
        Ok(Self::with_parts(config, store, chain))
    }

    /// Wires the services over an already opened store and chain.
    pub fn with_parts(config: AppConfig, store: Store, chain: ProviderChain) -> Self {
        let ledger = Ledger::new(store.clone());
        let salary = SalaryScheduler::new(ledger.clone(), config.salary.label.clone());
        let sync = PriceSyncEngine::new(store.clone(), chain, SyncSettings::from(&config.sync));
        let investments = InvestmentService::new(ledger.clone(), config.investments.clone());
        let status_invest =
            StatusInvestProvider::new(&config.providers.status_invest, config.sync.http_timeout());
        Self {
            config,
            store,
            ledger,
            salary,
            sync,
            investments,
            status_invest,
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::from_config(config)?;
    match command {
        AppCommand::Run => cli::daemon::run(&app).await,
        AppCommand::Account(cmd) => cli::ledger::run_account(&app, cmd),
        AppCommand::Category(cmd) => cli::ledger::run_category(&app, cmd),
        AppCommand::Tx(cmd) => cli::ledger::run_tx(&app, cmd),
        AppCommand::Salary(cmd) => cli::salary::run(&app, cmd),
        AppCommand::Invest(cmd) => cli::invest::run(&app, cmd).await,
        AppCommand::Refresh { ticker } => cli::invest::refresh(&app, ticker).await,
        AppCommand::Quote { ticker } => cli::invest::quote(&app, &ticker).await,
        AppCommand::Search { query } => cli::invest::search(&app, &query).await,
    }
}
