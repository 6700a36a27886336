use super::ui;
use crate::App;
use crate::core::models::{Investment, InvestmentInput, PortfolioSummary};
use crate::sync::RefreshSummary;
use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;
use rust_decimal::Decimal;
use tracing::warn;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum InvestCommand {
    /// Add a position and debit its cost from the funding account
    Add {
        ticker: String,
        quantity: Decimal,
        /// Average price paid per unit
        average_price: Decimal,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type", default_value = "stock")]
        kind: String,
        #[arg(long)]
        notes: Option<String>,
        /// Look up the current price and value the position right away
        #[arg(long)]
        fetch_price: bool,
    },
    /// Edit a position; omitted fields keep their value
    Update {
        id: i64,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        quantity: Option<Decimal>,
        #[arg(long)]
        average_price: Option<Decimal>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Revalue at this price
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Delete a position and reverse its purchase entry
    Rm { id: i64 },
    /// List positions
    List,
    /// Portfolio totals
    Summary,
}

pub async fn run(app: &App, cmd: InvestCommand) -> Result<()> {
    match cmd {
        InvestCommand::Add {
            ticker,
            quantity,
            average_price,
            name,
            kind,
            notes,
            fetch_price,
        } => {
            let current_price = if fetch_price {
                let spinner = ui::new_spinner(&format!("Fetching price for {ticker}"));
                let quote = app.sync.quote(&ticker).await;
                spinner.finish_and_clear();
                match quote {
                    Ok(quote) => Some(quote.price),
                    Err(e) => {
                        warn!(%ticker, error = %e, "Price lookup failed, adding without valuation");
                        None
                    }
                }
            } else {
                None
            };
            let inv = app.investments.create(InvestmentInput {
                ticker,
                name: name.unwrap_or_default(),
                r#type: kind,
                quantity,
                average_price,
                notes,
                current_price,
            })?;
            println!(
                "Added {} (id {}), invested {}",
                inv.ticker,
                inv.id,
                ui::money(inv.total_invested)
            );
        }
        InvestCommand::Update {
            id,
            ticker,
            quantity,
            average_price,
            name,
            kind,
            notes,
            price,
        } => {
            let existing = app.investments.get(id)?;
            let inv = app.investments.update(
                id,
                InvestmentInput {
                    ticker: ticker.unwrap_or(existing.ticker),
                    name: name.unwrap_or(existing.name),
                    r#type: kind.unwrap_or(existing.r#type),
                    quantity: quantity.unwrap_or(existing.quantity),
                    average_price: average_price.unwrap_or(existing.average_price),
                    notes: notes.or(existing.notes),
                    current_price: price,
                },
            )?;
            println!("{}", investments_table(&[inv]));
        }
        InvestCommand::Rm { id } => match app.investments.delete(id)? {
            Some(record) => println!(
                "Deleted investment {id}, refunded {} to account {}",
                ui::money(record.amount),
                record.account_id
            ),
            None => println!("Deleted investment {id}"),
        },
        InvestCommand::List => {
            let list = app.investments.list()?;
            println!("{}", investments_table(&list));
        }
        InvestCommand::Summary => {
            println!("{}", summary_table(&app.investments.summary()?));
        }
    }
    Ok(())
}

/// Refreshes prices for one ticker, or for the whole portfolio when `ticker` is `None`.
pub async fn refresh(app: &App, ticker: Option<String>) -> Result<()> {
    match ticker {
        Some(ticker) => {
            let spinner = ui::new_spinner(&format!("Refreshing {ticker}"));
            let refreshed = app.sync.refresh_one(&ticker).await;
            spinner.finish_and_clear();
            println!("{}", investments_table(&refreshed?));
        }
        None => {
            let spinner = ui::new_spinner("Refreshing portfolio prices");
            let summary = app.sync.refresh_all().await;
            spinner.finish_and_clear();
            print_refresh_summary(&summary?);
        }
    }
    Ok(())
}

pub async fn quote(app: &App, ticker: &str) -> Result<()> {
    let spinner = ui::new_spinner(&format!("Fetching price for {ticker}"));
    let quote = app.sync.quote(ticker).await;
    spinner.finish_and_clear();
    let quote = quote?;
    println!(
        "{}: {} ({})",
        quote.ticker,
        ui::style_text(&ui::money(quote.price), ui::StyleType::TotalValue),
        quote.source
    );
    Ok(())
}

pub async fn search(app: &App, query: &str) -> Result<()> {
    let found = app.status_invest.search(query).await?;
    if found.is_empty() {
        println!("{}", ui::style_text("No matches", ui::StyleType::Subtle));
        return Ok(());
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Name"),
        ui::header_cell("Kind"),
    ]);
    for s in found {
        table.add_row(vec![
            Cell::new(s.ticker),
            Cell::new(s.name),
            Cell::new(s.kind),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn investments_table(list: &[Investment]) -> String {
    if list.is_empty() {
        return ui::style_text("No investments", ui::StyleType::Subtle);
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Ticker"),
        ui::header_cell("Name"),
        ui::header_cell("Quantity"),
        ui::header_cell("Avg price"),
        ui::header_cell("Invested"),
        ui::header_cell("Price"),
        ui::header_cell("Value"),
        ui::header_cell("P/L"),
        ui::header_cell("P/L (%)"),
    ]);
    for inv in list {
        table.add_row(vec![
            Cell::new(inv.id),
            Cell::new(&inv.ticker),
            Cell::new(&inv.name),
            Cell::new(inv.quantity.normalize()),
            ui::money_cell(inv.average_price),
            ui::money_cell(inv.total_invested),
            ui::format_optional_cell(inv.current_price, ui::money_cell),
            ui::format_optional_cell(inv.current_value, ui::money_cell),
            ui::format_optional_cell(inv.profit_loss, ui::money_cell),
            ui::format_optional_cell(inv.profit_loss_percent, ui::change_cell),
        ]);
    }
    table.to_string()
}

fn summary_table(summary: &PortfolioSummary) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Positions"),
        ui::header_cell("Invested"),
        ui::header_cell("Current value"),
        ui::header_cell("P/L"),
        ui::header_cell("P/L (%)"),
    ]);
    table.add_row(vec![
        Cell::new(summary.count),
        ui::money_cell(summary.total_invested),
        ui::money_cell(summary.total_current_value),
        ui::money_cell(summary.total_profit_loss),
        ui::change_cell(summary.total_profit_loss_percent),
    ]);
    table.to_string()
}

fn print_refresh_summary(summary: &RefreshSummary) {
    println!(
        "{}: {} updated, {} failed",
        ui::style_text("Refresh", ui::StyleType::TotalLabel),
        summary.updated,
        summary.failed
    );
    for error in &summary.errors {
        println!("  {}", ui::style_text(&error.to_string(), ui::StyleType::Error));
    }
}
