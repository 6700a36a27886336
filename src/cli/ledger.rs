use super::ui;
use crate::App;
use crate::core::models::{
    Account, Category, CategoryTotal, ExpenseEntry, MonthTotals, MonthlyStats, NewTransaction,
    PeriodTotals, TransactionRecord, TransactionType,
};
use crate::core::{Error, Result as CoreResult};
use crate::store::{accounts, categories};
use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use comfy_table::Cell;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AccountCommand {
    /// Create an account
    Add {
        name: String,
        /// Free-form kind, e.g. checking, savings, wallet
        #[arg(long = "type", default_value = "checking")]
        kind: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// List accounts with their balances
    List,
    /// Delete an account together with its transactions
    Rm { id: i64 },
}

/// Fields shared by `tx add` and `tx update`.
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct TxFields {
    /// Account id
    #[arg(long)]
    pub account: i64,
    /// income or expense
    #[arg(long = "type")]
    pub kind: TransactionType,
    pub amount: Decimal,
    /// Category name
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum TxCommand {
    /// Record a transaction
    Add(TxFields),
    /// Rewrite a transaction
    Update {
        id: i64,
        #[command(flatten)]
        fields: TxFields,
    },
    /// Delete a transaction
    Rm { id: i64 },
    /// Delete all transactions, or those of one account
    Clear {
        #[arg(long)]
        account: Option<i64>,
    },
    /// List transactions, newest first
    List {
        #[arg(long)]
        account: Option<i64>,
    },
    /// Reports over recorded transactions
    #[command(subcommand)]
    Stats(StatsCommand),
}

/// Optional inclusive date range; both ends go together.
#[derive(clap::Args, Debug, Clone, Default, PartialEq)]
pub struct PeriodArgs {
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,
}

impl PeriodArgs {
    fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.from.zip(self.to)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum StatsCommand {
    /// Income, expenses and balance for a month (YYYY-MM, defaults to the current one)
    Month { month: Option<String> },
    /// Income and expenses between two dates, both included
    Period { from: NaiveDate, to: NaiveDate },
    /// This month next to the previous one
    Compare,
    /// Largest expenses first
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Expense totals per category
    ByCategory {
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Monthly income, expenses and net for recent months
    History {
        #[arg(long, default_value_t = 6)]
        months: u32,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CategoryCommand {
    /// Create a category
    Add {
        name: String,
        /// income or expense
        #[arg(long = "type")]
        kind: TransactionType,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// List categories
    List,
}

pub fn run_account(app: &App, cmd: AccountCommand) -> Result<()> {
    match cmd {
        AccountCommand::Add { name, kind, color } => {
            let id = app
                .store
                .with_conn(|c| accounts::insert(c, &name, &kind, color.as_deref()))?;
            println!("Created account {id} ({name})");
        }
        AccountCommand::List => {
            let list = app.store.with_conn(accounts::list)?;
            println!("{}", accounts_table(&list));
        }
        AccountCommand::Rm { id } => {
            if app.store.with_conn(|c| accounts::delete(c, id))? {
                println!("Deleted account {id}");
            } else {
                return Err(Error::not_found("Account", id).into());
            }
        }
    }
    Ok(())
}

pub fn run_tx(app: &App, cmd: TxCommand) -> Result<()> {
    match cmd {
        TxCommand::Add(fields) => {
            let tx = app.store.with_conn(|c| to_new_transaction(c, fields))?;
            let id = app.ledger.record_transaction(tx)?;
            println!("Recorded transaction {id}");
        }
        TxCommand::Update { id, fields } => {
            let tx = app.store.with_conn(|c| to_new_transaction(c, fields))?;
            app.ledger.update_transaction(id, tx)?;
            println!("Updated transaction {id}");
        }
        TxCommand::Rm { id } => {
            if app.ledger.delete_transaction(id)? {
                println!("Deleted transaction {id}");
            } else {
                println!("Transaction {id} does not exist");
            }
        }
        TxCommand::Clear { account } => {
            let count = app.ledger.clear_all(account)?;
            println!("Removed {count} transactions");
        }
        TxCommand::List { account } => {
            let records = app.ledger.list_transactions(account)?;
            let names: HashMap<i64, String> = app
                .store
                .with_conn(categories::list)?
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect();
            println!("{}", transactions_table(&records, &names));
        }
        TxCommand::Stats(cmd) => run_stats(app, cmd, Local::now().date_naive())?,
    }
    Ok(())
}

fn run_stats(app: &App, cmd: StatsCommand, today: NaiveDate) -> Result<()> {
    match cmd {
        StatsCommand::Month { month } => {
            let stats = match month {
                Some(month) => app.ledger.monthly_stats(&month)?,
                None => app.ledger.current_month_stats(today)?,
            };
            print_month(&stats);
            println!(
                "\n{}: {}",
                ui::style_text("Total balance", ui::StyleType::TotalLabel),
                ui::style_text(&ui::money(stats.total_balance), ui::StyleType::TotalValue)
            );
        }
        StatsCommand::Period { from, to } => {
            let totals = app.ledger.stats_by_period(from, to)?;
            println!(
                "Period: {}\n",
                ui::style_text(&format!("{from} to {to}"), ui::StyleType::Title)
            );
            print_totals(&totals);
        }
        StatsCommand::Compare => {
            let comparison = app.ledger.monthly_comparison(today)?;
            print_month(&comparison.current);
            println!();
            print_month(&comparison.previous);
        }
        StatsCommand::Top { limit, period } => {
            let expenses = app.ledger.top_expenses(limit, period.range())?;
            println!("{}", top_expenses_table(&expenses));
        }
        StatsCommand::ByCategory { period } => {
            let totals = app.ledger.expenses_by_category(period.range())?;
            println!("{}", category_totals_table(&totals));
        }
        StatsCommand::History { months } => {
            let history = app.ledger.balance_history(months, today)?;
            println!("{}", history_table(&history));
        }
    }
    Ok(())
}

pub fn run_category(app: &App, cmd: CategoryCommand) -> Result<()> {
    match cmd {
        CategoryCommand::Add {
            name,
            kind,
            color,
            icon,
        } => {
            let category =
                app.ledger
                    .create_category(&name, kind, color.as_deref(), icon.as_deref())?;
            println!("Created category {} ({})", category.id, category.name);
        }
        CategoryCommand::List => {
            println!("{}", categories_table(&app.ledger.list_categories()?));
        }
    }
    Ok(())
}

fn print_month(stats: &MonthlyStats) {
    println!(
        "Month: {}\n",
        ui::style_text(&stats.month, ui::StyleType::Title)
    );
    println!("Income:   {}", ui::money(stats.income));
    println!("Expenses: {}", ui::money(stats.expenses));
    println!("Net:      {}", ui::money(stats.net));
}

fn print_totals(totals: &PeriodTotals) {
    println!("Income:   {}", ui::money(totals.income));
    println!("Expenses: {}", ui::money(totals.expenses));
    println!("Net:      {}", ui::money(totals.net));
}

fn to_new_transaction(conn: &Connection, fields: TxFields) -> CoreResult<NewTransaction> {
    let category_id = fields
        .category
        .as_deref()
        .map(|name| resolve_category(conn, name))
        .transpose()?;
    Ok(NewTransaction {
        account_id: fields.account,
        category_id,
        r#type: fields.kind,
        amount: fields.amount,
        description: fields.description,
        date: fields.date.unwrap_or_else(|| Local::now().date_naive()),
    })
}

pub(crate) fn resolve_category(conn: &Connection, name: &str) -> CoreResult<i64> {
    categories::find_by_name(conn, name)?
        .map(|c| c.id)
        .ok_or_else(|| Error::not_found("Category", name))
}

fn accounts_table(list: &[Account]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Name"),
        ui::header_cell("Type"),
        ui::header_cell("Balance"),
    ]);
    let mut total = Decimal::ZERO;
    for account in list {
        total += account.balance;
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(&account.name),
            Cell::new(&account.r#type),
            ui::money_cell(account.balance),
        ]);
    }
    format!(
        "{table}\n\n{}: {}",
        ui::style_text("Total", ui::StyleType::TotalLabel),
        ui::style_text(&ui::money(total), ui::StyleType::TotalValue)
    )
}

fn categories_table(list: &[Category]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Name"),
        ui::header_cell("Type"),
        ui::header_cell("Icon"),
        ui::header_cell("Color"),
    ]);
    for category in list {
        table.add_row(vec![
            Cell::new(category.id),
            Cell::new(&category.name),
            Cell::new(category.r#type),
            Cell::new(&category.icon),
            Cell::new(&category.color),
        ]);
    }
    table.to_string()
}

fn top_expenses_table(expenses: &[ExpenseEntry]) -> String {
    if expenses.is_empty() {
        return ui::style_text("No expenses", ui::StyleType::Subtle);
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Category"),
        ui::header_cell("Description"),
        ui::header_cell("Amount"),
    ]);
    for expense in expenses {
        let category = match (&expense.category_icon, &expense.category_name) {
            (Some(icon), Some(name)) => format!("{icon} {name}"),
            (None, Some(name)) => name.clone(),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(expense.date),
            Cell::new(category),
            Cell::new(expense.description.as_deref().unwrap_or("")),
            ui::money_cell(expense.amount),
        ]);
    }
    table.to_string()
}

fn category_totals_table(totals: &[CategoryTotal]) -> String {
    if totals.is_empty() {
        return ui::style_text("No categorized expenses", ui::StyleType::Subtle);
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Category"), ui::header_cell("Total")]);
    for total in totals {
        table.add_row(vec![
            Cell::new(format!("{} {}", total.icon, total.name)),
            ui::money_cell(total.total),
        ]);
    }
    table.to_string()
}

fn history_table(history: &[MonthTotals]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Month"),
        ui::header_cell("Income"),
        ui::header_cell("Expenses"),
        ui::header_cell("Net"),
    ]);
    for month in history {
        table.add_row(vec![
            Cell::new(&month.month),
            ui::money_cell(month.income),
            ui::money_cell(month.expenses),
            ui::money_cell(month.net),
        ]);
    }
    table.to_string()
}

fn transactions_table(records: &[TransactionRecord], categories: &HashMap<i64, String>) -> String {
    if records.is_empty() {
        return ui::style_text("No transactions", ui::StyleType::Subtle);
    }
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Id"),
        ui::header_cell("Date"),
        ui::header_cell("Account"),
        ui::header_cell("Category"),
        ui::header_cell("Description"),
        ui::header_cell("Amount"),
    ]);
    for record in records {
        let category = record
            .category_id
            .and_then(|id| categories.get(&id))
            .map_or("-", String::as_str);
        table.add_row(vec![
            Cell::new(record.id),
            Cell::new(record.date),
            Cell::new(record.account_id),
            Cell::new(category),
            Cell::new(record.description.as_deref().unwrap_or("")),
            ui::money_cell(record.signed_amount()),
        ]);
    }
    table.to_string()
}
