use super::ledger::resolve_category;
use super::ui;
use crate::App;
use crate::core::models::SalarySettings;
use crate::salary::SalaryOutcome;
use anyhow::Result;
use clap::Subcommand;
use rust_decimal::Decimal;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SalaryCommand {
    /// Show the configured salary
    Show,
    /// Configure the monthly salary
    Set {
        amount: Decimal,
        /// Account credited on payday
        #[arg(long)]
        account: i64,
        /// Category name, e.g. Salary
        #[arg(long)]
        category: Option<String>,
    },
    /// Pay the salary now, ignoring the date and the paid marker
    Pay,
    /// Run one automatic check as the daemon would
    Check,
}

pub fn run(app: &App, cmd: SalaryCommand) -> Result<()> {
    match cmd {
        SalaryCommand::Show => match app.salary.get_config()? {
            Some(config) => {
                println!("Amount:    {}", ui::money(config.amount));
                println!("Account:   {}", config.account_id);
                println!(
                    "Category:  {}",
                    config
                        .category_id
                        .map_or_else(|| "-".to_string(), |id| id.to_string())
                );
                let last = if config.last_paid_month.is_empty() {
                    "never"
                } else {
                    config.last_paid_month.as_str()
                };
                println!("Last paid: {last}");
            }
            None => println!(
                "{}",
                ui::style_text("Salary is not configured", ui::StyleType::Subtle)
            ),
        },
        SalaryCommand::Set {
            amount,
            account,
            category,
        } => {
            let category_id = match category {
                Some(name) => Some(app.store.with_conn(|c| resolve_category(c, &name))?),
                None => None,
            };
            let config = app.salary.save_config(SalarySettings {
                amount,
                account_id: account,
                category_id,
            })?;
            println!(
                "Salary of {} will be credited to account {}",
                ui::money(config.amount),
                config.account_id
            );
        }
        SalaryCommand::Pay => {
            let id = app.salary.trigger_manually()?;
            println!("Salary paid (transaction {id})");
        }
        SalaryCommand::Check => match app.salary.tick()? {
            SalaryOutcome::NotConfigured => println!("Salary is not configured"),
            SalaryOutcome::AlreadyPaid => println!("Salary already paid this month"),
            SalaryOutcome::BeforePayday(day) => println!("Next payday is {day}"),
            SalaryOutcome::Paid { transaction_id } => {
                println!("Salary paid (transaction {transaction_id})")
            }
        },
    }
    Ok(())
}
