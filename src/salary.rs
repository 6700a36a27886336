//! Monthly payroll injection, idempotent per calendar month.

use crate::core::calendar::{first_business_day, month_key};
use crate::core::models::{NewTransaction, SalaryConfig, SalarySettings, TransactionType};
use crate::core::{Error, Result};
use crate::ledger::{self, Ledger};
use crate::store::{accounts, categories, salary};
use crate::tasks::PeriodicTask;
use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryOutcome {
    NotConfigured,
    AlreadyPaid,
    /// Nothing to do until the given first business day.
    BeforePayday(NaiveDate),
    Paid { transaction_id: i64 },
}

#[derive(Clone)]
pub struct SalaryScheduler {
    ledger: Ledger,
    label: String,
}

impl SalaryScheduler {
    pub fn new(ledger: Ledger, label: impl Into<String>) -> Self {
        Self {
            ledger,
            label: label.into(),
        }
    }

    pub fn get_config(&self) -> Result<Option<SalaryConfig>> {
        self.ledger.store().with_conn(salary::get)
    }

    /// Creates or replaces the salary settings, keeping the paid marker.
    pub fn save_config(&self, settings: SalarySettings) -> Result<SalaryConfig> {
        if settings.amount < Decimal::ZERO {
            return Err(Error::Validation(format!(
                "Salary amount must not be negative, got {}",
                settings.amount
            )));
        }
        self.ledger.store().with_transaction(|c| {
            if !accounts::exists(c, settings.account_id)? {
                return Err(Error::not_found("Account", settings.account_id));
            }
            if let Some(category_id) = settings.category_id {
                if !categories::exists(c, category_id)? {
                    return Err(Error::not_found("Category", category_id));
                }
            }
            salary::save(c, &settings)?;
            salary::get(c)?.ok_or_else(|| Error::not_found("SalaryConfig", "current"))
        })
    }

    /// Pays the salary now regardless of the date or the paid marker.
    pub fn trigger_manually(&self) -> Result<i64> {
        self.trigger_manually_on(Local::now().date_naive())
    }

    pub fn trigger_manually_on(&self, today: NaiveDate) -> Result<i64> {
        self.ledger.store().with_transaction(|c| {
            let config = salary::get(c)?.ok_or_else(|| Error::not_found("SalaryConfig", "current"))?;
            self.pay(c, &config, today)
        })
    }

    pub fn tick(&self) -> Result<SalaryOutcome> {
        self.tick_on(Local::now().date_naive())
    }

    /// One automatic check. The marker is read and written in the same transaction as the
    /// payment, so overlapping ticks pay at most once.
    pub fn tick_on(&self, today: NaiveDate) -> Result<SalaryOutcome> {
        let current = month_key(today);
        self.ledger.store().with_transaction(|c| {
            let Some(config) = salary::get(c)? else {
                return Ok(SalaryOutcome::NotConfigured);
            };
            if config.last_paid_month == current {
                return Ok(SalaryOutcome::AlreadyPaid);
            }
            let payday = first_business_day(today.year(), today.month())
                .ok_or_else(|| Error::Validation(format!("Invalid date {today}")))?;
            if today < payday {
                return Ok(SalaryOutcome::BeforePayday(payday));
            }
            let transaction_id = self.pay(c, &config, today)?;
            Ok(SalaryOutcome::Paid { transaction_id })
        })
    }

    fn pay(&self, conn: &rusqlite::Connection, config: &SalaryConfig, today: NaiveDate) -> Result<i64> {
        let id = ledger::record_in(
            conn,
            &NewTransaction {
                account_id: config.account_id,
                category_id: config.category_id,
                r#type: TransactionType::Income,
                amount: config.amount,
                description: Some(self.label.clone()),
                date: today,
            },
        )?;
        salary::mark_paid(conn, config.id, &month_key(today))?;
        info!(amount = %config.amount, account_id = config.account_id, "Salary paid");
        Ok(id)
    }

    /// Runs [`SalaryScheduler::tick`] every `every` until stopped. Failures are only logged.
    pub fn spawn(self, every: Duration) -> PeriodicTask {
        PeriodicTask::spawn("Salary", every, move || {
            let scheduler = self.clone();
            async move {
                match scheduler.tick() {
                    Ok(outcome) => debug!(?outcome, "Salary check done"),
                    Err(e) => error!(error = %e, "Salary check failed"),
                }
            }
        })
    }
}
