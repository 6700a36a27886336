//! Investment positions and the synthetic ledger entries that pay for them.

use crate::core::config::InvestmentsConfig;
use crate::core::models::{
    Investment, InvestmentInput, NewTransaction, PortfolioSummary, TransactionRecord,
    TransactionType,
};
use crate::core::valuation::{self, out_of_range};
use crate::core::{Error, Result};
use crate::ledger::{self, Ledger};
use crate::store::{accounts, categories, investments, transactions};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct InvestmentService {
    ledger: Ledger,
    config: InvestmentsConfig,
}

impl InvestmentService {
    pub fn new(ledger: Ledger, config: InvestmentsConfig) -> Self {
        Self { ledger, config }
    }

    pub fn get(&self, id: i64) -> Result<Investment> {
        self.ledger.store().with_conn(|c| investments::get(c, id))
    }

    pub fn list(&self) -> Result<Vec<Investment>> {
        self.ledger.store().with_conn(investments::list)
    }

    pub fn create(&self, input: InvestmentInput) -> Result<Investment> {
        self.create_on(input, Local::now().date_naive())
    }

    /// Stores the position and debits its cost from the funding account.
    ///
    /// The debit is best effort: when no funding account or category can be resolved the
    /// position is kept and the failure is only logged.
    pub fn create_on(&self, input: InvestmentInput, today: NaiveDate) -> Result<Investment> {
        let input = validate(input)?;
        let total_invested = valuation::total_invested(input.quantity, input.average_price)?;
        let valuation = match input.current_price {
            Some(price) => valuation::revalue(input.quantity, total_invested, price)?,
            None => None,
        };

        let store = self.ledger.store();
        let id = store.with_transaction(|c| {
            investments::insert(c, &input, total_invested, valuation.as_ref())
        })?;
        info!(id, ticker = %input.ticker, %total_invested, "Investment created");

        let debit = store.with_transaction(|c| {
            let transaction_id = self.debit(c, &input, total_invested, today)?;
            investments::set_ledger_link(c, id, transaction_id)?;
            Ok(transaction_id)
        });
        match debit {
            Ok(transaction_id) => debug!(id, transaction_id, "Investment purchase recorded"),
            Err(e) => warn!(id, error = %e, "Skipped ledger debit for investment"),
        }

        self.get(id)
    }

    fn debit(
        &self,
        conn: &Connection,
        input: &InvestmentInput,
        total_invested: Decimal,
        today: NaiveDate,
    ) -> Result<i64> {
        let category_id =
            categories::find_or_create(conn, &self.config.category, TransactionType::Expense)?;
        let account_id = accounts::funding_account(conn)?
            .ok_or_else(|| Error::not_found("Account", "funding"))?;
        ledger::record_in(
            conn,
            &NewTransaction {
                account_id,
                category_id: Some(category_id),
                r#type: TransactionType::Expense,
                amount: total_invested,
                description: Some(format!(
                    "{} {} ({})",
                    self.config.description_prefix, input.ticker, input.name
                )),
                date: today,
            },
        )
    }

    /// Rewrites the caller-owned fields. The cost basis is recomputed only when quantity or
    /// average price changed, and the position is revalued at the supplied or last known price.
    /// The original purchase entry in the ledger is left as it was.
    pub fn update(&self, id: i64, input: InvestmentInput) -> Result<Investment> {
        let input = validate(input)?;
        self.ledger.store().with_transaction(|c| {
            let existing = investments::get(c, id)?;
            let total_invested = if input.quantity != existing.quantity
                || input.average_price != existing.average_price
            {
                valuation::total_invested(input.quantity, input.average_price)?
            } else {
                existing.total_invested
            };
            let valuation = match input.current_price.or(existing.current_price) {
                Some(price) => valuation::revalue(input.quantity, total_invested, price)?,
                None => None,
            };
            investments::update(c, id, &input, total_invested, valuation.as_ref())?;
            investments::get(c, id)
        })
    }

    /// Deletes the position and reverses its purchase entry when one can be found.
    ///
    /// Returns the reversed transaction, if any. A position without a recoverable entry is
    /// still deleted and the orphaned entry is logged.
    pub fn delete(&self, id: i64) -> Result<Option<TransactionRecord>> {
        self.ledger.store().with_transaction(|c| {
            let inv = investments::get(c, id)?;
            let purchase = self.find_purchase(c, &inv)?;
            investments::delete(c, id)?;
            match &purchase {
                Some(record) => {
                    ledger::delete_in(c, record)?;
                    info!(id, transaction_id = record.id, "Investment deleted with its purchase entry");
                }
                None => warn!(id, ticker = %inv.ticker, "No purchase entry found for deleted investment"),
            }
            Ok(purchase)
        })
    }

    /// The linked transaction, or for rows created before links existed, the newest unlinked
    /// expense on the funding account with the same amount and the purchase prefix.
    ///
    /// A row that was linked once never falls back to matching: its entry was deleted
    /// through the ledger and any look-alike expense belongs to something else.
    fn find_purchase(&self, conn: &Connection, inv: &Investment) -> Result<Option<TransactionRecord>> {
        if let Some(transaction_id) = inv.ledger_transaction_id {
            return transactions::find(conn, transaction_id);
        }
        if inv.ledger_linked {
            debug!(id = inv.id, "Linked purchase entry was already removed");
            return Ok(None);
        }
        let Some(account_id) = accounts::funding_account(conn)? else {
            return Ok(None);
        };
        let linked = investments::linked_transaction_ids(conn)?;
        let candidates =
            transactions::list_expenses_with_prefix(conn, account_id, &self.config.description_prefix)?;
        let found = candidates
            .into_iter()
            .find(|t| t.amount == inv.total_invested && !linked.contains(&t.id));
        if found.is_some() {
            debug!(id = inv.id, "Matched purchase entry by amount and description");
        }
        Ok(found)
    }

    pub fn summary(&self) -> Result<PortfolioSummary> {
        let all = self.list()?;
        let mut summary = PortfolioSummary {
            count: all.len(),
            ..Default::default()
        };
        let add = |acc: Decimal, value: Decimal| acc.checked_add(value).ok_or_else(out_of_range);
        for inv in &all {
            summary.total_invested = add(summary.total_invested, inv.total_invested)?;
            summary.total_current_value =
                add(summary.total_current_value, inv.current_value.unwrap_or_default())?;
            summary.total_profit_loss =
                add(summary.total_profit_loss, inv.profit_loss.unwrap_or_default())?;
        }
        if summary.total_invested > Decimal::ZERO {
            summary.total_profit_loss_percent = summary
                .total_profit_loss
                .checked_div(summary.total_invested)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .ok_or_else(out_of_range)?;
        }
        Ok(summary)
    }
}

fn validate(mut input: InvestmentInput) -> Result<InvestmentInput> {
    input.ticker = input.ticker.trim().to_uppercase();
    if input.ticker.is_empty() {
        return Err(Error::Validation("Ticker must not be empty".to_string()));
    }
    if input.quantity < Decimal::ZERO || input.average_price < Decimal::ZERO {
        return Err(Error::Validation(
            "Quantity and average price must not be negative".to_string(),
        ));
    }
    if input.current_price.is_some_and(|p| p <= Decimal::ZERO) {
        return Err(Error::Validation("Current price must be positive".to_string()));
    }
    if input.name.trim().is_empty() {
        input.name = input.ticker.clone();
    }
    Ok(input)
}
