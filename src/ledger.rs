//! Transaction bookkeeping that keeps every account balance equal to the signed sum of
//! its stored transactions.

use crate::core::calendar::month_key;
use crate::core::models::{
    Category, CategoryTotal, ExpenseEntry, MonthTotals, MonthlyComparison, MonthlyStats,
    NewTransaction, PeriodTotals, TransactionRecord, TransactionType,
};
use crate::core::valuation::out_of_range;
use crate::core::{Error, Result};
use crate::store::{Store, accounts, categories, transactions};
use chrono::{Datelike, Months, NaiveDate};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tracing::debug;

/// Sole writer of transactions and, through them, of account balances.
#[derive(Clone)]
pub struct Ledger {
    store: Store,
}

impl Ledger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Inserts the transaction and applies its signed amount to the account.
    pub fn record_transaction(&self, tx: NewTransaction) -> Result<i64> {
        self.store.with_transaction(|c| record_in(c, &tx))
    }

    /// Moves the old signed effect off its account and the new one onto the (possibly
    /// different) target account.
    pub fn update_transaction(&self, id: i64, tx: NewTransaction) -> Result<()> {
        validate(&tx)?;
        self.store.with_transaction(|c| {
            let old = transactions::get(c, id)?;
            ensure_references(c, &tx)?;
            accounts::apply_delta(c, old.account_id, -old.signed_amount())?;
            transactions::update(c, id, &tx)?;
            accounts::apply_delta(c, tx.account_id, tx.signed_amount())?;
            debug!(id, account_id = tx.account_id, "Updated transaction");
            Ok(())
        })
    }

    /// Reverses and removes the transaction. Returns `false` when there was nothing to delete.
    pub fn delete_transaction(&self, id: i64) -> Result<bool> {
        self.store.with_transaction(|c| match transactions::find(c, id)? {
            Some(record) => {
                delete_in(c, &record)?;
                Ok(true)
            }
            None => {
                debug!(id, "Transaction already absent");
                Ok(false)
            }
        })
    }

    /// Reverses and removes every transaction, or only those of `account_id`.
    pub fn clear_all(&self, account_id: Option<i64>) -> Result<usize> {
        self.store.with_transaction(|c| {
            let records = transactions::list(c, account_id)?;
            for record in &records {
                delete_in(c, record)?;
            }
            debug!(count = records.len(), ?account_id, "Cleared transactions");
            Ok(records.len())
        })
    }

    pub fn get_transaction(&self, id: i64) -> Result<TransactionRecord> {
        self.store.with_conn(|c| transactions::get(c, id))
    }

    pub fn list_transactions(&self, account_id: Option<i64>) -> Result<Vec<TransactionRecord>> {
        self.store.with_conn(|c| transactions::list(c, account_id))
    }

    /// Totals for the `YYYY-MM` month plus the current balance across all accounts.
    pub fn monthly_stats(&self, month: &str) -> Result<MonthlyStats> {
        let start = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
            .map_err(|_| Error::Validation(format!("Invalid month '{month}', expected YYYY-MM")))?;
        let end = start
            .checked_add_months(Months::new(1))
            .ok_or_else(|| Error::Validation(format!("Month out of range: {month}")))?;
        self.store.with_conn(|c| {
            let (income, expenses) = transactions::totals_between(c, start, end)?;
            let totals = PeriodTotals::new(income, expenses).ok_or_else(out_of_range)?;
            Ok(MonthlyStats {
                month: month_key(start),
                total_balance: accounts::total_balance(c)?,
                income: totals.income,
                expenses: totals.expenses,
                net: totals.net,
            })
        })
    }

    pub fn current_month_stats(&self, today: NaiveDate) -> Result<MonthlyStats> {
        self.monthly_stats(&month_key(today))
    }

    /// Totals for dates from `from` through `to`, both included.
    pub fn stats_by_period(&self, from: NaiveDate, to: NaiveDate) -> Result<PeriodTotals> {
        let (from, end) = inclusive(from, to)?;
        self.store.with_conn(|c| {
            let (income, expenses) = transactions::totals_between(c, from, end)?;
            PeriodTotals::new(income, expenses).ok_or_else(out_of_range)
        })
    }

    /// The month containing `today` next to the month before it.
    pub fn monthly_comparison(&self, today: NaiveDate) -> Result<MonthlyComparison> {
        let previous = start_of_month(today)
            .checked_sub_months(Months::new(1))
            .ok_or_else(|| Error::Validation(format!("No month before {today}")))?;
        Ok(MonthlyComparison {
            current: self.current_month_stats(today)?,
            previous: self.monthly_stats(&month_key(previous))?,
        })
    }

    /// Largest expenses first, optionally within an inclusive date range.
    pub fn top_expenses(
        &self,
        limit: usize,
        period: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<ExpenseEntry>> {
        let range = period.map(|(from, to)| inclusive(from, to)).transpose()?;
        self.store
            .with_conn(|c| transactions::top_expenses(c, limit, range))
    }

    pub fn expenses_by_category(
        &self,
        period: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<CategoryTotal>> {
        let range = period.map(|(from, to)| inclusive(from, to)).transpose()?;
        self.store
            .with_conn(|c| transactions::expenses_by_category(c, range))
    }

    /// Income, expenses and net for each of the last `months` months up to the one holding
    /// `today`, oldest first. Months without transactions are reported as zero.
    pub fn balance_history(&self, months: u32, today: NaiveDate) -> Result<Vec<MonthTotals>> {
        if months == 0 {
            return Err(Error::Validation("History needs at least one month".into()));
        }
        let start = start_of_month(today)
            .checked_sub_months(Months::new(months - 1))
            .ok_or_else(|| Error::Validation(format!("Too many months: {months}")))?;
        let totals = self
            .store
            .with_conn(|c| transactions::monthly_totals_since(c, start))?;

        let mut history = Vec::with_capacity(months as usize);
        let mut month = start;
        for _ in 0..months {
            let key = month_key(month);
            let (income, expenses) = totals.get(&key).copied().unwrap_or_default();
            let totals = PeriodTotals::new(income, expenses).ok_or_else(out_of_range)?;
            history.push(MonthTotals {
                month: key,
                income: totals.income,
                expenses: totals.expenses,
                net: totals.net,
            });
            month = month
                .checked_add_months(Months::new(1))
                .ok_or_else(|| Error::Validation(format!("Month out of range: {month}")))?;
        }
        Ok(history)
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.store.with_conn(categories::list)
    }

    pub fn create_category(
        &self,
        name: &str,
        kind: TransactionType,
        color: Option<&str>,
        icon: Option<&str>,
    ) -> Result<Category> {
        self.store.with_transaction(|c| {
            let id = categories::insert(c, name, kind, color, icon)?;
            debug!(id, name, "Created category");
            categories::find_by_name(c, name.trim())?
                .ok_or_else(|| Error::not_found("Category", id))
        })
    }

    /// Stored balance minus the signed sum of the account's transactions. Zero when consistent.
    pub fn balance_drift(&self, account_id: i64) -> Result<Decimal> {
        self.store.with_conn(|c| {
            let account = accounts::get(c, account_id)?;
            account
                .balance
                .checked_sub(transactions::signed_sum(c, account_id)?)
                .ok_or_else(out_of_range)
        })
    }
}

fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Turns an inclusive `[from, to]` range into the half-open one the store queries take.
fn inclusive(from: NaiveDate, to: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    if from > to {
        return Err(Error::Validation(format!(
            "Period start {from} is after its end {to}"
        )));
    }
    let end = to
        .succ_opt()
        .ok_or_else(|| Error::Validation(format!("Date out of range: {to}")))?;
    Ok((from, end))
}

fn validate(tx: &NewTransaction) -> Result<()> {
    if tx.amount < Decimal::ZERO {
        return Err(Error::Validation(format!(
            "Amount must not be negative, got {}",
            tx.amount
        )));
    }
    Ok(())
}

fn ensure_references(conn: &Connection, tx: &NewTransaction) -> Result<()> {
    if !accounts::exists(conn, tx.account_id)? {
        return Err(Error::not_found("Account", tx.account_id));
    }
    if let Some(category_id) = tx.category_id {
        if !categories::exists(conn, category_id)? {
            return Err(Error::not_found("Category", category_id));
        }
    }
    Ok(())
}

/// Records `tx` on an open connection so callers can compose it into a larger transaction.
pub(crate) fn record_in(conn: &Connection, tx: &NewTransaction) -> Result<i64> {
    validate(tx)?;
    ensure_references(conn, tx)?;
    let id = transactions::insert(conn, tx)?;
    let balance = accounts::apply_delta(conn, tx.account_id, tx.signed_amount())?;
    debug!(id, account_id = tx.account_id, %balance, "Recorded transaction");
    Ok(id)
}

/// Reverses the effect of `record` and deletes it on an open connection.
pub(crate) fn delete_in(conn: &Connection, record: &TransactionRecord) -> Result<()> {
    accounts::apply_delta(conn, record.account_id, -record.signed_amount())?;
    transactions::delete(conn, record.id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::TransactionType;
    use rust_decimal_macros::dec;

    fn setup() -> Result<(Ledger, i64, i64)> {
        let store = Store::open_in_memory()?;
        let (a, b) = store.with_conn(|c| {
            Ok((
                accounts::insert(c, "Checking", "checking", None)?,
                accounts::insert(c, "Savings", "savings", None)?,
            ))
        })?;
        Ok((Ledger::new(store), a, b))
    }

    fn tx(account_id: i64, kind: TransactionType, amount: Decimal) -> NewTransaction {
        NewTransaction {
            account_id,
            category_id: None,
            r#type: kind,
            amount,
            description: Some("test".to_string()),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        }
    }

    fn balance(ledger: &Ledger, id: i64) -> Decimal {
        ledger
            .store()
            .with_conn(|c| accounts::get(c, id))
            .unwrap()
            .balance
    }

    #[test]
    fn test_record_applies_signed_amount() -> Result<()> {
        let (ledger, a, _) = setup()?;
        ledger.record_transaction(tx(a, TransactionType::Income, dec!(100)))?;
        ledger.record_transaction(tx(a, TransactionType::Expense, dec!(30.5)))?;
        assert_eq!(balance(&ledger, a), dec!(69.5));
        assert_eq!(ledger.balance_drift(a)?, Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn test_record_unknown_account_leaves_nothing_behind() -> Result<()> {
        let (ledger, a, _) = setup()?;
        let err = ledger
            .record_transaction(tx(a + 100, TransactionType::Income, dec!(1)))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Account", .. }));
        assert!(ledger.list_transactions(None)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_negative_amount_rejected() -> Result<()> {
        let (ledger, a, _) = setup()?;
        let err = ledger
            .record_transaction(tx(a, TransactionType::Income, dec!(-5)))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        Ok(())
    }

    #[test]
    fn test_update_moves_effect_between_accounts() -> Result<()> {
        let (ledger, a, b) = setup()?;
        let id = ledger.record_transaction(tx(a, TransactionType::Income, dec!(50)))?;
        ledger.update_transaction(id, tx(b, TransactionType::Expense, dec!(20)))?;

        assert_eq!(balance(&ledger, a), Decimal::ZERO);
        assert_eq!(balance(&ledger, b), dec!(-20));
        assert_eq!(ledger.balance_drift(a)?, Decimal::ZERO);
        assert_eq!(ledger.balance_drift(b)?, Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn test_update_to_unknown_account_rolls_back() -> Result<()> {
        let (ledger, a, _) = setup()?;
        let id = ledger.record_transaction(tx(a, TransactionType::Income, dec!(50)))?;
        let err = ledger
            .update_transaction(id, tx(a + 100, TransactionType::Income, dec!(10)))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(balance(&ledger, a), dec!(50));
        assert_eq!(ledger.get_transaction(id)?.account_id, a);
        Ok(())
    }

    #[test]
    fn test_update_missing_transaction() -> Result<()> {
        let (ledger, a, _) = setup()?;
        let err = ledger
            .update_transaction(9, tx(a, TransactionType::Income, dec!(1)))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Transaction", .. }));
        Ok(())
    }

    #[test]
    fn test_delete_is_idempotent() -> Result<()> {
        let (ledger, a, _) = setup()?;
        let id = ledger.record_transaction(tx(a, TransactionType::Expense, dec!(12)))?;
        assert!(ledger.delete_transaction(id)?);
        assert!(!ledger.delete_transaction(id)?);
        assert_eq!(balance(&ledger, a), Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn test_clear_all_scoped_and_global() -> Result<()> {
        let (ledger, a, b) = setup()?;
        ledger.record_transaction(tx(a, TransactionType::Income, dec!(10)))?;
        ledger.record_transaction(tx(a, TransactionType::Expense, dec!(4)))?;
        ledger.record_transaction(tx(b, TransactionType::Income, dec!(7)))?;

        assert_eq!(ledger.clear_all(Some(a))?, 2);
        assert_eq!(balance(&ledger, a), Decimal::ZERO);
        assert_eq!(balance(&ledger, b), dec!(7));

        assert_eq!(ledger.clear_all(None)?, 1);
        assert_eq!(balance(&ledger, b), Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn test_invariant_over_mixed_sequence() -> Result<()> {
        let (ledger, a, b) = setup()?;
        let mut ids = Vec::new();
        for i in 1..=6 {
            let kind = if i % 2 == 0 {
                TransactionType::Expense
            } else {
                TransactionType::Income
            };
            ids.push(ledger.record_transaction(tx(a, kind, Decimal::from(i * 3)))?);
        }
        ledger.update_transaction(ids[0], tx(b, TransactionType::Expense, dec!(1.1)))?;
        ledger.update_transaction(ids[3], tx(a, TransactionType::Income, dec!(0.9)))?;
        ledger.delete_transaction(ids[4])?;
        ledger.delete_transaction(ids[4])?;

        assert_eq!(ledger.balance_drift(a)?, Decimal::ZERO);
        assert_eq!(ledger.balance_drift(b)?, Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn test_monthly_stats() -> Result<()> {
        let (ledger, a, _) = setup()?;
        ledger.record_transaction(tx(a, TransactionType::Income, dec!(1000)))?;
        ledger.record_transaction(tx(a, TransactionType::Expense, dec!(250)))?;
        let mut april = tx(a, TransactionType::Expense, dec!(40));
        april.date = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        ledger.record_transaction(april)?;

        let stats = ledger.monthly_stats("2025-03")?;
        assert_eq!(stats.income, dec!(1000));
        assert_eq!(stats.expenses, dec!(250));
        assert_eq!(stats.net, dec!(750));
        assert_eq!(stats.total_balance, dec!(710));

        assert!(matches!(
            ledger.monthly_stats("March"),
            Err(Error::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_overflowing_balance_is_rejected() -> Result<()> {
        let (ledger, a, _) = setup()?;
        ledger.record_transaction(tx(a, TransactionType::Income, Decimal::MAX))?;
        let err = ledger
            .record_transaction(tx(a, TransactionType::Income, Decimal::MAX))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "amount out of range"));

        assert_eq!(ledger.list_transactions(None)?.len(), 1);
        assert_eq!(balance(&ledger, a), Decimal::MAX);
        ledger.record_transaction(tx(a, TransactionType::Expense, dec!(1)))?;
        assert_eq!(ledger.balance_drift(a)?, Decimal::ZERO);
        Ok(())
    }

    #[test]
    fn test_concurrent_writers_keep_invariant() -> Result<()> {
        let (ledger, a, b) = setup()?;
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let ledger = ledger.clone();
                std::thread::spawn(move || -> Result<()> {
                    for i in 0..25 {
                        let amount = Decimal::from(worker * 100 + i);
                        let id = ledger.record_transaction(tx(a, TransactionType::Income, amount))?;
                        let kind = if i % 2 == 0 {
                            TransactionType::Expense
                        } else {
                            TransactionType::Income
                        };
                        let target = if i % 3 == 0 { b } else { a };
                        ledger.update_transaction(id, tx(target, kind, amount + dec!(0.5)))?;
                        if i % 4 == 0 {
                            ledger.delete_transaction(id)?;
                        }
                    }
                    Ok(())
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker panicked")?;
        }

        assert_eq!(ledger.balance_drift(a)?, Decimal::ZERO);
        assert_eq!(ledger.balance_drift(b)?, Decimal::ZERO);
        assert_eq!(ledger.list_transactions(None)?.len(), 4 * 18);
        Ok(())
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn dated(account_id: i64, kind: TransactionType, amount: Decimal, date: NaiveDate) -> NewTransaction {
        NewTransaction {
            date,
            ..tx(account_id, kind, amount)
        }
    }

    #[test]
    fn test_stats_by_period_includes_both_ends() -> Result<()> {
        let (ledger, a, _) = setup()?;
        ledger.record_transaction(dated(a, TransactionType::Income, dec!(500), day(3, 1)))?;
        ledger.record_transaction(dated(a, TransactionType::Expense, dec!(80), day(3, 15)))?;
        ledger.record_transaction(dated(a, TransactionType::Expense, dec!(20), day(3, 16)))?;

        let stats = ledger.stats_by_period(day(3, 1), day(3, 15))?;
        assert_eq!(stats, PeriodTotals::new(dec!(500), dec!(80)).unwrap());
        assert_eq!(stats.net, dec!(420));

        assert!(matches!(
            ledger.stats_by_period(day(3, 16), day(3, 1)),
            Err(Error::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_monthly_comparison_crosses_year() -> Result<()> {
        let (ledger, a, _) = setup()?;
        let december = NaiveDate::from_ymd_opt(2024, 12, 20).unwrap();
        ledger.record_transaction(dated(a, TransactionType::Income, dec!(300), december))?;
        ledger.record_transaction(dated(a, TransactionType::Expense, dec!(45), day(1, 5)))?;

        let comparison = ledger.monthly_comparison(day(1, 31))?;
        assert_eq!(comparison.current.month, "2025-01");
        assert_eq!(comparison.current.expenses, dec!(45));
        assert_eq!(comparison.previous.month, "2024-12");
        assert_eq!(comparison.previous.income, dec!(300));
        assert_eq!(comparison.previous.net, dec!(300));
        Ok(())
    }

    #[test]
    fn test_top_expenses_and_categories() -> Result<()> {
        let (ledger, a, _) = setup()?;
        let pets = ledger.create_category("Pets", TransactionType::Expense, None, Some("🐶"))?;
        assert_eq!(pets.icon, "🐶");
        assert_eq!(pets.color, "#6B7280");
        assert!(ledger.list_categories()?.iter().any(|c| c.id == pets.id));

        let mut vet = dated(a, TransactionType::Expense, dec!(250), day(3, 4));
        vet.category_id = Some(pets.id);
        ledger.record_transaction(vet)?;
        let mut food = dated(a, TransactionType::Expense, dec!(60), day(4, 2));
        food.category_id = Some(pets.id);
        ledger.record_transaction(food)?;
        ledger.record_transaction(dated(a, TransactionType::Expense, dec!(75), day(3, 9)))?;

        let top = ledger.top_expenses(2, None)?;
        assert_eq!(top.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![dec!(250), dec!(75)]);
        assert_eq!(top[0].category_icon.as_deref(), Some("🐶"));

        let march = Some((day(3, 1), day(3, 31)));
        assert_eq!(ledger.top_expenses(10, march)?.len(), 2);
        let by_category = ledger.expenses_by_category(march)?;
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].name, "Pets");
        assert_eq!(by_category[0].total, dec!(250));
        assert_eq!(ledger.expenses_by_category(None)?[0].total, dec!(310));

        assert!(matches!(
            ledger.create_category("Pets", TransactionType::Income, None, None),
            Err(Error::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_balance_history_fills_empty_months() -> Result<()> {
        let (ledger, a, _) = setup()?;
        ledger.record_transaction(dated(a, TransactionType::Income, dec!(1000), day(1, 10)))?;
        ledger.record_transaction(dated(a, TransactionType::Expense, dec!(400), day(3, 2)))?;
        ledger.record_transaction(dated(a, TransactionType::Income, dec!(5), day(3, 31)))?;

        let history = ledger.balance_history(3, day(3, 31))?;
        let months: Vec<&str> = history.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, vec!["2025-01", "2025-02", "2025-03"]);
        assert_eq!(history[0].net, dec!(1000));
        assert_eq!(history[1].net, Decimal::ZERO);
        assert_eq!(history[2].expenses, dec!(400));
        assert_eq!(history[2].net, dec!(-395));

        assert_eq!(ledger.balance_history(1, day(3, 1))?.len(), 1);
        assert!(matches!(
            ledger.balance_history(0, day(3, 1)),
            Err(Error::Validation(_))
        ));
        Ok(())
    }
}
