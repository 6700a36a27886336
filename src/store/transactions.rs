use super::{decimal_at, enum_at};
use crate::core::calendar::month_key;
use crate::core::models::{
    CategoryTotal, ExpenseEntry, NewTransaction, TransactionRecord, TransactionType,
};
use crate::core::valuation::out_of_range;
use crate::core::{Error, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

/// Half-open `[from, to)` date range; `None` means every date.
pub type DateRange = Option<(NaiveDate, NaiveDate)>;

fn add(acc: Decimal, amount: Decimal) -> Result<Decimal> {
    acc.checked_add(amount).ok_or_else(out_of_range)
}

const COLUMNS: &str = "id, account_id, category_id, type, amount, description, date, created_at";

fn from_row(r: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    Ok(TransactionRecord {
        id: r.get(0)?,
        account_id: r.get(1)?,
        category_id: r.get(2)?,
        r#type: enum_at(r, 3)?,
        amount: decimal_at(r, 4)?,
        description: r.get(5)?,
        date: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn insert(conn: &Connection, tx: &NewTransaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(account_id, category_id, type, amount, description, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            tx.account_id,
            tx.category_id,
            tx.r#type.as_str(),
            tx.amount.to_string(),
            tx.description,
            tx.date
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<TransactionRecord>> {
    let sql = format!("SELECT {COLUMNS} FROM transactions WHERE id=?1");
    Ok(conn.query_row(&sql, params![id], from_row).optional()?)
}

pub fn get(conn: &Connection, id: i64) -> Result<TransactionRecord> {
    find(conn, id)?.ok_or_else(|| Error::not_found("Transaction", id))
}

pub fn update(conn: &Connection, id: i64, tx: &NewTransaction) -> Result<()> {
    conn.execute(
        "UPDATE transactions
         SET account_id=?1, category_id=?2, type=?3, amount=?4, description=?5, date=?6
         WHERE id=?7",
        params![
            tx.account_id,
            tx.category_id,
            tx.r#type.as_str(),
            tx.amount.to_string(),
            tx.description,
            tx.date,
            id
        ],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM transactions WHERE id=?1", params![id])? > 0)
}

/// Newest first, optionally restricted to one account.
pub fn list(conn: &Connection, account_id: Option<i64>) -> Result<Vec<TransactionRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM transactions
         WHERE (?1 IS NULL OR account_id=?1)
         ORDER BY date DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![account_id], from_row)?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    Ok(data)
}

/// Expense rows of `account_id` whose description starts with `prefix`, newest id first.
///
/// Amounts are compared by the caller since they are stored as text.
pub fn list_expenses_with_prefix(
    conn: &Connection,
    account_id: i64,
    prefix: &str,
) -> Result<Vec<TransactionRecord>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM transactions
         WHERE account_id=?1 AND type='expense' AND substr(description, 1, length(?2))=?2
         ORDER BY id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![account_id, prefix], from_row)?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    Ok(data)
}

/// Income and expense totals for dates in `[from, to)`.
pub fn totals_between(conn: &Connection, from: NaiveDate, to: NaiveDate) -> Result<(Decimal, Decimal)> {
    let mut stmt =
        conn.prepare("SELECT type, amount FROM transactions WHERE date >= ?1 AND date < ?2")?;
    let rows = stmt.query_map(params![from, to], |r| {
        Ok((enum_at::<TransactionType>(r, 0)?, decimal_at(r, 1)?))
    })?;
    let mut income = Decimal::ZERO;
    let mut expenses = Decimal::ZERO;
    for row in rows {
        match row? {
            (TransactionType::Income, amount) => income = add(income, amount)?,
            (TransactionType::Expense, amount) => expenses = add(expenses, amount)?,
        }
    }
    Ok((income, expenses))
}

/// Income and expense totals per `YYYY-MM` month for dates on or after `from`.
pub fn monthly_totals_since(
    conn: &Connection,
    from: NaiveDate,
) -> Result<BTreeMap<String, (Decimal, Decimal)>> {
    let mut stmt = conn.prepare("SELECT type, amount, date FROM transactions WHERE date >= ?1")?;
    let rows = stmt.query_map(params![from], |r| {
        Ok((
            enum_at::<TransactionType>(r, 0)?,
            decimal_at(r, 1)?,
            r.get::<_, NaiveDate>(2)?,
        ))
    })?;
    let mut months: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for row in rows {
        let (kind, amount, date) = row?;
        let (income, expenses) = months.entry(month_key(date)).or_default();
        match kind {
            TransactionType::Income => *income = add(*income, amount)?,
            TransactionType::Expense => *expenses = add(*expenses, amount)?,
        }
    }
    Ok(months)
}

/// The `limit` largest expenses in `range`, largest first.
///
/// Amounts are stored as text, so ordering happens here rather than in SQL.
pub fn top_expenses(conn: &Connection, limit: usize, range: DateRange) -> Result<Vec<ExpenseEntry>> {
    let (from, to) = range.unzip();
    let mut stmt = conn.prepare(
        "SELECT t.id, t.amount, t.description, t.date, c.name, c.icon
         FROM transactions t
         LEFT JOIN categories c ON t.category_id = c.id
         WHERE t.type='expense' AND (?1 IS NULL OR t.date >= ?1) AND (?2 IS NULL OR t.date < ?2)",
    )?;
    let rows = stmt.query_map(params![from, to], |r| {
        Ok(ExpenseEntry {
            id: r.get(0)?,
            amount: decimal_at(r, 1)?,
            description: r.get(2)?,
            date: r.get(3)?,
            category_name: r.get(4)?,
            category_icon: r.get(5)?,
        })
    })?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    data.sort_by_key(|e| (Reverse(e.amount), e.id));
    data.truncate(limit);
    Ok(data)
}

/// Expense totals per category in `range`, largest first. Uncategorized expenses are left out.
pub fn expenses_by_category(conn: &Connection, range: DateRange) -> Result<Vec<CategoryTotal>> {
    let (from, to) = range.unzip();
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.icon, c.color, t.amount
         FROM transactions t
         JOIN categories c ON t.category_id = c.id
         WHERE t.type='expense' AND (?1 IS NULL OR t.date >= ?1) AND (?2 IS NULL OR t.date < ?2)",
    )?;
    let rows = stmt.query_map(params![from, to], |r| {
        Ok((
            CategoryTotal {
                category_id: r.get(0)?,
                name: r.get(1)?,
                icon: r.get(2)?,
                color: r.get(3)?,
                total: Decimal::ZERO,
            },
            decimal_at(r, 4)?,
        ))
    })?;
    let mut totals: HashMap<i64, CategoryTotal> = HashMap::new();
    for row in rows {
        let (category, amount) = row?;
        let entry = totals.entry(category.category_id).or_insert(category);
        entry.total = add(entry.total, amount)?;
    }
    let mut data: Vec<CategoryTotal> = totals.into_values().collect();
    data.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    Ok(data)
}

/// Sum of signed amounts per account, used to detect balance drift.
pub fn signed_sum(conn: &Connection, account_id: i64) -> Result<Decimal> {
    let mut stmt = conn.prepare("SELECT type, amount FROM transactions WHERE account_id=?1")?;
    let rows = stmt.query_map(params![account_id], |r| {
        Ok((enum_at::<TransactionType>(r, 0)?, decimal_at(r, 1)?))
    })?;
    let mut total = Decimal::ZERO;
    for row in rows {
        let (kind, amount) = row?;
        total = add(total, kind.signed(amount))?;
    }
    Ok(total)
}
