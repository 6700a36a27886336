use super::{decimal_at, opt_decimal_at};
use crate::core::models::{Investment, InvestmentInput};
use crate::core::valuation::Valuation;
use crate::core::{Error, Result};
use rust_decimal::Decimal;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;

const COLUMNS: &str = "id, ticker, name, type, quantity, average_price, total_invested, \
     current_price, current_value, profit_loss, profit_loss_percent, notes, ledger_transaction_id, \
     ledger_linked";

fn from_row(r: &Row<'_>) -> rusqlite::Result<Investment> {
    Ok(Investment {
        id: r.get(0)?,
        ticker: r.get(1)?,
        name: r.get(2)?,
        r#type: r.get(3)?,
        quantity: decimal_at(r, 4)?,
        average_price: decimal_at(r, 5)?,
        total_invested: decimal_at(r, 6)?,
        current_price: opt_decimal_at(r, 7)?,
        current_value: opt_decimal_at(r, 8)?,
        profit_loss: opt_decimal_at(r, 9)?,
        profit_loss_percent: opt_decimal_at(r, 10)?,
        notes: r.get(11)?,
        ledger_transaction_id: r.get(12)?,
        ledger_linked: r.get(13)?,
    })
}

fn collect(conn: &Connection, sql: &str, param: Option<&str>) -> Result<Vec<Investment>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = match param {
        Some(p) => stmt.query_map(params![p], from_row)?,
        None => stmt.query_map([], from_row)?,
    };
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    Ok(data)
}

pub fn insert(
    conn: &Connection,
    input: &InvestmentInput,
    total_invested: Decimal,
    valuation: Option<&Valuation>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO investments(ticker, name, type, quantity, average_price, total_invested,
             current_price, current_value, profit_loss, profit_loss_percent, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            input.ticker,
            input.name,
            input.r#type,
            input.quantity.to_string(),
            input.average_price.to_string(),
            total_invested.to_string(),
            valuation.map(|v| v.current_price.to_string()),
            valuation.map(|v| v.current_value.to_string()),
            valuation.map(|v| v.profit_loss.to_string()),
            valuation.map(|v| v.profit_loss_percent.to_string()),
            input.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<Investment>> {
    let sql = format!("SELECT {COLUMNS} FROM investments WHERE id=?1");
    Ok(conn.query_row(&sql, params![id], from_row).optional()?)
}

pub fn get(conn: &Connection, id: i64) -> Result<Investment> {
    find(conn, id)?.ok_or_else(|| Error::not_found("Investment", id))
}

pub fn list(conn: &Connection) -> Result<Vec<Investment>> {
    let sql = format!("SELECT {COLUMNS} FROM investments ORDER BY ticker, id");
    collect(conn, &sql, None)
}

pub fn list_by_ticker(conn: &Connection, ticker: &str) -> Result<Vec<Investment>> {
    let sql = format!("SELECT {COLUMNS} FROM investments WHERE ticker=?1 ORDER BY id");
    collect(conn, &sql, Some(ticker))
}

/// Rewrites the caller-owned fields and the derived valuation together.
pub fn update(
    conn: &Connection,
    id: i64,
    input: &InvestmentInput,
    total_invested: Decimal,
    valuation: Option<&Valuation>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE investments
         SET ticker=?1, name=?2, type=?3, quantity=?4, average_price=?5, total_invested=?6,
             current_price=?7, current_value=?8, profit_loss=?9, profit_loss_percent=?10,
             notes=?11, updated_at=datetime('now')
         WHERE id=?12",
        params![
            input.ticker,
            input.name,
            input.r#type,
            input.quantity.to_string(),
            input.average_price.to_string(),
            total_invested.to_string(),
            valuation.map(|v| v.current_price.to_string()),
            valuation.map(|v| v.current_value.to_string()),
            valuation.map(|v| v.profit_loss.to_string()),
            valuation.map(|v| v.profit_loss_percent.to_string()),
            input.notes,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(Error::not_found("Investment", id));
    }
    Ok(())
}

pub fn set_valuation(conn: &Connection, id: i64, valuation: &Valuation) -> Result<()> {
    conn.execute(
        "UPDATE investments
         SET current_price=?1, current_value=?2, profit_loss=?3, profit_loss_percent=?4,
             updated_at=datetime('now')
         WHERE id=?5",
        params![
            valuation.current_price.to_string(),
            valuation.current_value.to_string(),
            valuation.profit_loss.to_string(),
            valuation.profit_loss_percent.to_string(),
            id
        ],
    )?;
    Ok(())
}

pub fn set_ledger_link(conn: &Connection, id: i64, transaction_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE investments SET ledger_transaction_id=?1, ledger_linked=1 WHERE id=?2",
        params![transaction_id, id],
    )?;
    Ok(())
}

pub fn linked_transaction_ids(conn: &Connection) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare(
        "SELECT ledger_transaction_id FROM investments WHERE ledger_transaction_id IS NOT NULL",
    )?;
    let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
    let mut ids = HashSet::new();
    for row in rows {
        ids.insert(row?);
    }
    Ok(ids)
}

pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM investments WHERE id=?1", params![id])? > 0)
}
