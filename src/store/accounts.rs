use super::decimal_at;
use crate::core::models::Account;
use crate::core::valuation::out_of_range;
use crate::core::{Error, Result};
use rust_decimal::Decimal;
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, name, type, balance, color, created_at";

fn from_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        name: r.get(1)?,
        r#type: r.get(2)?,
        balance: decimal_at(r, 3)?,
        color: r.get(4)?,
        created_at: r.get(5)?,
    })
}

pub fn insert(conn: &Connection, name: &str, kind: &str, color: Option<&str>) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Account name must not be empty".into()));
    }
    conn.execute(
        "INSERT INTO accounts(name, type, color) VALUES (?1, ?2, COALESCE(?3, '#3B82F6'))",
        params![name, kind, color],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> Result<Option<Account>> {
    let sql = format!("SELECT {COLUMNS} FROM accounts WHERE id=?1");
    Ok(conn.query_row(&sql, params![id], from_row).optional()?)
}

pub fn get(conn: &Connection, id: i64) -> Result<Account> {
    find(conn, id)?.ok_or_else(|| Error::not_found("Account", id))
}

pub fn exists(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM accounts WHERE id=?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

pub fn list(conn: &Connection) -> Result<Vec<Account>> {
    let sql = format!("SELECT {COLUMNS} FROM accounts ORDER BY created_at, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    Ok(data)
}

/// The account investment purchases are paid from: the earliest created one.
pub fn funding_account(conn: &Connection) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM accounts ORDER BY created_at, id LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?)
}

/// Adds `delta` to the stored balance. Fails with `NotFound` for an unknown account.
pub fn apply_delta(conn: &Connection, id: i64, delta: Decimal) -> Result<Decimal> {
    let current: Option<Decimal> = conn
        .query_row(
            "SELECT balance FROM accounts WHERE id=?1",
            params![id],
            |r| decimal_at(r, 0),
        )
        .optional()?;
    let current = current.ok_or_else(|| Error::not_found("Account", id))?;
    let balance = current.checked_add(delta).ok_or_else(out_of_range)?;
    conn.execute(
        "UPDATE accounts SET balance=?1 WHERE id=?2",
        params![balance.to_string(), id],
    )?;
    Ok(balance)
}

/// Deletes the account; its transactions go with it.
pub fn delete(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM accounts WHERE id=?1", params![id])? > 0)
}

pub fn total_balance(conn: &Connection) -> Result<Decimal> {
    let mut stmt = conn.prepare("SELECT balance FROM accounts")?;
    let rows = stmt.query_map([], |r| decimal_at(r, 0))?;
    let mut total = Decimal::ZERO;
    for row in rows {
        total = total.checked_add(row?).ok_or_else(out_of_range)?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_delta_accumulates() -> Result<()> {
        let store = Store::open_in_memory()?;
        store.with_conn(|c| {
            let id = insert(c, "Checking", "checking", None)?;
            apply_delta(c, id, dec!(100.25))?;
            let balance = apply_delta(c, id, dec!(-40.10))?;
            assert_eq!(balance, dec!(60.15));
            assert_eq!(get(c, id)?.balance, dec!(60.15));
            assert_eq!(get(c, id)?.color, "#3B82F6");
            Ok(())
        })
    }

    #[test]
    fn test_apply_delta_unknown_account() -> Result<()> {
        let store = Store::open_in_memory()?;
        let err = store.with_conn(|c| apply_delta(c, 42, dec!(1))).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Account", .. }));
        Ok(())
    }

    #[test]
    fn test_funding_account_is_earliest() -> Result<()> {
        let store = Store::open_in_memory()?;
        store.with_conn(|c| {
            assert_eq!(funding_account(c)?, None);
            let first = insert(c, "Main", "checking", Some("#000000"))?;
            insert(c, "Savings", "savings", None)?;
            assert_eq!(funding_account(c)?, Some(first));
            Ok(())
        })
    }

    #[test]
    fn test_empty_name_rejected() -> Result<()> {
        let store = Store::open_in_memory()?;
        let err = store.with_conn(|c| insert(c, "  ", "checking", None)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        Ok(())
    }
}
