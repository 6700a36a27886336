use super::decimal_at;
use crate::core::Result;
use crate::core::models::{SalaryConfig, SalarySettings};
use rusqlite::{Connection, OptionalExtension, params};

/// The single salary configuration, if one was saved.
pub fn get(conn: &Connection) -> Result<Option<SalaryConfig>> {
    Ok(conn
        .query_row(
            "SELECT id, amount, account_id, category_id, last_paid_month
             FROM salary_config ORDER BY id LIMIT 1",
            [],
            |r| {
                Ok(SalaryConfig {
                    id: r.get(0)?,
                    amount: decimal_at(r, 1)?,
                    account_id: r.get(2)?,
                    category_id: r.get(3)?,
                    last_paid_month: r.get(4)?,
                })
            },
        )
        .optional()?)
}

/// Creates or replaces the settings. The paid marker is preserved on update.
pub fn save(conn: &Connection, settings: &SalarySettings) -> Result<i64> {
    match get(conn)? {
        Some(existing) => {
            conn.execute(
                "UPDATE salary_config
                 SET amount=?1, account_id=?2, category_id=?3, updated_at=datetime('now')
                 WHERE id=?4",
                params![
                    settings.amount.to_string(),
                    settings.account_id,
                    settings.category_id,
                    existing.id
                ],
            )?;
            Ok(existing.id)
        }
        None => {
            conn.execute(
                "INSERT INTO salary_config(amount, account_id, category_id) VALUES (?1, ?2, ?3)",
                params![
                    settings.amount.to_string(),
                    settings.account_id,
                    settings.category_id
                ],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

pub fn mark_paid(conn: &Connection, id: i64, month: &str) -> Result<()> {
    conn.execute(
        "UPDATE salary_config SET last_paid_month=?1, updated_at=datetime('now') WHERE id=?2",
        params![month, id],
    )?;
    Ok(())
}
