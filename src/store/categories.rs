use super::enum_at;
use crate::core::models::{Category, TransactionType};
use crate::core::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

fn from_row(r: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: r.get(0)?,
        name: r.get(1)?,
        r#type: enum_at(r, 2)?,
        color: r.get(3)?,
        icon: r.get(4)?,
    })
}

pub fn list(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt =
        conn.prepare("SELECT id, name, type, color, icon FROM categories ORDER BY type, name")?;
    let rows = stmt.query_map([], from_row)?;
    let mut data = Vec::new();
    for row in rows {
        data.push(row?);
    }
    Ok(data)
}

pub fn exists(conn: &Connection, id: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM categories WHERE id=?1", params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Category>> {
    Ok(conn
        .query_row(
            "SELECT id, name, type, color, icon FROM categories WHERE name=?1",
            params![name],
            from_row,
        )
        .optional()?)
}

/// Creates a category. Names are unique across both types.
pub fn insert(
    conn: &Connection,
    name: &str,
    kind: TransactionType,
    color: Option<&str>,
    icon: Option<&str>,
) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("Category name must not be empty".into()));
    }
    if find_by_name(conn, name)?.is_some() {
        return Err(Error::Validation(format!("Category '{name}' already exists")));
    }
    conn.execute(
        "INSERT INTO categories(name, type, color, icon)
         VALUES (?1, ?2, COALESCE(?3, '#6B7280'), COALESCE(?4, '💰'))",
        params![name, kind.as_str(), color, icon],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns the id of category `name`, creating it with `kind` when absent.
///
/// An existing category of the other type is reported as a validation error, since
/// names are unique across types.
pub fn find_or_create(conn: &Connection, name: &str, kind: TransactionType) -> Result<i64> {
    if let Some(existing) = find_by_name(conn, name)? {
        if existing.r#type != kind {
            return Err(Error::Validation(format!(
                "Category '{name}' exists as {}, expected {kind}",
                existing.r#type
            )));
        }
        return Ok(existing.id);
    }
    conn.execute(
        "INSERT INTO categories(name, type, color, icon) VALUES (?1, ?2, '#3B82F6', '📊')",
        params![name, kind.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_find_or_create_is_stable() -> Result<()> {
        let store = Store::open_in_memory()?;
        store.with_conn(|c| {
            let first = find_or_create(c, "Investment", TransactionType::Expense)?;
            let second = find_or_create(c, "Investment", TransactionType::Expense)?;
            assert_eq!(first, second);
            assert!(exists(c, first)?);
            Ok(())
        })
    }

    #[test]
    fn test_type_mismatch_is_rejected() -> Result<()> {
        let store = Store::open_in_memory()?;
        let err = store
            .with_conn(|c| find_or_create(c, "Salary", TransactionType::Expense))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        Ok(())
    }

    #[test]
    fn test_insert_defaults_and_duplicates() -> Result<()> {
        let store = Store::open_in_memory()?;
        store.with_conn(|c| {
            let id = insert(c, " Pets ", TransactionType::Expense, None, None)?;
            let pets = find_by_name(c, "Pets")?.unwrap();
            assert_eq!(pets.id, id);
            assert_eq!(pets.color, "#6B7280");
            assert_eq!(pets.icon, "💰");

            let err = insert(c, "Pets", TransactionType::Income, None, None).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            let err = insert(c, "   ", TransactionType::Income, None, None).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));

            let id = insert(c, "Rent", TransactionType::Income, Some("#10B981"), Some("🏠"))?;
            assert_eq!(find_by_name(c, "Rent")?.map(|c| c.id), Some(id));
            Ok(())
        })
    }

    #[test]
    fn test_seeded_categories_listed() -> Result<()> {
        let store = Store::open_in_memory()?;
        let categories = store.with_conn(list)?;
        assert!(categories.iter().any(|c| c.name == "Salary" && c.r#type == TransactionType::Income));
        assert!(categories.iter().any(|c| c.name == "Food" && c.r#type == TransactionType::Expense));
        Ok(())
    }
}
