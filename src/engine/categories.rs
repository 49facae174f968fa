//! Product categories

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::Engine;
use crate::domain::{Category, EngineError, EngineResult};

/// Returns the id of the category called `name`
pub(crate) fn find_category(conn: &Connection, name: &str) -> EngineResult<i64> {
    let name = name.trim();
    conn.query_row(
        "SELECT id FROM categories WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| EngineError::CategoryNotFound(name.to_string()))
}

impl Engine {
    pub fn add_category(&self, name: &str) -> EngineResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyField("Category name"));
        }

        self.db.write(|tx| {
            match find_category(tx, name) {
                Ok(_) => return Err(EngineError::DuplicateCategory(name.to_string())),
                Err(EngineError::CategoryNotFound(_)) => {}
                Err(err) => return Err(err),
            }

            tx.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
            info!(category = name, "category added");

            Ok(Category {
                id: tx.last_insert_rowid(),
                name: name.to_string(),
                unit_count: 0,
            })
        })
    }

    /// All categories by name, each with its number of live units
    pub fn categories(&self) -> EngineResult<Vec<Category>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name,
                        (SELECT COUNT(*) FROM products p
                         WHERE p.category_id = c.id AND p.is_removed = 0)
                 FROM categories c
                 ORDER BY c.name",
            )?;
            let categories = stmt
                .query_map([], |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        unit_count: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(categories)
        })
    }

    /// Deletes a category no unit belongs to, removed units included
    pub fn remove_category(&self, name: &str) -> EngineResult<()> {
        self.db.write(|tx| {
            let id = find_category(tx, name)?;

            let in_use: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM products WHERE category_id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if in_use {
                return Err(EngineError::CategoryInUse(name.trim().to_string()));
            }

            tx.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
            info!(category = name.trim(), "category removed");
            Ok(())
        })
    }
}
