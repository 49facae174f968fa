//! SQLite schema for the RMA tracker
//!
//! The database is the source of truth. `PRAGMA user_version` records the
//! schema version; a fresh file (version 0) gets the full schema, and a file
//! written by a newer build is refused rather than guessed at.

use anyhow::{bail, Result};
use rusqlite::{Connection, OptionalExtension};

/// Bump when the schema changes and add a migration step below
pub const SCHEMA_VERSION: i32 = 1;

/// Ensures the schema is present and current
pub fn ensure_schema(conn: &mut Connection) -> Result<()> {
    let current = schema_version(conn)?;

    match current {
        0 => create_schema(conn),
        SCHEMA_VERSION => Ok(()),
        newer => bail!(
            "Database schema version {} is newer than this build supports ({})",
            newer,
            SCHEMA_VERSION
        ),
    }
}

/// Gets the current schema version
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let version: Option<i32> = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .optional()?;

    Ok(version.unwrap_or(0))
}

/// Creates the schema from scratch
fn create_schema(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "
        CREATE TABLE categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE statuses (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            is_closed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE status_transitions (
            id INTEGER PRIMARY KEY,
            from_status_id INTEGER NOT NULL REFERENCES statuses(id) ON DELETE CASCADE,
            to_status_id INTEGER NOT NULL REFERENCES statuses(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            UNIQUE (from_status_id, to_status_id)
        );

        CREATE TABLE tasks (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        );

        -- sort_order is dense 1..N per status for predefined rows, NULL otherwise
        CREATE TABLE status_tasks (
            id INTEGER PRIMARY KEY,
            status_id INTEGER NOT NULL REFERENCES statuses(id),
            task_id INTEGER NOT NULL REFERENCES tasks(id),
            is_predefined INTEGER NOT NULL,
            sort_order INTEGER,
            UNIQUE (status_id, task_id),
            CHECK ((is_predefined = 1 AND sort_order >= 1)
                OR (is_predefined = 0 AND sort_order IS NULL))
        );

        CREATE TABLE locations (
            id INTEGER PRIMARY KEY,
            rack_name TEXT NOT NULL,
            layer_number INTEGER NOT NULL CHECK (layer_number >= 1),
            space_number INTEGER NOT NULL CHECK (space_number >= 1),
            product_sn TEXT UNIQUE REFERENCES products(sn),
            UNIQUE (rack_name, layer_number, space_number)
        );

        CREATE TABLE products (
            sn TEXT PRIMARY KEY
                CHECK (length(sn) = 13 AND sn NOT GLOB '*[^0-9]*'),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            priority_level TEXT NOT NULL,
            short_test TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            current_status_id INTEGER NOT NULL REFERENCES statuses(id),
            current_task_id INTEGER REFERENCES tasks(id),
            location_id INTEGER UNIQUE REFERENCES locations(id),
            is_removed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE product_statuses (
            id INTEGER PRIMARY KEY,
            product_sn TEXT NOT NULL REFERENCES products(sn),
            status_id INTEGER NOT NULL REFERENCES statuses(id),
            changed_at TEXT NOT NULL
        );

        CREATE TABLE product_tasks (
            id INTEGER PRIMARY KEY,
            product_sn TEXT NOT NULL REFERENCES products(sn),
            task_id INTEGER NOT NULL REFERENCES tasks(id),
            history_id INTEGER NOT NULL REFERENCES product_statuses(id),
            is_completed INTEGER NOT NULL DEFAULT 0,
            is_skipped INTEGER NOT NULL DEFAULT 0,
            is_predefined INTEGER NOT NULL DEFAULT 0,
            result TEXT NOT NULL,
            note TEXT,
            sort_order INTEGER NOT NULL CHECK (sort_order >= 1),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (NOT (is_completed = 1 AND is_skipped = 1))
        );

        -- At most one active entry per (product, task)
        CREATE UNIQUE INDEX idx_product_tasks_one_active
            ON product_tasks(product_sn, task_id)
            WHERE is_completed = 0 AND is_skipped = 0;

        CREATE INDEX idx_product_tasks_order ON product_tasks(product_sn, sort_order);
        CREATE INDEX idx_product_statuses_product ON product_statuses(product_sn);
        CREATE INDEX idx_status_tasks_order ON status_tasks(status_id, sort_order);
        CREATE INDEX idx_products_status ON products(current_status_id);

        -- History is append-only
        CREATE TRIGGER product_statuses_no_update BEFORE UPDATE ON product_statuses BEGIN
            SELECT RAISE(ABORT, 'product status history is append-only');
        END;

        CREATE TRIGGER product_statuses_no_delete BEFORE DELETE ON product_statuses BEGIN
            SELECT RAISE(ABORT, 'product status history is append-only');
        END;

        -- Resolved entries only accept note changes (and renumbering)
        CREATE TRIGGER product_tasks_resolved_frozen
        BEFORE UPDATE OF task_id, is_completed, is_skipped, is_predefined, result ON product_tasks
        WHEN OLD.is_completed = 1 OR OLD.is_skipped = 1
        BEGIN
            SELECT RAISE(ABORT, 'resolved checklist entries are immutable');
        END;
        ",
    )?;

    tx.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
    tx.commit()?;

    Ok(())
}
