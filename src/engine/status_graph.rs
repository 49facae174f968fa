//! Status graph: statuses and the directed transitions between them
//!
//! Outgoing edges are returned in creation order. A closed status is a
//! terminal node: it can never be the source of an edge, and closing a
//! status deletes the edges it already had.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::Engine;
use crate::domain::{EngineError, EngineResult, Status, StatusId, StatusTransition};

const STATUS_COLUMNS: &str = "id, name, description, is_closed, created_at, updated_at";

fn map_status(row: &Row<'_>) -> rusqlite::Result<Status> {
    Ok(Status {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_closed: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Looks up a status by its unique name
pub(crate) fn find_status(conn: &Connection, name: &str) -> EngineResult<Status> {
    conn.query_row(
        &format!("SELECT {} FROM statuses WHERE name = ?1", STATUS_COLUMNS),
        params![name.trim()],
        map_status,
    )
    .optional()?
    .ok_or_else(|| EngineError::StatusNotFound(name.trim().to_string()))
}

pub(crate) fn status_by_id(conn: &Connection, id: StatusId) -> EngineResult<Status> {
    conn.query_row(
        &format!("SELECT {} FROM statuses WHERE id = ?1", STATUS_COLUMNS),
        params![id],
        map_status,
    )
    .optional()?
    .ok_or_else(|| EngineError::StatusNotFound(format!("#{}", id)))
}

/// Inserts a new status, rejecting duplicate names
pub(crate) fn insert_status(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    is_closed: bool,
) -> EngineResult<Status> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::EmptyField("Status name"));
    }

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM statuses WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    if exists {
        return Err(EngineError::DuplicateStatusName(name.to_string()));
    }

    let now = Utc::now();
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    conn.execute(
        "INSERT INTO statuses (name, description, is_closed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![name, description, is_closed, now],
    )?;

    info!(status = name, closed = is_closed, "status added");

    Ok(Status {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        description: description.map(str::to_string),
        is_closed,
        created_at: now,
        updated_at: now,
    })
}

/// Returns the status with `name`, creating an open one if missing
pub(crate) fn get_or_create_status(conn: &Connection, name: &str) -> EngineResult<Status> {
    match find_status(conn, name) {
        Err(EngineError::StatusNotFound(_)) => insert_status(conn, name, None, false),
        other => other,
    }
}

/// Inserts the edge `from -> to`
pub(crate) fn insert_transition(
    conn: &Connection,
    from: &Status,
    to: &Status,
) -> EngineResult<StatusTransition> {
    if from.is_closed {
        return Err(EngineError::InvalidTransition(from.name.clone()));
    }

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM status_transitions
                       WHERE from_status_id = ?1 AND to_status_id = ?2)",
        params![from.id, to.id],
        |row| row.get(0),
    )?;
    if exists {
        return Err(EngineError::DuplicateTransition {
            from: from.name.clone(),
            to: to.name.clone(),
        });
    }

    let now = Utc::now();
    conn.execute(
        "INSERT INTO status_transitions (from_status_id, to_status_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![from.id, to.id, now],
    )?;

    info!(from = %from.name, to = %to.name, "transition added");

    Ok(StatusTransition {
        id: conn.last_insert_rowid(),
        from_status: from.id,
        to_status: to.id,
        created_at: now,
    })
}

/// Statuses reachable by one outgoing edge, in edge-creation order
pub(crate) fn next_statuses(conn: &Connection, from: StatusId) -> EngineResult<Vec<Status>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.description, s.is_closed, s.created_at, s.updated_at
         FROM status_transitions t
         JOIN statuses s ON s.id = t.to_status_id
         WHERE t.from_status_id = ?1
         ORDER BY t.id",
    )?;

    let statuses = stmt
        .query_map(params![from], map_status)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(statuses)
}

impl Engine {
    /// Creates a status
    pub fn add_status(
        &self,
        name: &str,
        description: Option<&str>,
        is_closed: bool,
    ) -> EngineResult<Status> {
        self.db
            .write(|tx| insert_status(tx, name, description, is_closed))
    }

    /// Looks up a status by name
    pub fn status(&self, name: &str) -> EngineResult<Status> {
        self.db.read(|conn| find_status(conn, name))
    }

    /// Lists all statuses in creation order
    pub fn statuses(&self) -> EngineResult<Vec<Status>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM statuses ORDER BY id",
                STATUS_COLUMNS
            ))?;
            let statuses = stmt
                .query_map([], map_status)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(statuses)
        })
    }

    /// Allows units in `from` to move to `to`
    pub fn add_transition(&self, from: &str, to: &str) -> EngineResult<StatusTransition> {
        self.db.write(|tx| {
            let from = find_status(tx, from)?;
            let to = find_status(tx, to)?;
            insert_transition(tx, &from, &to)
        })
    }

    /// Statuses reachable from `status` by one edge, oldest edge first
    pub fn possible_next_statuses(&self, status: &str) -> EngineResult<Vec<Status>> {
        self.db.read(|conn| {
            let status = find_status(conn, status)?;
            next_statuses(conn, status.id)
        })
    }

    /// Marks a status terminal and deletes its outgoing edges
    pub fn close_status(&self, name: &str) -> EngineResult<Status> {
        self.db.write(|tx| {
            let mut status = find_status(tx, name)?;
            let now = Utc::now();

            tx.execute(
                "UPDATE statuses SET is_closed = 1, updated_at = ?1 WHERE id = ?2",
                params![now, status.id],
            )?;
            let dropped = tx.execute(
                "DELETE FROM status_transitions WHERE from_status_id = ?1",
                params![status.id],
            )?;

            info!(status = %status.name, dropped_edges = dropped, "status closed");

            status.is_closed = true;
            status.updated_at = now;
            Ok(status)
        })
    }

    /// Deletes an unreferenced status together with its edges
    pub fn remove_status(&self, name: &str) -> EngineResult<()> {
        self.db.write(|tx| {
            let status = find_status(tx, name)?;

            let in_use: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM product_statuses WHERE status_id = ?1)
                     OR EXISTS(SELECT 1 FROM status_tasks WHERE status_id = ?1)
                     OR EXISTS(SELECT 1 FROM products WHERE current_status_id = ?1)",
                params![status.id],
                |row| row.get(0),
            )?;
            if in_use {
                return Err(EngineError::StatusInUse(status.name));
            }

            // Edges in both directions cascade
            tx.execute("DELETE FROM statuses WHERE id = ?1", params![status.id])?;
            info!(status = %status.name, "status removed");
            Ok(())
        })
    }
}
