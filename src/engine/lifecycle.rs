//! Unit lifecycle controller
//!
//! Units enter the configured intake status on creation. From then on the
//! only way their status moves is [`Engine::change_status`], which checks
//! the outgoing checklist, appends history, rebuilds the checklist for the
//! new status and, for a closed status, frees the unit's slot. All of it
//! commits together or not at all.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::categories::find_category;
use super::checklist::{instantiate_predefined, outstanding_tasks, relocate_current_task};
use super::locations::{assign_slot, release_slot};
use super::status_graph::{
    find_status, get_or_create_status, insert_status, insert_transition, next_statuses,
    status_by_id,
};
use super::{serial_at, Engine};
use crate::domain::{
    EngineError, EngineResult, EntryState, NewUnit, SerialNumber, SlotAddress, Status, StatusStay,
    TaskSummary, Unit, UnitPlacement, Visibility,
};

const UNIT_SELECT: &str = "SELECT p.sn, c.name, p.priority_level, p.short_test, p.description,
            p.current_status_id, s.name, p.current_task_id,
            l.rack_name, l.layer_number, l.space_number,
            p.is_removed, p.created_at, p.updated_at
     FROM products p
     JOIN categories c ON c.id = p.category_id
     JOIN statuses s ON s.id = p.current_status_id
     LEFT JOIN locations l ON l.id = p.location_id";

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_unit(row: &Row<'_>) -> rusqlite::Result<Unit> {
    let rack: Option<String> = row.get(8)?;
    let location = match rack {
        Some(rack) => Some(SlotAddress {
            rack,
            layer: row.get(9)?,
            space: row.get(10)?,
        }),
        None => None,
    };

    Ok(Unit {
        serial: serial_at(row, 0)?,
        category: row.get(1)?,
        priority: parse_column(row, 2)?,
        short_test: parse_column(row, 3)?,
        description: row.get(4)?,
        status_id: row.get(5)?,
        status: row.get(6)?,
        current_task: row.get(7)?,
        location,
        is_removed: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn visibility_filter(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Live => " AND p.is_removed = 0",
        Visibility::IncludeRemoved => "",
    }
}

/// Looks a unit up by serial; removed units only show with `IncludeRemoved`
pub(crate) fn find_unit(
    conn: &Connection,
    serial: &str,
    visibility: Visibility,
) -> EngineResult<Unit> {
    let serial = serial.trim();
    conn.query_row(
        &format!(
            "{} WHERE p.sn = ?1{}",
            UNIT_SELECT,
            visibility_filter(visibility)
        ),
        params![serial],
        map_unit,
    )
    .optional()?
    .ok_or_else(|| EngineError::UnitNotFound(serial.to_string()))
}

/// Id of the unit's latest history row, the stay new entries belong to
pub(crate) fn current_stay(conn: &Connection, serial: &str) -> EngineResult<i64> {
    conn.query_row(
        "SELECT id FROM product_statuses WHERE product_sn = ?1 ORDER BY id DESC LIMIT 1",
        params![serial],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| EngineError::UnitNotFound(serial.to_string()))
}

fn append_history(conn: &Connection, serial: &str, status: &Status) -> EngineResult<i64> {
    conn.execute(
        "INSERT INTO product_statuses (product_sn, status_id, changed_at) VALUES (?1, ?2, ?3)",
        params![serial, status.id, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Creates a unit in the intake status with its predefined checklist, and
/// checks it into `new.location` if one is given
fn insert_unit(conn: &Connection, new: &NewUnit, initial_status: &str) -> EngineResult<Unit> {
    let serial: SerialNumber = new
        .serial
        .parse()
        .map_err(|_| EngineError::InvalidSerial(new.serial.trim().to_string()))?;

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM products WHERE sn = ?1)",
        params![serial.as_str()],
        |row| row.get(0),
    )?;
    if exists {
        return Err(EngineError::DuplicateSerial(serial.to_string()));
    }

    let category_id = find_category(conn, &new.category)?;
    let status = get_or_create_status(conn, initial_status)?;

    let now = Utc::now();
    conn.execute(
        "INSERT INTO products (sn, category_id, priority_level, short_test, description,
                               current_status_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            serial.as_str(),
            category_id,
            new.priority.as_str(),
            new.short_test.code(),
            new.description.trim(),
            status.id,
            now
        ],
    )?;

    append_history(conn, serial.as_str(), &status)?;
    instantiate_predefined(conn, serial.as_str(), &status)?;
    relocate_current_task(conn, serial.as_str())?;

    if let Some(slot) = &new.location {
        assign_slot(conn, serial.as_str(), slot)?;
    }

    info!(serial = %serial, category = %new.category.trim(), status = %status.name, "unit created");
    find_unit(conn, serial.as_str(), Visibility::Live)
}

/// Moves `unit` to `target`, enforcing the checklist gate and the graph
fn transition(conn: &Connection, unit: &Unit, target: &Status) -> EngineResult<Unit> {
    let serial = unit.serial.as_str();
    let current = status_by_id(conn, unit.status_id)?;

    let outstanding = outstanding_tasks(conn, serial, current.id)?;
    if !outstanding.is_empty() {
        return Err(EngineError::OutstandingTasks {
            serial: serial.to_string(),
            status: current.name,
            tasks: outstanding,
        });
    }

    let reachable = next_statuses(conn, current.id)?
        .iter()
        .any(|s| s.id == target.id);
    if !reachable {
        return Err(EngineError::UnreachableStatus {
            from: current.name,
            to: target.name.clone(),
        });
    }

    append_history(conn, serial, target)?;
    conn.execute(
        "UPDATE products SET current_status_id = ?1, updated_at = ?2 WHERE sn = ?3",
        params![target.id, Utc::now(), serial],
    )?;
    instantiate_predefined(conn, serial, target)?;
    relocate_current_task(conn, serial)?;

    if target.is_closed {
        release_slot(conn, serial)?;
    }

    info!(serial, from = %current.name, to = %target.name, closed = target.is_closed, "status changed");
    find_unit(conn, serial, Visibility::Live)
}

impl Engine {
    /// Checks in a new unit.
    ///
    /// The unit starts in the configured intake status (created on first
    /// use) with that status's predefined tasks. Serials of removed units
    /// stay taken.
    pub fn create_unit(&self, new: NewUnit) -> EngineResult<Unit> {
        self.db
            .write(|tx| insert_unit(tx, &new, &self.config.initial_status))
    }

    /// A live unit
    pub fn unit(&self, serial: &str) -> EngineResult<Unit> {
        self.db.read(|conn| find_unit(conn, serial, Visibility::Live))
    }

    /// Units in check-in order
    pub fn units(&self, visibility: Visibility) -> EngineResult<Vec<Unit>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE 1 = 1{} ORDER BY p.created_at, p.sn",
                UNIT_SELECT,
                visibility_filter(visibility)
            ))?;
            let units = stmt
                .query_map([], map_unit)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(units)
        })
    }

    /// Replaces the unit's free-text description
    pub fn describe_unit(&self, serial: &str, description: &str) -> EngineResult<Unit> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            tx.execute(
                "UPDATE products SET description = ?1, updated_at = ?2 WHERE sn = ?3",
                params![description.trim(), Utc::now(), unit.serial.as_str()],
            )?;
            find_unit(tx, unit.serial.as_str(), Visibility::Live)
        })
    }

    /// Soft-deletes a unit and frees its slot; history and checklist stay
    pub fn remove_unit(&self, serial: &str) -> EngineResult<()> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            release_slot(tx, unit.serial.as_str())?;
            tx.execute(
                "UPDATE products SET is_removed = 1, updated_at = ?1 WHERE sn = ?2",
                params![Utc::now(), unit.serial.as_str()],
            )?;
            info!(serial = %unit.serial, "unit removed");
            Ok(())
        })
    }

    /// Moves a unit to `new_status`.
    ///
    /// Fails with `OutstandingTasks` while any active entry is mapped to the
    /// current status, and with `UnreachableStatus` when no edge leads from
    /// the current status to `new_status`.
    pub fn change_status(&self, serial: &str, new_status: &str) -> EngineResult<Unit> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            let target = find_status(tx, new_status)?;
            transition(tx, &unit, &target)
        })
    }

    /// Creates a status and wires an edge from each of `reachable_from` to it
    pub fn create_status_with_transition(
        &self,
        name: &str,
        description: Option<&str>,
        reachable_from: &[&str],
    ) -> EngineResult<Status> {
        self.db.write(|tx| {
            let status = insert_status(tx, name, description, false)?;
            for from in reachable_from {
                let from = find_status(tx, from)?;
                insert_transition(tx, &from, &status)?;
            }
            Ok(status)
        })
    }

    /// Creates a status reachable from the unit's current one and moves the
    /// unit into it. A blocked move leaves no new status behind.
    pub fn enter_new_status(
        &self,
        serial: &str,
        name: &str,
        description: Option<&str>,
    ) -> EngineResult<Unit> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            let current = status_by_id(tx, unit.status_id)?;
            let target = insert_status(tx, name, description, false)?;
            insert_transition(tx, &current, &target)?;
            transition(tx, &unit, &target)
        })
    }

    /// Every status the unit has entered, oldest first, with the entries
    /// created during each stay
    pub fn status_history(&self, serial: &str) -> EngineResult<Vec<StatusStay>> {
        self.db.read(|conn| {
            let unit = find_unit(conn, serial, Visibility::Live)?;

            let mut stays_stmt = conn.prepare(
                "SELECT ps.id, s.name, ps.changed_at
                 FROM product_statuses ps
                 JOIN statuses s ON s.id = ps.status_id
                 WHERE ps.product_sn = ?1
                 ORDER BY ps.id",
            )?;
            let mut stays = stays_stmt
                .query_map(params![unit.serial.as_str()], |row| {
                    Ok(StatusStay {
                        id: row.get(0)?,
                        status: row.get(1)?,
                        changed_at: row.get(2)?,
                        tasks: Vec::new(),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut tasks_stmt = conn.prepare(
                "SELECT t.name, pt.is_completed, pt.is_skipped, pt.result, pt.note
                 FROM product_tasks pt
                 JOIN tasks t ON t.id = pt.task_id
                 WHERE pt.history_id = ?1
                 ORDER BY pt.sort_order",
            )?;
            for stay in &mut stays {
                stay.tasks = tasks_stmt
                    .query_map(params![stay.id], |row| {
                        let completed: bool = row.get(1)?;
                        let skipped: bool = row.get(2)?;
                        let state = match (completed, skipped) {
                            (true, _) => EntryState::Completed,
                            (_, true) => EntryState::Skipped,
                            _ => EntryState::Active,
                        };
                        Ok(TaskSummary {
                            task: row.get(0)?,
                            state,
                            result: row.get(3)?,
                            note: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
            }

            Ok(stays)
        })
    }

    /// Where the unit sits and which status it is in
    pub fn product_location(&self, serial: &str) -> EngineResult<UnitPlacement> {
        let unit = self.unit(serial)?;
        Ok(UnitPlacement {
            serial: unit.serial,
            status: unit.status,
            location: unit.location,
        })
    }
}
