//! Task checklist engine
//!
//! A unit's checklist is its ordered list of entries across every status it
//! has been in. Orders are dense per unit (1..N). The unit's current task is
//! always the task of its lowest-order active entry, or `None` when nothing
//! is active or the unit sits in a closed status.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::catalog::{ensure_mapping, predefined_mappings, task_by_id};
use super::lifecycle::{current_stay, find_unit};
use super::status_graph::{find_status, status_by_id};
use super::{serial_at, Engine};
use crate::domain::{
    ChecklistEntry, EngineError, EngineResult, EntryId, Resolution, Status, StatusId, TaskId,
    Visibility, DEFAULT_RESULT,
};

const ENTRY_SELECT: &str = "SELECT pt.id, pt.product_sn, pt.task_id, t.name, pt.history_id,
            pt.is_completed, pt.is_skipped, pt.is_predefined, pt.result, pt.note,
            pt.sort_order, pt.created_at, pt.updated_at
     FROM product_tasks pt
     JOIN tasks t ON t.id = pt.task_id";

const ACTIVE: &str = "pt.is_completed = 0 AND pt.is_skipped = 0";

fn map_entry(row: &Row<'_>) -> rusqlite::Result<ChecklistEntry> {
    Ok(ChecklistEntry {
        id: row.get(0)?,
        serial: serial_at(row, 1)?,
        task_id: row.get(2)?,
        task_name: row.get(3)?,
        history_id: row.get(4)?,
        is_completed: row.get(5)?,
        is_skipped: row.get(6)?,
        is_predefined: row.get(7)?,
        result: row.get(8)?,
        note: row.get(9)?,
        order: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

pub(crate) fn entry_by_id(conn: &Connection, id: EntryId) -> EngineResult<ChecklistEntry> {
    conn.query_row(&format!("{} WHERE pt.id = ?1", ENTRY_SELECT), params![id], map_entry)
        .optional()?
        .ok_or(EngineError::EntryNotFound(id))
}

/// Entries of a unit ascending by order
pub(crate) fn entries_of(
    conn: &Connection,
    serial: &str,
    only_active: bool,
) -> EngineResult<Vec<ChecklistEntry>> {
    let filter = if only_active {
        format!(" AND {}", ACTIVE)
    } else {
        String::new()
    };
    let mut stmt = conn.prepare(&format!(
        "{} WHERE pt.product_sn = ?1{} ORDER BY pt.sort_order",
        ENTRY_SELECT, filter
    ))?;
    let entries = stmt
        .query_map(params![serial], map_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn is_task_active(conn: &Connection, serial: &str, task_id: TaskId) -> EngineResult<bool> {
    let active: bool = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM product_tasks pt
                           WHERE pt.product_sn = ?1 AND pt.task_id = ?2 AND {})",
            ACTIVE
        ),
        params![serial, task_id],
        |row| row.get(0),
    )?;
    Ok(active)
}

fn insert_entry(
    conn: &Connection,
    serial: &str,
    task_id: TaskId,
    history_id: i64,
    is_predefined: bool,
    order: u32,
) -> EngineResult<EntryId> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO product_tasks
             (product_sn, task_id, history_id, is_predefined, result, sort_order,
              created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![serial, task_id, history_id, is_predefined, DEFAULT_RESULT, order, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Appends the predefined tasks of `status` to the unit's checklist tail,
/// skipping tasks that are already active. Returns how many were created.
pub(crate) fn instantiate_predefined(
    conn: &Connection,
    serial: &str,
    status: &Status,
) -> EngineResult<usize> {
    let history_id = current_stay(conn, serial)?;
    let mut next_order: u32 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM product_tasks WHERE product_sn = ?1",
        params![serial],
        |row| row.get(0),
    )?;

    let mut created = 0;
    for mapping in predefined_mappings(conn, status.id)? {
        if is_task_active(conn, serial, mapping.task_id)? {
            continue;
        }
        insert_entry(conn, serial, mapping.task_id, history_id, true, next_order)?;
        next_order += 1;
        created += 1;
    }

    debug!(serial, status = %status.name, created, "predefined tasks instantiated");
    Ok(created)
}

/// Points the unit at its lowest-order active entry, writing only on change.
/// A unit in a closed status has no current task.
pub(crate) fn relocate_current_task(conn: &Connection, serial: &str) -> EngineResult<Option<TaskId>> {
    let (stored, closed): (Option<TaskId>, bool) = conn
        .query_row(
            "SELECT p.current_task_id, s.is_closed
             FROM products p
             JOIN statuses s ON s.id = p.current_status_id
             WHERE p.sn = ?1",
            params![serial],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?
        .ok_or_else(|| EngineError::UnitNotFound(serial.to_string()))?;

    let next: Option<TaskId> = if closed {
        None
    } else {
        conn.query_row(
            &format!(
                "SELECT pt.task_id FROM product_tasks pt
                 WHERE pt.product_sn = ?1 AND {}
                 ORDER BY pt.sort_order LIMIT 1",
                ACTIVE
            ),
            params![serial],
            |row| row.get(0),
        )
        .optional()?
    };

    if stored != next {
        conn.execute(
            "UPDATE products SET current_task_id = ?1, updated_at = ?2 WHERE sn = ?3",
            params![next, Utc::now(), serial],
        )?;
        debug!(serial, from = ?stored, to = ?next, "current task moved");
    }

    Ok(next)
}

/// Names of the unit's active tasks that are mapped to `status`
pub(crate) fn outstanding_tasks(
    conn: &Connection,
    serial: &str,
    status_id: StatusId,
) -> EngineResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT t.name FROM product_tasks pt
         JOIN tasks t ON t.id = pt.task_id
         WHERE pt.product_sn = ?1 AND {}
           AND EXISTS(SELECT 1 FROM status_tasks st
                      WHERE st.status_id = ?2 AND st.task_id = pt.task_id)
         ORDER BY pt.sort_order",
        ACTIVE
    ))?;
    let names = stmt
        .query_map(params![serial, status_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

fn resolve(
    conn: &Connection,
    id: EntryId,
    resolution: Resolution,
    result: Option<&str>,
) -> EngineResult<ChecklistEntry> {
    let entry = entry_by_id(conn, id)?;
    find_unit(conn, entry.serial.as_str(), Visibility::Live)?;
    if !entry.is_active() {
        return Err(EngineError::AlreadyResolved(id));
    }

    let (completed, skipped) = match resolution {
        Resolution::Completed => (true, false),
        Resolution::Skipped => (false, true),
    };
    conn.execute(
        "UPDATE product_tasks
         SET is_completed = ?1, is_skipped = ?2, result = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            completed,
            skipped,
            resolution.tagged_result(result),
            Utc::now(),
            id
        ],
    )?;

    relocate_current_task(conn, entry.serial.as_str())?;

    info!(
        serial = %entry.serial,
        entry = id,
        task = %entry.task_name,
        resolution = ?resolution,
        "checklist entry resolved"
    );
    entry_by_id(conn, id)
}

impl Engine {
    /// Adds the predefined tasks of `status` to the unit's checklist.
    ///
    /// Tasks already active on the unit are left alone, so calling this
    /// twice has the same effect as calling it once.
    pub fn instantiate_predefined_tasks(&self, serial: &str, status: &str) -> EngineResult<usize> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            let status = find_status(tx, status)?;
            let created = instantiate_predefined(tx, unit.serial.as_str(), &status)?;
            relocate_current_task(tx, unit.serial.as_str())?;
            Ok(created)
        })
    }

    /// Marks an active entry completed; the result gets a "(Completed)" tag
    pub fn complete_task(&self, entry: EntryId, result: Option<&str>) -> EngineResult<ChecklistEntry> {
        self.db
            .write(|tx| resolve(tx, entry, Resolution::Completed, result))
    }

    /// Marks an active entry skipped; the result gets a "(Skipped)" tag
    pub fn skip_task(&self, entry: EntryId, result: Option<&str>) -> EngineResult<ChecklistEntry> {
        self.db
            .write(|tx| resolve(tx, entry, Resolution::Skipped, result))
    }

    /// Recomputes the unit's current task and returns it
    pub fn relocate_current_task(&self, serial: &str) -> EngineResult<Option<TaskId>> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            relocate_current_task(tx, unit.serial.as_str())
        })
    }

    /// Whether the unit has active work mapped to `status`
    pub fn has_outstanding_tasks(&self, serial: &str, status: &str) -> EngineResult<bool> {
        self.db.read(|conn| {
            let unit = find_unit(conn, serial, Visibility::Live)?;
            let status = find_status(conn, status)?;
            Ok(!outstanding_tasks(conn, unit.serial.as_str(), status.id)?.is_empty())
        })
    }

    /// Inserts a task at `position` (1-based) in the unit's checklist.
    ///
    /// Positions at or before the number of resolved entries are rejected.
    /// Entries at or after `position` move down by one. The task is mapped
    /// to the unit's current status if it was not already, so it gates the
    /// next status change like any other task of that status.
    pub fn insert_ad_hoc_task(
        &self,
        serial: &str,
        task_id: TaskId,
        position: u32,
    ) -> EngineResult<ChecklistEntry> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            let serial = unit.serial.as_str();
            let task = task_by_id(tx, task_id)?;

            if is_task_active(tx, serial, task.id)? {
                return Err(EngineError::DuplicateActiveTask {
                    serial: serial.to_string(),
                    task: task.name,
                });
            }

            let (total, resolved): (u32, u32) = tx.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_completed OR is_skipped), 0)
                 FROM product_tasks WHERE product_sn = ?1",
                params![serial],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            if position <= resolved || position > total + 1 {
                return Err(EngineError::InvalidPosition {
                    position,
                    min: resolved + 1,
                    max: total + 1,
                });
            }

            let status = status_by_id(tx, unit.status_id)?;
            let mapping = ensure_mapping(tx, &status, &task)?;
            let history_id = current_stay(tx, serial)?;

            tx.execute(
                "UPDATE product_tasks SET sort_order = sort_order + 1
                 WHERE product_sn = ?1 AND sort_order >= ?2",
                params![serial, position],
            )?;
            let id = insert_entry(
                tx,
                serial,
                task.id,
                history_id,
                mapping.is_predefined,
                position,
            )?;
            relocate_current_task(tx, serial)?;

            info!(serial, task = %task.name, position, "ad hoc task inserted");
            entry_by_id(tx, id)
        })
    }

    /// Sets or clears the note of an entry, resolved or not
    pub fn annotate(&self, entry: EntryId, note: Option<&str>) -> EngineResult<ChecklistEntry> {
        let note = note.map(str::trim).filter(|n| !n.is_empty());
        self.db.write(|tx| {
            let current = entry_by_id(tx, entry)?;
            find_unit(tx, current.serial.as_str(), Visibility::Live)?;
            tx.execute(
                "UPDATE product_tasks SET note = ?1, updated_at = ?2 WHERE id = ?3",
                params![note, Utc::now(), entry],
            )?;
            entry_by_id(tx, entry)
        })
    }

    pub fn checklist_entry(&self, entry: EntryId) -> EngineResult<ChecklistEntry> {
        self.db.read(|conn| entry_by_id(conn, entry))
    }

    /// The unit's checklist ascending by order, optionally only active entries
    pub fn checklist(&self, serial: &str, only_active: bool) -> EngineResult<Vec<ChecklistEntry>> {
        self.db.read(|conn| {
            let unit = find_unit(conn, serial, Visibility::Live)?;
            entries_of(conn, unit.serial.as_str(), only_active)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{EngineError, ErrorKind, NewUnit, TaskId, DEFAULT_RESULT};
    use crate::engine::Engine;

    const SN: &str = "1234567890123";

    fn setup(tasks: &[&str]) -> (Engine, Vec<TaskId>) {
        let engine = Engine::in_memory().unwrap();
        engine.add_category("PSU").unwrap();
        engine.add_status("RMA Sorting", None, false).unwrap();
        let ids = tasks
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let task = engine.define_task(name, None).unwrap();
                engine
                    .map_task_to_status("RMA Sorting", task.id, true, Some(i as u32 + 1))
                    .unwrap();
                task.id
            })
            .collect();
        engine.create_unit(NewUnit::new(SN, "PSU")).unwrap();
        (engine, ids)
    }

    fn current_task(engine: &Engine) -> Option<TaskId> {
        engine.unit(SN).unwrap().current_task
    }

    #[test]
    fn test_entries_start_active_with_default_result() {
        let (engine, ids) = setup(&["Inspect", "Photograph"]);
        let entries = engine.checklist(SN, false).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].task_id, ids[0]);
        assert_eq!(entries[0].order, 1);
        assert_eq!(entries[1].order, 2);
        assert!(entries.iter().all(|e| e.is_active() && e.is_predefined));
        assert!(entries.iter().all(|e| e.result == DEFAULT_RESULT));
    }

    #[test]
    fn test_instantiate_twice_is_idempotent() {
        let (engine, _) = setup(&["Inspect", "Photograph"]);

        let created = engine
            .instantiate_predefined_tasks(SN, "RMA Sorting")
            .unwrap();
        assert_eq!(created, 0);
        assert_eq!(engine.checklist(SN, true).unwrap().len(), 2);
    }

    #[test]
    fn test_complete_tags_result_and_moves_pointer() {
        let (engine, ids) = setup(&["Inspect", "Photograph"]);
        let first = engine.checklist(SN, false).unwrap()[0].id;

        let entry = engine.complete_task(first, Some("No damage")).unwrap();
        assert!(entry.is_completed);
        assert!(!entry.is_skipped);
        assert_eq!(entry.result, "(Completed) No damage");
        assert_eq!(current_task(&engine), Some(ids[1]));
    }

    #[test]
    fn test_resolving_twice_fails() {
        let (engine, _) = setup(&["Inspect"]);
        let id = engine.checklist(SN, false).unwrap()[0].id;

        let entry = engine.skip_task(id, None).unwrap();
        assert_eq!(entry.result, "(Skipped)");
        assert_eq!(current_task(&engine), None);

        let err = engine.complete_task(id, Some("late")).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyResolved(_)));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(engine.checklist_entry(id).unwrap().is_skipped);
    }

    #[test]
    fn test_out_of_order_completion_keeps_lowest_active() {
        let (engine, ids) = setup(&["Inspect", "Photograph", "Weigh"]);
        let entries = engine.checklist(SN, false).unwrap();

        engine.complete_task(entries[1].id, None).unwrap();
        assert_eq!(current_task(&engine), Some(ids[0]));

        engine.complete_task(entries[0].id, None).unwrap();
        assert_eq!(current_task(&engine), Some(ids[2]));
    }

    #[test]
    fn test_outstanding_tasks_follow_status_mapping() {
        let (engine, _) = setup(&["Inspect"]);
        engine.add_status("Repair", None, false).unwrap();

        assert!(engine.has_outstanding_tasks(SN, "RMA Sorting").unwrap());
        assert!(!engine.has_outstanding_tasks(SN, "Repair").unwrap());

        let id = engine.checklist(SN, false).unwrap()[0].id;
        engine.complete_task(id, None).unwrap();
        assert!(!engine.has_outstanding_tasks(SN, "RMA Sorting").unwrap());
    }

    #[test]
    fn test_ad_hoc_insert_shifts_later_entries() {
        let (engine, ids) = setup(&["Inspect", "Photograph"]);
        let extra = engine.define_task("Clean contacts", None).unwrap();

        let entry = engine.insert_ad_hoc_task(SN, extra.id, 1).unwrap();
        assert_eq!(entry.order, 1);
        assert!(!entry.is_predefined);

        let tasks: Vec<_> = engine
            .checklist(SN, false)
            .unwrap()
            .into_iter()
            .map(|e| (e.task_id, e.order))
            .collect();
        assert_eq!(tasks, vec![(extra.id, 1), (ids[0], 2), (ids[1], 3)]);
        assert_eq!(current_task(&engine), Some(extra.id));

        // The inserted task now gates the current status
        let mappings = engine.status_tasks_of("RMA Sorting").unwrap();
        assert!(mappings.iter().any(|m| m.task_id == extra.id && !m.is_predefined));
    }

    #[test]
    fn test_ad_hoc_insert_cannot_rewrite_the_past() {
        let (engine, _) = setup(&["Inspect", "Photograph"]);
        let first = engine.checklist(SN, false).unwrap()[0].id;
        engine.complete_task(first, None).unwrap();
        let extra = engine.define_task("Clean contacts", None).unwrap();

        let err = engine.insert_ad_hoc_task(SN, extra.id, 1).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidPosition {
                position: 1,
                min: 2,
                max: 3
            }
        ));

        let err = engine.insert_ad_hoc_task(SN, extra.id, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Appending at the tail is fine
        let entry = engine.insert_ad_hoc_task(SN, extra.id, 3).unwrap();
        assert_eq!(entry.order, 3);
    }

    #[test]
    fn test_ad_hoc_insert_rejects_active_duplicate() {
        let (engine, ids) = setup(&["Inspect"]);
        let err = engine.insert_ad_hoc_task(SN, ids[0], 2).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateActiveTask { .. }));
        assert_eq!(engine.checklist(SN, false).unwrap().len(), 1);
    }

    #[test]
    fn test_annotate_resolved_entry() {
        let (engine, _) = setup(&["Inspect"]);
        let id = engine.checklist(SN, false).unwrap()[0].id;
        engine.complete_task(id, Some("ok")).unwrap();

        let entry = engine.annotate(id, Some("re-checked by QA")).unwrap();
        assert_eq!(entry.note.as_deref(), Some("re-checked by QA"));
        assert_eq!(entry.result, "(Completed) ok");

        let entry = engine.annotate(id, None).unwrap();
        assert_eq!(entry.note, None);
    }

    #[test]
    fn test_unknown_entry_is_not_found() {
        let (engine, _) = setup(&[]);
        let err = engine.complete_task(999, None).unwrap_err();
        assert!(matches!(err, EngineError::EntryNotFound(999)));
    }

    #[test]
    fn test_closed_status_keeps_no_current_task() {
        let (engine, _) = setup(&["Inspect"]);
        engine.add_status("Scrapped", None, true).unwrap();
        engine.add_transition("RMA Sorting", "Scrapped").unwrap();
        for (i, name) in ["Label", "Photo"].iter().enumerate() {
            let task = engine.define_task(name, None).unwrap();
            engine
                .map_task_to_status("Scrapped", task.id, true, Some(i as u32 + 1))
                .unwrap();
        }

        let inspect = engine.checklist(SN, true).unwrap()[0].id;
        engine.complete_task(inspect, None).unwrap();
        engine.change_status(SN, "Scrapped").unwrap();
        assert_eq!(current_task(&engine), None);

        let active = engine.checklist(SN, true).unwrap();
        assert_eq!(active.len(), 2);
        engine.complete_task(active[0].id, Some("tagged")).unwrap();
        assert_eq!(current_task(&engine), None);

        engine.skip_task(active[1].id, None).unwrap();
        assert_eq!(engine.relocate_current_task(SN).unwrap(), None);
        assert_eq!(current_task(&engine), None);
    }

    #[test]
    fn test_removed_unit_entries_are_frozen() {
        let (engine, _) = setup(&["Inspect"]);
        let id = engine.checklist(SN, true).unwrap()[0].id;
        engine.remove_unit(SN).unwrap();

        let err = engine.complete_task(id, None).unwrap_err();
        assert!(matches!(err, EngineError::UnitNotFound(_)));
        assert!(matches!(
            engine.skip_task(id, None),
            Err(EngineError::UnitNotFound(_))
        ));
        assert!(matches!(
            engine.annotate(id, Some("late note")),
            Err(EngineError::UnitNotFound(_))
        ));

        let entry = engine.checklist_entry(id).unwrap();
        assert!(entry.is_active());
        assert_eq!(entry.note, None);
    }
}
