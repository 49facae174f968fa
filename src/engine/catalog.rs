//! Task catalog: reusable tasks and their per-status mappings
//!
//! Predefined mappings of a status form a dense 1..N sequence. Inserting at a
//! position shifts every mapping at or after it down by one; removing one
//! closes the gap. Non-predefined mappings carry no order and always list
//! after the predefined ones.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::status_graph::find_status;
use super::Engine;
use crate::domain::{EngineError, EngineResult, Status, StatusId, StatusTask, Task, TaskId};

const STATUS_TASK_SELECT: &str = "SELECT st.id, st.status_id, st.task_id, t.name, st.is_predefined, st.sort_order
     FROM status_tasks st
     JOIN tasks t ON t.id = st.task_id";

fn map_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_status_task(row: &Row<'_>) -> rusqlite::Result<StatusTask> {
    Ok(StatusTask {
        id: row.get(0)?,
        status_id: row.get(1)?,
        task_id: row.get(2)?,
        task_name: row.get(3)?,
        is_predefined: row.get(4)?,
        order: row.get(5)?,
    })
}

pub(crate) fn task_by_id(conn: &Connection, id: TaskId) -> EngineResult<Task> {
    conn.query_row(
        "SELECT id, name, description, created_at FROM tasks WHERE id = ?1",
        params![id],
        map_task,
    )
    .optional()?
    .ok_or(EngineError::TaskNotFound(id))
}

pub(crate) fn find_mapping(
    conn: &Connection,
    status_id: StatusId,
    task_id: TaskId,
) -> EngineResult<Option<StatusTask>> {
    let mapping = conn
        .query_row(
            &format!(
                "{} WHERE st.status_id = ?1 AND st.task_id = ?2",
                STATUS_TASK_SELECT
            ),
            params![status_id, task_id],
            map_status_task,
        )
        .optional()?;
    Ok(mapping)
}

/// Predefined mappings of a status, ascending by order
pub(crate) fn predefined_mappings(
    conn: &Connection,
    status_id: StatusId,
) -> EngineResult<Vec<StatusTask>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE st.status_id = ?1 AND st.is_predefined = 1 ORDER BY st.sort_order",
        STATUS_TASK_SELECT
    ))?;
    let mappings = stmt
        .query_map(params![status_id], map_status_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(mappings)
}

fn predefined_count(conn: &Connection, status_id: StatusId) -> EngineResult<u32> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM status_tasks WHERE status_id = ?1 AND is_predefined = 1",
        params![status_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn check_order(order: u32, max: u32) -> EngineResult<()> {
    if order == 0 || order > max {
        return Err(EngineError::InvalidOrder { order, max });
    }
    Ok(())
}

/// Shifts predefined orders `>= position` up by one, skipping `except`
fn open_gap(
    conn: &Connection,
    status_id: StatusId,
    position: u32,
    except: Option<i64>,
) -> EngineResult<()> {
    conn.execute(
        "UPDATE status_tasks SET sort_order = sort_order + 1
         WHERE status_id = ?1 AND is_predefined = 1 AND sort_order >= ?2
           AND id IS NOT ?3",
        params![status_id, position, except],
    )?;
    Ok(())
}

/// Shifts predefined orders `> position` down by one
fn close_gap(conn: &Connection, status_id: StatusId, position: u32) -> EngineResult<()> {
    conn.execute(
        "UPDATE status_tasks SET sort_order = sort_order - 1
         WHERE status_id = ?1 AND is_predefined = 1 AND sort_order > ?2",
        params![status_id, position],
    )?;
    Ok(())
}

fn insert_mapping(
    conn: &Connection,
    status: &Status,
    task: &Task,
    order: Option<u32>,
) -> EngineResult<StatusTask> {
    conn.execute(
        "INSERT INTO status_tasks (status_id, task_id, is_predefined, sort_order)
         VALUES (?1, ?2, ?3, ?4)",
        params![status.id, task.id, order.is_some(), order],
    )?;

    Ok(StatusTask {
        id: conn.last_insert_rowid(),
        status_id: status.id,
        task_id: task.id,
        task_name: task.name.clone(),
        is_predefined: order.is_some(),
        order,
    })
}

/// Makes sure `task` is mapped to `status`, adding a non-predefined mapping
/// if it is not
pub(crate) fn ensure_mapping(
    conn: &Connection,
    status: &Status,
    task: &Task,
) -> EngineResult<StatusTask> {
    match find_mapping(conn, status.id, task.id)? {
        Some(mapping) => Ok(mapping),
        None => insert_mapping(conn, status, task, None),
    }
}

impl Engine {
    /// Adds a reusable task to the catalog
    pub fn define_task(&self, name: &str, description: Option<&str>) -> EngineResult<Task> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyField("Task name"));
        }
        let description = description.map(str::trim).filter(|d| !d.is_empty());

        self.db.write(|tx| {
            let now = Utc::now();
            tx.execute(
                "INSERT INTO tasks (name, description, created_at) VALUES (?1, ?2, ?3)",
                params![name, description, now],
            )?;

            let task = Task {
                id: tx.last_insert_rowid(),
                name: name.to_string(),
                description: description.map(str::to_string),
                created_at: now,
            };
            info!(task_id = task.id, name = %task.name, "task defined");
            Ok(task)
        })
    }

    pub fn task(&self, id: TaskId) -> EngineResult<Task> {
        self.db.read(|conn| task_by_id(conn, id))
    }

    /// Lists the catalog in creation order
    pub fn tasks(&self) -> EngineResult<Vec<Task>> {
        self.db.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, description, created_at FROM tasks ORDER BY id")?;
            let tasks = stmt
                .query_map([], map_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Deletes a task nothing refers to
    pub fn remove_task(&self, id: TaskId) -> EngineResult<()> {
        self.db.write(|tx| {
            task_by_id(tx, id)?;

            let in_use: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM status_tasks WHERE task_id = ?1)
                     OR EXISTS(SELECT 1 FROM product_tasks WHERE task_id = ?1)
                     OR EXISTS(SELECT 1 FROM products WHERE current_task_id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if in_use {
                return Err(EngineError::TaskInUse(id));
            }

            tx.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            info!(task_id = id, "task removed");
            Ok(())
        })
    }

    /// Maps a task onto a status.
    ///
    /// Predefined mappings need an `order` in `1..=N+1` and are inserted
    /// there, shifting later ones; for other mappings `order` is ignored.
    pub fn map_task_to_status(
        &self,
        status: &str,
        task_id: TaskId,
        predefined: bool,
        order: Option<u32>,
    ) -> EngineResult<StatusTask> {
        if predefined && order.is_none() {
            return Err(EngineError::MissingOrder);
        }

        self.db.write(|tx| {
            let status = find_status(tx, status)?;
            let task = task_by_id(tx, task_id)?;

            if find_mapping(tx, status.id, task.id)?.is_some() {
                return Err(EngineError::DuplicateMapping {
                    status: status.name,
                    task: task.name,
                });
            }

            let mapping = match order.filter(|_| predefined) {
                Some(order) => {
                    check_order(order, predefined_count(tx, status.id)? + 1)?;
                    open_gap(tx, status.id, order, None)?;
                    insert_mapping(tx, &status, &task, Some(order))?
                }
                None => insert_mapping(tx, &status, &task, None)?,
            };

            info!(
                status = %status.name,
                task = %task.name,
                predefined,
                order = ?mapping.order,
                "task mapped to status"
            );
            Ok(mapping)
        })
    }

    /// Places `task` at `position` among the status's predefined tasks.
    ///
    /// An unmapped or non-predefined task becomes predefined there; a
    /// predefined one moves. Either way the sequence stays dense.
    pub fn insert_predefined_at(
        &self,
        status: &str,
        task_id: TaskId,
        position: u32,
    ) -> EngineResult<StatusTask> {
        self.db.write(|tx| {
            let status = find_status(tx, status)?;
            let task = task_by_id(tx, task_id)?;
            let count = predefined_count(tx, status.id)?;

            let mapping = match find_mapping(tx, status.id, task.id)? {
                Some(mut existing) if existing.is_predefined => {
                    check_order(position, count)?;
                    let current = existing.order.unwrap_or(count);
                    if current != position {
                        close_gap(tx, status.id, current)?;
                        open_gap(tx, status.id, position, Some(existing.id))?;
                        tx.execute(
                            "UPDATE status_tasks SET sort_order = ?1 WHERE id = ?2",
                            params![position, existing.id],
                        )?;
                    }
                    existing.order = Some(position);
                    existing
                }
                Some(mut existing) => {
                    check_order(position, count + 1)?;
                    open_gap(tx, status.id, position, None)?;
                    tx.execute(
                        "UPDATE status_tasks SET is_predefined = 1, sort_order = ?1 WHERE id = ?2",
                        params![position, existing.id],
                    )?;
                    existing.is_predefined = true;
                    existing.order = Some(position);
                    existing
                }
                None => {
                    check_order(position, count + 1)?;
                    open_gap(tx, status.id, position, None)?;
                    insert_mapping(tx, &status, &task, Some(position))?
                }
            };

            info!(status = %status.name, task = %task.name, position, "predefined task placed");
            Ok(mapping)
        })
    }

    /// Deletes a mapping no checklist entry depends on
    pub fn remove_mapping(&self, status: &str, task_id: TaskId) -> EngineResult<()> {
        self.db.write(|tx| {
            let status = find_status(tx, status)?;
            let task = task_by_id(tx, task_id)?;

            let mapping = find_mapping(tx, status.id, task.id)?.ok_or_else(|| {
                EngineError::MappingNotFound {
                    status: status.name.clone(),
                    task: task.name.clone(),
                }
            })?;

            let in_use: bool = tx.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM product_tasks pt
                     JOIN product_statuses ps ON ps.id = pt.history_id
                     WHERE ps.status_id = ?1 AND pt.task_id = ?2)",
                params![status.id, task.id],
                |row| row.get(0),
            )?;
            if in_use {
                return Err(EngineError::MappingInUse {
                    status: status.name,
                    task: task.name,
                });
            }

            tx.execute("DELETE FROM status_tasks WHERE id = ?1", params![mapping.id])?;
            if let Some(order) = mapping.order {
                close_gap(tx, status.id, order)?;
            }

            info!(status = %status.name, task = %task.name, "task mapping removed");
            Ok(())
        })
    }

    /// Predefined tasks of a status, ascending by order
    pub fn predefined_tasks_of(&self, status: &str) -> EngineResult<Vec<StatusTask>> {
        self.db.read(|conn| {
            let status = find_status(conn, status)?;
            predefined_mappings(conn, status.id)
        })
    }

    /// Every mapping of a status: predefined by order, then the rest by insertion
    pub fn status_tasks_of(&self, status: &str) -> EngineResult<Vec<StatusTask>> {
        self.db.read(|conn| {
            let status = find_status(conn, status)?;
            let mut stmt = conn.prepare(&format!(
                "{} WHERE st.status_id = ?1
                 ORDER BY st.is_predefined DESC, st.sort_order, st.id",
                STATUS_TASK_SELECT
            ))?;
            let mappings = stmt
                .query_map(params![status.id], map_status_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(mappings)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{EngineError, ErrorKind, NewUnit, TaskId};
    use crate::engine::Engine;

    fn setup() -> (Engine, Vec<TaskId>) {
        let engine = Engine::in_memory().unwrap();
        engine.add_status("Repair", None, false).unwrap();
        let ids = ["Diagnose", "Replace PSU", "Burn-in", "Label"]
            .iter()
            .map(|name| engine.define_task(name, None).unwrap().id)
            .collect();
        (engine, ids)
    }

    fn predefined_names(engine: &Engine, status: &str) -> Vec<(String, u32)> {
        engine
            .predefined_tasks_of(status)
            .unwrap()
            .into_iter()
            .map(|m| (m.task_name, m.order.unwrap()))
            .collect()
    }

    #[test]
    fn test_define_task_allows_same_name() {
        let engine = Engine::in_memory().unwrap();
        let a = engine.define_task("Clean", None).unwrap();
        let b = engine.define_task("Clean", Some("second pass")).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(engine.tasks().unwrap().len(), 2);
    }

    #[test]
    fn test_define_task_rejects_empty_name() {
        let engine = Engine::in_memory().unwrap();
        let err = engine.define_task("  ", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_predefined_mapping_needs_order() {
        let (engine, ids) = setup();
        let err = engine
            .map_task_to_status("Repair", ids[0], true, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingOrder));
    }

    #[test]
    fn test_duplicate_mapping_fails() {
        let (engine, ids) = setup();
        engine.map_task_to_status("Repair", ids[0], false, None).unwrap();
        let err = engine
            .map_task_to_status("Repair", ids[0], true, Some(1))
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateMapping { .. }));
    }

    #[test]
    fn test_non_predefined_order_is_ignored() {
        let (engine, ids) = setup();
        let mapping = engine
            .map_task_to_status("Repair", ids[0], false, Some(7))
            .unwrap();
        assert!(!mapping.is_predefined);
        assert_eq!(mapping.order, None);
    }

    #[test]
    fn test_mapping_with_order_shifts_later_tasks() {
        let (engine, ids) = setup();
        engine.map_task_to_status("Repair", ids[0], true, Some(1)).unwrap();
        engine.map_task_to_status("Repair", ids[1], true, Some(2)).unwrap();
        engine.map_task_to_status("Repair", ids[2], true, Some(1)).unwrap();

        assert_eq!(
            predefined_names(&engine, "Repair"),
            vec![
                ("Burn-in".to_string(), 1),
                ("Diagnose".to_string(), 2),
                ("Replace PSU".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_mapping_order_out_of_range() {
        let (engine, ids) = setup();
        engine.map_task_to_status("Repair", ids[0], true, Some(1)).unwrap();
        let err = engine
            .map_task_to_status("Repair", ids[1], true, Some(3))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidOrder { order: 3, max: 2 }));
    }

    #[test]
    fn test_insert_predefined_moves_existing() {
        let (engine, ids) = setup();
        for (i, id) in ids.iter().enumerate() {
            engine
                .map_task_to_status("Repair", *id, true, Some(i as u32 + 1))
                .unwrap();
        }

        // Move "Label" (4) to the front: shift-and-insert, not swap
        engine.insert_predefined_at("Repair", ids[3], 1).unwrap();
        assert_eq!(
            predefined_names(&engine, "Repair"),
            vec![
                ("Label".to_string(), 1),
                ("Diagnose".to_string(), 2),
                ("Replace PSU".to_string(), 3),
                ("Burn-in".to_string(), 4)
            ]
        );

        // And "Diagnose" (2) to the back
        engine.insert_predefined_at("Repair", ids[0], 4).unwrap();
        assert_eq!(
            predefined_names(&engine, "Repair"),
            vec![
                ("Label".to_string(), 1),
                ("Replace PSU".to_string(), 2),
                ("Burn-in".to_string(), 3),
                ("Diagnose".to_string(), 4)
            ]
        );
    }

    #[test]
    fn test_insert_predefined_promotes_plain_mapping() {
        let (engine, ids) = setup();
        engine.map_task_to_status("Repair", ids[0], true, Some(1)).unwrap();
        engine.map_task_to_status("Repair", ids[1], false, None).unwrap();

        let mapping = engine.insert_predefined_at("Repair", ids[1], 1).unwrap();
        assert!(mapping.is_predefined);
        assert_eq!(
            predefined_names(&engine, "Repair"),
            vec![("Replace PSU".to_string(), 1), ("Diagnose".to_string(), 2)]
        );
    }

    #[test]
    fn test_insert_predefined_rejects_gap() {
        let (engine, ids) = setup();
        let err = engine.insert_predefined_at("Repair", ids[0], 2).unwrap_err();
        assert!(matches!(err, EngineError::InvalidOrder { .. }));
        assert!(engine.predefined_tasks_of("Repair").unwrap().is_empty());
    }

    #[test]
    fn test_remove_mapping_renumbers() {
        let (engine, ids) = setup();
        for (i, id) in ids.iter().take(3).enumerate() {
            engine
                .map_task_to_status("Repair", *id, true, Some(i as u32 + 1))
                .unwrap();
        }

        engine.remove_mapping("Repair", ids[0]).unwrap();
        assert_eq!(
            predefined_names(&engine, "Repair"),
            vec![("Replace PSU".to_string(), 1), ("Burn-in".to_string(), 2)]
        );

        let err = engine.remove_mapping("Repair", ids[0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_mapping_in_use() {
        let (engine, ids) = setup();
        engine.add_category("PSU").unwrap();
        engine.add_status("RMA Sorting", None, false).unwrap();
        engine
            .map_task_to_status("RMA Sorting", ids[0], true, Some(1))
            .unwrap();
        engine.map_task_to_status("Repair", ids[0], false, None).unwrap();
        engine
            .create_unit(NewUnit::new("1234567890123", "PSU"))
            .unwrap();

        // The unit got a Diagnose entry while in RMA Sorting
        let err = engine.remove_mapping("RMA Sorting", ids[0]).unwrap_err();
        assert!(matches!(err, EngineError::MappingInUse { .. }));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(
            predefined_names(&engine, "RMA Sorting"),
            vec![("Diagnose".to_string(), 1)]
        );

        // No unit has been through Repair, so that mapping can go
        engine.remove_mapping("Repair", ids[0]).unwrap();
        assert!(engine.status_tasks_of("Repair").unwrap().is_empty());
    }

    #[test]
    fn test_status_tasks_lists_predefined_first() {
        let (engine, ids) = setup();
        engine.map_task_to_status("Repair", ids[0], false, None).unwrap();
        engine.map_task_to_status("Repair", ids[1], true, Some(1)).unwrap();
        engine.map_task_to_status("Repair", ids[2], false, None).unwrap();

        let names: Vec<_> = engine
            .status_tasks_of("Repair")
            .unwrap()
            .into_iter()
            .map(|m| m.task_name)
            .collect();
        assert_eq!(names, vec!["Replace PSU", "Diagnose", "Burn-in"]);
    }

    #[test]
    fn test_remove_task_guarded_by_mapping() {
        let (engine, ids) = setup();
        engine.map_task_to_status("Repair", ids[0], false, None).unwrap();

        assert!(matches!(
            engine.remove_task(ids[0]),
            Err(EngineError::TaskInUse(_))
        ));
        engine.remove_task(ids[1]).unwrap();
        assert!(matches!(
            engine.task(ids[1]),
            Err(EngineError::TaskNotFound(_))
        ));
    }
}
