//! Task catalog CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::open_engine;
use super::output::Output;
use crate::domain::TaskId;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Define a reusable task
    Add {
        /// What to do
        name: String,

        #[arg(long, short)]
        description: Option<String>,
    },

    /// List the task catalog
    List,

    /// Remove a task nothing refers to
    Remove {
        id: TaskId,
    },

    /// Map a task onto a status
    ///
    /// Examples:
    ///   rma task map "Repair" 3                      # Ad hoc task for Repair
    ///   rma task map "Repair" 3 --predefined --order 1
    Map {
        status: String,
        task: TaskId,

        /// Assign the task to every unit entering the status
        #[arg(long)]
        predefined: bool,

        /// Position among the status's predefined tasks (1-based)
        #[arg(long)]
        order: Option<u32>,
    },

    /// Put a task at a position in a status's predefined list
    Place {
        status: String,
        task: TaskId,
        position: u32,
    },

    /// Remove a status mapping
    Unmap {
        status: String,
        task: TaskId,
    },
}

pub fn run(cmd: TaskCommands, output: &Output) -> Result<()> {
    let engine = open_engine(output)?;

    match cmd {
        TaskCommands::Add { name, description } => {
            let task = engine.define_task(&name, description.as_deref())?;
            if output.is_json() {
                output.data(&task);
            } else {
                output.success(&format!("Defined task {}: {}", task.id, task.name));
            }
        }
        TaskCommands::List => {
            let tasks = engine.tasks()?;
            output.render(&tasks, |tasks| {
                if tasks.is_empty() {
                    println!("No tasks defined.");
                    return;
                }
                println!("{:<6} {:<32} DESCRIPTION", "ID", "TASK");
                for task in tasks {
                    println!(
                        "{:<6} {:<32} {}",
                        task.id,
                        task.name,
                        task.description.as_deref().unwrap_or("")
                    );
                }
            });
        }
        TaskCommands::Remove { id } => {
            engine.remove_task(id)?;
            output.success(&format!("Removed task {}", id));
        }
        TaskCommands::Map {
            status,
            task,
            predefined,
            order,
        } => {
            let mapping = engine.map_task_to_status(&status, task, predefined, order)?;
            if output.is_json() {
                output.data(&mapping);
            } else {
                let position = mapping
                    .order
                    .map(|o| format!(" at position {}", o))
                    .unwrap_or_default();
                output.success(&format!(
                    "Mapped '{}' to '{}'{}",
                    mapping.task_name,
                    status.trim(),
                    position
                ));
            }
        }
        TaskCommands::Place {
            status,
            task,
            position,
        } => {
            let mapping = engine.insert_predefined_at(&status, task, position)?;
            if output.is_json() {
                output.data(&mapping);
            } else {
                output.success(&format!(
                    "Placed '{}' at position {} of '{}'",
                    mapping.task_name,
                    position,
                    status.trim()
                ));
            }
        }
        TaskCommands::Unmap { status, task } => {
            engine.remove_mapping(&status, task)?;
            output.success(&format!("Unmapped task {} from '{}'", task, status.trim()));
        }
    }

    Ok(())
}
