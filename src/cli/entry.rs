//! Checklist entry CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::open_engine;
use super::output::Output;
use crate::domain::{ChecklistEntry, EntryId, TaskId};

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Show one checklist entry
    Show {
        id: EntryId,
    },

    /// Mark an entry completed
    Done {
        id: EntryId,

        /// What was found or done
        #[arg(long, short)]
        result: Option<String>,
    },

    /// Mark an entry skipped
    Skip {
        id: EntryId,

        /// Why it was skipped
        #[arg(long, short)]
        result: Option<String>,
    },

    /// Set or clear an entry's note
    Note {
        id: EntryId,

        /// New note (omit to clear)
        note: Option<String>,
    },

    /// Insert a task into a unit's checklist
    Insert {
        serial: String,
        task: TaskId,

        /// 1-based position; defaults to the end of the checklist
        #[arg(long)]
        position: Option<u32>,
    },
}

pub fn run(cmd: EntryCommands, output: &Output) -> Result<()> {
    let engine = open_engine(output)?;

    match cmd {
        EntryCommands::Show { id } => {
            let entry = engine.checklist_entry(id)?;
            output.render(&entry, print_entry);
        }
        EntryCommands::Done { id, result } => {
            let entry = engine.complete_task(id, result.as_deref())?;
            report(output, &entry, "Completed");
        }
        EntryCommands::Skip { id, result } => {
            let entry = engine.skip_task(id, result.as_deref())?;
            report(output, &entry, "Skipped");
        }
        EntryCommands::Note { id, note } => {
            let entry = engine.annotate(id, note.as_deref())?;
            report(output, &entry, "Annotated");
        }
        EntryCommands::Insert {
            serial,
            task,
            position,
        } => {
            let position = match position {
                Some(position) => position,
                None => engine.checklist(&serial, false)?.len() as u32 + 1,
            };
            let entry = engine.insert_ad_hoc_task(&serial, task, position)?;
            report(output, &entry, "Inserted");
        }
    }

    Ok(())
}

fn report(output: &Output, entry: &ChecklistEntry, verb: &str) {
    if output.is_json() {
        output.data(entry);
    } else {
        output.success(&format!(
            "{} entry {} ({}) on {}",
            verb, entry.id, entry.task_name, entry.serial
        ));
    }
}

fn print_entry(entry: &ChecklistEntry) {
    println!("Entry:   {}", entry.id);
    println!("Unit:    {}", entry.serial);
    println!("Task:    {} ({})", entry.task_name, entry.task_id);
    println!("Order:   {}", entry.order);
    println!("State:   {}", entry.state().label());
    println!("Result:  {}", entry.result);
    if let Some(note) = &entry.note {
        println!("Note:    {}", note);
    }
}
