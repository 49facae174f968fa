//! Status CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::open_engine;
use super::output::Output;
use crate::domain::Status;

#[derive(Subcommand)]
pub enum StatusCommands {
    /// Add a status
    Add {
        /// Status name (unique)
        name: String,

        /// Longer description
        #[arg(long, short)]
        description: Option<String>,

        /// Terminal status: units entering it lose their slot
        #[arg(long)]
        closed: bool,

        /// Statuses that may move into the new one
        #[arg(long = "from", value_name = "STATUS")]
        from: Vec<String>,
    },

    /// List statuses
    List,

    /// Allow units to move from one status to another
    Link {
        from: String,
        to: String,
    },

    /// Show statuses reachable from a status
    Next {
        name: String,
    },

    /// Mark a status terminal, dropping its outgoing transitions
    Close {
        name: String,
    },

    /// Remove an unreferenced status
    Remove {
        name: String,
    },

    /// Show the tasks mapped to a status
    Tasks {
        name: String,

        /// Only predefined tasks
        #[arg(long)]
        predefined: bool,
    },
}

pub fn run(cmd: StatusCommands, output: &Output) -> Result<()> {
    let engine = open_engine(output)?;

    match cmd {
        StatusCommands::Add {
            name,
            description,
            closed,
            from,
        } => {
            let status = if from.is_empty() {
                engine.add_status(&name, description.as_deref(), closed)?
            } else {
                let sources: Vec<&str> = from.iter().map(String::as_str).collect();
                let status =
                    engine.create_status_with_transition(&name, description.as_deref(), &sources)?;
                if closed {
                    engine.close_status(&status.name)?
                } else {
                    status
                }
            };
            if output.is_json() {
                output.data(&status);
            } else {
                output.success(&format!("Added status: {}", status.name));
            }
        }
        StatusCommands::List => {
            let statuses = engine.statuses()?;
            output.render(&statuses, |statuses| print_statuses(statuses));
        }
        StatusCommands::Link { from, to } => {
            let transition = engine.add_transition(&from, &to)?;
            if output.is_json() {
                output.data(&transition);
            } else {
                output.success(&format!("Linked: {} -> {}", from.trim(), to.trim()));
            }
        }
        StatusCommands::Next { name } => {
            let next = engine.possible_next_statuses(&name)?;
            output.render(&next, |next| {
                if next.is_empty() {
                    println!("No outgoing transitions from '{}'.", name.trim());
                }
                for status in next {
                    println!("{}", status.name);
                }
            });
        }
        StatusCommands::Close { name } => {
            let status = engine.close_status(&name)?;
            output.success(&format!("Closed status: {}", status.name));
        }
        StatusCommands::Remove { name } => {
            engine.remove_status(&name)?;
            output.success(&format!("Removed status: {}", name.trim()));
        }
        StatusCommands::Tasks { name, predefined } => {
            let mappings = if predefined {
                engine.predefined_tasks_of(&name)?
            } else {
                engine.status_tasks_of(&name)?
            };
            output.render(&mappings, |mappings| {
                if mappings.is_empty() {
                    println!("No tasks mapped to '{}'.", name.trim());
                    return;
                }
                println!("{:<6} {:<8} TASK", "ORDER", "TASK ID");
                for mapping in mappings {
                    let order = mapping
                        .order
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("{:<6} {:<8} {}", order, mapping.task_id, mapping.task_name);
                }
            });
        }
    }

    Ok(())
}

fn print_statuses(statuses: &[Status]) {
    if statuses.is_empty() {
        println!("No statuses.");
        return;
    }
    println!("{:<28} {:<8} DESCRIPTION", "STATUS", "CLOSED");
    for status in statuses {
        println!(
            "{:<28} {:<8} {}",
            status.name,
            if status.is_closed { "yes" } else { "no" },
            status.description.as_deref().unwrap_or("")
        );
    }
}
