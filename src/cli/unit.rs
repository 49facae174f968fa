//! Unit CLI commands

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use super::location::parse_slot;
use super::open_engine;
use super::output::Output;
use crate::domain::{
    ChecklistEntry, NewUnit, Priority, ShortTest, SlotAddress, StatusStay, Unit, Visibility,
};

#[derive(Subcommand)]
pub enum UnitCommands {
    /// Check in a new unit
    ///
    /// Examples:
    ///   rma unit add 1234567890123 --category PSU
    ///   rma unit add 1234567890123 --category PSU --priority hot --short-test F12 --slot A:1:4
    Add {
        /// 13-digit serial number
        serial: String,

        #[arg(long, short)]
        category: String,

        /// normal, hot or zfa
        #[arg(long, default_value = "normal")]
        priority: Priority,

        /// P, F12 or F48
        #[arg(long, default_value = "P")]
        short_test: ShortTest,

        #[arg(long, short)]
        description: Option<String>,

        /// Empty slot to put the unit in (RACK:LAYER:SPACE)
        #[arg(long, value_parser = parse_slot)]
        slot: Option<SlotAddress>,
    },

    /// Check in every unit listed in a JSON file
    Import {
        /// JSON array of {serial, category, priority?, short_test?, description?, location?}
        file: PathBuf,
    },

    /// Show a unit
    Show {
        serial: String,
    },

    /// List units
    List {
        /// Include removed units
        #[arg(long)]
        all: bool,
    },

    /// Show where a unit sits and its status
    Where {
        serial: String,
    },

    /// Replace a unit's description
    Describe {
        serial: String,
        description: String,
    },

    /// Soft-delete a unit and free its slot
    Remove {
        serial: String,
    },

    /// Move a unit to the next status
    Move {
        serial: String,
        status: String,
    },

    /// Create a new status on the fly and move the unit into it
    Enter {
        serial: String,
        status: String,

        #[arg(long, short)]
        description: Option<String>,
    },

    /// Show a unit's checklist
    Checklist {
        serial: String,

        /// Only active entries
        #[arg(long)]
        active: bool,
    },

    /// Show every status a unit has been through
    History {
        serial: String,
    },
}

pub fn run(cmd: UnitCommands, output: &Output) -> Result<()> {
    let engine = open_engine(output)?;

    match cmd {
        UnitCommands::Add {
            serial,
            category,
            priority,
            short_test,
            description,
            slot,
        } => {
            let mut new = NewUnit::new(serial, category)
                .with_priority(priority)
                .with_short_test(short_test)
                .with_description(description.unwrap_or_default());
            if let Some(slot) = slot {
                new = new.with_location(slot);
            }

            let unit = engine.create_unit(new)?;
            if output.is_json() {
                output.data(&unit);
            } else {
                output.success(&format!("Checked in {} ({})", unit.serial, unit.status));
            }
        }
        UnitCommands::Import { file } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let units: Vec<NewUnit> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            output.verbose_ctx("import", &format!("Checking in {} units", units.len()));

            let report = engine.check_in_batch(units);
            let failed: Vec<_> = report
                .failed
                .iter()
                .map(|(serial, err)| {
                    serde_json::json!({
                        "serial": serial,
                        "kind": err.kind().as_str(),
                        "error": err.to_string(),
                    })
                })
                .collect();

            if output.is_json() {
                output.data(&serde_json::json!({
                    "succeeded": report.succeeded,
                    "failed": failed,
                }));
            } else {
                println!("Checked in {} of {} units", report.succeeded.len(), report.len());
                for (serial, err) in &report.failed {
                    println!("  {}: {}", serial, err);
                }
            }
        }
        UnitCommands::Show { serial } => {
            let unit = engine.unit(&serial)?;
            output.render(&unit, print_unit);
        }
        UnitCommands::List { all } => {
            let visibility = if all {
                Visibility::IncludeRemoved
            } else {
                Visibility::Live
            };
            let units = engine.units(visibility)?;
            output.render(&units, |units| print_units(units));
        }
        UnitCommands::Where { serial } => {
            let placement = engine.product_location(&serial)?;
            output.render(&placement, |placement| {
                let slot = placement
                    .location
                    .as_ref()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "no location".to_string());
                println!("{}: {} ({})", placement.serial, slot, placement.status);
            });
        }
        UnitCommands::Describe {
            serial,
            description,
        } => {
            let unit = engine.describe_unit(&serial, &description)?;
            if output.is_json() {
                output.data(&unit);
            } else {
                output.success(&format!("Updated description of {}", unit.serial));
            }
        }
        UnitCommands::Remove { serial } => {
            engine.remove_unit(&serial)?;
            output.success(&format!("Removed unit {}", serial.trim()));
        }
        UnitCommands::Move { serial, status } => {
            let unit = engine.change_status(&serial, &status)?;
            if output.is_json() {
                output.data(&unit);
            } else {
                output.success(&format!("{} is now in '{}'", unit.serial, unit.status));
            }
        }
        UnitCommands::Enter {
            serial,
            status,
            description,
        } => {
            let unit = engine.enter_new_status(&serial, &status, description.as_deref())?;
            if output.is_json() {
                output.data(&unit);
            } else {
                output.success(&format!("{} is now in new status '{}'", unit.serial, unit.status));
            }
        }
        UnitCommands::Checklist { serial, active } => {
            let entries = engine.checklist(&serial, active)?;
            output.render(&entries, |entries| print_checklist(entries));
        }
        UnitCommands::History { serial } => {
            let stays = engine.status_history(&serial)?;
            output.render(&stays, |stays| print_history(stays));
        }
    }

    Ok(())
}

fn print_unit(unit: &Unit) {
    println!("Serial:      {}", unit.serial);
    println!("Category:    {}", unit.category);
    println!("Status:      {}", unit.status);
    println!("Priority:    {}", unit.priority.label());
    println!("Short test:  {}", unit.short_test.label());
    match &unit.location {
        Some(slot) => println!("Location:    {}", slot),
        None => println!("Location:    -"),
    }
    match unit.current_task {
        Some(task) => println!("Task:        {}", task),
        None => println!("Task:        -"),
    }
    if !unit.description.is_empty() {
        println!("Description: {}", unit.description);
    }
    if unit.is_removed {
        println!("Removed:     yes");
    }
}

fn print_units(units: &[Unit]) {
    if units.is_empty() {
        println!("No units.");
        return;
    }
    println!(
        "{:<15} {:<12} {:<8} {:<24} LOCATION",
        "SERIAL", "CATEGORY", "PRIORITY", "STATUS"
    );
    for unit in units {
        let location = unit
            .location
            .as_ref()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<15} {:<12} {:<8} {:<24} {}",
            unit.serial.as_str(),
            unit.category,
            unit.priority.label(),
            unit.status,
            location
        );
    }
}

fn print_checklist(entries: &[ChecklistEntry]) {
    if entries.is_empty() {
        println!("Checklist is empty.");
        return;
    }
    println!("{:<4} {:<6} {:<10} {:<28} RESULT", "#", "ENTRY", "STATE", "TASK");
    for entry in entries {
        println!(
            "{:<4} {:<6} {:<10} {:<28} {}",
            entry.order,
            entry.id,
            entry.state().label(),
            entry.task_name,
            entry.result
        );
    }
}

fn print_history(stays: &[StatusStay]) {
    for stay in stays {
        println!(
            "{}  {}",
            stay.changed_at.format("%Y-%m-%d %H:%M"),
            stay.summary_line()
        );
    }
}
