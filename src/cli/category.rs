//! Category CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::open_engine;
use super::output::Output;

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Add a product category
    Add {
        /// Category name
        name: String,
    },

    /// List categories with their live unit counts
    List,

    /// Remove a category no unit belongs to
    Remove {
        /// Category name
        name: String,
    },
}

pub fn run(cmd: CategoryCommands, output: &Output) -> Result<()> {
    let engine = open_engine(output)?;

    match cmd {
        CategoryCommands::Add { name } => {
            let category = engine.add_category(&name)?;
            if output.is_json() {
                output.data(&category);
            } else {
                output.success(&format!("Added category: {}", category.name));
            }
        }
        CategoryCommands::List => {
            let categories = engine.categories()?;
            output.render(&categories, |categories| {
                if categories.is_empty() {
                    println!("No categories.");
                    return;
                }
                println!("{:<24} UNITS", "CATEGORY");
                for category in categories {
                    println!("{:<24} {}", category.name, category.unit_count);
                }
            });
        }
        CategoryCommands::Remove { name } => {
            engine.remove_category(&name)?;
            output.success(&format!("Removed category: {}", name.trim()));
        }
    }

    Ok(())
}
