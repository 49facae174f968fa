//! Location CLI commands

use anyhow::{anyhow, Result};
use clap::Subcommand;

use super::open_engine;
use super::output::Output;
use crate::domain::{Location, SlotAddress};

#[derive(Subcommand)]
pub enum LocationCommands {
    /// Create a rack of empty slots
    Provision {
        rack: String,
        layers: u32,
        spaces_per_layer: u32,
    },

    /// Create a single slot (RACK:LAYER:SPACE)
    Add {
        #[arg(value_parser = parse_slot)]
        slot: SlotAddress,
    },

    /// List slots
    List {
        /// Only this rack
        #[arg(long)]
        rack: Option<String>,
    },

    /// List rack names
    Racks,

    /// List free slots of a layer, or layers with free slots
    Empty {
        rack: String,
        layer: Option<u32>,
    },

    /// Put a unit into an empty slot
    Assign {
        serial: String,
        #[arg(value_parser = parse_slot)]
        slot: SlotAddress,
    },

    /// Free a unit's slot
    Release {
        serial: String,
    },

    /// Move a unit to another slot
    Relocate {
        serial: String,
        #[arg(value_parser = parse_slot)]
        slot: SlotAddress,
    },

    /// Remove every slot of an empty layer
    RemoveLayer {
        rack: String,
        layer: u32,
    },

    /// Remove every slot of an empty rack
    RemoveRack {
        rack: String,
    },
}

/// Parses `RACK:LAYER:SPACE`, e.g. `A:2:7`
pub fn parse_slot(value: &str) -> Result<SlotAddress> {
    let mut parts = value.rsplitn(3, ':');
    let (space, layer, rack) = match (parts.next(), parts.next(), parts.next()) {
        (Some(space), Some(layer), Some(rack)) if !rack.trim().is_empty() => (space, layer, rack),
        _ => return Err(anyhow!("expected RACK:LAYER:SPACE, got '{}'", value)),
    };

    let layer = layer
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid layer number '{}'", layer))?;
    let space = space
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid space number '{}'", space))?;

    Ok(SlotAddress::new(rack.trim(), layer, space))
}

pub fn run(cmd: LocationCommands, output: &Output) -> Result<()> {
    let engine = open_engine(output)?;

    match cmd {
        LocationCommands::Provision {
            rack,
            layers,
            spaces_per_layer,
        } => {
            let slots = engine.provision_rack(&rack, layers, spaces_per_layer)?;
            if output.is_json() {
                output.data(&slots);
            } else {
                output.success(&format!(
                    "Provisioned rack {} with {} slots",
                    rack.trim(),
                    slots.len()
                ));
            }
        }
        LocationCommands::Add { slot } => {
            let location = engine.add_slot(&slot)?;
            if output.is_json() {
                output.data(&location);
            } else {
                output.success(&format!("Added slot {}", location.address));
            }
        }
        LocationCommands::List { rack } => {
            let slots = engine.slots(rack.as_deref())?;
            output.render(&slots, |slots| print_slots(slots));
        }
        LocationCommands::Racks => {
            let racks = engine.racks()?;
            output.render(&racks, |racks| {
                for rack in racks {
                    println!("{}", rack);
                }
            });
        }
        LocationCommands::Empty { rack, layer } => match layer {
            Some(layer) => {
                let slots = engine.empty_slots(&rack, layer)?;
                output.render(&slots, |slots| print_slots(slots));
            }
            None => {
                let layers = engine.empty_layers(&rack)?;
                output.render(&layers, |layers| {
                    for layer in layers {
                        println!("Layer {}", layer);
                    }
                });
            }
        },
        LocationCommands::Assign { serial, slot } => {
            let location = engine.assign(&serial, &slot)?;
            if output.is_json() {
                output.data(&location);
            } else {
                output.success(&format!("Assigned {} to {}", serial.trim(), location.address));
            }
        }
        LocationCommands::Release { serial } => {
            let released = engine.release(&serial)?;
            if output.is_json() {
                output.data(&serde_json::json!({ "serial": serial.trim(), "released": released }));
            } else {
                match released {
                    Some(slot) => output.success(&format!("Released {} from {}", serial.trim(), slot)),
                    None => output.success(&format!("{} held no location", serial.trim())),
                }
            }
        }
        LocationCommands::Relocate { serial, slot } => {
            let location = engine.relocate(&serial, &slot)?;
            if output.is_json() {
                output.data(&location);
            } else {
                output.success(&format!("Moved {} to {}", serial.trim(), location.address));
            }
        }
        LocationCommands::RemoveLayer { rack, layer } => {
            let removed = engine.remove_layer(&rack, layer)?;
            output.success(&format!(
                "Removed {} slots from {} layer {}",
                removed,
                rack.trim(),
                layer
            ));
        }
        LocationCommands::RemoveRack { rack } => {
            let removed = engine.remove_rack(&rack)?;
            output.success(&format!("Removed rack {} ({} slots)", rack.trim(), removed));
        }
    }

    Ok(())
}

fn print_slots(slots: &[Location]) {
    if slots.is_empty() {
        println!("No slots.");
        return;
    }
    println!("{:<28} OCCUPANT", "SLOT");
    for slot in slots {
        let occupant = slot
            .occupant
            .as_ref()
            .map(|sn| sn.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<28} {}", slot.address.to_string(), occupant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_slot_triples() {
        assert_eq!(parse_slot("A:2:7").unwrap(), SlotAddress::new("A", 2, 7));
        // Rack names may contain colons; the last two fields are numbers
        assert_eq!(
            parse_slot("Bay:3:1:4").unwrap(),
            SlotAddress::new("Bay:3", 1, 4)
        );
    }

    #[test]
    fn rejects_malformed_slots() {
        assert!(parse_slot("A:2").is_err());
        assert!(parse_slot(":1:1").is_err());
        assert!(parse_slot("A:x:1").is_err());
    }
}
