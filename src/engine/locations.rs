//! Location registry: rack / layer / space slots
//!
//! A slot holds at most one unit and a unit holds at most one slot. The link
//! is stored on both sides (`locations.product_sn`, `products.location_id`),
//! each backed by a UNIQUE column, and every write updates both.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::lifecycle::find_unit;
use super::Engine;
use crate::domain::{
    EngineError, EngineResult, Location, SerialNumber, SlotAddress, Visibility,
};

const LOCATION_SELECT: &str =
    "SELECT id, rack_name, layer_number, space_number, product_sn FROM locations";

/// Upper bound on the slots one rack may be provisioned with
pub const MAX_RACK_SLOTS: u32 = 10_000;

fn map_location(row: &Row<'_>) -> rusqlite::Result<Location> {
    let occupant: Option<String> = row.get(4)?;
    let occupant = occupant
        .map(|sn| sn.parse::<SerialNumber>())
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Location {
        id: row.get(0)?,
        address: SlotAddress {
            rack: row.get(1)?,
            layer: row.get(2)?,
            space: row.get(3)?,
        },
        occupant,
    })
}

fn query_locations(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> EngineResult<Vec<Location>> {
    let mut stmt = conn.prepare(&format!(
        "{} {} ORDER BY rack_name, layer_number, space_number",
        LOCATION_SELECT, filter
    ))?;
    let locations = stmt
        .query_map(params, map_location)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(locations)
}

fn try_find_location(conn: &Connection, address: &SlotAddress) -> EngineResult<Option<Location>> {
    let location = conn
        .query_row(
            &format!(
                "{} WHERE rack_name = ?1 AND layer_number = ?2 AND space_number = ?3",
                LOCATION_SELECT
            ),
            params![address.rack, address.layer, address.space],
            map_location,
        )
        .optional()?;
    Ok(location)
}

pub(crate) fn find_location(conn: &Connection, address: &SlotAddress) -> EngineResult<Location> {
    try_find_location(conn, address)?
        .ok_or_else(|| EngineError::LocationNotFound(address.to_string()))
}

fn insert_slot(conn: &Connection, address: &SlotAddress) -> EngineResult<Location> {
    if address.rack.trim().is_empty() {
        return Err(EngineError::EmptyField("Rack name"));
    }
    if address.layer == 0 || address.space == 0 {
        return Err(EngineError::InvalidRackShape);
    }
    if try_find_location(conn, address)?.is_some() {
        return Err(EngineError::DuplicateLocation(address.clone()));
    }

    conn.execute(
        "INSERT INTO locations (rack_name, layer_number, space_number) VALUES (?1, ?2, ?3)",
        params![address.rack, address.layer, address.space],
    )?;

    Ok(Location {
        id: conn.last_insert_rowid(),
        address: address.clone(),
        occupant: None,
    })
}

/// Links `serial` to the slot at `address`. Re-assigning a unit to the slot
/// it already holds changes nothing.
pub(crate) fn assign_slot(
    conn: &Connection,
    serial: &str,
    address: &SlotAddress,
) -> EngineResult<Location> {
    let unit = find_unit(conn, serial, Visibility::Live)?;
    let mut location = find_location(conn, &address.normalized())?;

    match &location.occupant {
        Some(occupant) if *occupant == unit.serial => return Ok(location),
        Some(occupant) => {
            return Err(EngineError::LocationOccupied {
                location: location.address,
                occupant: occupant.to_string(),
            })
        }
        None => {}
    }
    if let Some(held) = unit.location {
        return Err(EngineError::UnitAlreadyLocated {
            serial: unit.serial.to_string(),
            location: held,
        });
    }

    conn.execute(
        "UPDATE locations SET product_sn = ?1 WHERE id = ?2",
        params![unit.serial.as_str(), location.id],
    )?;
    conn.execute(
        "UPDATE products SET location_id = ?1, updated_at = ?2 WHERE sn = ?3",
        params![location.id, Utc::now(), unit.serial.as_str()],
    )?;

    info!(serial = %unit.serial, location = %location.address, "location assigned");
    location.occupant = Some(unit.serial);
    Ok(location)
}

/// Clears the unit's slot link on both sides, returning the freed address
pub(crate) fn release_slot(conn: &Connection, serial: &str) -> EngineResult<Option<SlotAddress>> {
    let held: Option<i64> = conn
        .query_row(
            "SELECT location_id FROM products WHERE sn = ?1",
            params![serial],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| EngineError::UnitNotFound(serial.to_string()))?;

    let Some(location_id) = held else {
        return Ok(None);
    };

    let address = conn.query_row(
        "SELECT rack_name, layer_number, space_number FROM locations WHERE id = ?1",
        params![location_id],
        |row| {
            Ok(SlotAddress {
                rack: row.get(0)?,
                layer: row.get(1)?,
                space: row.get(2)?,
            })
        },
    )?;

    conn.execute(
        "UPDATE products SET location_id = NULL, updated_at = ?1 WHERE sn = ?2",
        params![Utc::now(), serial],
    )?;
    conn.execute(
        "UPDATE locations SET product_sn = NULL WHERE id = ?1",
        params![location_id],
    )?;

    info!(serial, location = %address, "location released");
    Ok(Some(address))
}

/// Deletes every slot matching `filter`, refusing if any is occupied
fn remove_slots(
    conn: &Connection,
    target: String,
    filter: &str,
    params: &[&dyn rusqlite::ToSql],
) -> EngineResult<usize> {
    let (total, occupied): (u64, u64) = conn.query_row(
        &format!(
            "SELECT COUNT(*), COUNT(product_sn) FROM locations WHERE {}",
            filter
        ),
        params,
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    if total == 0 {
        return Err(EngineError::LocationNotFound(target));
    }
    if occupied > 0 {
        return Err(EngineError::LocationsOccupied {
            target,
            count: occupied,
        });
    }

    let removed = conn.execute(&format!("DELETE FROM locations WHERE {}", filter), params)?;
    info!(scope = %target, removed, "locations removed");
    Ok(removed)
}

impl Engine {
    /// Creates `layers * spaces_per_layer` empty slots numbered from 1.
    ///
    /// Fails without creating anything if any of the slots already exists.
    pub fn provision_rack(
        &self,
        rack: &str,
        layers: u32,
        spaces_per_layer: u32,
    ) -> EngineResult<Vec<Location>> {
        let rack = rack.trim();
        if rack.is_empty() {
            return Err(EngineError::EmptyField("Rack name"));
        }
        let total = layers
            .checked_mul(spaces_per_layer)
            .filter(|&total| total > 0 && total <= MAX_RACK_SLOTS)
            .ok_or(EngineError::InvalidRackShape)?;

        self.db.write(|tx| {
            let mut created = Vec::with_capacity(total as usize);
            for layer in 1..=layers {
                for space in 1..=spaces_per_layer {
                    created.push(insert_slot(tx, &SlotAddress::new(rack, layer, space))?);
                }
            }

            info!(rack, layers, spaces_per_layer, "rack provisioned");
            Ok(created)
        })
    }

    /// Creates a single empty slot
    pub fn add_slot(&self, address: &SlotAddress) -> EngineResult<Location> {
        let address = address.normalized();
        self.db.write(|tx| {
            let location = insert_slot(tx, &address)?;
            info!(location = %address, "slot added");
            Ok(location)
        })
    }

    /// Puts a unit into an empty slot
    pub fn assign(&self, serial: &str, address: &SlotAddress) -> EngineResult<Location> {
        self.db.write(|tx| assign_slot(tx, serial, address))
    }

    /// Frees the unit's slot; `None` if it held none
    pub fn release(&self, serial: &str) -> EngineResult<Option<SlotAddress>> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            release_slot(tx, unit.serial.as_str())
        })
    }

    /// Moves a unit to another slot, releasing the old one
    pub fn relocate(&self, serial: &str, address: &SlotAddress) -> EngineResult<Location> {
        self.db.write(|tx| {
            let unit = find_unit(tx, serial, Visibility::Live)?;
            if unit.location != Some(address.normalized()) {
                release_slot(tx, unit.serial.as_str())?;
            }
            assign_slot(tx, unit.serial.as_str(), address)
        })
    }

    /// Deletes all slots of one layer
    pub fn remove_layer(&self, rack: &str, layer: u32) -> EngineResult<usize> {
        let rack = rack.trim();
        self.db.write(|tx| {
            remove_slots(
                tx,
                format!("{} - Layer {}", rack, layer),
                "rack_name = ?1 AND layer_number = ?2",
                &[&rack, &layer],
            )
        })
    }

    /// Deletes all slots of a rack
    pub fn remove_rack(&self, rack: &str) -> EngineResult<usize> {
        let rack = rack.trim();
        self.db
            .write(|tx| remove_slots(tx, rack.to_string(), "rack_name = ?1", &[&rack]))
    }

    /// Free slots of one layer, by space number
    pub fn empty_slots(&self, rack: &str, layer: u32) -> EngineResult<Vec<Location>> {
        self.db.read(|conn| {
            query_locations(
                conn,
                "WHERE rack_name = ?1 AND layer_number = ?2 AND product_sn IS NULL",
                params![rack.trim(), layer],
            )
        })
    }

    /// All slots, or those of one rack
    pub fn slots(&self, rack: Option<&str>) -> EngineResult<Vec<Location>> {
        self.db.read(|conn| match rack {
            Some(rack) => query_locations(conn, "WHERE rack_name = ?1", params![rack.trim()]),
            None => query_locations(conn, "", []),
        })
    }

    /// Distinct rack names
    pub fn racks(&self) -> EngineResult<Vec<String>> {
        self.db.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT rack_name FROM locations ORDER BY rack_name")?;
            let racks = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(racks)
        })
    }

    /// Layers of a rack that still have a free slot
    pub fn empty_layers(&self, rack: &str) -> EngineResult<Vec<u32>> {
        self.db.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT layer_number FROM locations
                 WHERE rack_name = ?1 AND product_sn IS NULL
                 ORDER BY layer_number",
            )?;
            let layers = stmt
                .query_map(params![rack.trim()], |row| row.get(0))?
                .collect::<Result<Vec<u32>, _>>()?;
            Ok(layers)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::MAX_RACK_SLOTS;
    use crate::domain::{EngineError, ErrorKind, NewUnit, SlotAddress};
    use crate::engine::Engine;

    const X: &str = "1000000000001";
    const Y: &str = "1000000000002";

    fn setup() -> Engine {
        let engine = Engine::in_memory().unwrap();
        engine.add_category("PSU").unwrap();
        engine.create_unit(NewUnit::new(X, "PSU")).unwrap();
        engine.create_unit(NewUnit::new(Y, "PSU")).unwrap();
        engine.provision_rack("A", 2, 3).unwrap();
        engine
    }

    #[test]
    fn test_provision_rack_numbers_from_one() {
        let engine = setup();
        let slots = engine.slots(Some("A")).unwrap();

        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0].address, SlotAddress::new("A", 1, 1));
        assert_eq!(slots[5].address, SlotAddress::new("A", 2, 3));
        assert!(slots.iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_provision_overlap_is_atomic() {
        let engine = setup();
        // B is new, but the A triples collide
        engine.provision_rack("B", 1, 1).unwrap();
        let err = engine.provision_rack("A", 3, 3).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateLocation(_)));
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(engine.slots(Some("A")).unwrap().len(), 6);
    }

    #[test]
    fn test_provision_rejects_empty_shape() {
        let engine = setup();
        let err = engine.provision_rack("C", 0, 4).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRackShape));
    }

    #[test]
    fn test_provision_rejects_oversized_shape() {
        let engine = setup();

        let err = engine.provision_rack("C", 65_536, 65_536).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRackShape));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = engine.provision_rack("C", MAX_RACK_SLOTS + 1, 1).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRackShape));
        assert!(engine.slots(Some("C")).unwrap().is_empty());
    }

    #[test]
    fn test_assign_trims_rack_name() {
        let engine = setup();
        engine.provision_rack(" B ", 1, 1).unwrap();

        let location = engine.assign(X, &SlotAddress::new(" B", 1, 1)).unwrap();
        assert_eq!(location.address, SlotAddress::new("B", 1, 1));

        // Relocating onto the slot already held is a no-op
        engine.relocate(X, &SlotAddress::new("B ", 1, 1)).unwrap();
        assert_eq!(
            engine.unit(X).unwrap().location,
            Some(SlotAddress::new("B", 1, 1))
        );
    }

    #[test]
    fn test_assign_links_both_sides() {
        let engine = setup();
        let slot = SlotAddress::new("A", 1, 2);
        engine.assign(X, &slot).unwrap();

        assert_eq!(engine.unit(X).unwrap().location, Some(slot.clone()));
        let empty: Vec<_> = engine
            .empty_slots("A", 1)
            .unwrap()
            .into_iter()
            .map(|l| l.address.space)
            .collect();
        assert_eq!(empty, vec![1, 3]);

        // Same slot again is a no-op
        engine.assign(X, &slot).unwrap();
    }

    #[test]
    fn test_assign_occupied_slot_fails() {
        let engine = setup();
        let slot = SlotAddress::new("A", 1, 1);
        engine.assign(X, &slot).unwrap();

        let err = engine.assign(Y, &slot).unwrap_err();
        assert!(matches!(err, EngineError::LocationOccupied { ref occupant, .. } if occupant == X));
        assert_eq!(engine.unit(X).unwrap().location, Some(slot));
        assert_eq!(engine.unit(Y).unwrap().location, None);
    }

    #[test]
    fn test_assign_second_slot_needs_release() {
        let engine = setup();
        engine.assign(X, &SlotAddress::new("A", 1, 1)).unwrap();

        let err = engine.assign(X, &SlotAddress::new("A", 1, 2)).unwrap_err();
        assert!(matches!(err, EngineError::UnitAlreadyLocated { .. }));

        assert_eq!(
            engine.release(X).unwrap(),
            Some(SlotAddress::new("A", 1, 1))
        );
        assert_eq!(engine.release(X).unwrap(), None);
        engine.assign(X, &SlotAddress::new("A", 1, 2)).unwrap();
    }

    #[test]
    fn test_relocate_moves_unit() {
        let engine = setup();
        engine.assign(X, &SlotAddress::new("A", 1, 1)).unwrap();
        engine.assign(Y, &SlotAddress::new("A", 1, 2)).unwrap();

        // Occupied target: nothing changes
        assert!(engine.relocate(X, &SlotAddress::new("A", 1, 2)).is_err());
        assert_eq!(
            engine.unit(X).unwrap().location,
            Some(SlotAddress::new("A", 1, 1))
        );

        engine.relocate(X, &SlotAddress::new("A", 2, 1)).unwrap();
        assert_eq!(
            engine.unit(X).unwrap().location,
            Some(SlotAddress::new("A", 2, 1))
        );
        assert_eq!(engine.empty_slots("A", 1).unwrap().len(), 2);
    }

    #[test]
    fn test_remove_layer_blocked_while_occupied() {
        let engine = setup();
        engine.assign(X, &SlotAddress::new("A", 2, 3)).unwrap();

        let err = engine.remove_layer("A", 2).unwrap_err();
        assert!(matches!(err, EngineError::LocationsOccupied { count: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert!(engine.remove_rack("A").is_err());

        assert_eq!(engine.remove_layer("A", 1).unwrap(), 3);
        assert_eq!(engine.empty_layers("A").unwrap(), vec![2]);
        assert!(matches!(
            engine.remove_layer("A", 1),
            Err(EngineError::LocationNotFound(_))
        ));
    }

    #[test]
    fn test_remove_rack() {
        let engine = setup();
        engine.provision_rack("B", 1, 2).unwrap();
        assert_eq!(engine.racks().unwrap(), vec!["A", "B"]);

        assert_eq!(engine.remove_rack("B").unwrap(), 2);
        assert_eq!(engine.racks().unwrap(), vec!["A"]);
    }

    #[test]
    fn test_add_slot_duplicate() {
        let engine = setup();
        engine.add_slot(&SlotAddress::new("A", 3, 1)).unwrap();
        let err = engine.add_slot(&SlotAddress::new("A", 3, 1)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateLocation(_)));
    }
}
