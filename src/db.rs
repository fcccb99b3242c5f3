use crate::types::Car;
use chrono::Local;
use rusqlite::{params, Connection, Result};
use std::path::Path;

pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS car (
            reg_number TEXT NOT NULL PRIMARY KEY,
            make_model TEXT,
            body_type TEXT,
            colour TEXT,
            year TEXT,
            is_corrected INTEGER NOT NULL,
            recognized_at TEXT NOT NULL,
            verified_at TEXT NOT NULL
        ) WITHOUT ROWID",
        [],
    )?;
    Ok(conn)
}

/// Inserts a verified car; returns false if the registration was already saved.
pub fn record_verified(conn: &Connection, car: &Car) -> Result<bool> {
    let vehicle = car.vehicle.clone().unwrap_or_default();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO car (reg_number, make_model, body_type, colour, year, is_corrected, recognized_at, verified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            car.reg_number,
            vehicle.make_model,
            vehicle.body_type,
            vehicle.colour,
            vehicle.year,
            car.is_corrected,
            car.recognized_at.to_rfc3339(),
            Local::now().to_rfc3339(),
        ],
    )?;
    Ok(inserted > 0)
}

pub fn verified_plates(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT reg_number FROM car ORDER BY verified_at, reg_number")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}
