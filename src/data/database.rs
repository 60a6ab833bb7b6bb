//! SQLite storage for collected race results

use crate::{RaceEntry, Result};
use rusqlite::{params, Connection};
use std::path::Path;

const ENTRY_COLUMNS: &str = "year, round, event_name, driver, driver_number, team, grid_position,
     finish_position, points, status, q1_time, q2_time, q3_time";

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS race_entries (
                year INTEGER NOT NULL,
                round INTEGER NOT NULL,
                event_name TEXT NOT NULL,
                driver TEXT NOT NULL,
                driver_number INTEGER NOT NULL,
                team TEXT NOT NULL,
                grid_position INTEGER NOT NULL,
                finish_position INTEGER NOT NULL,
                points REAL NOT NULL,
                status TEXT NOT NULL,
                q1_time REAL,
                q2_time REAL,
                q3_time REAL,
                PRIMARY KEY (year, round, driver)
            );

            CREATE INDEX IF NOT EXISTS idx_entries_event ON race_entries(year, round);
            CREATE INDEX IF NOT EXISTS idx_entries_team ON race_entries(team);
            "#,
        )?;
        Ok(())
    }

    /// Insert or update one entry
    pub fn upsert_entry(&self, entry: &RaceEntry) -> Result<()> {
        upsert_with(&self.conn, entry)
    }

    /// Insert or update a batch of entries in one transaction
    pub fn upsert_entries(&mut self, entries: &[RaceEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for entry in entries {
            upsert_with(&tx, entry)?;
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// All entries ordered by (year, round, grid)
    pub fn get_all_entries(&self) -> Result<Vec<RaceEntry>> {
        self.query_entries(
            &format!("SELECT {ENTRY_COLUMNS} FROM race_entries ORDER BY year, round, grid_position"),
            [],
        )
    }

    pub fn get_season_entries(&self, year: u16) -> Result<Vec<RaceEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM race_entries WHERE year = ?1
                 ORDER BY round, grid_position"
            ),
            params![year],
        )
    }

    /// True if any entry exists for the event
    pub fn has_event(&self, year: u16, round: u8) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM race_entries WHERE year = ?1 AND round = ?2",
            params![year, round],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn query_entries<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<RaceEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(params, Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<RaceEntry> {
        Ok(RaceEntry {
            year: row.get(0)?,
            round: row.get(1)?,
            event_name: row.get(2)?,
            driver: row.get(3)?,
            driver_number: row.get(4)?,
            team: row.get(5)?,
            grid_position: row.get(6)?,
            finish_position: row.get(7)?,
            points: row.get(8)?,
            status: row.get(9)?,
            q1_time: row.get(10)?,
            q2_time: row.get(11)?,
            q3_time: row.get(12)?,
        })
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        self.conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT driver), COUNT(DISTINCT team),
                        COUNT(DISTINCT year * 100 + round), MIN(year), MAX(year)
                 FROM race_entries",
                [],
                |row| {
                    Ok(DatabaseStats {
                        entry_count: row.get::<_, i64>(0)? as usize,
                        driver_count: row.get::<_, i64>(1)? as usize,
                        team_count: row.get::<_, i64>(2)? as usize,
                        event_count: row.get::<_, i64>(3)? as usize,
                        first_season: row.get(4)?,
                        last_season: row.get(5)?,
                    })
                },
            )
            .map_err(Into::into)
    }
}

fn upsert_with(conn: &Connection, entry: &RaceEntry) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO race_entries ({ENTRY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(year, round, driver) DO UPDATE SET
                event_name = excluded.event_name,
                driver_number = excluded.driver_number,
                team = excluded.team,
                grid_position = excluded.grid_position,
                finish_position = excluded.finish_position,
                points = excluded.points,
                status = excluded.status,
                q1_time = COALESCE(excluded.q1_time, q1_time),
                q2_time = COALESCE(excluded.q2_time, q2_time),
                q3_time = COALESCE(excluded.q3_time, q3_time)"
        ),
        params![
            entry.year,
            entry.round,
            entry.event_name,
            entry.driver,
            entry.driver_number,
            entry.team,
            entry.grid_position,
            entry.finish_position,
            entry.points,
            entry.status,
            entry.q1_time,
            entry.q2_time,
            entry.q3_time,
        ],
    )?;
    Ok(())
}

/// Database statistics
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub entry_count: usize,
    pub driver_count: usize,
    pub team_count: usize,
    pub event_count: usize,
    pub first_season: Option<u16>,
    pub last_season: Option<u16>,
}
