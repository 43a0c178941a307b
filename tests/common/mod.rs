#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use nhl_sync::config::SyncConfig;
use nhl_sync::fixture_source::FixtureProvider;
use nhl_sync::schema;

pub const SEASON: i64 = 20162017;
pub const OPENER: i64 = 2016020001;
pub const MISSING_PBP: i64 = 2016020002;
pub const ALL_STAR: i64 = 2016040001;

pub fn fixture_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("league");
    path
}

pub fn fixture_json(name: &str) -> Value {
    let raw =
        fs::read_to_string(fixture_dir().join(name)).expect("fixture file should be readable");
    serde_json::from_str(&raw).expect("fixture should be valid json")
}

pub fn league_provider() -> FixtureProvider {
    FixtureProvider::from_dir(&fixture_dir()).expect("fixture dir should load")
}

pub fn one_season() -> SyncConfig {
    SyncConfig::default().with_seasons([SEASON])
}

pub fn memory_store() -> Connection {
    let mut conn = Connection::open_in_memory().expect("in-memory sqlite");
    schema::ensure_schema(&mut conn).expect("schema");
    conn
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).expect("count query")
}

/// Every row of every table rendered as text, sorted, for whole-store
/// comparisons.
pub fn dump(conn: &Connection) -> Vec<String> {
    let mut out = Vec::new();
    for table in ["Season", "Team", "Game", "Event", "Player", "Roster"] {
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {table}"))
            .expect("prepare dump");
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                let mut cells = Vec::with_capacity(width);
                for i in 0..width {
                    cells.push(format!("{:?}", row.get::<_, SqlValue>(i)?));
                }
                Ok(format!("{table}|{}", cells.join("|")))
            })
            .expect("dump rows");
        for row in rows {
            out.push(row.expect("dump row"));
        }
    }
    out.sort();
    out
}
