use rusqlite::Connection;
use tempfile::tempdir;

use nhl_sync::error::SchemaError;
use nhl_sync::schema::{self, SCHEMA_VERSION, TABLES};
use nhl_sync::store;

#[test]
fn fresh_store_gets_every_table_and_the_version_stamp() {
    let dir = tempdir().expect("tempdir");
    let mut conn = store::open_store(&dir.path().join("nhl.sqlite")).expect("open");
    let report = schema::ensure_schema(&mut conn).expect("migrate");

    assert_eq!(report.tables_created.len(), TABLES.len());
    assert!(report.columns_added.is_empty());
    assert_eq!(schema::schema_version(&conn).expect("version"), SCHEMA_VERSION);
    for (table, columns) in schema::schema_inventory(&conn).expect("inventory") {
        let declared = TABLES
            .iter()
            .find(|t| t.name == table)
            .expect("declared table");
        assert_eq!(columns.len(), declared.columns.len(), "{table}");
    }
}

#[test]
fn rerunning_is_a_no_op() {
    let mut conn = Connection::open_in_memory().expect("sqlite");
    schema::ensure_schema(&mut conn).expect("first");
    let second = schema::ensure_schema(&mut conn).expect("second");
    assert!(second.is_noop());
}

#[test]
fn old_event_table_gains_missing_columns_and_keeps_rows() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("old.sqlite");
    {
        let conn = Connection::open(&path).expect("open");
        conn.execute_batch(
            "CREATE TABLE Game (game_id INTEGER PRIMARY KEY, season_id INTEGER, homeScore INTEGER);
             CREATE TABLE Event (
               game_id INTEGER NOT NULL,
               eventId INTEGER NOT NULL,
               typeDescKey TEXT,
               details_json TEXT,
               PRIMARY KEY (game_id, eventId)
             );
             INSERT INTO Game (game_id, season_id, homeScore) VALUES (2016020001, 20162017, 4);
             INSERT INTO Event (game_id, eventId, typeDescKey, details_json)
               VALUES (2016020001, 53, 'goal', '{\"xCoord\": 78, \"yCoord\": -4}');",
        )
        .expect("old layout");
    }

    let mut conn = store::open_store(&path).expect("reopen");
    let report = schema::ensure_schema(&mut conn).expect("migrate");
    assert!(report.columns_added.contains(&"Event.xCoord".to_string()));
    assert!(report.columns_added.contains(&"Game.hasPlays".to_string()));
    assert!(report.tables_created.contains(&"Roster".to_string()));

    let (kind, x): (String, Option<f64>) = conn
        .query_row("SELECT typeDescKey, xCoord FROM Event", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .expect("surviving event");
    assert_eq!(kind, "goal");
    assert_eq!(x, None);

    let index_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'index' AND name = 'idx_event_shooter'",
            [],
            |row| row.get(0),
        )
        .expect("index lookup");
    assert_eq!(index_count, 1);
    assert!(schema::ensure_schema(&mut conn).expect("again").is_noop());
}

#[test]
fn missing_key_column_aborts_without_partial_changes() {
    let mut conn = Connection::open_in_memory().expect("sqlite");
    conn.execute_batch(
        "CREATE TABLE Season (season_id INTEGER PRIMARY KEY);
         CREATE TABLE Roster (season_id INTEGER, player_id INTEGER);",
    )
    .expect("broken layout");

    let err = schema::ensure_schema(&mut conn).expect_err("key column cannot be added");
    assert!(matches!(err, SchemaError::Migration { ref column, .. } if column == "team_id"));

    let team_tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'Team'",
            [],
            |row| row.get(0),
        )
        .expect("table lookup");
    assert_eq!(team_tables, 0);
    assert_eq!(schema::schema_version(&conn).expect("version"), 0);
}
