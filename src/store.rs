use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::records::{GameMeta, TeamRow};

/// How an existing row is merged with an incoming one on key conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// A null incoming value keeps the stored value.
    Enrich,
    /// Incoming values replace stored values, nulls included.
    Overwrite,
    /// Listed columns enrich, every other column overwrites.
    CoalesceSpecific(&'static [&'static str]),
}

impl MergePolicy {
    fn enriches(&self, column: &str) -> bool {
        match self {
            MergePolicy::Enrich => true,
            MergePolicy::Overwrite => false,
            MergePolicy::CoalesceSpecific(cols) => cols.contains(&column),
        }
    }
}

pub trait Record {
    const TABLE: &'static str;
    const CONFLICT_KEY: &'static [&'static str];
    const COLUMNS: &'static [&'static str];
    const POLICY: MergePolicy;

    fn values(&self) -> Vec<SqlValue>;
}

pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create db dir {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")
        .context("enable wal journal")?;
    Ok(conn)
}

pub fn upsert_sql(
    table: &str,
    conflict_key: &[&str],
    columns: &[&str],
    policy: MergePolicy,
) -> String {
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = columns
        .iter()
        .filter(|col| !conflict_key.contains(col))
        .map(|col| {
            if policy.enriches(col) {
                format!("{col} = COALESCE(excluded.{col}, {col})")
            } else {
                format!("{col} = excluded.{col}")
            }
        })
        .collect::<Vec<_>>();
    let on_conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {table} ({}) VALUES ({placeholders}) ON CONFLICT({}) {on_conflict}",
        columns.join(", "),
        conflict_key.join(", "),
    )
}

pub fn upsert<R: Record>(conn: &mut Connection, rows: &[R]) -> rusqlite::Result<usize> {
    upsert_with(conn, rows, R::POLICY)
}

/// Either every row of the batch commits or none does.
pub fn upsert_with<R: Record>(
    conn: &mut Connection,
    rows: &[R],
    policy: MergePolicy,
) -> rusqlite::Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    let written = upsert_in_with(&tx, rows, policy)?;
    tx.commit()?;
    Ok(written)
}

/// Same as [`upsert`] but joins the caller's open transaction.
pub fn upsert_in<R: Record>(conn: &Connection, rows: &[R]) -> rusqlite::Result<usize> {
    upsert_in_with(conn, rows, R::POLICY)
}

pub fn upsert_in_with<R: Record>(
    conn: &Connection,
    rows: &[R],
    policy: MergePolicy,
) -> rusqlite::Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    let sql = upsert_sql(R::TABLE, R::CONFLICT_KEY, R::COLUMNS, policy);
    let mut stmt = conn.prepare_cached(&sql)?;
    for row in rows {
        stmt.execute(params_from_iter(row.values()))?;
    }
    Ok(rows.len())
}

pub fn ensure_season_stub(conn: &Connection, season_id: Option<i64>) -> rusqlite::Result<()> {
    if let Some(id) = season_id {
        conn.execute(
            "INSERT OR IGNORE INTO Season(season_id) VALUES (?1)",
            params![id],
        )?;
    }
    Ok(())
}

pub fn ensure_team_stub(conn: &Connection, team_id: Option<i64>) -> rusqlite::Result<()> {
    if let Some(id) = team_id {
        conn.execute(
            "INSERT OR IGNORE INTO Team(team_id) VALUES (?1)",
            params![id],
        )?;
    }
    Ok(())
}

/// Team objects embedded in game payloads only fill gaps: the team list keeps
/// authority over names it already supplied.
pub fn fill_team_gaps(conn: &Connection, teams: &[TeamRow]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO Team(team_id, fullName, triCode) VALUES (?1, ?2, ?3)
         ON CONFLICT(team_id) DO UPDATE SET
           fullName = COALESCE(fullName, excluded.fullName),
           triCode  = COALESCE(triCode, excluded.triCode)",
    )?;
    for team in teams {
        stmt.execute(params![team.team_id, team.full_name, team.tri_code])?;
    }
    Ok(teams.len())
}

pub fn table_has_rows(conn: &Connection, table: &str) -> Result<bool> {
    let found = conn
        .query_row(&format!("SELECT 1 FROM {table} LIMIT 1"), [], |_| Ok(()))
        .optional()
        .with_context(|| format!("check rows of {table}"))?;
    Ok(found.is_some())
}

/// True when at least one row has `column` populated, i.e. the table holds
/// more than stubs.
pub fn table_has_populated(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let found = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE {column} IS NOT NULL LIMIT 1"),
            [],
            |_| Ok(()),
        )
        .optional()
        .with_context(|| format!("check {table}.{column}"))?;
    Ok(found.is_some())
}

pub fn existing_ids(conn: &Connection, table: &str, id_col: &str) -> Result<HashSet<i64>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {id_col} FROM {table}"))
        .with_context(|| format!("prepare id scan of {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .with_context(|| format!("scan ids of {table}"))?;
    let mut out = HashSet::new();
    for row in rows {
        out.insert(row.context("decode id")?);
    }
    Ok(out)
}

pub fn roster_exists(conn: &Connection, season_id: i64, team_id: i64) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM Roster WHERE season_id = ?1 AND team_id = ?2 LIMIT 1",
            params![season_id, team_id],
            |_| Ok(()),
        )
        .optional()
        .context("look up roster")?;
    Ok(found.is_some())
}

/// `None` when the game is unknown, `Some(None)` when the flag is undetermined.
pub fn game_has_plays(conn: &Connection, game_id: i64) -> Result<Option<Option<bool>>> {
    conn.query_row(
        "SELECT hasPlays FROM Game WHERE game_id = ?1",
        params![game_id],
        |row| Ok(row.get::<_, Option<i64>>(0)?.map(|v| v != 0)),
    )
    .optional()
    .context("read hasPlays")
}

pub fn set_has_plays(
    conn: &Connection,
    game_id: i64,
    has_plays: bool,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE Game SET hasPlays = ?1 WHERE game_id = ?2",
        params![has_plays as i64, game_id],
    )
}

/// Writes the play-by-play meta of a game. Venue and start time enrich, the
/// has-plays flag is always set.
pub fn update_game_meta(
    conn: &Connection,
    game_id: i64,
    meta: &GameMeta,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE Game
            SET startTimeUTC  = COALESCE(?1, startTimeUTC),
                venue         = COALESCE(?2, venue),
                venueLocation = COALESCE(?3, venueLocation),
                hasPlays      = ?4
          WHERE game_id = ?5",
        params![
            meta.start_time_utc,
            meta.venue,
            meta.venue_location,
            meta.has_plays as i64,
            game_id
        ],
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRefs {
    pub season_id: Option<i64>,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
}

pub fn game_refs(conn: &Connection, game_id: i64) -> rusqlite::Result<Option<GameRefs>> {
    conn.query_row(
        "SELECT season_id, homeTeamId, awayTeamId FROM Game WHERE game_id = ?1",
        params![game_id],
        |row| {
            Ok(GameRefs {
                season_id: row.get(0)?,
                home_team_id: row.get(1)?,
                away_team_id: row.get(2)?,
            })
        },
    )
    .optional()
}

pub fn team_tricode(conn: &Connection, team_id: i64) -> Result<Option<String>> {
    let code = conn
        .query_row(
            "SELECT COALESCE(triCode, rawTricode) FROM Team WHERE team_id = ?1",
            params![team_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .context("read team tricode")?;
    Ok(code.flatten().filter(|c| !c.trim().is_empty()))
}

pub fn teams_with_tricode(conn: &Connection) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn
        .prepare(
            "SELECT team_id, COALESCE(triCode, rawTricode) FROM Team
             WHERE triCode IS NOT NULL OR rawTricode IS NOT NULL
             ORDER BY team_id",
        )
        .context("prepare team scan")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)))
        .context("scan teams")?;
    let mut out = Vec::new();
    for row in rows {
        let (id, code) = row.context("decode team row")?;
        if let Some(code) = code.filter(|c| !c.trim().is_empty()) {
            out.push((id, code));
        }
    }
    Ok(out)
}

pub fn games_without_events(conn: &Connection, seasons: &[i64]) -> Result<Vec<i64>> {
    if seasons.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = (1..=seasons.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT g.game_id FROM Game g
         WHERE g.season_id IN ({placeholders})
           AND NOT EXISTS (SELECT 1 FROM Event e WHERE e.game_id = g.game_id)
         ORDER BY g.game_id"
    );
    let mut stmt = conn.prepare(&sql).context("prepare candidate scan")?;
    let rows = stmt
        .query_map(params_from_iter(seasons.iter()), |row| row.get::<_, i64>(0))
        .context("scan candidate games")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode game id")?);
    }
    Ok(out)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .with_context(|| format!("count {table}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrich_sql_coalesces_non_key_columns() {
        let sql = upsert_sql("Team", &["team_id"], &["team_id", "fullName"], MergePolicy::Enrich);
        assert!(sql.contains("ON CONFLICT(team_id) DO UPDATE SET"));
        assert!(sql.contains("fullName = COALESCE(excluded.fullName, fullName)"));
        assert!(!sql.contains("team_id = "));
    }

    #[test]
    fn coalesce_specific_mixes_both_rules() {
        let sql = upsert_sql(
            "Event",
            &["game_id", "eventId"],
            &["game_id", "eventId", "period", "situationCode"],
            MergePolicy::CoalesceSpecific(&["situationCode"]),
        );
        assert!(sql.contains("period = excluded.period"));
        assert!(sql.contains("situationCode = COALESCE(excluded.situationCode, situationCode)"));
        assert!(sql.contains("ON CONFLICT(game_id, eventId)"));
    }

    #[test]
    fn key_only_records_do_nothing_on_conflict() {
        let sql = upsert_sql("Season", &["season_id"], &["season_id"], MergePolicy::Overwrite);
        assert!(sql.ends_with("ON CONFLICT(season_id) DO NOTHING"));
    }
}
