use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::mapper;
use crate::provider::{Selector, SourceProvider};
use crate::records::TeamRow;
use crate::store;

/// Stored in both coordinate columns when upstream never sent one, so a
/// derived-but-missing coordinate is distinguishable from a pending one.
pub const COORD_SENTINEL: f64 = 0.0;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub teams_repaired: usize,
    pub events_backfilled: usize,
    /// Backfilled events whose details carried neither coordinate.
    pub coords_missing: usize,
    pub has_plays_reconciled: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub rewritten: usize,
    pub coords_missing: usize,
    pub batches: usize,
}

/// Team names for exhibition sides only show up in those games' play-by-play,
/// so nameless teams are enriched from the exhibition games they played in.
#[instrument(skip(conn, provider))]
pub fn repair_team_names<P: SourceProvider>(
    conn: &Connection,
    provider: &P,
    exhibition_game_type: i64,
) -> Result<usize> {
    if !store::table_has_rows(conn, "Team")? {
        return Ok(0);
    }
    let nameless = conn
        .query_row("SELECT COUNT(*) FROM Team WHERE fullName IS NULL", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("count nameless teams")?;
    if nameless == 0 {
        return Ok(0);
    }

    let game_ids = {
        let mut stmt = conn
            .prepare(
                "SELECT g.game_id FROM Game g
                 WHERE g.gameType = ?1
                   AND EXISTS (
                     SELECT 1 FROM Team t
                     WHERE t.fullName IS NULL
                       AND t.team_id IN (g.homeTeamId, g.awayTeamId))
                 ORDER BY g.game_id",
            )
            .context("prepare exhibition game scan")?;
        let rows = stmt
            .query_map(params![exhibition_game_type], |row| row.get::<_, i64>(0))
            .context("scan exhibition games")?;
        rows.collect::<rusqlite::Result<Vec<i64>>>()
            .context("decode exhibition game id")?
    };

    let mut repaired = 0usize;
    for game_id in game_ids {
        let raw = match provider.fetch(&Selector::PlayByPlay(game_id)) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(game_id, error = %err, "team repair fetch failed");
                continue;
            }
        };
        let teams = mapper::to_event_rows(&raw, game_id)
            .teams
            .into_iter()
            .filter(|t| t.full_name.is_some())
            .collect::<Vec<TeamRow>>();
        repaired += store::fill_team_gaps(conn, &teams)
            .with_context(|| format!("enrich teams of game {game_id}"))?;
    }

    let still_nameless = conn
        .query_row("SELECT COUNT(*) FROM Team WHERE fullName IS NULL", [], |row| {
            row.get::<_, i64>(0)
        })
        .context("count nameless teams")?;
    info!(
        before = nameless,
        after = still_nameless,
        upserts = repaired,
        "team names repaired"
    );
    Ok((nameless - still_nameless).max(0) as usize)
}

/// Re-derives shot columns of events whose details are stored but whose
/// coordinates were never projected. Works from `details_json` only and
/// commits every `batch_size` rows.
#[instrument(skip(conn))]
pub fn backfill_event_columns(conn: &mut Connection, batch_size: usize) -> Result<BackfillReport> {
    let batch_size = batch_size.max(1);
    let mut report = BackfillReport::default();
    loop {
        let pending = {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT game_id, eventId, details_json FROM Event
                     WHERE details_json IS NOT NULL AND xCoord IS NULL
                     LIMIT ?1",
                )
                .context("prepare backfill scan")?;
            let rows = stmt
                .query_map(params![batch_size as i64], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                })
                .context("scan events to backfill")?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .context("decode backfill row")?
        };
        if pending.is_empty() {
            break;
        }

        let tx = conn.transaction().context("begin backfill batch")?;
        {
            let mut update = tx
                .prepare_cached(
                    "UPDATE Event
                        SET xCoord = ?1, yCoord = ?2, shotType = ?3, shootingPlayerId = ?4,
                            goalieInNetId = ?5, zoneCode = ?6, emptyNet = ?7
                      WHERE game_id = ?8 AND eventId = ?9",
                )
                .context("prepare backfill update")?;
            for (game_id, event_id, details_json) in &pending {
                let shot = mapper::project_shot_json(details_json);
                if shot.x_coord.is_none() && shot.y_coord.is_none() {
                    report.coords_missing += 1;
                }
                update
                    .execute(params![
                        shot.x_coord.unwrap_or(COORD_SENTINEL),
                        shot.y_coord.unwrap_or(COORD_SENTINEL),
                        shot.shot_type,
                        shot.shooting_player_id,
                        shot.goalie_in_net_id,
                        shot.zone_code,
                        shot.empty_net.map(i64::from),
                        game_id,
                        event_id,
                    ])
                    .context("rewrite event columns")?;
            }
        }
        tx.commit().context("commit backfill batch")?;

        report.rewritten += pending.len();
        report.batches += 1;
        info!(rewritten = report.rewritten, "backfill progress");
    }
    if report.rewritten > 0 {
        info!(
            rewritten = report.rewritten,
            coords_missing = report.coords_missing,
            "event columns backfilled"
        );
    }
    Ok(report)
}

/// Marks games with stored events as having plays. Never clears a flag.
pub fn reconcile_has_plays(conn: &Connection) -> Result<usize> {
    let changed = conn
        .execute(
            "UPDATE Game SET hasPlays = 1
              WHERE (hasPlays IS NULL OR hasPlays = 0)
                AND EXISTS (SELECT 1 FROM Event e WHERE e.game_id = Game.game_id)",
            [],
        )
        .context("reconcile hasPlays")?;
    if changed > 0 {
        info!(changed, "hasPlays reconciled");
    }
    Ok(changed)
}
