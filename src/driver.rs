use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::SyncConfig;
use crate::error::{FetchError, IngestError, SchemaError, UnitOutcome};
use crate::mapper;
use crate::provider::{Selector, SourceProvider};
use crate::records::{GameRow, PlayByPlay, PlayerRow, RosterRow, SeasonRow, TeamRow};
use crate::repair::{self, RepairReport};
use crate::schema;
use crate::store;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub absent: usize,
    pub transient: usize,
    pub integrity: usize,
    pub rows: usize,
}

impl PhaseReport {
    pub fn record(&mut self, outcome: &UnitOutcome) {
        self.attempted += 1;
        match outcome {
            UnitOutcome::Success { rows } => {
                self.succeeded += 1;
                self.rows += rows;
            }
            UnitOutcome::ConfirmedAbsent => self.absent += 1,
            UnitOutcome::TransientFailure(_) => self.transient += 1,
            UnitOutcome::IntegrityViolation(_) => self.integrity += 1,
        }
    }

    /// Units left for a later run.
    pub fn pending(&self) -> usize {
        self.transient + self.integrity
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub finished_at: String,
    pub seasons: PhaseReport,
    pub teams: PhaseReport,
    pub rosters: PhaseReport,
    pub games: PhaseReport,
    pub events: PhaseReport,
    pub repair: RepairReport,
}

impl RunSummary {
    pub fn phases(&self) -> [(&'static str, &PhaseReport); 5] {
        [
            ("seasons", &self.seasons),
            ("teams", &self.teams),
            ("rosters", &self.rosters),
            ("games", &self.games),
            ("events", &self.events),
        ]
    }
}

fn outcome_of(result: Result<usize, IngestError>) -> UnitOutcome {
    match result {
        Ok(rows) => UnitOutcome::Success { rows },
        Err(err) => err.into(),
    }
}

fn log_outcome(unit: &str, outcome: &UnitOutcome) {
    match outcome {
        UnitOutcome::Success { rows } => debug!(unit, rows, "unit done"),
        UnitOutcome::ConfirmedAbsent => debug!(unit, "absent upstream"),
        UnitOutcome::TransientFailure(reason) => warn!(unit, %reason, "left pending"),
        UnitOutcome::IntegrityViolation(reason) => warn!(unit, %reason, "unusable payload"),
    }
}

pub struct Reconciler<'a, P: SourceProvider> {
    conn: &'a mut Connection,
    provider: P,
    config: SyncConfig,
}

impl<'a, P: SourceProvider> Reconciler<'a, P> {
    pub fn new(
        conn: &'a mut Connection,
        provider: P,
        config: SyncConfig,
    ) -> Result<Self, SchemaError> {
        let report = schema::ensure_schema(conn)?;
        if !report.is_noop() {
            info!(
                tables = report.tables_created.len(),
                columns = report.columns_added.len(),
                "schema migrated"
            );
        }
        Ok(Self {
            conn,
            provider,
            config,
        })
    }

    fn seasons_in_range(&self) -> Vec<i64> {
        self.config.season_range.iter().copied().collect()
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        let started_at = Utc::now().to_rfc3339();
        let seasons = self.sync_seasons()?;
        let teams = self.sync_teams()?;
        let rosters = self.sync_rosters()?;
        let games = self.sync_games()?;
        let events = self.sync_events()?;
        let repair = self.run_repairs()?;
        Ok(RunSummary {
            started_at,
            finished_at: Utc::now().to_rfc3339(),
            seasons,
            teams,
            rosters,
            games,
            events,
            repair,
        })
    }

    pub fn run_repairs(&mut self) -> Result<RepairReport> {
        let teams_repaired = repair::repair_team_names(
            self.conn,
            &self.provider,
            self.config.exhibition_game_type,
        )?;
        let backfill = repair::backfill_event_columns(self.conn, self.config.event_batch_size)?;
        let has_plays_reconciled = repair::reconcile_has_plays(self.conn)?;
        Ok(RepairReport {
            teams_repaired,
            events_backfilled: backfill.rewritten,
            coords_missing: backfill.coords_missing,
            has_plays_reconciled,
        })
    }

    #[instrument(skip(self))]
    pub fn sync_seasons(&mut self) -> Result<PhaseReport> {
        let mut report = PhaseReport::default();
        if store::table_has_populated(self.conn, "Season", "formattedSeasonId")? {
            report.skipped += 1;
            debug!("season table already bootstrapped");
            return Ok(report);
        }
        let outcome = outcome_of(self.write_seasons());
        log_outcome("seasons", &outcome);
        report.record(&outcome);
        info!(rows = report.rows, "seasons synced");
        Ok(report)
    }

    fn write_seasons(&mut self) -> Result<usize, IngestError> {
        let raw = self.provider.fetch(&Selector::Seasons)?;
        let rows = mapper::list_items(&raw)
            .iter()
            .filter_map(mapper::to_season_row)
            .filter(|row| self.config.contains_season(row.season_id))
            .collect::<Vec<SeasonRow>>();
        Ok(store::upsert(self.conn, &rows)?)
    }

    #[instrument(skip(self))]
    pub fn sync_teams(&mut self) -> Result<PhaseReport> {
        let mut report = PhaseReport::default();
        if store::table_has_populated(self.conn, "Team", "leagueId")? {
            report.skipped += 1;
            debug!("team table already bootstrapped");
            return Ok(report);
        }
        let outcome = outcome_of(self.write_teams());
        log_outcome("teams", &outcome);
        report.record(&outcome);
        info!(rows = report.rows, "teams synced");
        Ok(report)
    }

    fn write_teams(&mut self) -> Result<usize, IngestError> {
        let raw = self.provider.fetch(&Selector::Teams)?;
        let rows = mapper::list_items(&raw)
            .iter()
            .filter_map(mapper::to_team_row)
            .collect::<Vec<TeamRow>>();
        Ok(store::upsert(self.conn, &rows)?)
    }

    /// One unit per `(season, team)` pair. A pair with any roster row is
    /// complete; failed or empty pairs are simply retried next run.
    #[instrument(skip(self))]
    pub fn sync_rosters(&mut self) -> Result<PhaseReport> {
        let mut report = PhaseReport::default();
        let teams = store::teams_with_tricode(self.conn)?;
        let checkpoint = self.config.roster_batch_size.max(1);
        for season_id in self.seasons_in_range() {
            for (team_id, tricode) in &teams {
                if store::roster_exists(self.conn, season_id, *team_id)? {
                    report.skipped += 1;
                    continue;
                }
                let outcome = self.roster_unit(season_id, *team_id, tricode);
                log_outcome(&format!("roster {tricode}/{season_id}"), &outcome);
                report.record(&outcome);
                if report.attempted % checkpoint == 0 {
                    info!(
                        attempted = report.attempted,
                        rows = report.rows,
                        "roster progress"
                    );
                }
            }
        }
        info!(
            attempted = report.attempted,
            skipped = report.skipped,
            pending = report.pending(),
            "rosters synced"
        );
        Ok(report)
    }

    fn roster_unit(&mut self, season_id: i64, team_id: i64, tricode: &str) -> UnitOutcome {
        match self.write_roster(season_id, team_id, tricode) {
            Ok(0) => UnitOutcome::ConfirmedAbsent,
            other => outcome_of(other),
        }
    }

    fn write_roster(
        &mut self,
        season_id: i64,
        team_id: i64,
        tricode: &str,
    ) -> Result<usize, IngestError> {
        let raw = self.provider.fetch(&Selector::Roster {
            tricode: tricode.to_string(),
            season_id,
        })?;
        let (players, rosters) = mapper::to_roster_rows(&raw, season_id, team_id);
        if rosters.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        store::ensure_season_stub(&tx, Some(season_id))?;
        store::ensure_team_stub(&tx, Some(team_id))?;
        store::upsert_in(&tx, &players)?;
        store::upsert_in(&tx, &rosters)?;
        tx.commit()?;
        Ok(rosters.len())
    }

    /// True when the pair holds a roster fetched from the roster endpoint,
    /// either already stored or written by this call.
    fn ensure_team_roster(
        &mut self,
        season_id: i64,
        team_id: i64,
        fallback_tricode: Option<&str>,
    ) -> Result<bool> {
        if store::roster_exists(self.conn, season_id, team_id)? {
            return Ok(true);
        }
        let Some(tricode) = store::team_tricode(self.conn, team_id)?
            .or_else(|| fallback_tricode.map(str::to_string))
        else {
            return Ok(false);
        };
        let outcome = self.roster_unit(season_id, team_id, &tricode);
        log_outcome(&format!("roster {tricode}/{season_id}"), &outcome);
        Ok(matches!(outcome, UnitOutcome::Success { .. }))
    }

    #[instrument(skip(self))]
    pub fn sync_games(&mut self) -> Result<PhaseReport> {
        let mut report = PhaseReport::default();
        let mut known = store::existing_ids(self.conn, "Game", "game_id")?;
        for season_id in self.seasons_in_range() {
            let outcome = match self.write_new_games(season_id, &known) {
                Ok(ids) => {
                    let rows = ids.len();
                    known.extend(ids);
                    UnitOutcome::Success { rows }
                }
                Err(err) => err.into(),
            };
            log_outcome(&format!("games {season_id}"), &outcome);
            report.record(&outcome);
        }
        info!(new_games = report.rows, pending = report.pending(), "games synced");
        Ok(report)
    }

    fn write_new_games(
        &mut self,
        season_id: i64,
        known: &HashSet<i64>,
    ) -> Result<Vec<i64>, IngestError> {
        let raw = self.provider.fetch(&Selector::GamesForSeason(season_id))?;
        let mut seen = HashSet::new();
        let rows = mapper::list_items(&raw)
            .iter()
            .filter_map(mapper::to_game_row)
            .filter(|g| !known.contains(&g.game_id) && seen.insert(g.game_id))
            .collect::<Vec<GameRow>>();
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let tx = self.conn.transaction()?;
        for game in &rows {
            store::ensure_season_stub(&tx, game.season_id)?;
            store::ensure_team_stub(&tx, game.home_team_id)?;
            store::ensure_team_stub(&tx, game.away_team_id)?;
        }
        store::upsert_in(&tx, &rows)?;
        tx.commit()?;
        Ok(rows.iter().map(|g| g.game_id).collect())
    }

    #[instrument(skip(self))]
    pub fn sync_events(&mut self) -> Result<PhaseReport> {
        let mut report = PhaseReport::default();
        let candidates = store::games_without_events(self.conn, &self.seasons_in_range())?;
        let checkpoint = self.config.event_batch_size.max(1);
        info!(candidates = candidates.len(), "event candidates");

        for game_id in candidates {
            match store::game_has_plays(self.conn, game_id)? {
                // Decided either way: confirmed empty, or already ingested.
                Some(Some(_)) => {
                    report.skipped += 1;
                    continue;
                }
                Some(None) => {}
                None => continue,
            }
            if self
                .config
                .max_games_per_run
                .is_some_and(|max| report.attempted >= max)
            {
                info!(max = report.attempted, "per-run game budget reached");
                break;
            }
            let outcome = self.ingest_game_events(game_id);
            log_outcome(&format!("events {game_id}"), &outcome);
            report.record(&outcome);
            if report.attempted % checkpoint == 0 {
                info!(
                    attempted = report.attempted,
                    events = report.rows,
                    "event progress"
                );
            }
        }
        info!(
            attempted = report.attempted,
            events = report.rows,
            absent = report.absent,
            pending = report.pending(),
            "events synced"
        );
        Ok(report)
    }

    /// One game's play-by-play. A confirmed-missing document marks the game
    /// empty for good; every other failure leaves the flag untouched.
    pub fn ingest_game_events(&mut self, game_id: i64) -> UnitOutcome {
        match self.write_game_events(game_id) {
            Err(IngestError::Fetch(FetchError::NotFound { .. })) => {
                match store::set_has_plays(self.conn, game_id, false) {
                    Ok(_) => UnitOutcome::ConfirmedAbsent,
                    Err(err) => UnitOutcome::TransientFailure(format!("store: {err}")),
                }
            }
            other => outcome_of(other),
        }
    }

    fn write_game_events(&mut self, game_id: i64) -> Result<usize, IngestError> {
        let raw = self.provider.fetch(&Selector::PlayByPlay(game_id))?;
        let pbp = mapper::to_event_rows(&raw, game_id);
        if pbp.roster_spots.is_empty() {
            return Err(IngestError::Integrity(format!(
                "play-by-play for game {game_id} carries no roster spots"
            )));
        }
        let refs = store::game_refs(self.conn, game_id)?.ok_or_else(|| {
            IngestError::Integrity(format!("game {game_id} must be stored before its events"))
        })?;

        // Spot rows only join rosters the roster endpoint supplied.
        let mut fetched_rosters = HashSet::new();
        if let Some(season_id) = refs.season_id {
            for team_id in [refs.home_team_id, refs.away_team_id].into_iter().flatten() {
                let fallback = pbp
                    .teams
                    .iter()
                    .find(|t| t.team_id == team_id)
                    .and_then(|t| t.tri_code.clone());
                match self.ensure_team_roster(season_id, team_id, fallback.as_deref()) {
                    Ok(true) => {
                        fetched_rosters.insert(team_id);
                    }
                    Ok(false) => {}
                    Err(err) => warn!(game_id, team_id, error = %err, "roster check failed"),
                }
            }
        }

        self.commit_play_by_play(game_id, refs.season_id, &fetched_rosters, &pbp)?;
        Ok(pbp.events.len())
    }

    /// Teams, players, roster spots, game meta and events in one transaction.
    fn commit_play_by_play(
        &mut self,
        game_id: i64,
        season_id: Option<i64>,
        fetched_rosters: &HashSet<i64>,
        pbp: &PlayByPlay,
    ) -> Result<(), IngestError> {
        let players = pbp
            .roster_spots
            .iter()
            .map(|spot| spot.player.clone())
            .collect::<Vec<PlayerRow>>();

        let tx = self.conn.transaction()?;
        store::fill_team_gaps(&tx, &pbp.teams)?;
        store::upsert_in(&tx, &players)?;
        if let Some(season_id) = season_id {
            let rosters = pbp
                .roster_spots
                .iter()
                .filter(|spot| fetched_rosters.contains(&spot.team_id))
                .map(|spot| spot.roster_row(season_id))
                .collect::<Vec<RosterRow>>();
            store::upsert_in(&tx, &rosters)?;
        }
        store::update_game_meta(&tx, game_id, &pbp.meta)?;
        store::upsert_in(&tx, &pbp.events)?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn refresh_game(&mut self, game_id: i64) -> Result<UnitOutcome> {
        let raw = match self.provider.fetch(&Selector::Game(game_id)) {
            Ok(raw) => raw,
            Err(err) => return Ok(IngestError::from(err).into()),
        };
        let Some(game) = mapper::list_items(&raw)
            .iter()
            .filter_map(mapper::to_game_row)
            .find(|g| g.game_id == game_id)
        else {
            return Ok(UnitOutcome::ConfirmedAbsent);
        };

        let tx = self.conn.transaction().context("begin game refresh")?;
        store::ensure_season_stub(&tx, game.season_id)?;
        store::ensure_team_stub(&tx, game.home_team_id)?;
        store::ensure_team_stub(&tx, game.away_team_id)?;
        store::upsert_in(&tx, std::slice::from_ref(&game))?;
        tx.commit().context("commit game refresh")?;

        let outcome = self.ingest_game_events(game_id);
        log_outcome(&format!("events {game_id}"), &outcome);
        Ok(outcome)
    }
}
