mod common;

use rusqlite::params;
use serde_json::json;

use common::{ALL_STAR, count, fixture_json, memory_store};
use nhl_sync::config::ALL_STAR_GAME_TYPE;
use nhl_sync::fixture_source::FixtureProvider;
use nhl_sync::provider::Selector;
use nhl_sync::records::{EventRow, GameRow, TeamRow};
use nhl_sync::repair::{self, COORD_SENTINEL};
use nhl_sync::store;

const GAME: i64 = 2016020001;

fn seed_game(conn: &mut rusqlite::Connection, game: GameRow) {
    store::ensure_season_stub(conn, game.season_id).expect("season stub");
    store::ensure_team_stub(conn, game.home_team_id).expect("home stub");
    store::ensure_team_stub(conn, game.away_team_id).expect("away stub");
    store::upsert(conn, &[game]).expect("game");
}

fn regular_game() -> GameRow {
    GameRow {
        game_id: GAME,
        season_id: Some(20162017),
        game_type: Some(2),
        home_team_id: Some(10),
        away_team_id: Some(8),
        ..GameRow::default()
    }
}

fn raw_event(event_id: i64, details: Option<&str>) -> EventRow {
    EventRow {
        game_id: GAME,
        event_id,
        type_desc_key: Some("shot-on-goal".to_string()),
        details_json: details.map(str::to_string),
        ..EventRow::default()
    }
}

#[test]
fn backfill_converges_in_bounded_batches() {
    let mut conn = memory_store();
    seed_game(&mut conn, regular_game());
    let snap = r#"{"xCoord": 61, "yCoord": 17, "shotType": "snap", "shootingPlayerId": 8476853}"#;
    store::upsert(
        &mut conn,
        &[
            raw_event(1, Some(snap)),
            raw_event(2, Some(r#"{"zoneCode": "D", "committedByPlayerId": 8474056}"#)),
            raw_event(3, Some(r#"{"xCoord": -40}"#)),
            raw_event(4, Some("{not json")),
            raw_event(5, None),
        ],
    )
    .expect("raw events");

    let report = repair::backfill_event_columns(&mut conn, 2).expect("backfill");
    assert_eq!(report.rewritten, 4);
    assert_eq!(report.batches, 2);
    assert_eq!(report.coords_missing, 2);

    assert_eq!(
        count(
            &conn,
            "SELECT COUNT(*) FROM Event WHERE details_json IS NOT NULL AND xCoord IS NULL"
        ),
        0
    );
    let (x, y, shooter, shot_type): (f64, f64, i64, String) = conn
        .query_row(
            "SELECT xCoord, yCoord, shootingPlayerId, shotType FROM Event WHERE eventId = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .expect("event 1");
    assert_eq!((x, y), (61.0, 17.0));
    assert_eq!(shooter, 8476853);
    assert_eq!(shot_type, "snap");

    let (x, y, zone): (f64, f64, String) = conn
        .query_row(
            "SELECT xCoord, yCoord, zoneCode FROM Event WHERE eventId = 2",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .expect("event 2");
    assert_eq!((x, y), (COORD_SENTINEL, COORD_SENTINEL));
    assert_eq!(zone, "D");

    let y: f64 = conn
        .query_row("SELECT yCoord FROM Event WHERE eventId = 3", [], |row| row.get(0))
        .expect("event 3");
    assert_eq!(y, COORD_SENTINEL);

    let x: Option<f64> = conn
        .query_row("SELECT xCoord FROM Event WHERE eventId = 5", [], |row| row.get(0))
        .expect("event 5");
    assert_eq!(x, None);

    let again = repair::backfill_event_columns(&mut conn, 2).expect("second pass");
    assert_eq!(again.rewritten, 0);
}

#[test]
fn nameless_all_star_teams_are_named_from_play_by_play() {
    let mut conn = memory_store();
    store::upsert(&mut conn, &[TeamRow::stub(87), TeamRow::stub(88)]).expect("stubs");
    seed_game(
        &mut conn,
        GameRow {
            game_id: ALL_STAR,
            season_id: Some(20162017),
            game_type: Some(ALL_STAR_GAME_TYPE),
            home_team_id: Some(87),
            away_team_id: Some(88),
            ..GameRow::default()
        },
    );
    let provider = FixtureProvider::new().with(
        Selector::PlayByPlay(ALL_STAR),
        fixture_json("pbp-2016040001.json"),
    );

    let repaired = repair::repair_team_names(&conn, &provider, ALL_STAR_GAME_TYPE).expect("repair");
    assert_eq!(repaired, 2);
    let name: String = conn
        .query_row("SELECT fullName FROM Team WHERE team_id = 87", [], |row| row.get(0))
        .expect("team 87");
    assert_eq!(name, "Atlantic");

    provider.clear_served();
    assert_eq!(
        repair::repair_team_names(&conn, &provider, ALL_STAR_GAME_TYPE).expect("again"),
        0
    );
    assert!(provider.served().is_empty());
}

#[test]
fn team_repair_ignores_regular_games_and_failed_fetches() {
    let mut conn = memory_store();
    seed_game(&mut conn, regular_game());
    let provider = FixtureProvider::new().with(
        Selector::PlayByPlay(GAME),
        json!({"homeTeam": {"id": 10, "commonName": {"default": "Maple Leafs"}}}),
    );
    let repaired = repair::repair_team_names(&conn, &provider, ALL_STAR_GAME_TYPE).expect("repair");
    assert_eq!(repaired, 0);
    assert!(provider.served().is_empty());

    conn.execute(
        "UPDATE Game SET gameType = ?1 WHERE game_id = ?2",
        params![ALL_STAR_GAME_TYPE, GAME],
    )
    .expect("retype");
    let empty = FixtureProvider::new();
    assert_eq!(
        repair::repair_team_names(&conn, &empty, ALL_STAR_GAME_TYPE).expect("missing pbp"),
        0
    );
}

#[test]
fn has_plays_follows_stored_events_and_never_clears() {
    let mut conn = memory_store();
    seed_game(&mut conn, regular_game());
    seed_game(
        &mut conn,
        GameRow {
            game_id: GAME + 1,
            has_plays: Some(true),
            ..regular_game()
        },
    );
    store::upsert(&mut conn, &[raw_event(1, None)]).expect("event");

    assert_eq!(repair::reconcile_has_plays(&conn).expect("reconcile"), 1);
    let flags: Vec<Option<i64>> = conn
        .prepare("SELECT hasPlays FROM Game ORDER BY game_id")
        .and_then(|mut stmt| {
            stmt.query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .expect("flags");
    assert_eq!(flags, vec![Some(1), Some(1)]);
    assert_eq!(repair::reconcile_has_plays(&conn).expect("again"), 0);
}
