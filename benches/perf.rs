use criterion::{Criterion, criterion_group, criterion_main};
use rusqlite::Connection;
use serde_json::{Value, json};
use std::hint::black_box;

use nhl_sync::mapper::to_event_rows;
use nhl_sync::records::{GameRow, PlayByPlay};
use nhl_sync::schema::ensure_schema;
use nhl_sync::store;

const GAME_ID: i64 = 2016020001;

fn sample_play_by_play(plays: usize) -> Value {
    let plays = (0..plays)
        .map(|i| {
            json!({
                "eventId": i + 1,
                "sortOrder": i + 1,
                "periodDescriptor": {"number": 1 + i / 100, "periodType": "REG"},
                "timeInPeriod": "05:40",
                "timeRemaining": "14:20",
                "situationCode": "1551",
                "typeCode": 506,
                "typeDescKey": "shot-on-goal",
                "details": {
                    "xCoord": (i % 90) as i64 - 45,
                    "yCoord": (i % 40) as i64 - 20,
                    "shotType": "wrist",
                    "shootingPlayerId": 8479318,
                    "goalieInNetId": 8471679,
                    "eventOwnerTeamId": 10,
                    "zoneCode": "O"
                }
            })
        })
        .collect::<Vec<_>>();
    json!({
        "startTimeUTC": "2016-10-12T23:00:00Z",
        "venue": {"default": "Air Canada Centre"},
        "homeTeam": {"id": 10, "commonName": {"default": "Maple Leafs"}, "abbrev": "TOR"},
        "awayTeam": {"id": 8, "commonName": {"default": "Canadiens"}, "abbrev": "MTL"},
        "plays": plays,
        "rosterSpots": [
            {"teamId": 10, "playerId": 8479318, "sweaterNumber": 34, "positionCode": "C"},
            {"teamId": 8, "playerId": 8471679, "sweaterNumber": 31, "positionCode": "G"}
        ]
    })
}

fn seeded_store() -> Connection {
    let mut conn = Connection::open_in_memory().expect("sqlite");
    ensure_schema(&mut conn).expect("schema");
    store::ensure_season_stub(&conn, Some(20162017)).expect("season");
    store::ensure_team_stub(&conn, Some(10)).expect("home");
    store::ensure_team_stub(&conn, Some(8)).expect("away");
    let game = GameRow {
        game_id: GAME_ID,
        season_id: Some(20162017),
        home_team_id: Some(10),
        away_team_id: Some(8),
        ..GameRow::default()
    };
    store::upsert(&mut conn, &[game]).expect("game");
    conn
}

fn bench_perf(c: &mut Criterion) {
    let raw = sample_play_by_play(350);
    c.bench_function("map_play_by_play_350", |b| {
        b.iter(|| to_event_rows(black_box(&raw), GAME_ID))
    });

    let PlayByPlay { events, .. } = to_event_rows(&raw, GAME_ID);
    let mut conn = seeded_store();
    c.bench_function("upsert_events_350", |b| {
        b.iter(|| store::upsert(&mut conn, black_box(&events)).expect("upsert"))
    });
}

criterion_group!(benches, bench_perf);
criterion_main!(benches);
