use serde_json::{Map, Value};

use crate::records::{
    EventRow, GameMeta, GameRow, PlayByPlay, PlayerRow, RosterRow, RosterSpot, SeasonRow,
    ShotProjection, TeamRow,
};

const ROSTER_GROUPS: [&str; 3] = ["forwards", "defensemen", "goalies"];

/// Items of a stats-API listing. Accepts `{"data": [...]}` or a bare array.
pub fn list_items(raw: &Value) -> &[Value] {
    if let Some(arr) = raw.as_array() {
        return arr;
    }
    raw.get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn to_season_row(raw: &Value) -> Option<SeasonRow> {
    Some(SeasonRow {
        season_id: int_at(raw, "id")?,
        formatted_season_id: str_at(raw, "formattedSeasonId"),
        start_date: str_at(raw, "startDate"),
        end_date: str_at(raw, "endDate"),
        regular_season_end_date: str_at(raw, "regularSeasonEndDate"),
        preseason_start_date: str_at(raw, "preseasonStartdate"),
        number_of_games: int_at(raw, "numberOfGames"),
        total_regular_season_games: int_at(raw, "totalRegularSeasonGames"),
        total_playoff_games: int_at(raw, "totalPlayoffGames"),
        season_ordinal: int_at(raw, "seasonOrdinal"),
        conferences_in_use: flag_at(raw, "conferencesInUse"),
        divisions_in_use: flag_at(raw, "divisionsInUse"),
        wildcard_in_use: flag_at(raw, "wildcardInUse"),
        ties_in_use: flag_at(raw, "tiesInUse"),
        point_for_ot_loss_in_use: flag_at(raw, "pointForOTLossInUse"),
        row_in_use: flag_at(raw, "rowInUse"),
        all_star_game_in_use: flag_at(raw, "allStarGameInUse"),
        entry_draft_in_use: flag_at(raw, "entryDraftInUse"),
        supplemental_draft_in_use: flag_at(raw, "supplementalDraftInUse"),
        stanley_cup_owner: int_at(raw, "nhlStanleyCupOwner"),
        min_playoff_minutes_goalie_leaders: int_at(
            raw,
            "minimumPlayoffMinutesForGoalieStatsLeaders",
        ),
        min_regular_games_goalie_leaders: int_at(raw, "minimumRegularGamesForGoalieStatsLeaders"),
        olympics_participation: flag_at(raw, "olympicsParticipation"),
    })
}

pub fn to_team_row(raw: &Value) -> Option<TeamRow> {
    Some(TeamRow {
        team_id: int_at(raw, "id")?,
        franchise_id: int_at(raw, "franchiseId"),
        full_name: str_at(raw, "fullName"),
        league_id: int_at(raw, "leagueId"),
        raw_tricode: str_at(raw, "rawTricode"),
        tri_code: str_at(raw, "triCode"),
    })
}

pub fn to_embedded_team_row(raw: &Value) -> Option<TeamRow> {
    Some(TeamRow {
        team_id: int_at(raw, "id")?,
        full_name: localized_at(raw, "commonName").or_else(|| str_at(raw, "fullName")),
        tri_code: str_at(raw, "abbrev"),
        ..TeamRow::default()
    })
}

pub fn to_game_row(raw: &Value) -> Option<GameRow> {
    Some(GameRow {
        game_id: int_at(raw, "id").or_else(|| int_at(raw, "gameId"))?,
        season_id: int_at(raw, "season"),
        game_date: str_at(raw, "gameDate"),
        game_type: int_at(raw, "gameType"),
        game_number: int_at(raw, "gameNumber"),
        game_schedule_state_id: int_at(raw, "gameScheduleStateId"),
        game_state_id: int_at(raw, "gameStateId"),
        period: int_at(raw, "period"),
        home_team_id: int_at(raw, "homeTeamId"),
        away_team_id: int_at(raw, "visitingTeamId").or_else(|| int_at(raw, "awayTeamId")),
        home_score: int_at(raw, "homeScore"),
        away_score: int_at(raw, "visitingScore").or_else(|| int_at(raw, "awayScore")),
        ..GameRow::default()
    })
}

fn to_player_row(raw: &Value, id_key: &str) -> Option<PlayerRow> {
    Some(PlayerRow {
        player_id: int_at(raw, id_key).filter(|id| *id != 0)?,
        first_name: localized_at(raw, "firstName"),
        last_name: localized_at(raw, "lastName"),
        headshot: str_at(raw, "headshot"),
        shoots_catches: str_at(raw, "shootsCatches"),
        position_code: str_at(raw, "positionCode"),
        birth_date: str_at(raw, "birthDate"),
        birth_city: localized_at(raw, "birthCity"),
        birth_state_province: localized_at(raw, "birthStateProvince"),
        birth_country: str_at(raw, "birthCountry"),
        height_in_inches: int_at(raw, "heightInInches"),
        weight_in_pounds: int_at(raw, "weightInPounds"),
        height_in_centimeters: int_at(raw, "heightInCentimeters"),
        weight_in_kilograms: int_at(raw, "weightInKilograms"),
    })
}

/// One entry of a team roster document, scoped to `season_id`/`team_id`.
pub fn to_player_and_roster_rows(
    raw: &Value,
    season_id: i64,
    team_id: i64,
) -> Option<(PlayerRow, RosterRow)> {
    let player = to_player_row(raw, "id")?;
    let roster = RosterRow {
        season_id,
        team_id,
        player_id: player.player_id,
        sweater_number: int_at(raw, "sweaterNumber"),
        position_code: player.position_code.clone(),
    };
    Some((player, roster))
}

pub fn to_roster_rows(
    raw: &Value,
    season_id: i64,
    team_id: i64,
) -> (Vec<PlayerRow>, Vec<RosterRow>) {
    let mut players = Vec::new();
    let mut rosters = Vec::new();
    for group in ROSTER_GROUPS {
        let Some(entries) = raw.get(group).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            if let Some((player, roster)) = to_player_and_roster_rows(entry, season_id, team_id) {
                players.push(player);
                rosters.push(roster);
            }
        }
    }
    (players, rosters)
}

fn to_roster_spot(raw: &Value) -> Option<RosterSpot> {
    let team_id = int_at(raw, "teamId").filter(|id| *id != 0)?;
    let player = to_player_row(raw, "playerId")?;
    Some(RosterSpot {
        team_id,
        sweater_number: int_at(raw, "sweaterNumber"),
        position_code: player.position_code.clone(),
        player,
    })
}

/// Shot-specific columns read from an event's `details` object.
pub fn project_shot(details: &Value) -> ShotProjection {
    ShotProjection {
        x_coord: float_at(details, "xCoord"),
        y_coord: float_at(details, "yCoord"),
        shot_type: str_at(details, "shotType"),
        shooting_player_id: int_at(details, "scoringPlayerId")
            .or_else(|| int_at(details, "shootingPlayerId")),
        goalie_in_net_id: int_at(details, "goalieInNetId"),
        zone_code: str_at(details, "zoneCode"),
        empty_net: flag_at(details, "emptyNet"),
    }
}

/// Same projection, starting from the stored `details_json` text. Unparseable
/// text projects to all-`None`.
pub fn project_shot_json(details_json: &str) -> ShotProjection {
    match serde_json::from_str::<Value>(details_json) {
        Ok(details) => project_shot(&details),
        Err(_) => ShotProjection::default(),
    }
}

fn to_event_row(raw: &Value, game_id: i64) -> Option<EventRow> {
    let event_id = int_at(raw, "eventId")?;
    let period_descriptor = raw.get("periodDescriptor").filter(|v| v.is_object());
    let details = raw.get("details").filter(|v| v.is_object());
    let (shot, details_json) = match details {
        Some(d) => (project_shot(d), serde_json::to_string(d).ok()),
        None => (ShotProjection::default(), None),
    };
    let detail_int = |k: &str| details.and_then(|d| int_at(d, k));
    let detail_str = |k: &str| details.and_then(|d| str_at(d, k));

    Some(EventRow {
        game_id,
        event_id,
        period: period_descriptor
            .and_then(|p| int_at(p, "number"))
            .or_else(|| int_at(raw, "period")),
        period_type: period_descriptor.and_then(|p| str_at(p, "periodType")),
        time_in_period: str_at(raw, "timeInPeriod"),
        time_remaining: str_at(raw, "timeRemaining"),
        type_code: int_at(raw, "typeCode"),
        type_desc_key: str_at(raw, "typeDescKey"),
        sort_order: int_at(raw, "sortOrder"),
        penalty_type_code: detail_str("typeCode"),
        penalty_duration: detail_int("duration"),
        committed_by_player_id: detail_int("committedByPlayerId"),
        event_owner_team_id: detail_int("eventOwnerTeamId"),
        details_json,
        shot,
        situation_code: str_at(raw, "situationCode")
            .or_else(|| period_descriptor.and_then(|p| str_at(p, "situationCode"))),
        home_team_defending_side: str_at(raw, "homeTeamDefendingSide"),
    })
}

/// Normalizes a play-by-play document for `game_id`. Events keep upstream
/// order; plays without an `eventId` are dropped.
pub fn to_event_rows(raw: &Value, game_id: i64) -> PlayByPlay {
    let plays = raw
        .get("plays")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let events = plays
        .iter()
        .filter_map(|p| to_event_row(p, game_id))
        .collect::<Vec<_>>();

    let meta = GameMeta {
        start_time_utc: str_at(raw, "startTimeUTC"),
        venue: localized_at(raw, "venue"),
        venue_location: localized_at(raw, "venueLocation"),
        has_plays: !events.is_empty(),
    };

    let teams = ["homeTeam", "awayTeam"]
        .iter()
        .filter_map(|side| raw.get(side))
        .filter_map(to_embedded_team_row)
        .collect();

    let roster_spots = raw
        .get("rosterSpots")
        .and_then(Value::as_array)
        .map(|spots| spots.iter().filter_map(to_roster_spot).collect())
        .unwrap_or_default();

    PlayByPlay {
        meta,
        teams,
        events,
        roster_spots,
    }
}

fn int_at(v: &Value, key: &str) -> Option<i64> {
    as_i64_any(v.get(key)?)
}

fn float_at(v: &Value, key: &str) -> Option<f64> {
    let raw = v.get(key)?;
    if let Some(n) = raw.as_f64() {
        return Some(n);
    }
    raw.as_str()?.trim().parse::<f64>().ok()
}

fn str_at(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads `{"default": "..."}` localized strings, falling back to a plain string.
fn localized_at(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::Object(map) => default_of(map),
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn default_of(map: &Map<String, Value>) -> Option<String> {
    map.get("default")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn flag_at(v: &Value, key: &str) -> Option<bool> {
    match v.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim() {
            "1" | "true" | "Y" => Some(true),
            "0" | "false" | "N" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}
