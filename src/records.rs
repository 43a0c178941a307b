use rusqlite::types::Value as SqlValue;

use crate::store::{MergePolicy, Record};

fn int(v: Option<i64>) -> SqlValue {
    v.map(SqlValue::Integer).unwrap_or(SqlValue::Null)
}

fn real(v: Option<f64>) -> SqlValue {
    v.map(SqlValue::Real).unwrap_or(SqlValue::Null)
}

fn text(v: &Option<String>) -> SqlValue {
    v.clone().map(SqlValue::Text).unwrap_or(SqlValue::Null)
}

fn flag(v: Option<bool>) -> SqlValue {
    v.map(|b| SqlValue::Integer(b as i64))
        .unwrap_or(SqlValue::Null)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonRow {
    pub season_id: i64,
    pub formatted_season_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub regular_season_end_date: Option<String>,
    pub preseason_start_date: Option<String>,
    pub number_of_games: Option<i64>,
    pub total_regular_season_games: Option<i64>,
    pub total_playoff_games: Option<i64>,
    pub season_ordinal: Option<i64>,
    pub conferences_in_use: Option<bool>,
    pub divisions_in_use: Option<bool>,
    pub wildcard_in_use: Option<bool>,
    pub ties_in_use: Option<bool>,
    pub point_for_ot_loss_in_use: Option<bool>,
    pub row_in_use: Option<bool>,
    pub all_star_game_in_use: Option<bool>,
    pub entry_draft_in_use: Option<bool>,
    pub supplemental_draft_in_use: Option<bool>,
    pub stanley_cup_owner: Option<i64>,
    pub min_playoff_minutes_goalie_leaders: Option<i64>,
    pub min_regular_games_goalie_leaders: Option<i64>,
    pub olympics_participation: Option<bool>,
}

impl Record for SeasonRow {
    const TABLE: &'static str = "Season";
    const CONFLICT_KEY: &'static [&'static str] = &["season_id"];
    const COLUMNS: &'static [&'static str] = &[
        "season_id",
        "formattedSeasonId",
        "startDate",
        "endDate",
        "regularSeasonEndDate",
        "preseasonStartdate",
        "numberOfGames",
        "totalRegularSeasonGames",
        "totalPlayoffGames",
        "seasonOrdinal",
        "conferencesInUse",
        "divisionsInUse",
        "wildcardInUse",
        "tiesInUse",
        "pointForOTLossInUse",
        "rowInUse",
        "allStarGameInUse",
        "entryDraftInUse",
        "supplementalDraftInUse",
        "nhlStanleyCupOwner",
        "minimumPlayoffMinutesForGoalieStatsLeaders",
        "minimumRegularGamesForGoalieStatsLeaders",
        "olympicsParticipation",
    ];
    const POLICY: MergePolicy = MergePolicy::Overwrite;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.season_id),
            text(&self.formatted_season_id),
            text(&self.start_date),
            text(&self.end_date),
            text(&self.regular_season_end_date),
            text(&self.preseason_start_date),
            int(self.number_of_games),
            int(self.total_regular_season_games),
            int(self.total_playoff_games),
            int(self.season_ordinal),
            flag(self.conferences_in_use),
            flag(self.divisions_in_use),
            flag(self.wildcard_in_use),
            flag(self.ties_in_use),
            flag(self.point_for_ot_loss_in_use),
            flag(self.row_in_use),
            flag(self.all_star_game_in_use),
            flag(self.entry_draft_in_use),
            flag(self.supplemental_draft_in_use),
            int(self.stanley_cup_owner),
            int(self.min_playoff_minutes_goalie_leaders),
            int(self.min_regular_games_goalie_leaders),
            flag(self.olympics_participation),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamRow {
    pub team_id: i64,
    pub franchise_id: Option<i64>,
    pub full_name: Option<String>,
    pub league_id: Option<i64>,
    pub raw_tricode: Option<String>,
    pub tri_code: Option<String>,
}

impl TeamRow {
    pub fn stub(team_id: i64) -> Self {
        Self {
            team_id,
            ..Self::default()
        }
    }
}

impl Record for TeamRow {
    const TABLE: &'static str = "Team";
    const CONFLICT_KEY: &'static [&'static str] = &["team_id"];
    const COLUMNS: &'static [&'static str] = &[
        "team_id",
        "franchiseId",
        "fullName",
        "leagueId",
        "rawTricode",
        "triCode",
    ];
    const POLICY: MergePolicy = MergePolicy::Enrich;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.team_id),
            int(self.franchise_id),
            text(&self.full_name),
            int(self.league_id),
            text(&self.raw_tricode),
            text(&self.tri_code),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerRow {
    pub player_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub headshot: Option<String>,
    pub shoots_catches: Option<String>,
    pub position_code: Option<String>,
    pub birth_date: Option<String>,
    pub birth_city: Option<String>,
    pub birth_state_province: Option<String>,
    pub birth_country: Option<String>,
    pub height_in_inches: Option<i64>,
    pub weight_in_pounds: Option<i64>,
    pub height_in_centimeters: Option<i64>,
    pub weight_in_kilograms: Option<i64>,
}

impl Record for PlayerRow {
    const TABLE: &'static str = "Player";
    const CONFLICT_KEY: &'static [&'static str] = &["player_id"];
    const COLUMNS: &'static [&'static str] = &[
        "player_id",
        "firstName",
        "lastName",
        "headshot",
        "shootsCatches",
        "positionCode",
        "birthDate",
        "birthCity",
        "birthStateProvince",
        "birthCountry",
        "heightInInches",
        "weightInPounds",
        "heightInCentimeters",
        "weightInKilograms",
    ];
    const POLICY: MergePolicy = MergePolicy::Enrich;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.player_id),
            text(&self.first_name),
            text(&self.last_name),
            text(&self.headshot),
            text(&self.shoots_catches),
            text(&self.position_code),
            text(&self.birth_date),
            text(&self.birth_city),
            text(&self.birth_state_province),
            text(&self.birth_country),
            int(self.height_in_inches),
            int(self.weight_in_pounds),
            int(self.height_in_centimeters),
            int(self.weight_in_kilograms),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterRow {
    pub season_id: i64,
    pub team_id: i64,
    pub player_id: i64,
    pub sweater_number: Option<i64>,
    pub position_code: Option<String>,
}

impl Record for RosterRow {
    const TABLE: &'static str = "Roster";
    const CONFLICT_KEY: &'static [&'static str] = &["season_id", "team_id", "player_id"];
    const COLUMNS: &'static [&'static str] = &[
        "season_id",
        "team_id",
        "player_id",
        "sweaterNumber",
        "positionCode",
    ];
    const POLICY: MergePolicy = MergePolicy::Enrich;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.season_id),
            SqlValue::Integer(self.team_id),
            SqlValue::Integer(self.player_id),
            int(self.sweater_number),
            text(&self.position_code),
        ]
    }
}

/// Game columns filled lazily from play-by-play; they enrich while the
/// scoreboard and schedule columns overwrite.
pub const GAME_META_COLUMNS: &[&str] = &["startTimeUTC", "venue", "venueLocation", "hasPlays"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRow {
    pub game_id: i64,
    pub season_id: Option<i64>,
    pub game_date: Option<String>,
    pub game_type: Option<i64>,
    pub game_number: Option<i64>,
    pub game_schedule_state_id: Option<i64>,
    pub game_state_id: Option<i64>,
    pub period: Option<i64>,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub start_time_utc: Option<String>,
    pub venue: Option<String>,
    pub venue_location: Option<String>,
    pub has_plays: Option<bool>,
}

impl Record for GameRow {
    const TABLE: &'static str = "Game";
    const CONFLICT_KEY: &'static [&'static str] = &["game_id"];
    const COLUMNS: &'static [&'static str] = &[
        "game_id",
        "season_id",
        "gameDate",
        "gameType",
        "gameNumber",
        "gameScheduleStateId",
        "gameStateId",
        "period",
        "homeTeamId",
        "awayTeamId",
        "homeScore",
        "awayScore",
        "startTimeUTC",
        "venue",
        "venueLocation",
        "hasPlays",
    ];
    const POLICY: MergePolicy = MergePolicy::CoalesceSpecific(GAME_META_COLUMNS);

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.game_id),
            int(self.season_id),
            text(&self.game_date),
            int(self.game_type),
            int(self.game_number),
            int(self.game_schedule_state_id),
            int(self.game_state_id),
            int(self.period),
            int(self.home_team_id),
            int(self.away_team_id),
            int(self.home_score),
            int(self.away_score),
            text(&self.start_time_utc),
            text(&self.venue),
            text(&self.venue_location),
            flag(self.has_plays),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameMeta {
    pub start_time_utc: Option<String>,
    pub venue: Option<String>,
    pub venue_location: Option<String>,
    pub has_plays: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShotProjection {
    pub x_coord: Option<f64>,
    pub y_coord: Option<f64>,
    pub shot_type: Option<String>,
    pub shooting_player_id: Option<i64>,
    pub goalie_in_net_id: Option<i64>,
    pub zone_code: Option<String>,
    pub empty_net: Option<bool>,
}

pub const EVENT_ENRICH_COLUMNS: &[&str] = &["situationCode", "homeTeamDefendingSide"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRow {
    pub game_id: i64,
    pub event_id: i64,
    pub period: Option<i64>,
    pub period_type: Option<String>,
    pub time_in_period: Option<String>,
    pub time_remaining: Option<String>,
    pub type_code: Option<i64>,
    pub type_desc_key: Option<String>,
    pub sort_order: Option<i64>,
    pub penalty_type_code: Option<String>,
    pub penalty_duration: Option<i64>,
    pub committed_by_player_id: Option<i64>,
    pub event_owner_team_id: Option<i64>,
    /// Verbatim `details` object, kept for re-derivation without a refetch.
    pub details_json: Option<String>,
    pub shot: ShotProjection,
    pub situation_code: Option<String>,
    pub home_team_defending_side: Option<String>,
}

impl Record for EventRow {
    const TABLE: &'static str = "Event";
    const CONFLICT_KEY: &'static [&'static str] = &["game_id", "eventId"];
    const COLUMNS: &'static [&'static str] = &[
        "game_id",
        "eventId",
        "period",
        "periodType",
        "timeInPeriod",
        "timeRemaining",
        "typeCode",
        "typeDescKey",
        "sortOrder",
        "penaltyTypeCode",
        "penaltyDuration",
        "committedByPlayerId",
        "eventOwnerTeamId",
        "details_json",
        "xCoord",
        "yCoord",
        "shotType",
        "shootingPlayerId",
        "goalieInNetId",
        "zoneCode",
        "emptyNet",
        "situationCode",
        "homeTeamDefendingSide",
    ];
    const POLICY: MergePolicy = MergePolicy::CoalesceSpecific(EVENT_ENRICH_COLUMNS);

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Integer(self.game_id),
            SqlValue::Integer(self.event_id),
            int(self.period),
            text(&self.period_type),
            text(&self.time_in_period),
            text(&self.time_remaining),
            int(self.type_code),
            text(&self.type_desc_key),
            int(self.sort_order),
            text(&self.penalty_type_code),
            int(self.penalty_duration),
            int(self.committed_by_player_id),
            int(self.event_owner_team_id),
            text(&self.details_json),
            real(self.shot.x_coord),
            real(self.shot.y_coord),
            text(&self.shot.shot_type),
            int(self.shot.shooting_player_id),
            int(self.shot.goalie_in_net_id),
            text(&self.shot.zone_code),
            flag(self.shot.empty_net),
            text(&self.situation_code),
            text(&self.home_team_defending_side),
        ]
    }
}

/// A player listed in a play-by-play payload, with the team they dressed for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSpot {
    pub team_id: i64,
    pub player: PlayerRow,
    pub sweater_number: Option<i64>,
    pub position_code: Option<String>,
}

impl RosterSpot {
    pub fn roster_row(&self, season_id: i64) -> RosterRow {
        RosterRow {
            season_id,
            team_id: self.team_id,
            player_id: self.player.player_id,
            sweater_number: self.sweater_number,
            position_code: self.position_code.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayByPlay {
    pub meta: GameMeta,
    pub teams: Vec<TeamRow>,
    pub events: Vec<EventRow>,
    pub roster_spots: Vec<RosterSpot>,
}
