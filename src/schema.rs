use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::SchemaError;

use self::ColumnType::{Integer, Real, Text};

pub const SCHEMA_VERSION: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDecl {
    pub name: &'static str,
    pub ty: ColumnType,
    pub not_null: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TableDecl {
    pub name: &'static str,
    pub columns: &'static [ColumnDecl],
    /// Table constraints appended after the column list.
    pub constraints: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct IndexDecl {
    pub name: &'static str,
    pub table: &'static str,
    pub column: &'static str,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnDecl {
    ColumnDecl {
        name,
        ty,
        not_null: false,
    }
}

const fn key(name: &'static str) -> ColumnDecl {
    ColumnDecl {
        name,
        ty: ColumnType::Integer,
        not_null: true,
    }
}

pub const TABLES: &[TableDecl] = &[
    TableDecl {
        name: "Season",
        columns: &[
            key("season_id"),
            col("formattedSeasonId", Text),
            col("startDate", Text),
            col("endDate", Text),
            col("regularSeasonEndDate", Text),
            col("preseasonStartdate", Text),
            col("numberOfGames", Integer),
            col("totalRegularSeasonGames", Integer),
            col("totalPlayoffGames", Integer),
            col("seasonOrdinal", Integer),
            col("conferencesInUse", Integer),
            col("divisionsInUse", Integer),
            col("wildcardInUse", Integer),
            col("tiesInUse", Integer),
            col("pointForOTLossInUse", Integer),
            col("rowInUse", Integer),
            col("allStarGameInUse", Integer),
            col("entryDraftInUse", Integer),
            col("supplementalDraftInUse", Integer),
            col("nhlStanleyCupOwner", Integer),
            col("minimumPlayoffMinutesForGoalieStatsLeaders", Integer),
            col("minimumRegularGamesForGoalieStatsLeaders", Integer),
            col("olympicsParticipation", Integer),
        ],
        constraints: &["PRIMARY KEY (season_id)"],
    },
    TableDecl {
        name: "Team",
        columns: &[
            key("team_id"),
            col("franchiseId", Integer),
            col("fullName", Text),
            col("leagueId", Integer),
            col("rawTricode", Text),
            col("triCode", Text),
        ],
        constraints: &["PRIMARY KEY (team_id)"],
    },
    TableDecl {
        name: "Game",
        columns: &[
            key("game_id"),
            col("season_id", Integer),
            col("gameDate", Text),
            col("gameType", Integer),
            col("gameNumber", Integer),
            col("gameScheduleStateId", Integer),
            col("gameStateId", Integer),
            col("period", Integer),
            col("homeTeamId", Integer),
            col("awayTeamId", Integer),
            col("homeScore", Integer),
            col("awayScore", Integer),
            col("startTimeUTC", Text),
            col("venue", Text),
            col("venueLocation", Text),
            col("hasPlays", Integer),
        ],
        constraints: &[
            "PRIMARY KEY (game_id)",
            "FOREIGN KEY (season_id) REFERENCES Season(season_id)",
            "FOREIGN KEY (homeTeamId) REFERENCES Team(team_id)",
            "FOREIGN KEY (awayTeamId) REFERENCES Team(team_id)",
        ],
    },
    TableDecl {
        name: "Event",
        columns: &[
            key("game_id"),
            key("eventId"),
            col("period", Integer),
            col("periodType", Text),
            col("timeInPeriod", Text),
            col("timeRemaining", Text),
            col("typeCode", Integer),
            col("typeDescKey", Text),
            col("sortOrder", Integer),
            col("penaltyTypeCode", Text),
            col("penaltyDuration", Integer),
            col("committedByPlayerId", Integer),
            col("eventOwnerTeamId", Integer),
            col("details_json", Text),
            col("xCoord", Real),
            col("yCoord", Real),
            col("shotType", Text),
            col("shootingPlayerId", Integer),
            col("goalieInNetId", Integer),
            col("zoneCode", Text),
            col("emptyNet", Integer),
            col("situationCode", Text),
            col("homeTeamDefendingSide", Text),
        ],
        constraints: &[
            "PRIMARY KEY (game_id, eventId)",
            "FOREIGN KEY (game_id) REFERENCES Game(game_id) ON DELETE CASCADE",
        ],
    },
    TableDecl {
        name: "Player",
        columns: &[
            key("player_id"),
            col("firstName", Text),
            col("lastName", Text),
            col("headshot", Text),
            col("shootsCatches", Text),
            col("positionCode", Text),
            col("birthDate", Text),
            col("birthCity", Text),
            col("birthStateProvince", Text),
            col("birthCountry", Text),
            col("heightInInches", Integer),
            col("weightInPounds", Integer),
            col("heightInCentimeters", Integer),
            col("weightInKilograms", Integer),
        ],
        constraints: &["PRIMARY KEY (player_id)"],
    },
    TableDecl {
        name: "Roster",
        columns: &[
            key("season_id"),
            key("team_id"),
            key("player_id"),
            col("sweaterNumber", Integer),
            col("positionCode", Text),
        ],
        constraints: &[
            "PRIMARY KEY (season_id, team_id, player_id)",
            "FOREIGN KEY (season_id) REFERENCES Season(season_id) ON DELETE CASCADE",
            "FOREIGN KEY (team_id) REFERENCES Team(team_id) ON DELETE CASCADE",
            "FOREIGN KEY (player_id) REFERENCES Player(player_id) ON DELETE CASCADE",
        ],
    },
];

pub const INDEXES: &[IndexDecl] = &[
    IndexDecl {
        name: "idx_game_season",
        table: "Game",
        column: "season_id",
    },
    IndexDecl {
        name: "idx_game_home",
        table: "Game",
        column: "homeTeamId",
    },
    IndexDecl {
        name: "idx_game_away",
        table: "Game",
        column: "awayTeamId",
    },
    IndexDecl {
        name: "idx_event_game",
        table: "Event",
        column: "game_id",
    },
    IndexDecl {
        name: "idx_event_type",
        table: "Event",
        column: "typeCode",
    },
    IndexDecl {
        name: "idx_event_team",
        table: "Event",
        column: "eventOwnerTeamId",
    },
    IndexDecl {
        name: "idx_event_typedesc",
        table: "Event",
        column: "typeDescKey",
    },
    IndexDecl {
        name: "idx_event_shooter",
        table: "Event",
        column: "shootingPlayerId",
    },
    IndexDecl {
        name: "idx_event_goalie",
        table: "Event",
        column: "goalieInNetId",
    },
    IndexDecl {
        name: "idx_event_home_team_def_side",
        table: "Event",
        column: "homeTeamDefendingSide",
    },
    IndexDecl {
        name: "idx_roster_team",
        table: "Roster",
        column: "team_id",
    },
    IndexDecl {
        name: "idx_roster_player",
        table: "Roster",
        column: "player_id",
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub tables_created: Vec<String>,
    pub columns_added: Vec<String>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.tables_created.is_empty() && self.columns_added.is_empty()
    }
}

/// Converges the store to the declared shape. Safe to call on any state any
/// number of times; a failure rolls back the whole migration.
pub fn ensure_schema(conn: &mut Connection) -> Result<MigrationReport, SchemaError> {
    // Has no effect inside a transaction, so it goes first.
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let tx = conn.transaction()?;
    let mut report = MigrationReport::default();

    for table in TABLES {
        let existing = table_columns(&tx, table.name)?;
        if existing.is_empty() {
            tx.execute_batch(&create_table_sql(table))?;
            debug!(table = table.name, "created table");
            report.tables_created.push(table.name.to_string());
            continue;
        }
        for column in table.columns {
            if existing.iter().any(|c| c == column.name) {
                continue;
            }
            if column.not_null {
                return Err(SchemaError::Migration {
                    table: table.name.to_string(),
                    column: column.name.to_string(),
                    reason: "NOT NULL key column cannot be added in place".to_string(),
                });
            }
            tx.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {};",
                table.name,
                column.name,
                column.ty.sql()
            ))?;
            info!(table = table.name, column = column.name, "added column");
            report
                .columns_added
                .push(format!("{}.{}", table.name, column.name));
        }
    }

    for index in INDEXES {
        tx.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({});",
            index.name, index.table, index.column
        ))?;
    }

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    Ok(report)
}

pub fn create_table_sql(table: &TableDecl) -> String {
    let mut parts = table
        .columns
        .iter()
        .map(|c| {
            if c.not_null {
                format!("{} {} NOT NULL", c.name, c.ty.sql())
            } else {
                format!("{} {}", c.name, c.ty.sql())
            }
        })
        .collect::<Vec<_>>();
    parts.extend(table.constraints.iter().map(|c| c.to_string()));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n);",
        table.name,
        parts.join(",\n  ")
    )
}

pub fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    rows.collect()
}

pub fn schema_inventory(conn: &Connection) -> rusqlite::Result<Vec<(String, Vec<String>)>> {
    let mut out = Vec::with_capacity(TABLES.len());
    for table in TABLES {
        out.push((table.name.to_string(), table_columns(conn, table.name)?));
    }
    Ok(out)
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{EventRow, GameRow, PlayerRow, RosterRow, SeasonRow, TeamRow};
    use crate::store::Record;

    fn declared(table: &str) -> Vec<&'static str> {
        TABLES
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.columns.iter().map(|c| c.name).collect())
            .unwrap_or_default()
    }

    fn assert_covers<R: Record>() {
        let cols = declared(R::TABLE);
        for c in R::COLUMNS {
            assert!(cols.contains(c), "{}.{} is not declared", R::TABLE, c);
        }
    }

    #[test]
    fn every_record_column_is_declared() {
        assert_covers::<SeasonRow>();
        assert_covers::<TeamRow>();
        assert_covers::<PlayerRow>();
        assert_covers::<RosterRow>();
        assert_covers::<GameRow>();
        assert_covers::<EventRow>();
    }

    #[test]
    fn indexes_reference_declared_columns() {
        for index in INDEXES {
            assert!(declared(index.table).contains(&index.column), "{}", index.name);
        }
    }

    #[test]
    fn create_sql_carries_keys_and_constraints() {
        let sql = create_table_sql(&TABLES[3]);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS Event"));
        assert!(sql.contains("eventId INTEGER NOT NULL"));
        assert!(sql.contains("xCoord REAL"));
        assert!(sql.contains("PRIMARY KEY (game_id, eventId)"));
    }
}
