use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

const APP_DIR: &str = "nhl_sync";
const DB_FILE: &str = "nhl.sqlite";

pub const DEFAULT_FIRST_SEASON_START: i64 = 2016;
pub const DEFAULT_LAST_SEASON_START: i64 = 2023;
pub const DEFAULT_EVENT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_ROSTER_BATCH_SIZE: usize = 50;
/// `gameType` of all-star games; their play-by-play is the only place the
/// all-star teams carry names.
pub const ALL_STAR_GAME_TYPE: i64 = 4;

const STATS_BASE_URL: &str = "https://api.nhle.com/stats/rest/en";
const WEB_BASE_URL: &str = "https://api-web.nhle.com/v1";

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub season_range: BTreeSet<i64>,
    pub event_batch_size: usize,
    pub roster_batch_size: usize,
    pub max_games_per_run: Option<usize>,
    pub exhibition_game_type: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            season_range: season_span(DEFAULT_FIRST_SEASON_START, DEFAULT_LAST_SEASON_START),
            event_batch_size: DEFAULT_EVENT_BATCH_SIZE,
            roster_batch_size: DEFAULT_ROSTER_BATCH_SIZE,
            max_games_per_run: None,
            exhibition_game_type: ALL_STAR_GAME_TYPE,
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = opt_env("NHL_SYNC_SEASONS") {
            config.season_range = parse_season_range(&raw)?;
        }
        if let Some(size) = opt_env("NHL_SYNC_EVENT_BATCH").and_then(|v| v.parse::<usize>().ok()) {
            config.event_batch_size = size.max(1);
        }
        if let Some(size) = opt_env("NHL_SYNC_ROSTER_BATCH").and_then(|v| v.parse::<usize>().ok())
        {
            config.roster_batch_size = size.max(1);
        }
        config.max_games_per_run = opt_env("NHL_SYNC_MAX_GAMES")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0);
        Ok(config)
    }

    pub fn with_seasons(mut self, seasons: impl IntoIterator<Item = i64>) -> Self {
        self.season_range = seasons.into_iter().collect();
        self
    }

    pub fn contains_season(&self, season_id: i64) -> bool {
        self.season_range.contains(&season_id)
    }
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub stats_base_url: String,
    pub web_base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            stats_base_url: STATS_BASE_URL.to_string(),
            web_base_url: WEB_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            stats_base_url: opt_env("NHL_STATS_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.stats_base_url),
            web_base_url: opt_env("NHL_WEB_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.web_base_url),
            timeout_secs: opt_env("NHL_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(defaults.timeout_secs)
                .max(1),
            max_retries: opt_env("NHL_HTTP_RETRIES")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_retries),
            backoff_base_ms: defaults.backoff_base_ms,
        }
    }
}

/// Loads `.env.local` then `.env` if present. Real environment wins.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Some(path) = opt_env("NHL_SYNC_DB") {
        return Some(PathBuf::from(path));
    }
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(APP_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

/// Season ids are `YYYYyyyy` with `yyyy = YYYY + 1`, e.g. `20162017`.
pub fn season_id_for_start_year(year: i64) -> i64 {
    year * 10_000 + year + 1
}

pub fn season_span(first_start_year: i64, last_start_year: i64) -> BTreeSet<i64> {
    (first_start_year..=last_start_year)
        .map(season_id_for_start_year)
        .collect()
}

/// Accepts `20162017-20232024`, `20162017,20172018` or a mix of both.
pub fn parse_season_range(raw: &str) -> Result<BTreeSet<i64>> {
    let mut out = BTreeSet::new();
    for part in raw.split([',', ';', ' ']).map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((lo, hi)) = part.split_once('-') {
            let lo = parse_season_id(lo)?;
            let hi = parse_season_id(hi)?;
            if lo > hi {
                return Err(anyhow!("season range {part} is reversed"));
            }
            out.extend(season_span(lo / 10_000, hi / 10_000));
        } else {
            out.insert(parse_season_id(part)?);
        }
    }
    if out.is_empty() {
        return Err(anyhow!("no seasons in {raw:?}"));
    }
    Ok(out)
}

fn parse_season_id(raw: &str) -> Result<i64> {
    let id = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| anyhow!("invalid season id {raw:?}"))?;
    let start = id / 10_000;
    if id < 10_000_000 || id % 10_000 != start + 1 {
        return Err(anyhow!("season id {id} is not of the form YYYYyyyy"));
    }
    Ok(id)
}

fn opt_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
