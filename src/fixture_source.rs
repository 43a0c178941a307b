//! In-memory source provider serving canned documents. Backs offline runs
//! (`--fixtures <dir>`) and the integration tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::error::FetchError;
use crate::provider::{Selector, SourceProvider};

#[derive(Debug, Clone)]
enum Canned {
    Document(Value),
    Transient(String),
}

#[derive(Debug, Default)]
pub struct FixtureProvider {
    responses: HashMap<Selector, Canned>,
    served: RefCell<Vec<Selector>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: Selector, document: Value) -> Self {
        self.insert(selector, document);
        self
    }

    pub fn insert(&mut self, selector: Selector, document: Value) {
        self.responses.insert(selector, Canned::Document(document));
    }

    /// Makes `selector` fail with a transient error until replaced.
    pub fn fail_transiently(&mut self, selector: Selector, message: &str) {
        self.responses
            .insert(selector, Canned::Transient(message.to_string()));
    }

    /// Loads every `*.json` file of `dir` whose name maps to a selector:
    /// `seasons.json`, `teams.json`, `games-<season>.json`, `game-<id>.json`,
    /// `roster-<TRI>-<season>.json`, `pbp-<game>.json`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut provider = Self::new();
        let entries =
            fs::read_dir(dir).with_context(|| format!("read fixture dir {}", dir.display()))?;
        for entry in entries {
            let path = entry.context("read fixture entry")?.path();
            let Some(stem) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            let Some(selector) = selector_for_stem(stem) else {
                continue;
            };
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("read fixture {}", path.display()))?;
            let value = serde_json::from_str::<Value>(raw.trim())
                .with_context(|| format!("invalid fixture json {}", path.display()))?;
            provider.insert(selector, value);
        }
        Ok(provider)
    }

    /// Every selector fetched so far, in call order.
    pub fn served(&self) -> Vec<Selector> {
        self.served.borrow().clone()
    }

    pub fn served_count(&self, selector: &Selector) -> usize {
        self.served.borrow().iter().filter(|s| *s == selector).count()
    }

    pub fn clear_served(&self) {
        self.served.borrow_mut().clear();
    }
}

pub fn selector_for_stem(stem: &str) -> Option<Selector> {
    match stem {
        "seasons" => return Some(Selector::Seasons),
        "teams" => return Some(Selector::Teams),
        _ => {}
    }
    if let Some(rest) = stem.strip_prefix("games-") {
        return rest.parse().ok().map(Selector::GamesForSeason);
    }
    if let Some(rest) = stem.strip_prefix("game-") {
        return rest.parse().ok().map(Selector::Game);
    }
    if let Some(rest) = stem.strip_prefix("pbp-") {
        return rest.parse().ok().map(Selector::PlayByPlay);
    }
    if let Some(rest) = stem.strip_prefix("roster-") {
        let (tricode, season) = rest.rsplit_once('-')?;
        return Some(Selector::Roster {
            tricode: tricode.to_string(),
            season_id: season.parse().ok()?,
        });
    }
    None
}

impl SourceProvider for FixtureProvider {
    fn fetch(&self, selector: &Selector) -> Result<Value, FetchError> {
        self.served.borrow_mut().push(selector.clone());
        match self.responses.get(selector) {
            Some(Canned::Document(value)) => Ok(value.clone()),
            Some(Canned::Transient(message)) => Err(FetchError::Transient {
                resource: selector.to_string(),
                message: message.clone(),
            }),
            None => Err(FetchError::NotFound {
                resource: selector.to_string(),
            }),
        }
    }
}
