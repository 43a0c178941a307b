use std::fmt;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::FetchError;
use crate::http_client::http_client;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selector {
    Seasons,
    Teams,
    GamesForSeason(i64),
    Game(i64),
    Roster { tricode: String, season_id: i64 },
    PlayByPlay(i64),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Seasons => write!(f, "season list"),
            Selector::Teams => write!(f, "team list"),
            Selector::GamesForSeason(id) => write!(f, "games of season {id}"),
            Selector::Game(id) => write!(f, "game {id}"),
            Selector::Roster { tricode, season_id } => write!(f, "roster {tricode}/{season_id}"),
            Selector::PlayByPlay(id) => write!(f, "play-by-play {id}"),
        }
    }
}

/// Returns the raw JSON document for a selector, or says why it cannot.
/// Retry and timeout policy belong to the implementation.
pub trait SourceProvider {
    fn fetch(&self, selector: &Selector) -> Result<Value, FetchError>;
}

impl<P: SourceProvider + ?Sized> SourceProvider for &P {
    fn fetch(&self, selector: &Selector) -> Result<Value, FetchError> {
        (**self).fetch(selector)
    }
}

pub struct NhlApiProvider {
    client: &'static Client,
    config: ProviderConfig,
}

impl NhlApiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = http_client(config.timeout_secs)?;
        Ok(Self { client, config })
    }

    pub fn url_for(&self, selector: &Selector) -> String {
        let stats = &self.config.stats_base_url;
        let web = &self.config.web_base_url;
        match selector {
            Selector::Seasons => format!("{stats}/season"),
            Selector::Teams => format!("{stats}/team"),
            Selector::GamesForSeason(id) => format!("{stats}/game?cayenneExp=season={id}"),
            Selector::Game(id) => format!("{stats}/game?cayenneExp=id={id}"),
            Selector::Roster { tricode, season_id } => {
                format!("{web}/roster/{tricode}/{season_id}")
            }
            Selector::PlayByPlay(id) => format!("{web}/gamecenter/{id}/play-by-play"),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.backoff_base_ms.saturating_mul(1 << attempt.min(6));
        let jitter = rand::thread_rng().gen_range(0..=self.config.backoff_base_ms / 2);
        Duration::from_millis(base + jitter)
    }

    fn fetch_once(&self, url: &str, resource: &str) -> Result<Value, Attempt> {
        let resp = self.client.get(url).send().map_err(|err| {
            Attempt::Retry(FetchError::Transient {
                resource: resource.to_string(),
                message: err.to_string(),
            })
        })?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Attempt::Final(FetchError::NotFound {
                resource: resource.to_string(),
            }));
        }
        if !status.is_success() {
            let err = FetchError::Transient {
                resource: resource.to_string(),
                message: format!("http {status}"),
            };
            return Err(if is_retryable(status) {
                Attempt::Retry(err)
            } else {
                Attempt::Final(err)
            });
        }
        let body = resp.text().map_err(|err| {
            Attempt::Retry(FetchError::Transient {
                resource: resource.to_string(),
                message: format!("failed reading body: {err}"),
            })
        })?;
        serde_json::from_str::<Value>(body.trim()).map_err(|err| {
            Attempt::Final(FetchError::Malformed {
                resource: resource.to_string(),
                message: err.to_string(),
            })
        })
    }
}

enum Attempt {
    Retry(FetchError),
    Final(FetchError),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

impl SourceProvider for NhlApiProvider {
    fn fetch(&self, selector: &Selector) -> Result<Value, FetchError> {
        let url = self.url_for(selector);
        let resource = selector.to_string();
        let mut attempt = 0u32;
        loop {
            debug!(%url, attempt, "fetch");
            match self.fetch_once(&url, &resource) {
                Ok(value) => return Ok(value),
                Err(Attempt::Final(err)) => return Err(err),
                Err(Attempt::Retry(err)) => {
                    if attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    let wait = self.backoff(attempt);
                    warn!(%resource, error = %err, wait_ms = wait.as_millis() as u64, "retrying");
                    thread::sleep(wait);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> NhlApiProvider {
        NhlApiProvider::new(ProviderConfig::default()).expect("client")
    }

    #[test]
    fn urls_follow_endpoint_layout() {
        let p = provider();
        assert_eq!(
            p.url_for(&Selector::GamesForSeason(20162017)),
            "https://api.nhle.com/stats/rest/en/game?cayenneExp=season=20162017"
        );
        assert_eq!(
            p.url_for(&Selector::Roster {
                tricode: "TOR".to_string(),
                season_id: 20162017
            }),
            "https://api-web.nhle.com/v1/roster/TOR/20162017"
        );
        assert_eq!(
            p.url_for(&Selector::PlayByPlay(2016020001)),
            "https://api-web.nhle.com/v1/gamecenter/2016020001/play-by-play"
        );
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let p = provider();
        let first = p.backoff(0);
        let third = p.backoff(2);
        assert!(first >= Duration::from_millis(500));
        assert!(third >= Duration::from_millis(2000));
    }

    #[test]
    fn only_throttling_and_server_errors_retry() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::FORBIDDEN));
    }
}
