use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::stats_http::{first_result_set, number, stats_client, text};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub id: i64,
}

/// Source of the current active roster.
#[async_trait]
pub trait RosterFeed: Send + Sync {
    async fn active_players(&self) -> Result<Vec<RosterEntry>>;
}

/// `commonallplayers` endpoint of the stats service, current season only.
pub struct StatsRosterFeed {
    client: reqwest::Client,
    base_url: String,
    season: String,
}

impl StatsRosterFeed {
    pub fn new(base_url: &str, season: &str) -> Result<Self> {
        Ok(Self {
            client: stats_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            season: season.to_string(),
        })
    }
}

#[async_trait]
impl RosterFeed for StatsRosterFeed {
    async fn active_players(&self) -> Result<Vec<RosterEntry>> {
        let url = format!(
            "{}/commonallplayers?IsOnlyCurrentSeason=1&LeagueID=00&Season={}",
            self.base_url, self.season
        );
        debug!("Fetching roster from {url}");
        let body: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_roster(&body)
    }
}

pub fn parse_roster(body: &serde_json::Value) -> Result<Vec<RosterEntry>> {
    let rows = first_result_set(body).map_err(|e| AppError::Roster(e.to_string()))?;
    Ok(rows
        .iter()
        .filter(|row| number(row, "ROSTERSTATUS").map_or(true, |s| s >= 1.0))
        .filter_map(|row| {
            let name = text(row, "DISPLAY_FIRST_LAST")?.trim().to_string();
            let id = number(row, "PERSON_ID")? as i64;
            (!name.is_empty()).then_some(RosterEntry { name, id })
        })
        .collect())
}

/// JSON file with an array of `{"name": .., "id": ..}` objects.
pub struct FileRosterFeed {
    path: PathBuf,
}

impl FileRosterFeed {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl RosterFeed for FileRosterFeed {
    async fn active_players(&self) -> Result<Vec<RosterEntry>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let entries: Vec<RosterEntry> = serde_json::from_str(&raw)?;
        Ok(entries)
    }
}
