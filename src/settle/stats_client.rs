use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::stats_http::{first_result_set, number, stats_client, text, ResultRow};
use crate::types::GameStatLine;

/// Month the season rolls over; August and later belong to the next season.
const SEASON_START_MONTH: u32 = 8;

/// One row of a player's game log.
#[derive(Debug, Clone, PartialEq)]
pub struct GameLogEntry {
    pub date: NaiveDate,
    pub line: GameStatLine,
}

/// Per-game performance records for a player and season.
///
/// `Ok` with an empty log means the service answered with no games; transport
/// failures are errors and abort the settlement run.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn game_log(&self, player_id: i64, season: &str) -> Result<Vec<GameLogEntry>>;
}

/// Season string for a game date: 2025-01-15 -> "2024-25", 2024-10-22 -> "2024-25".
pub fn season_for(date: NaiveDate) -> String {
    let start = if date.month() >= SEASON_START_MONTH {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{start}-{:02}", (start + 1) % 100)
}

/// `playergamelog` endpoint of the stats service.
pub struct NbaStatsClient {
    client: reqwest::Client,
    base_url: String,
}

impl NbaStatsClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: stats_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StatsProvider for NbaStatsClient {
    async fn game_log(&self, player_id: i64, season: &str) -> Result<Vec<GameLogEntry>> {
        let url = format!(
            "{}/playergamelog?PlayerID={player_id}&Season={season}&SeasonType=Regular%20Season",
            self.base_url
        );
        debug!("Fetching game log from {url}");
        let body: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_game_log(&body)
    }
}

/// Game log rows keyed by date (`GAME_DATE` like "JAN 15, 2025"). Rows with
/// an unreadable date are skipped; a row with a missing counting stat is an
/// error.
pub fn parse_game_log(body: &serde_json::Value) -> Result<Vec<GameLogEntry>> {
    first_result_set(body)?
        .iter()
        .filter_map(|row| {
            let date = text(row, "GAME_DATE")
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%b %d, %Y").ok())?;
            Some(stat_line(row).map(|line| GameLogEntry { date, line }))
        })
        .collect()
}

fn stat_line(row: &ResultRow) -> Result<GameStatLine> {
    let stat = |key: &str| {
        number(row, key)
            .ok_or_else(|| AppError::StatsService(format!("game log row has no {key}")))
    };
    Ok(GameStatLine::from_counts(
        stat("PTS")?,
        stat("AST")?,
        stat("REB")?,
        stat("FG3M")?,
        stat("BLK")?,
        stat("STL")?,
        stat("TOV")?,
    ))
}
