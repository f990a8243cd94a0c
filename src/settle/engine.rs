use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rand::Rng;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info, warn};

use crate::db::models::{BetRow, NewBetResult};
use crate::db::{bets, settlement};
use crate::error::{AppError, Result};
use crate::settle::latency::CallLatency;
use crate::settle::outcome::{compute_outcome, SettleError};
use crate::settle::stats_client::{season_for, GameLogEntry, StatsProvider};
use crate::types::{BetStatus, BetType, GameStatLine};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleSummary {
    pub settled: usize,
    pub unplayed: usize,
    pub skipped: usize,
    pub stats_calls: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Settled,
    Unplayed,
}

/// How one candidate failed.
#[derive(Debug)]
enum StepError {
    /// Data problem on the bet itself; logged and skipped.
    Expected(SettleError),
    /// Anything else local to this bet (a failed write); logged and skipped.
    Unexpected(AppError),
    /// Stats service unreachable; aborts the run.
    Fatal(AppError),
}

impl From<SettleError> for StepError {
    fn from(e: SettleError) -> Self {
        StepError::Expected(e)
    }
}

impl From<AppError> for StepError {
    fn from(e: AppError) -> Self {
        StepError::Unexpected(e)
    }
}

/// Fields a bet must carry before it can be settled.
struct Settleable {
    player_id: i64,
    date: String,
    game_date: NaiveDate,
    bet_type: BetType,
    bet_line: String,
    odds: i64,
    score: f64,
}

impl TryFrom<&BetRow> for Settleable {
    type Error = SettleError;

    fn try_from(b: &BetRow) -> std::result::Result<Self, SettleError> {
        let date = b.date.clone().ok_or(SettleError::MissingField("date"))?;
        let game_date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|_| SettleError::InvalidDate(date.clone()))?;
        let raw_type = b.bet_type.clone().ok_or(SettleError::MissingField("bet type"))?;
        Ok(Self {
            player_id: b.player_id.ok_or(SettleError::MissingField("player id"))?,
            bet_type: raw_type.parse().map_err(|_| SettleError::UnknownBetType(raw_type))?,
            bet_line: b.bet_line.clone().ok_or(SettleError::MissingField("bet line"))?,
            odds: b.odds.ok_or(SettleError::MissingField("odds"))?,
            score: b.score.ok_or(SettleError::MissingField("score"))?,
            date,
            game_date,
        })
    }
}

/// Settles every `extracted` bet against the stats service.
///
/// The whole run is one transaction and each bet a savepoint inside it. A bet
/// that fails for its own reasons rolls back to its savepoint and stays
/// `extracted` for the next run; a stats-service failure rolls back the run.
pub struct SettlementEngine<'a> {
    stats: &'a dyn StatsProvider,
    season: Option<String>,
    delay_ms: (u64, u64),
    game_logs: HashMap<(i64, String), Vec<GameLogEntry>>,
    latency: CallLatency,
}

impl<'a> SettlementEngine<'a> {
    pub fn new(stats: &'a dyn StatsProvider, season: Option<String>, delay_ms: (u64, u64)) -> Self {
        Self {
            stats,
            season,
            delay_ms,
            game_logs: HashMap::new(),
            latency: CallLatency::new(),
        }
    }

    pub async fn run(&mut self, pool: &SqlitePool) -> Result<SettleSummary> {
        let mut tx = pool.begin().await?;
        let pending = bets::bets_with_status(&mut tx, BetStatus::Extracted).await?;
        if pending.is_empty() {
            info!("No unprocessed bets found");
            return Ok(SettleSummary::default());
        }
        info!(count = pending.len(), "Settling {} bets", pending.len());

        let mut summary = SettleSummary::default();
        for bet in &pending {
            let mut savepoint = sqlx::Connection::begin(&mut *tx).await?;
            match self.settle_one(&mut savepoint, bet).await {
                Ok(disposition) => {
                    savepoint.commit().await?;
                    match disposition {
                        Disposition::Settled => summary.settled += 1,
                        Disposition::Unplayed => summary.unplayed += 1,
                    }
                }
                Err(StepError::Expected(e)) => {
                    savepoint.rollback().await?;
                    warn!(bet_id = bet.id, "Skipping bet {}: {e}", bet.id);
                    summary.skipped += 1;
                }
                Err(StepError::Unexpected(e)) => {
                    savepoint.rollback().await?;
                    error!(bet_id = bet.id, "Error processing bet {}: {e}", bet.id);
                    summary.skipped += 1;
                }
                Err(StepError::Fatal(e)) => {
                    savepoint.rollback().await?;
                    tx.rollback().await?;
                    error!(bet_id = bet.id, "Stats service failure, run rolled back: {e}");
                    return Err(e);
                }
            }
        }
        tx.commit().await?;

        summary.stats_calls = self.latency.len() as usize;
        info!(
            settled = summary.settled,
            unplayed = summary.unplayed,
            skipped = summary.skipped,
            stats_calls = summary.stats_calls,
            "Settlement complete: {} settled, {} unplayed, {} skipped",
            summary.settled,
            summary.unplayed,
            summary.skipped,
        );
        self.latency.log_summary();
        Ok(summary)
    }

    async fn settle_one(
        &mut self,
        conn: &mut SqliteConnection,
        bet: &BetRow,
    ) -> std::result::Result<Disposition, StepError> {
        let b = Settleable::try_from(bet)?;

        let (game_stats_id, line) = match settlement::cached_stats(conn, b.player_id, &b.date).await? {
            Some(row) => {
                info!(bet_id = bet.id, player_id = b.player_id, date = %b.date, "Found cached stats");
                (Some(row.id), row.line())
            }
            None => {
                if settlement::known_unplayed(conn, b.player_id, &b.date).await? {
                    info!(bet_id = bet.id, player_id = b.player_id, date = %b.date, "Player already known unplayed");
                    return self.mark_unplayed(conn, bet.id, &b).await;
                }
                match self.fetch_line(b.player_id, b.game_date).await? {
                    Some(line) => (None, line),
                    None => {
                        info!(bet_id = bet.id, player_id = b.player_id, date = %b.date, "No game on date, marking unplayed");
                        return self.mark_unplayed(conn, bet.id, &b).await;
                    }
                }
            }
        };

        let outcome = compute_outcome(&line, b.bet_type, &b.bet_line, b.odds, b.score)?;

        let game_stats_id = match game_stats_id {
            Some(id) => id,
            None => settlement::insert_game_stats(conn, b.player_id, &b.date, &line).await?,
        };
        settlement::insert_result(
            conn,
            &NewBetResult {
                bet_id: bet.id,
                player_id: b.player_id,
                game_stats_id,
                bet_type: b.bet_type.as_str().to_string(),
                result: outcome.result.to_string(),
                result_delta: outcome.delta,
                score_range: outcome.score_range.as_str().to_string(),
                over_under: outcome.over_under.to_string(),
                stat_result: outcome.stat_value,
                line_value: outcome.line_value,
            },
        )
        .await?;
        bets::transition(conn, bet.id, BetStatus::Extracted, BetStatus::Settled).await?;

        info!(
            bet_id = bet.id,
            result = %outcome.result,
            delta = outcome.delta,
            "Settled bet {}: {} {}",
            bet.id,
            outcome.result,
            outcome.delta,
        );
        Ok(Disposition::Settled)
    }

    async fn mark_unplayed(
        &self,
        conn: &mut SqliteConnection,
        bet_id: i64,
        b: &Settleable,
    ) -> std::result::Result<Disposition, StepError> {
        settlement::insert_unplayed(conn, bet_id, b.player_id, &b.date).await?;
        bets::transition(conn, bet_id, BetStatus::Extracted, BetStatus::Unplayed).await?;
        Ok(Disposition::Unplayed)
    }

    /// Stat line for the player's game on `date`, or `None` if the log has no
    /// game that day. Logs are fetched once per (player, season) per run.
    async fn fetch_line(
        &mut self,
        player_id: i64,
        date: NaiveDate,
    ) -> std::result::Result<Option<GameStatLine>, StepError> {
        let season = self.season.clone().unwrap_or_else(|| season_for(date));
        let key = (player_id, season);

        if !self.game_logs.contains_key(&key) {
            let (min, max) = self.delay_ms;
            let pause = rand::thread_rng().gen_range(min..=max);
            tokio::time::sleep(Duration::from_millis(pause)).await;

            info!(player_id, season = %key.1, "Fetching game log from stats service");
            let started = Instant::now();
            let log = self
                .stats
                .game_log(player_id, &key.1)
                .await
                .map_err(StepError::Fatal)?;
            self.latency.record(started.elapsed());
            self.game_logs.insert(key.clone(), log);
        }

        let log = self.game_logs.get(&key).map(Vec::as_slice).unwrap_or_default();
        if log.is_empty() {
            return Err(SettleError::EmptyGameLog.into());
        }
        Ok(log.iter().find(|e| e.date == date).map(|e| e.line))
    }
}
