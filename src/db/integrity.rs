//! Read-only consistency checks over the store. Issues are reported and
//! logged, never repaired.

use std::sync::LazyLock;

use regex::Regex;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::config::ValidRanges;
use crate::error::Result;

static LINE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ou]\d+\.5$").expect("static regex"));

/// Number of offending ids echoed into the log line.
const SAMPLE_IDS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityIssue {
    pub check: &'static str,
    pub ids: Vec<i64>,
}

/// Checks that need no parameters: (name, query returning offending ids).
const SQL_CHECKS: &[(&str, &str)] = &[
    (
        "invalid_player_ids",
        "SELECT b.id FROM bets b LEFT JOIN players p ON p.external_id = b.player_id
         WHERE b.player_id IS NOT NULL AND p.external_id IS NULL",
    ),
    (
        "duplicate_game_stats",
        "SELECT MIN(id) FROM game_stats GROUP BY player_id, date HAVING COUNT(*) > 1",
    ),
    (
        "settled_without_result",
        "SELECT b.id FROM bets b LEFT JOIN bet_results r ON r.bet_id = b.id
         WHERE b.status = 'settled' AND r.id IS NULL",
    ),
    (
        "unplayed_without_record",
        "SELECT b.id FROM bets b LEFT JOIN unplayed_bets u ON u.bet_id = b.id
         WHERE b.status = 'unplayed' AND u.id IS NULL",
    ),
    (
        "unplayed_record_on_open_bet",
        "SELECT u.bet_id FROM unplayed_bets u JOIN bets b ON b.id = u.bet_id
         WHERE b.status <> 'unplayed'",
    ),
    (
        "result_on_unsettled_bet",
        "SELECT r.bet_id FROM bet_results r JOIN bets b ON b.id = r.bet_id
         WHERE b.status <> 'settled'",
    ),
    (
        "future_dates",
        "SELECT id FROM bets WHERE date IS NOT NULL AND date > date('now')",
    ),
    (
        "orphaned_results",
        "SELECT r.id FROM bet_results r LEFT JOIN bets b ON b.id = r.bet_id WHERE b.id IS NULL",
    ),
    (
        "orphaned_game_stats",
        "SELECT g.id FROM game_stats g
         WHERE NOT EXISTS (SELECT 1 FROM bet_results r WHERE r.game_stats_id = g.id)",
    ),
    (
        "results_missing_game_stats",
        "SELECT r.id FROM bet_results r LEFT JOIN game_stats g ON g.id = r.game_stats_id
         WHERE g.id IS NULL",
    ),
    (
        "duplicate_bets",
        "SELECT MIN(id) FROM bets WHERE player_id IS NOT NULL AND status <> 'voided'
         GROUP BY player_id, date, bet_type HAVING COUNT(*) > 1",
    ),
    (
        "missing_required_fields",
        "SELECT id FROM bets
         WHERE status IN ('extracted', 'settled', 'unplayed')
           AND (player_id IS NULL OR bet_type IS NULL OR score IS NULL OR date IS NULL
                OR bet_line IS NULL OR odds IS NULL)",
    ),
    (
        "inconsistent_result_delta",
        "SELECT id FROM bet_results
         WHERE (result = 'Win' AND result_delta <= 0) OR (result = 'Loss' AND result_delta >= 0)",
    ),
];

pub async fn run_checks(
    conn: &mut SqliteConnection,
    ranges: &ValidRanges,
) -> Result<Vec<IntegrityIssue>> {
    let mut issues = Vec::new();

    for (check, sql) in SQL_CHECKS {
        let ids: Vec<i64> = sqlx::query_scalar(sql).fetch_all(&mut *conn).await?;
        if !ids.is_empty() {
            issues.push(IntegrityIssue { check, ids });
        }
    }

    // Flagged rows are expected to be out of range; only trusted rows count.
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM bets WHERE status <> 'needs_review' AND status <> 'voided'
         AND score IS NOT NULL AND (score < ? OR score > ?)",
    )
    .bind(ranges.score.0)
    .bind(ranges.score.1)
    .fetch_all(&mut *conn)
    .await?;
    if !ids.is_empty() {
        issues.push(IntegrityIssue { check: "score_out_of_range", ids });
    }

    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM bets WHERE status <> 'needs_review' AND status <> 'voided'
         AND odds IS NOT NULL AND (odds < ? OR odds > ?)",
    )
    .bind(ranges.odds.0)
    .bind(ranges.odds.1)
    .fetch_all(&mut *conn)
    .await?;
    if !ids.is_empty() {
        issues.push(IntegrityIssue { check: "odds_out_of_range", ids });
    }

    let lines: Vec<(i64, String)> = sqlx::query_as(
        "SELECT id, bet_line FROM bets WHERE status <> 'needs_review' AND status <> 'voided'
         AND bet_line IS NOT NULL",
    )
    .fetch_all(&mut *conn)
    .await?;
    let ids: Vec<i64> = lines
        .into_iter()
        .filter(|(_, line)| !LINE_FORMAT.is_match(line))
        .map(|(id, _)| id)
        .collect();
    if !ids.is_empty() {
        issues.push(IntegrityIssue { check: "invalid_line_format", ids });
    }

    Ok(issues)
}

pub fn log_issues(issues: &[IntegrityIssue]) {
    if issues.is_empty() {
        info!("Integrity checks passed");
        return;
    }
    for issue in issues {
        let sample: Vec<i64> = issue.ids.iter().take(SAMPLE_IDS).copied().collect();
        warn!(
            check = issue.check,
            count = issue.ids.len(),
            sample = ?sample,
            "Integrity check {} found {} rows",
            issue.check,
            issue.ids.len(),
        );
    }
}

/// Run every check and log what it finds.
pub async fn validate(conn: &mut SqliteConnection, ranges: &ValidRanges) -> Result<Vec<IntegrityIssue>> {
    let issues = run_checks(conn, ranges).await?;
    log_issues(&issues);
    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::bets::tests::new_bet;
    use crate::db::bets::{insert_bet, transition};
    use crate::db::players::upsert_active;
    use crate::db::test_pool;
    use crate::types::BetStatus;

    #[tokio::test]
    async fn clean_store_has_no_issues() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        upsert_active(&mut conn, 7, "Jalen Brunson").await.unwrap();
        insert_bet(&mut conn, &new_bet(Some(7), Some(25.0), BetStatus::Extracted))
            .await
            .unwrap();

        let issues = run_checks(&mut conn, &ValidRanges::default()).await.unwrap();
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[tokio::test]
    async fn settled_bet_without_result_is_reported() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        upsert_active(&mut conn, 7, "Jalen Brunson").await.unwrap();
        let id = insert_bet(&mut conn, &new_bet(Some(7), Some(25.0), BetStatus::Extracted))
            .await
            .unwrap()
            .unwrap();
        transition(&mut conn, id, BetStatus::Extracted, BetStatus::Settled).await.unwrap();

        let issues = run_checks(&mut conn, &ValidRanges::default()).await.unwrap();
        assert_eq!(
            issues,
            vec![IntegrityIssue { check: "settled_without_result", ids: vec![id] }]
        );
    }

    #[tokio::test]
    async fn flagged_rows_are_not_range_checked() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let mut bet = new_bet(None, Some(15.0), BetStatus::NeedsReview);
        bet.bet_line = Some("021.5".to_string());
        insert_bet(&mut conn, &bet).await.unwrap();

        let issues = run_checks(&mut conn, &ValidRanges::default()).await.unwrap();
        assert!(issues.is_empty(), "{issues:?}");
    }
}
