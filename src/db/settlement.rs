use sqlx::SqliteConnection;

use crate::db::models::{BetResultRow, GameStatRow, NewBetResult};
use crate::db::now_secs;
use crate::error::Result;
use crate::types::GameStatLine;

// ---------------------------------------------------------------------------
// Game stats cache
// ---------------------------------------------------------------------------

pub async fn cached_stats(
    conn: &mut SqliteConnection,
    player_id: i64,
    date: &str,
) -> Result<Option<GameStatRow>> {
    let row = sqlx::query_as::<_, GameStatRow>(
        r#"
        SELECT id, player_id, date, points, assists, rebounds, three_pointers, blocks,
               steals, turnovers, par, pts_rebs, pts_asts, rebs_asts
        FROM game_stats WHERE player_id = ? AND date = ?
        "#,
    )
    .bind(player_id)
    .bind(date)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Store a fetched stat line and return its row id. An existing row for the
/// same (player, date) wins.
pub async fn insert_game_stats(
    conn: &mut SqliteConnection,
    player_id: i64,
    date: &str,
    line: &GameStatLine,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO game_stats (
            player_id, date, points, assists, rebounds, three_pointers, blocks,
            steals, turnovers, par, pts_rebs, pts_asts, rebs_asts, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(player_id)
    .bind(date)
    .bind(line.points)
    .bind(line.assists)
    .bind(line.rebounds)
    .bind(line.three_pointers)
    .bind(line.blocks)
    .bind(line.steals)
    .bind(line.turnovers)
    .bind(line.par)
    .bind(line.pts_rebs)
    .bind(line.pts_asts)
    .bind(line.rebs_asts)
    .bind(now_secs())
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM game_stats WHERE player_id = ? AND date = ?")
        .bind(player_id)
        .bind(date)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Unplayed markers
// ---------------------------------------------------------------------------

/// True when some earlier bet already established that the player did not
/// play on `date`.
pub async fn known_unplayed(conn: &mut SqliteConnection, player_id: i64, date: &str) -> Result<bool> {
    let hit: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM unplayed_bets WHERE player_id = ? AND date = ? LIMIT 1")
            .bind(player_id)
            .bind(date)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(hit.is_some())
}

pub async fn insert_unplayed(
    conn: &mut SqliteConnection,
    bet_id: i64,
    player_id: i64,
    date: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO unplayed_bets (bet_id, player_id, date, added_at) VALUES (?, ?, ?, ?)",
    )
    .bind(bet_id)
    .bind(player_id)
    .bind(date)
    .bind(now_secs())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

pub async fn insert_result(conn: &mut SqliteConnection, r: &NewBetResult) -> Result<i64> {
    let res = sqlx::query(
        r#"
        INSERT INTO bet_results (
            bet_id, player_id, game_stats_id, bet_type, result, result_delta,
            score_range, over_under, stat_result, line_value, is_uploaded, processed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(r.bet_id)
    .bind(r.player_id)
    .bind(r.game_stats_id)
    .bind(&r.bet_type)
    .bind(&r.result)
    .bind(r.result_delta)
    .bind(&r.score_range)
    .bind(&r.over_under)
    .bind(r.stat_result)
    .bind(r.line_value)
    .bind(now_secs())
    .execute(&mut *conn)
    .await?;
    Ok(res.last_insert_rowid())
}

pub async fn result_for_bet(conn: &mut SqliteConnection, bet_id: i64) -> Result<Option<BetResultRow>> {
    let row = sqlx::query_as::<_, BetResultRow>(
        r#"
        SELECT id, bet_id, player_id, game_stats_id, bet_type, result, result_delta,
               score_range, over_under, stat_result, line_value, is_uploaded, processed_at
        FROM bet_results WHERE bet_id = ?
        "#,
    )
    .bind(bet_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Win/loss totals per bet type: (bet_type, wins, losses, net delta).
pub async fn result_summary(conn: &mut SqliteConnection) -> Result<Vec<(String, i64, i64, f64)>> {
    let rows: Vec<(String, i64, i64, f64)> = sqlx::query_as(
        r#"
        SELECT bet_type,
               SUM(CASE WHEN result = 'Win' THEN 1 ELSE 0 END),
               SUM(CASE WHEN result = 'Loss' THEN 1 ELSE 0 END),
               SUM(result_delta)
        FROM bet_results
        GROUP BY bet_type
        ORDER BY bet_type
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
