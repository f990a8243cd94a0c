//! Bet rows and their status transitions.
//!
//! Every status change goes through [`transition`] or [`apply_correction`],
//! both of which guard on the current status so a stale caller can never move
//! a bet out of a terminal state.

use sqlx::SqliteConnection;

use crate::db::models::{BetCorrection, BetRow, NewBet};
use crate::db::now_secs;
use crate::error::{AppError, Result};
use crate::types::BetStatus;

const BET_COLUMNS: &str = "id, player_name, player_id, bet_type, score, date, bet_line, odds, \
     image_source, raw_text, read_players, read_score_patterns, status, created_at";

/// Insert a candidate. Returns `None` when the uniqueness key
/// (player, date, bet type, score) already exists.
pub async fn insert_bet(conn: &mut SqliteConnection, bet: &NewBet) -> Result<Option<i64>> {
    let res = sqlx::query(
        r#"
        INSERT OR IGNORE INTO bets (
            player_name, player_id, bet_type, score, date, bet_line, odds,
            image_source, raw_text, read_players, read_score_patterns,
            status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&bet.player_name)
    .bind(bet.player_id)
    .bind(&bet.bet_type)
    .bind(bet.score)
    .bind(&bet.date)
    .bind(&bet.bet_line)
    .bind(bet.odds)
    .bind(&bet.image_source)
    .bind(&bet.raw_text)
    .bind(&bet.read_players)
    .bind(&bet.read_score_patterns)
    .bind(bet.status.as_str())
    .bind(now_secs())
    .execute(&mut *conn)
    .await?;

    if res.rows_affected() == 0 {
        Ok(None)
    } else {
        Ok(Some(res.last_insert_rowid()))
    }
}

pub async fn get_bet(conn: &mut SqliteConnection, id: i64) -> Result<Option<BetRow>> {
    let row = sqlx::query_as::<_, BetRow>(&format!("SELECT {BET_COLUMNS} FROM bets WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

pub async fn bets_for_image(conn: &mut SqliteConnection, image: &str) -> Result<Vec<BetRow>> {
    let rows = sqlx::query_as::<_, BetRow>(&format!(
        "SELECT {BET_COLUMNS} FROM bets WHERE image_source = ? ORDER BY id"
    ))
    .bind(image)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn bets_with_status(
    conn: &mut SqliteConnection,
    status: BetStatus,
) -> Result<Vec<BetRow>> {
    let rows = sqlx::query_as::<_, BetRow>(&format!(
        "SELECT {BET_COLUMNS} FROM bets WHERE status = ? ORDER BY id"
    ))
    .bind(status.as_str())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Newest first, optionally filtered by status.
pub async fn list_bets(
    conn: &mut SqliteConnection,
    status: Option<BetStatus>,
    limit: i64,
) -> Result<Vec<BetRow>> {
    let rows = match status {
        Some(s) => {
            sqlx::query_as::<_, BetRow>(&format!(
                "SELECT {BET_COLUMNS} FROM bets WHERE status = ? ORDER BY id DESC LIMIT ?"
            ))
            .bind(s.as_str())
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_as::<_, BetRow>(&format!(
                "SELECT {BET_COLUMNS} FROM bets ORDER BY id DESC LIMIT ?"
            ))
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?
        }
    };
    Ok(rows)
}

/// Row count per stored status.
pub async fn status_counts(conn: &mut SqliteConnection) -> Result<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM bets GROUP BY status ORDER BY status")
            .fetch_all(&mut *conn)
            .await?;
    Ok(rows)
}

/// Move a bet from `from` to `to`. Fails without writing if the move is not a
/// legal transition or the stored status is no longer `from`.
pub async fn transition(
    conn: &mut SqliteConnection,
    id: i64,
    from: BetStatus,
    to: BetStatus,
) -> Result<()> {
    let to = from
        .transition(to)
        .ok_or(AppError::IllegalTransition { bet_id: id, from, to })?;
    let res = sqlx::query("UPDATE bets SET status = ? WHERE id = ? AND status = ?")
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        return Err(stale(conn, id, to).await);
    }
    Ok(())
}

/// Write reviewer-corrected fields and move the bet back to `extracted`.
pub async fn apply_correction(
    conn: &mut SqliteConnection,
    id: i64,
    fix: &BetCorrection,
) -> Result<()> {
    let res = sqlx::query(
        r#"
        UPDATE bets
        SET player_name = ?, player_id = ?, bet_type = ?, score = ?, date = ?,
            bet_line = ?, odds = ?, status = 'extracted'
        WHERE id = ? AND status = 'needs_review'
        "#,
    )
    .bind(&fix.player_name)
    .bind(fix.player_id)
    .bind(&fix.bet_type)
    .bind(fix.score)
    .bind(&fix.date)
    .bind(&fix.bet_line)
    .bind(fix.odds)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(stale(conn, id, BetStatus::Extracted).await);
    }
    Ok(())
}

/// Refresh the stored raw fields of a flagged bet without changing its status.
pub async fn update_flagged_fields(
    conn: &mut SqliteConnection,
    id: i64,
    player_id: Option<i64>,
) -> Result<()> {
    sqlx::query("UPDATE bets SET player_id = ? WHERE id = ? AND status = 'needs_review'")
        .bind(player_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn stale(conn: &mut SqliteConnection, id: i64, to: BetStatus) -> AppError {
    match get_bet(conn, id).await {
        Ok(Some(row)) => match row.status() {
            Some(from) => AppError::IllegalTransition { bet_id: id, from, to },
            None => AppError::NotFound(format!("bet {id} has unknown status {}", row.status)),
        },
        Ok(None) => AppError::NotFound(format!("bet {id}")),
        Err(e) => e,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::players::upsert_active;
    use crate::db::test_pool;

    pub(crate) fn new_bet(player_id: Option<i64>, score: Option<f64>, status: BetStatus) -> NewBet {
        NewBet {
            player_name: Some("Jalen Brunson".to_string()),
            player_id,
            bet_type: Some("points".to_string()),
            score,
            date: Some("2025-01-15".to_string()),
            bet_line: Some("o21.5".to_string()),
            odds: Some(-150),
            image_source: "slip.png".to_string(),
            raw_text: "raw".to_string(),
            read_players: None,
            read_score_patterns: None,
            status,
        }
    }

    #[tokio::test]
    async fn duplicate_key_is_ignored() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        upsert_active(&mut conn, 7, "Jalen Brunson").await.unwrap();

        let bet = new_bet(Some(7), Some(25.0), BetStatus::Extracted);
        assert!(insert_bet(&mut conn, &bet).await.unwrap().is_some());
        assert!(insert_bet(&mut conn, &bet).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn incomplete_rows_never_collide() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let bet = new_bet(None, None, BetStatus::NeedsReview);
        assert!(insert_bet(&mut conn, &bet).await.unwrap().is_some());
        assert!(insert_bet(&mut conn, &bet).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn voided_bet_cannot_be_settled() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let id = insert_bet(&mut conn, &new_bet(None, None, BetStatus::NeedsReview))
            .await
            .unwrap()
            .unwrap();
        transition(&mut conn, id, BetStatus::NeedsReview, BetStatus::Voided).await.unwrap();

        let err = transition(&mut conn, id, BetStatus::Extracted, BetStatus::Settled)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::IllegalTransition { from: BetStatus::Voided, to: BetStatus::Settled, .. }
        ));
        let row = get_bet(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(row.status(), Some(BetStatus::Voided));
    }

    #[tokio::test]
    async fn correction_only_applies_to_flagged_rows() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        upsert_active(&mut conn, 7, "Jalen Brunson").await.unwrap();

        let id = insert_bet(&mut conn, &new_bet(None, Some(15.0), BetStatus::NeedsReview))
            .await
            .unwrap()
            .unwrap();
        let fix = BetCorrection {
            player_name: "Jalen Brunson".to_string(),
            player_id: 7,
            bet_type: "points".to_string(),
            score: 25.0,
            date: "2025-01-15".to_string(),
            bet_line: "o21.5".to_string(),
            odds: -150,
        };
        apply_correction(&mut conn, id, &fix).await.unwrap();
        let row = get_bet(&mut conn, id).await.unwrap().unwrap();
        assert_eq!(row.status(), Some(BetStatus::Extracted));
        assert_eq!(row.score, Some(25.0));

        assert!(apply_correction(&mut conn, id, &fix).await.is_err());
    }
}
