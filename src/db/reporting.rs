use sqlx::SqliteConnection;

use crate::db::models::{AggregateRow, UnuploadedRow};
use crate::db::now_secs;
use crate::error::Result;

/// Settled results not yet pushed to the sheet, oldest first.
pub async fn unuploaded_results(conn: &mut SqliteConnection) -> Result<Vec<UnuploadedRow>> {
    let rows = sqlx::query_as::<_, UnuploadedRow>(
        r#"
        SELECT r.id AS result_id, r.bet_type, r.score_range, r.result_delta, b.date
        FROM bet_results r
        JOIN bets b ON b.id = r.bet_id
        WHERE r.is_uploaded = 0
        ORDER BY r.id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn mark_uploaded(conn: &mut SqliteConnection, result_ids: &[i64]) -> Result<()> {
    for id in result_ids {
        sqlx::query("UPDATE bet_results SET is_uploaded = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn upsert_aggregate(conn: &mut SqliteConnection, row: &AggregateRow) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO aggregated_results (
            cell_key, bet_type, score_range, result_cell, volume_cell,
            volume, result, updated_to, processed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(cell_key) DO UPDATE SET
            result_cell = excluded.result_cell,
            volume_cell = excluded.volume_cell,
            volume = excluded.volume,
            result = excluded.result,
            updated_to = excluded.updated_to,
            processed_at = excluded.processed_at
        "#,
    )
    .bind(&row.cell_key)
    .bind(&row.bet_type)
    .bind(&row.score_range)
    .bind(&row.result_cell)
    .bind(&row.volume_cell)
    .bind(row.volume)
    .bind(row.result)
    .bind(&row.updated_to)
    .bind(now_secs())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn all_aggregates(conn: &mut SqliteConnection) -> Result<Vec<AggregateRow>> {
    let rows = sqlx::query_as::<_, AggregateRow>(
        r#"
        SELECT cell_key, bet_type, score_range, result_cell, volume_cell,
               volume, result, updated_to, processed_at
        FROM aggregated_results ORDER BY bet_type, score_range
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
