use std::collections::HashMap;

use sqlx::SqliteConnection;

use crate::db::models::PlayerRow;
use crate::error::Result;

pub async fn all_players(conn: &mut SqliteConnection) -> Result<Vec<PlayerRow>> {
    let rows = sqlx::query_as::<_, PlayerRow>(
        "SELECT external_id, name, is_active FROM players ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Active roster as canonical name -> external id.
pub async fn active_roster(conn: &mut SqliteConnection) -> Result<HashMap<String, i64>> {
    let rows = sqlx::query_as::<_, PlayerRow>(
        "SELECT external_id, name, is_active FROM players WHERE is_active = 1",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(|p| (p.name, p.external_id)).collect())
}

/// Insert or reactivate a player. Returns `false` when the name is already
/// held by a different id (the row is left alone).
pub async fn upsert_active(conn: &mut SqliteConnection, id: i64, name: &str) -> Result<bool> {
    let holder: Option<i64> =
        sqlx::query_scalar("SELECT external_id FROM players WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
    if matches!(holder, Some(existing) if existing != id) {
        return Ok(false);
    }

    sqlx::query(
        r#"
        INSERT INTO players (external_id, name, is_active) VALUES (?, ?, 1)
        ON CONFLICT(external_id) DO UPDATE SET name = excluded.name, is_active = 1
        "#,
    )
    .bind(id)
    .bind(name)
    .execute(&mut *conn)
    .await?;
    Ok(true)
}

pub async fn mark_inactive(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    sqlx::query("UPDATE players SET is_active = 0 WHERE external_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn upsert_reactivates_and_renames() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(upsert_active(&mut conn, 1, "Jalen Brunson").await.unwrap());
        mark_inactive(&mut conn, 1).await.unwrap();
        assert!(active_roster(&mut conn).await.unwrap().is_empty());

        assert!(upsert_active(&mut conn, 1, "Jalen Brunson").await.unwrap());
        let roster = active_roster(&mut conn).await.unwrap();
        assert_eq!(roster.get("Jalen Brunson"), Some(&1));
    }

    #[tokio::test]
    async fn name_held_by_other_id_is_rejected() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(upsert_active(&mut conn, 1, "Jalen Williams").await.unwrap());
        assert!(!upsert_active(&mut conn, 2, "Jalen Williams").await.unwrap());
        assert_eq!(all_players(&mut conn).await.unwrap().len(), 1);
    }
}
