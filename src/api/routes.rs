use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{AggregateRow, BetRow};
use crate::db::{bets, players, reporting, settlement};
use crate::error::AppError;
use crate::types::BetStatus;

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/bets", get(get_bets))
        .route("/bets/:id", get(get_bet))
        .route("/results/summary", get(get_results_summary))
        .route("/aggregates", get(get_aggregates))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct BetsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub players: usize,
    pub bets_by_status: Vec<StatusCount>,
}

#[derive(Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct BetResponse {
    pub id: i64,
    pub player_name: Option<String>,
    pub player_id: Option<i64>,
    pub bet_type: Option<String>,
    pub score: Option<f64>,
    pub date: Option<String>,
    pub bet_line: Option<String>,
    pub odds: Option<i64>,
    pub image_source: String,
    pub status: String,
    /// Settled, unplayed or voided: the row will not change again.
    pub terminal: bool,
    pub created_at: i64,
}

impl From<BetRow> for BetResponse {
    fn from(r: BetRow) -> Self {
        let terminal = r.status().is_some_and(|s| s.is_terminal());
        Self {
            id: r.id,
            player_name: r.player_name,
            player_id: r.player_id,
            bet_type: r.bet_type,
            score: r.score,
            date: r.date,
            bet_line: r.bet_line,
            odds: r.odds,
            image_source: r.image_source,
            terminal,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BetDetailResponse {
    #[serde(flatten)]
    pub bet: BetResponse,
    pub raw_text: String,
    pub result: Option<String>,
    pub result_delta: Option<f64>,
    pub score_range: Option<String>,
}

#[derive(Serialize)]
pub struct ResultSummaryResponse {
    pub bet_type: String,
    pub wins: i64,
    pub losses: i64,
    pub net_delta: f64,
}

#[derive(Serialize)]
pub struct AggregateResponse {
    pub bet_type: String,
    pub score_range: String,
    pub result_cell: String,
    pub volume_cell: String,
    pub result: f64,
    pub volume: i64,
    pub updated_to: String,
}

impl From<AggregateRow> for AggregateResponse {
    fn from(r: AggregateRow) -> Self {
        Self {
            bet_type: r.bet_type,
            score_range: r.score_range,
            result_cell: r.result_cell,
            volume_cell: r.volume_cell,
            result: r.result,
            volume: r.volume,
            updated_to: r.updated_to,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let roster = players::all_players(&mut conn).await?;
    let counts = bets::status_counts(&mut conn).await?;
    Ok(Json(HealthResponse {
        status: "ok",
        players: roster.iter().filter(|p| p.is_active).count(),
        bets_by_status: counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect(),
    }))
}

async fn get_bets(
    State(state): State<ApiState>,
    Query(params): Query<BetsQuery>,
) -> Result<Json<Vec<BetResponse>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<BetStatus>)
        .transpose()
        .map_err(AppError::Config)?;
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);

    let mut conn = state.pool.acquire().await?;
    let rows = bets::list_bets(&mut conn, status, limit).await?;
    Ok(Json(rows.into_iter().map(BetResponse::from).collect()))
}

async fn get_bet(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<BetDetailResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let row = bets::get_bet(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("bet {id}")))?;
    let result = settlement::result_for_bet(&mut conn, id).await?;

    let raw_text = row.raw_text.clone();
    Ok(Json(BetDetailResponse {
        bet: BetResponse::from(row),
        raw_text,
        result: result.as_ref().map(|r| r.result.clone()),
        result_delta: result.as_ref().map(|r| r.result_delta),
        score_range: result.map(|r| r.score_range),
    }))
}

async fn get_results_summary(
    State(state): State<ApiState>,
) -> Result<Json<Vec<ResultSummaryResponse>>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let rows = settlement::result_summary(&mut conn).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(bet_type, wins, losses, net_delta)| ResultSummaryResponse {
                bet_type,
                wins,
                losses,
                net_delta,
            })
            .collect(),
    ))
}

async fn get_aggregates(
    State(state): State<ApiState>,
) -> Result<Json<Vec<AggregateResponse>>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let rows = reporting::all_aggregates(&mut conn).await?;
    Ok(Json(rows.into_iter().map(AggregateResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::bets::insert_bet;
    use crate::db::bets::tests::new_bet;
    use crate::db::players::upsert_active;
    use crate::db::test_pool;

    async fn state_with_bets() -> ApiState {
        let pool = test_pool().await;
        {
            let mut conn = pool.acquire().await.unwrap();
            upsert_active(&mut conn, 7, "Jalen Brunson").await.unwrap();
            insert_bet(&mut conn, &new_bet(Some(7), Some(25.0), BetStatus::Extracted))
                .await
                .unwrap();
            insert_bet(&mut conn, &new_bet(None, None, BetStatus::NeedsReview))
                .await
                .unwrap();
        }
        ApiState { pool }
    }

    #[tokio::test]
    async fn bets_filter_by_status() {
        let state = state_with_bets().await;
        let query = BetsQuery { status: Some("needs_review".to_string()), limit: None };
        let Json(rows) = get_bets(State(state), Query(query)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, "needs_review");
        assert!(!rows[0].terminal);
    }

    #[tokio::test]
    async fn unknown_status_is_rejected() {
        let state = state_with_bets().await;
        let query = BetsQuery { status: Some("pending".to_string()), limit: None };
        assert!(matches!(
            get_bets(State(state), Query(query)).await,
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn missing_bet_is_not_found() {
        let state = state_with_bets().await;
        let Json(found) = get_bet(State(state.clone()), Path(1)).await.unwrap();
        assert_eq!(found.bet.player_id, Some(7));
        assert_eq!(found.result, None);
        assert!(matches!(get_bet(State(state), Path(99)).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn health_counts_statuses() {
        let state = state_with_bets().await;
        let Json(health) = get_health(State(state)).await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.players, 1);
        assert_eq!(health.bets_by_status.len(), 2);
    }

    #[tokio::test]
    async fn settled_bets_are_terminal() {
        let state = state_with_bets().await;
        {
            let mut conn = state.pool.acquire().await.unwrap();
            insert_bet(&mut conn, &new_bet(Some(7), Some(26.0), BetStatus::Settled))
                .await
                .unwrap();
        }
        let query = BetsQuery { status: Some("settled".to_string()), limit: None };
        let Json(rows) = get_bets(State(state), Query(query)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].player_name.as_deref(), Some("Jalen Brunson"));
        assert!(rows[0].terminal);
    }
}
