/// Database row types matching `migrations/0001_init.sql`.
/// Used by sqlx for typed queries.
use crate::types::{BetStatus, GameStatLine};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayerRow {
    pub external_id: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BetRow {
    pub id: i64,
    pub player_name: Option<String>,
    pub player_id: Option<i64>,
    pub bet_type: Option<String>,
    pub score: Option<f64>,
    pub date: Option<String>,
    pub bet_line: Option<String>,
    pub odds: Option<i64>,
    pub image_source: String,
    pub raw_text: String,
    pub read_players: Option<String>,
    pub read_score_patterns: Option<String>,
    pub status: String,
    pub created_at: i64,
}

impl BetRow {
    /// `None` only if the row holds a status the schema CHECK would reject.
    pub fn status(&self) -> Option<BetStatus> {
        self.status.parse().ok()
    }
}

/// A candidate ready to be written by the ingest pipeline.
#[derive(Debug, Clone)]
pub struct NewBet {
    pub player_name: Option<String>,
    pub player_id: Option<i64>,
    pub bet_type: Option<String>,
    pub score: Option<f64>,
    pub date: Option<String>,
    pub bet_line: Option<String>,
    pub odds: Option<i64>,
    pub image_source: String,
    pub raw_text: String,
    /// JSON-encoded diagnostics.
    pub read_players: Option<String>,
    pub read_score_patterns: Option<String>,
    pub status: BetStatus,
}

/// Field values a reviewer may correct.
#[derive(Debug, Clone, PartialEq)]
pub struct BetCorrection {
    pub player_name: String,
    pub player_id: i64,
    pub bet_type: String,
    pub score: f64,
    pub date: String,
    pub bet_line: String,
    pub odds: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameStatRow {
    pub id: i64,
    pub player_id: i64,
    pub date: String,
    pub points: f64,
    pub assists: f64,
    pub rebounds: f64,
    pub three_pointers: f64,
    pub blocks: f64,
    pub steals: f64,
    pub turnovers: f64,
    pub par: f64,
    pub pts_rebs: f64,
    pub pts_asts: f64,
    pub rebs_asts: f64,
}

impl GameStatRow {
    pub fn line(&self) -> GameStatLine {
        GameStatLine {
            points: self.points,
            assists: self.assists,
            rebounds: self.rebounds,
            three_pointers: self.three_pointers,
            blocks: self.blocks,
            steals: self.steals,
            turnovers: self.turnovers,
            par: self.par,
            pts_rebs: self.pts_rebs,
            pts_asts: self.pts_asts,
            rebs_asts: self.rebs_asts,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BetResultRow {
    pub id: i64,
    pub bet_id: i64,
    pub player_id: i64,
    pub game_stats_id: i64,
    pub bet_type: String,
    pub result: String,
    pub result_delta: f64,
    pub score_range: String,
    pub over_under: String,
    pub stat_result: f64,
    pub line_value: f64,
    pub is_uploaded: bool,
    pub processed_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewBetResult {
    pub bet_id: i64,
    pub player_id: i64,
    pub game_stats_id: i64,
    pub bet_type: String,
    pub result: String,
    pub result_delta: f64,
    pub score_range: String,
    pub over_under: String,
    pub stat_result: f64,
    pub line_value: f64,
}

/// A settled result not yet mirrored to the reporting sink.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnuploadedRow {
    pub result_id: i64,
    pub bet_type: String,
    pub score_range: String,
    pub result_delta: f64,
    pub date: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AggregateRow {
    pub cell_key: String,
    pub bet_type: String,
    pub score_range: String,
    pub result_cell: String,
    pub volume_cell: String,
    pub volume: i64,
    pub result: f64,
    pub updated_to: String,
    pub processed_at: i64,
}
