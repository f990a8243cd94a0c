use std::path::PathBuf;

use crate::error::{AppError, Result};

pub const STATS_API_URL: &str = "https://stats.nba.com/stats";
pub const OCR_COMMAND: &str = "tesseract {path} stdout";

/// Inclusive bounds a transcribed boost score must fall in to be trusted.
pub const VALID_SCORE_RANGE: (f64, f64) = (20.0, 100.0);

/// Inclusive bounds for American odds read off a slip.
pub const VALID_ODDS_RANGE: (i64, i64) = (-1000, 1000);

/// Randomized pause before every stats call, in milliseconds.
/// Keeps the run under the provider's throttling threshold.
pub const STATS_DELAY_MS: (u64, u64) = (500, 1000);

/// Timeout for stats and roster HTTP calls (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Payout for a winning bet in stake units.
pub const WIN_DELTA: f64 = 100.0;

/// Image extensions picked up by folder ingestion.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Score bucket bounds for reporting (lower inclusive, upper exclusive).
/// Everything at or above the last upper bound lands in the open "50+" bucket.
pub mod score_buckets {
    pub const FLOOR: f64 = 20.0;
    pub const WIDTH: f64 = 5.0;
    pub const CEILING: f64 = 50.0;
}

/// Validity bounds the classifier checks against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRanges {
    pub score: (f64, f64),
    pub odds: (i64, i64),
}

impl Default for ValidRanges {
    fn default() -> Self {
        Self {
            score: VALID_SCORE_RANGE,
            odds: VALID_ODDS_RANGE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Source images (IMAGES_DIR)
    pub images_dir: PathBuf,
    /// Review workspace root; CSVs and images live below it (REVIEW_DIR)
    pub review_dir: PathBuf,
    /// Upload summaries (UPDATES_DIR)
    pub updates_dir: PathBuf,
    pub stats_api_url: String,
    /// Remote roster endpoint (ROSTER_URL). Ignored when ROSTER_FILE is set.
    pub roster_url: String,
    /// Local JSON roster (ROSTER_FILE), array of {"name", "id"}.
    pub roster_file: Option<PathBuf>,
    /// OCR command template; `{path}` is replaced by the image path (OCR_COMMAND)
    pub ocr_command: String,
    /// CSV mirror of the reporting sheet (SHEET_PATH)
    pub sheet_path: PathBuf,
    /// Fixed season string like "2024-25" (SEASON). Derived from the bet date when unset.
    pub season: Option<String>,
    pub stats_delay_ms: (u64, u64),
    pub ranges: ValidRanges,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let stats_delay_min = parse_var("STATS_DELAY_MIN_MS", STATS_DELAY_MS.0)?;
        let stats_delay_max = parse_var("STATS_DELAY_MAX_MS", STATS_DELAY_MS.1)?;
        if stats_delay_min > stats_delay_max {
            return Err(AppError::Config(
                "STATS_DELAY_MIN_MS must not exceed STATS_DELAY_MAX_MS".to_string(),
            ));
        }

        let ranges = ValidRanges {
            score: (
                parse_var("SCORE_MIN", VALID_SCORE_RANGE.0)?,
                parse_var("SCORE_MAX", VALID_SCORE_RANGE.1)?,
            ),
            odds: (
                parse_var("ODDS_MIN", VALID_ODDS_RANGE.0)?,
                parse_var("ODDS_MAX", VALID_ODDS_RANGE.1)?,
            ),
        };

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "sports_bets.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            images_dir: path_var("IMAGES_DIR", data_dir.join("images")),
            review_dir: path_var("REVIEW_DIR", data_dir.join("review_info")),
            updates_dir: path_var("UPDATES_DIR", data_dir.join("review_info").join("update_csvs")),
            stats_api_url: std::env::var("STATS_API_URL")
                .unwrap_or_else(|_| STATS_API_URL.to_string()),
            roster_url: std::env::var("ROSTER_URL")
                .unwrap_or_else(|_| STATS_API_URL.to_string()),
            roster_file: std::env::var("ROSTER_FILE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            ocr_command: std::env::var("OCR_COMMAND").unwrap_or_else(|_| OCR_COMMAND.to_string()),
            sheet_path: path_var("SHEET_PATH", data_dir.join("results_sheet.csv")),
            season: std::env::var("SEASON").ok().filter(|s| !s.trim().is_empty()),
            stats_delay_ms: (stats_delay_min, stats_delay_max),
            ranges,
        })
    }

    pub fn review_csv_dir(&self) -> PathBuf {
        self.review_dir.join("review_csvs")
    }

    pub fn review_images_dir(&self) -> PathBuf {
        self.review_dir.join("review_images")
    }
}

fn path_var(name: &str, default: PathBuf) -> PathBuf {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{name} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}
