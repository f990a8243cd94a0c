//! Shared plumbing for the stats-service endpoints (roster and game logs).
//! Both return the same `resultSets` envelope: named column headers plus
//! positional row arrays.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::{AppError, Result};

pub type ResultRow = HashMap<String, serde_json::Value>;

/// The stats site rejects requests without browser-like headers.
pub fn stats_client() -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Rows of the first result set, keyed by column header.
pub fn first_result_set(body: &serde_json::Value) -> Result<Vec<ResultRow>> {
    let set = body
        .get("resultSets")
        .and_then(|s| s.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| AppError::StatsService("response has no resultSets".to_string()))?;

    let headers: Vec<String> = set
        .get("headers")
        .and_then(|h| h.as_array())
        .ok_or_else(|| AppError::StatsService("result set has no headers".to_string()))?
        .iter()
        .map(|h| h.as_str().unwrap_or_default().to_string())
        .collect();

    let rows = set
        .get("rowSet")
        .and_then(|r| r.as_array())
        .ok_or_else(|| AppError::StatsService("result set has no rowSet".to_string()))?;

    Ok(rows
        .iter()
        .filter_map(|row| row.as_array())
        .map(|cells| {
            headers
                .iter()
                .cloned()
                .zip(cells.iter().cloned())
                .collect::<ResultRow>()
        })
        .collect())
}

/// Numeric cell; stats come back as numbers but occasionally as strings or null.
pub fn number(row: &ResultRow, key: &str) -> Option<f64> {
    match row.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn text<'a>(row: &'a ResultRow, key: &str) -> Option<&'a str> {
    row.get(key)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zips_headers_with_rows() {
        let body = json!({
            "resultSets": [{
                "name": "PlayerGameLog",
                "headers": ["GAME_DATE", "PTS"],
                "rowSet": [["JAN 15, 2025", 31], ["JAN 13, 2025", "12"]]
            }]
        });
        let rows = first_result_set(&body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(text(&rows[0], "GAME_DATE"), Some("JAN 15, 2025"));
        assert_eq!(number(&rows[0], "PTS"), Some(31.0));
        assert_eq!(number(&rows[1], "PTS"), Some(12.0));
    }

    #[test]
    fn missing_envelope_is_an_error() {
        assert!(first_result_set(&json!({"message": "rate limited"})).is_err());
    }
}
