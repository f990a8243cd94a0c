//! Push settled results to the reporting sink as running totals per
//! (bet type, score range) bucket.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::db::models::AggregateRow;
use crate::db::reporting;
use crate::error::{AppError, Result};
use crate::report::cells::{cell_key, cells_for, CellPair};
use crate::report::sink::ReportingSink;
use crate::types::{BetType, ScoreRange};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSummary {
    pub results: usize,
    pub buckets: usize,
    /// Update summary file, absent on a dry run or when nothing was pending.
    pub summary_file: Option<PathBuf>,
}

/// One line of the update summary file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellUpdate {
    pub bet_type: String,
    pub score_range: String,
    pub location: String,
    pub kind: &'static str,
    pub current: f64,
    pub change: f64,
    pub new_value: f64,
}

struct Bucket {
    bet_type: BetType,
    range: ScoreRange,
    cells: CellPair,
    delta: f64,
    count: i64,
}

pub async fn upload(
    pool: &SqlitePool,
    sink: &dyn ReportingSink,
    updates_dir: &Path,
    dry_run: bool,
) -> Result<UploadSummary> {
    let mut tx = pool.begin().await?;
    let pending = reporting::unuploaded_results(&mut tx).await?;
    if pending.is_empty() {
        info!("No unuploaded bets to process");
        return Ok(UploadSummary::default());
    }

    let mut buckets: BTreeMap<(BetType, ScoreRange), Bucket> = BTreeMap::new();
    for row in &pending {
        let bet_type: BetType = row.bet_type.parse().map_err(AppError::Sink)?;
        let range: ScoreRange = row.score_range.parse().map_err(AppError::Sink)?;
        let bucket = buckets.entry((bet_type, range)).or_insert_with(|| Bucket {
            bet_type,
            range,
            cells: cells_for(bet_type, range),
            delta: 0.0,
            count: 0,
        });
        bucket.delta += row.result_delta;
        bucket.count += 1;
    }
    let last_date = pending.iter().map(|r| r.date.as_str()).max().unwrap_or_default().to_string();
    info!(results = pending.len(), buckets = buckets.len(), "Processing new uploads");

    let wanted: Vec<String> = buckets
        .values()
        .flat_map(|b| [b.cells.result.clone(), b.cells.volume.clone()])
        .collect();
    let current = sink.read_cells(&wanted).await?;
    let value_of = |cell: &str| current.get(cell).copied().unwrap_or(0.0);

    let mut updates = Vec::with_capacity(wanted.len());
    let mut report = Vec::with_capacity(wanted.len());
    let mut aggregates = Vec::with_capacity(buckets.len());
    for b in buckets.values() {
        let (cur_result, cur_volume) = (value_of(&b.cells.result), value_of(&b.cells.volume));
        let (new_result, new_volume) = (cur_result + b.delta, cur_volume + b.count as f64);

        report.push(CellUpdate {
            bet_type: b.bet_type.to_string(),
            score_range: b.range.to_string(),
            location: b.cells.result.clone(),
            kind: "Result",
            current: cur_result,
            change: b.delta,
            new_value: new_result,
        });
        report.push(CellUpdate {
            bet_type: b.bet_type.to_string(),
            score_range: b.range.to_string(),
            location: b.cells.volume.clone(),
            kind: "Volume",
            current: cur_volume,
            change: b.count as f64,
            new_value: new_volume,
        });
        updates.push((b.cells.result.clone(), new_result));
        updates.push((b.cells.volume.clone(), new_volume));
        aggregates.push(AggregateRow {
            cell_key: cell_key(b.bet_type, b.range),
            bet_type: b.bet_type.to_string(),
            score_range: b.range.to_string(),
            result_cell: b.cells.result.clone(),
            volume_cell: b.cells.volume.clone(),
            volume: new_volume as i64,
            result: new_result,
            updated_to: last_date.clone(),
            processed_at: 0,
        });
    }

    for u in &report {
        info!(
            cell = %u.location,
            bet_type = %u.bet_type,
            score_range = %u.score_range,
            "{} {} -> {} ({:+})",
            u.kind,
            u.current,
            u.new_value,
            u.change,
        );
    }

    if dry_run {
        info!("DRY RUN - no changes written to the sheet or the database");
        return Ok(UploadSummary { results: pending.len(), buckets: buckets.len(), summary_file: None });
    }

    for agg in &aggregates {
        reporting::upsert_aggregate(&mut tx, agg).await?;
    }
    let ids: Vec<i64> = pending.iter().map(|r| r.result_id).collect();
    reporting::mark_uploaded(&mut tx, &ids).await?;

    // Sink before commit: a failed write rolls the store back with it. A
    // commit failing after the write leaves the sheet ahead of the store, and
    // the next upload would add these results again.
    sink.write_cells(&updates).await?;
    if let Err(e) = tx.commit().await {
        error!(
            cells = ?updates,
            results = ?ids,
            "Sheet written but store commit failed; restore these cells before the next upload: {e}",
        );
        return Err(e.into());
    }

    let summary_file = write_summary(updates_dir, &report)?;
    info!(
        results = pending.len(),
        file = %summary_file.display(),
        "Batch update completed",
    );
    Ok(UploadSummary {
        results: pending.len(),
        buckets: buckets.len(),
        summary_file: Some(summary_file),
    })
}

fn write_summary(dir: &Path, report: &[CellUpdate]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("updates_{}.csv", chrono::Local::now().format("%Y%m%d")));
    let mut writer = csv::Writer::from_path(&path)?;
    for update in report {
        writer.serialize(update)?;
    }
    writer.flush()?;
    Ok(path)
}
