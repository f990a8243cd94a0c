//! Human review loop: flagged candidates go out as a CSV plus image copies,
//! edited rows come back and are re-classified before anything is committed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

use crate::config::ValidRanges;
use crate::db::bets;
use crate::db::models::{BetCorrection, BetRow};
use crate::error::{AppError, Result};
use crate::review::classifier::{classify_image, CandidateFields};
use crate::roster::PlayerResolver;
use crate::types::BetStatus;

/// One row of the review file. Numeric fields stay textual so a bad hand
/// edit is reported by the classifier instead of failing the whole import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: i64,
    pub date: Option<String>,
    pub bet_type: Option<String>,
    pub score: Option<String>,
    pub bet_line: Option<String>,
    pub odds: Option<String>,
    pub player: Option<String>,
    pub read_players: Option<String>,
    pub read_score_patterns: Option<String>,
    pub raw_text: String,
    pub image_source: String,
}

impl From<&BetRow> for ReviewRecord {
    fn from(b: &BetRow) -> Self {
        Self {
            id: b.id,
            date: b.date.clone(),
            bet_type: b.bet_type.clone(),
            score: b.score.map(|s| s.to_string()),
            bet_line: b.bet_line.clone(),
            odds: b.odds.map(|o| o.to_string()),
            player: b.player_name.clone(),
            read_players: b.read_players.clone(),
            read_score_patterns: b.read_score_patterns.clone(),
            raw_text: b.raw_text.clone(),
            image_source: b.image_source.clone(),
        }
    }
}

impl From<&ReviewRecord> for CandidateFields {
    fn from(r: &ReviewRecord) -> Self {
        Self {
            player_name: r.player.clone(),
            bet_type: r.bet_type.clone(),
            score: r.score.clone(),
            date: r.date.clone(),
            bet_line: r.bet_line.clone(),
            odds: r.odds.clone(),
        }
    }
}

/// Where review files and image copies live, and where the originals are.
#[derive(Debug, Clone)]
pub struct ReviewWorkspace {
    pub csv_dir: PathBuf,
    pub images_dir: PathBuf,
    pub source_images: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub voided: usize,
    pub corrected: usize,
    pub still_flagged: usize,
}

pub fn read_records(path: &Path) -> Result<Vec<ReviewRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

pub fn write_records(path: &Path, records: &[ReviewRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every pending review row to `reviews_MM-DD.csv` and refresh the
/// image copies. Returns the file written, or `None` when nothing is flagged.
pub async fn export_for_review(pool: &SqlitePool, ws: &ReviewWorkspace) -> Result<Option<PathBuf>> {
    let rows = {
        let mut conn = pool.acquire().await?;
        bets::bets_with_status(&mut conn, BetStatus::NeedsReview).await?
    };

    std::fs::create_dir_all(&ws.csv_dir)?;
    clear_dir(&ws.images_dir)?;

    if rows.is_empty() {
        info!("No entries need review");
        return Ok(None);
    }

    let path = ws
        .csv_dir
        .join(format!("reviews_{}.csv", chrono::Local::now().format("%m-%d")));
    let records: Vec<ReviewRecord> = rows.iter().map(ReviewRecord::from).collect();
    write_records(&path, &records)?;

    let images: HashSet<&str> = rows.iter().map(|r| r.image_source.as_str()).collect();
    for image in &images {
        let source = ws.source_images.join(image);
        if !source.exists() {
            debug!(image = %image, "Source image not found, not copied");
            continue;
        }
        if let Err(e) = std::fs::copy(&source, ws.images_dir.join(image)) {
            error!(image = %image, "Error copying image: {e}");
        }
    }

    info!(
        entries = records.len(),
        images = images.len(),
        "Exported {} entries to {}",
        records.len(),
        path.display(),
    );
    Ok(Some(path))
}

/// Merge an edited review file back, then re-export what is still pending.
///
/// Flagged ids missing from the file are voided. The remaining rows are
/// re-classified per image; an image is committed only when every one of
/// its rows passes, otherwise it stays flagged untouched. One bad row holds
/// back the other rows of its image: the reviewer fixes it or deletes it
/// from the file (voiding it) to release the rest. An image whose correction
/// duplicates an existing bet also stays flagged while the rest of the file
/// commits. An empty file is a no-op so a truncated export can never void
/// everything.
pub async fn import_reviewed(
    pool: &SqlitePool,
    resolver: &PlayerResolver,
    ranges: &ValidRanges,
    ws: &ReviewWorkspace,
    file: &Path,
) -> Result<ImportSummary> {
    let path = if file.exists() { file.to_path_buf() } else { ws.csv_dir.join(file) };
    if !path.exists() {
        return Err(AppError::NotFound(format!("review file {}", file.display())));
    }

    let records = read_records(&path)?;
    if records.is_empty() {
        info!(file = %path.display(), "No entries to update");
        return Ok(ImportSummary::default());
    }

    let mut summary = ImportSummary::default();
    let mut tx = pool.begin().await?;

    let flagged: HashMap<i64, BetRow> = bets::bets_with_status(&mut tx, BetStatus::NeedsReview)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();
    let listed: HashSet<i64> = records.iter().map(|r| r.id).collect();

    let mut deleted: Vec<i64> = flagged.keys().copied().filter(|id| !listed.contains(id)).collect();
    deleted.sort_unstable();
    for id in &deleted {
        bets::transition(&mut tx, *id, BetStatus::NeedsReview, BetStatus::Voided).await?;
    }
    summary.voided = deleted.len();
    if !deleted.is_empty() {
        info!(ids = ?deleted, "Marked {} deleted entries as voided", deleted.len());
    }

    // Group by the stored image so a reviewer cannot move a row between slips.
    let mut by_image: BTreeMap<&str, Vec<&ReviewRecord>> = BTreeMap::new();
    for record in &records {
        match flagged.get(&record.id) {
            Some(row) => by_image.entry(row.image_source.as_str()).or_default().push(record),
            None => debug!(bet_id = record.id, "Ignoring row that is not pending review"),
        }
    }

    for (image, rows) in by_image {
        let fields: Vec<CandidateFields> = rows.iter().map(|r| CandidateFields::from(*r)).collect();
        let review = classify_image(&fields, resolver, ranges);
        if review.needs_review() {
            debug!(image = %image, reasons = %review.summary(), "Reviewed image still invalid");
            summary.still_flagged += rows.len();
            continue;
        }
        let fixes = rows
            .iter()
            .zip(&fields)
            .map(|(record, f)| correction(f, resolver).map(|fix| (record.id, fix)))
            .collect::<Result<Vec<_>>>()?;
        if !commit_image(&mut tx, image, &fixes).await? {
            summary.still_flagged += rows.len();
            continue;
        }
        for record in &rows {
            info!(bet_id = record.id, image = %image, "Updated valid entry");
        }
        summary.corrected += rows.len();
    }

    tx.commit().await?;
    info!(
        voided = summary.voided,
        corrected = summary.corrected,
        still_flagged = summary.still_flagged,
        "Processed {} reviewed entries",
        records.len(),
    );

    export_for_review(pool, ws).await?;
    Ok(summary)
}

/// Re-resolve and re-classify every pending image against the current roster.
/// Images that now pass move to `extracted`; returns how many bets moved.
pub async fn reprocess_flagged(
    pool: &SqlitePool,
    resolver: &PlayerResolver,
    ranges: &ValidRanges,
) -> Result<usize> {
    let mut tx = pool.begin().await?;
    let pending = bets::bets_with_status(&mut tx, BetStatus::NeedsReview).await?;

    let mut by_image: BTreeMap<String, Vec<BetRow>> = BTreeMap::new();
    for row in pending {
        by_image.entry(row.image_source.clone()).or_default().push(row);
    }

    let mut moved = 0;
    for (image, rows) in by_image {
        let fields: Vec<CandidateFields> = rows
            .iter()
            .map(|r| {
                let mut f = CandidateFields::from(r);
                f.player_name = f.player_name.map(|n| resolver.canonical(n.trim()).to_string());
                f
            })
            .collect();

        let review = classify_image(&fields, resolver, ranges);
        if review.needs_review() {
            debug!(image = %image, reasons = %review.summary(), "Still needs review");
            refresh_ids(&mut tx, &rows, resolver).await?;
            continue;
        }
        let fixes = rows
            .iter()
            .zip(&fields)
            .map(|(row, f)| correction(f, resolver).map(|fix| (row.id, fix)))
            .collect::<Result<Vec<_>>>()?;
        if !commit_image(&mut tx, &image, &fixes).await? {
            continue;
        }
        info!(image = %image, bets = rows.len(), "Flagged image now passes");
        moved += rows.len();
    }

    tx.commit().await?;
    info!(moved, "Reprocessed flagged entries");
    Ok(moved)
}

/// Apply the corrections of one image inside a savepoint. When a corrected
/// row duplicates an existing bet the image is rolled back and left flagged;
/// returns whether it was committed.
async fn commit_image(
    conn: &mut SqliteConnection,
    image: &str,
    fixes: &[(i64, BetCorrection)],
) -> Result<bool> {
    let mut savepoint = sqlx::Connection::begin(&mut *conn).await?;
    for (id, fix) in fixes {
        match bets::apply_correction(&mut savepoint, *id, fix).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                savepoint.rollback().await?;
                warn!(
                    bet_id = *id,
                    image = %image,
                    "Correction duplicates an existing bet, image left flagged: {e}",
                );
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
    }
    savepoint.commit().await?;
    Ok(true)
}

async fn refresh_ids(
    conn: &mut SqliteConnection,
    rows: &[BetRow],
    resolver: &PlayerResolver,
) -> Result<()> {
    for row in rows {
        let id = row.player_name.as_deref().and_then(|n| resolver.lookup(n));
        if id != row.player_id {
            bets::update_flagged_fields(conn, row.id, id).await?;
        }
    }
    Ok(())
}

/// Typed fields of a row that already passed classification.
fn correction(f: &CandidateFields, resolver: &PlayerResolver) -> Result<BetCorrection> {
    let text = |v: &Option<String>, name: &str| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Config(format!("reviewed row is missing {name}")))
    };
    let player = text(&f.player_name, "player")?;
    let player_id = resolver
        .lookup(&player)
        .ok_or_else(|| AppError::NotFound(format!("player {player}")))?;
    let score = text(&f.score, "score")?;
    let odds = text(&f.odds, "odds")?;

    Ok(BetCorrection {
        player_name: resolver.canonical(&player).to_string(),
        player_id,
        bet_type: text(&f.bet_type, "bet type")?,
        score: score
            .parse()
            .map_err(|_| AppError::Config(format!("invalid score {score}")))?,
        date: text(&f.date, "date")?,
        bet_line: text(&f.bet_line, "bet line")?,
        odds: odds
            .parse()
            .map_err(|_| AppError::Config(format!("invalid odds {odds}")))?,
    })
}

fn clear_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(file = %path.display(), "Error deleting review image: {e}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::players::upsert_active;
    use crate::ingest::tests::{seeded, FakeTranscriber, CLEAN_SLIP, FLAGGED_SLIP};
    use crate::ingest::Ingestor;

    /// b.png's slip on the following day.
    const NEXT_DAY_SLIP: &str =
        "Points 1/17 Jalen Brunson +25.50% o21.5 -150 Alex Sarr +30.00% o8.5 -120";

    async fn ingest_extra(f: &Fixture, image: &str, text: &str) {
        let ocr = FakeTranscriber::new(&[(image, text)]);
        Ingestor::new(&f.pool, &ocr, &f.resolver, ValidRanges::default(), 2025)
            .process_image(Path::new(image))
            .await
            .unwrap();
    }

    struct Fixture {
        pool: SqlitePool,
        resolver: PlayerResolver,
        ws: ReviewWorkspace,
        _dir: tempfile::TempDir,
    }

    /// One clean image (a.png) and one flagged image (b.png) ingested.
    async fn fixture() -> Fixture {
        let (pool, resolver) = seeded().await;
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("images");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("b.png"), b"img").unwrap();

        let ocr = FakeTranscriber::new(&[("a.png", CLEAN_SLIP), ("b.png", FLAGGED_SLIP)]);
        let ingestor = Ingestor::new(&pool, &ocr, &resolver, ValidRanges::default(), 2025);
        ingestor.process_image(Path::new("a.png")).await.unwrap();
        ingestor.process_image(Path::new("b.png")).await.unwrap();

        let ws = ReviewWorkspace {
            csv_dir: dir.path().join("review_csvs"),
            images_dir: dir.path().join("review_images"),
            source_images: source,
        };
        Fixture { pool, resolver, ws, _dir: dir }
    }

    async fn statuses(pool: &SqlitePool) -> Vec<(i64, BetStatus)> {
        let mut conn = pool.acquire().await.unwrap();
        let mut rows = bets::list_bets(&mut conn, None, 100).await.unwrap();
        rows.sort_by_key(|r| r.id);
        rows.iter().map(|r| (r.id, r.status().unwrap())).collect()
    }

    #[tokio::test]
    async fn export_lists_flagged_rows_and_copies_images() {
        let f = fixture().await;
        let path = export_for_review(&f.pool, &f.ws).await.unwrap().unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.image_source == "b.png"));
        assert_eq!(records[1].player.as_deref(), Some("Alexandre Sarr"));
        assert!(f.ws.images_dir.join("b.png").exists());
    }

    #[tokio::test]
    async fn unedited_import_changes_nothing() {
        let f = fixture().await;
        let path = export_for_review(&f.pool, &f.ws).await.unwrap().unwrap();
        let before = statuses(&f.pool).await;

        let summary =
            import_reviewed(&f.pool, &f.resolver, &ValidRanges::default(), &f.ws, &path)
                .await
                .unwrap();
        assert_eq!(summary, ImportSummary { voided: 0, corrected: 0, still_flagged: 2 });
        assert_eq!(statuses(&f.pool).await, before);
    }

    #[tokio::test]
    async fn empty_file_voids_nothing() {
        let f = fixture().await;
        let path = export_for_review(&f.pool, &f.ws).await.unwrap().unwrap();
        write_records(&path, &[]).unwrap();

        let summary =
            import_reviewed(&f.pool, &f.resolver, &ValidRanges::default(), &f.ws, &path)
                .await
                .unwrap();
        assert_eq!(summary, ImportSummary::default());
        assert!(statuses(&f.pool).await.iter().all(|(_, s)| *s != BetStatus::Voided));
    }

    #[tokio::test]
    async fn deleted_row_is_voided_and_survivor_can_pass() {
        let f = fixture().await;
        let path = export_for_review(&f.pool, &f.ws).await.unwrap().unwrap();
        let records = read_records(&path).unwrap();
        let (kept, dropped) = (records[0].clone(), records[1].id);
        write_records(&path, &[kept.clone()]).unwrap();

        let summary =
            import_reviewed(&f.pool, &f.resolver, &ValidRanges::default(), &f.ws, &path)
                .await
                .unwrap();
        assert_eq!(summary, ImportSummary { voided: 1, corrected: 1, still_flagged: 0 });

        let mut conn = f.pool.acquire().await.unwrap();
        let voided = bets::get_bet(&mut conn, dropped).await.unwrap().unwrap();
        assert_eq!(voided.status(), Some(BetStatus::Voided));
        let ready = bets::get_bet(&mut conn, kept.id).await.unwrap().unwrap();
        assert_eq!(ready.status(), Some(BetStatus::Extracted));
    }

    #[tokio::test]
    async fn corrected_image_is_committed_with_resolved_id() {
        let f = fixture().await;
        let path = export_for_review(&f.pool, &f.ws).await.unwrap().unwrap();
        let mut records = read_records(&path).unwrap();
        records[1].player = Some("Josh Hart".to_string());
        records[1].odds = Some("-115".to_string());
        write_records(&path, &records).unwrap();

        let summary =
            import_reviewed(&f.pool, &f.resolver, &ValidRanges::default(), &f.ws, &path)
                .await
                .unwrap();
        assert_eq!(summary.corrected, 2);

        let mut conn = f.pool.acquire().await.unwrap();
        let row = bets::get_bet(&mut conn, records[1].id).await.unwrap().unwrap();
        assert_eq!(row.status(), Some(BetStatus::Extracted));
        assert_eq!(row.player_id, Some(1628404));
        assert_eq!(row.odds, Some(-115));
        drop(conn);

        // Nothing left to review: the re-export clears the workspace.
        assert!(!f.ws.images_dir.join("b.png").exists());
    }

    #[tokio::test]
    async fn bad_edit_leaves_whole_image_flagged() {
        let f = fixture().await;
        let path = export_for_review(&f.pool, &f.ws).await.unwrap().unwrap();
        let mut records = read_records(&path).unwrap();
        records[1].player = Some("Josh Hart".to_string());
        records[1].score = Some("abc".to_string());
        write_records(&path, &records).unwrap();

        let summary =
            import_reviewed(&f.pool, &f.resolver, &ValidRanges::default(), &f.ws, &path)
                .await
                .unwrap();
        assert_eq!(summary.still_flagged, 2);

        let mut conn = f.pool.acquire().await.unwrap();
        let row = bets::get_bet(&mut conn, records[1].id).await.unwrap().unwrap();
        assert_eq!(row.status(), Some(BetStatus::NeedsReview));
        assert_eq!(row.player_name.as_deref(), Some("Alexandre Sarr"));
    }

    #[tokio::test]
    async fn reprocess_picks_up_new_roster_entries() {
        let f = fixture().await;
        let ranges = ValidRanges::default();
        assert_eq!(reprocess_flagged(&f.pool, &f.resolver, &ranges).await.unwrap(), 0);

        let resolver = {
            let mut conn = f.pool.acquire().await.unwrap();
            upsert_active(&mut conn, 1642259, "Alexandre Sarr").await.unwrap();
            crate::roster::resolver::load(&mut conn).await.unwrap()
        };
        assert_eq!(reprocess_flagged(&f.pool, &resolver, &ranges).await.unwrap(), 2);
        assert!(statuses(&f.pool).await.iter().all(|(_, s)| *s == BetStatus::Extracted));
    }

    #[tokio::test]
    async fn duplicate_correction_keeps_image_flagged_and_commits_the_rest() {
        let f = fixture().await;
        ingest_extra(&f, "c.png", NEXT_DAY_SLIP).await;
        let path = export_for_review(&f.pool, &f.ws).await.unwrap().unwrap();
        let (mut kept, dropped): (Vec<_>, Vec<_>) = read_records(&path)
            .unwrap()
            .into_iter()
            .partition(|r| r.image_source == "b.png");
        assert_eq!((kept.len(), dropped.len()), (2, 2));

        // Josh Hart's bet from a.png typed again onto b.png.
        kept[1].player = Some("Josh Hart".to_string());
        kept[1].date = Some("2025-01-15".to_string());
        kept[1].bet_line = Some("u8.5".to_string());
        write_records(&path, &kept).unwrap();

        let summary =
            import_reviewed(&f.pool, &f.resolver, &ValidRanges::default(), &f.ws, &path)
                .await
                .unwrap();
        assert_eq!(summary, ImportSummary { voided: 2, corrected: 0, still_flagged: 2 });

        let mut conn = f.pool.acquire().await.unwrap();
        for r in &kept {
            let row = bets::get_bet(&mut conn, r.id).await.unwrap().unwrap();
            assert_eq!(row.status(), Some(BetStatus::NeedsReview));
        }
        let untouched = bets::get_bet(&mut conn, kept[1].id).await.unwrap().unwrap();
        assert_eq!(untouched.player_name.as_deref(), Some("Alexandre Sarr"));
        for r in &dropped {
            let row = bets::get_bet(&mut conn, r.id).await.unwrap().unwrap();
            assert_eq!(row.status(), Some(BetStatus::Voided));
        }
    }

    #[tokio::test]
    async fn reprocess_skips_image_that_duplicates_another() {
        let f = fixture().await;
        // Same slip again: only the unresolved row is stored for c.png.
        ingest_extra(&f, "c.png", FLAGGED_SLIP).await;
        let resolver = {
            let mut conn = f.pool.acquire().await.unwrap();
            upsert_active(&mut conn, 1642259, "Alexandre Sarr").await.unwrap();
            crate::roster::resolver::load(&mut conn).await.unwrap()
        };

        let moved = reprocess_flagged(&f.pool, &resolver, &ValidRanges::default()).await.unwrap();
        assert_eq!(moved, 2);

        let all = statuses(&f.pool).await;
        assert_eq!(all.len(), 5);
        assert!(all[..4].iter().all(|(_, s)| *s == BetStatus::Extracted));
        assert_eq!(all[4].1, BetStatus::NeedsReview);
    }
}
