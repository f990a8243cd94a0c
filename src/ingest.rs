//! Slip images to persisted bet candidates: transcribe, extract, normalize,
//! classify per image, then insert.

use std::path::{Path, PathBuf};

use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::config::{ValidRanges, IMAGE_EXTENSIONS};
use crate::db::bets;
use crate::db::models::{BetRow, NewBet};
use crate::error::Result;
use crate::extract::{extract_candidates, normalize, LabelMatcher, NormalizedCandidate, Transcriber};
use crate::review::classifier::{classify_image, CandidateFields};
use crate::roster::PlayerResolver;
use crate::types::BetStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub images: usize,
    pub skipped: usize,
    pub candidates: usize,
}

pub struct Ingestor<'a> {
    pool: &'a SqlitePool,
    transcriber: &'a dyn Transcriber,
    resolver: &'a PlayerResolver,
    labels: LabelMatcher,
    ranges: ValidRanges,
    year: i32,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        transcriber: &'a dyn Transcriber,
        resolver: &'a PlayerResolver,
        ranges: ValidRanges,
        year: i32,
    ) -> Self {
        Self {
            pool,
            transcriber,
            resolver,
            labels: LabelMatcher::bet_types(),
            ranges,
            year,
        }
    }

    /// Process every image in `dir`. A failing image is logged and skipped.
    pub async fn process_folder(&self, dir: &Path) -> Result<IngestSummary> {
        info!(dir = %dir.display(), "Starting folder processing");
        let mut summary = IngestSummary::default();

        for path in image_files(dir)? {
            summary.images += 1;
            match self.process_image(&path).await {
                Ok(Some(rows)) => summary.candidates += rows.len(),
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    error!(image = %path.display(), "Error processing image: {e}");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            images = summary.images,
            skipped = summary.skipped,
            candidates = summary.candidates,
            "Completed processing {} bets from {}",
            summary.candidates,
            dir.display(),
        );
        Ok(summary)
    }

    /// Rows for one image, or `None` if the image yields nothing. An image
    /// that already has rows is never transcribed again.
    pub async fn process_image(&self, path: &Path) -> Result<Option<Vec<BetRow>>> {
        let image = image_name(path);
        info!(image = %image, "Processing image");

        {
            let mut conn = self.pool.acquire().await?;
            let existing = bets::bets_for_image(&mut conn, &image).await?;
            if !existing.is_empty() {
                info!(image = %image, rows = existing.len(), "Using existing data");
                return Ok(Some(existing));
            }
        }

        let raw_text = match self.transcriber.transcribe(path).await {
            Ok(text) => text,
            Err(e) => {
                error!(image = %image, "OCR failed: {e}");
                return Ok(None);
            }
        };

        let Some(raw) = extract_candidates(&raw_text, &self.labels, self.resolver) else {
            error!(image = %image, "Failed to extract data");
            return Ok(None);
        };
        let normalized: Vec<NormalizedCandidate> =
            raw.iter().map(|c| normalize(c, self.year)).collect();

        let fields: Vec<CandidateFields> = normalized.iter().map(CandidateFields::from).collect();
        let review = classify_image(&fields, self.resolver, &self.ranges);
        if review.needs_review() {
            warn!(image = %image, reasons = %review.summary(), "Image needs review");
        }
        let status = BetStatus::initial(review.needs_review());

        let mut tx = self.pool.begin().await?;
        for c in &normalized {
            let bet = NewBet {
                player_id: c.player_name.as_deref().and_then(|n| self.resolver.lookup(n)),
                player_name: c.player_name.clone(),
                bet_type: c.bet_type.clone(),
                score: c.score,
                date: c.date.clone(),
                bet_line: c.bet_line.clone(),
                odds: c.odds,
                image_source: image.clone(),
                raw_text: raw_text.clone(),
                read_players: c.read_player.as_ref().map(serde_json::to_string).transpose()?,
                read_score_patterns: c
                    .read_score_pattern
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                status,
            };
            if bets::insert_bet(&mut tx, &bet).await?.is_none() {
                warn!(image = %image, player = ?bet.player_name, "Duplicate bet ignored");
            }
        }
        let rows = bets::bets_for_image(&mut tx, &image).await?;
        tx.commit().await?;

        Ok(Some(rows))
    }
}

pub fn image_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Image files directly in `dir`, sorted by name.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::players::upsert_active;
    use crate::db::test_pool;
    use crate::error::AppError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transcriber answering from a map of file name to slip text.
    pub(crate) struct FakeTranscriber {
        pub texts: HashMap<String, String>,
        pub calls: AtomicUsize,
    }

    impl FakeTranscriber {
        pub(crate) fn new(texts: &[(&str, &str)]) -> Self {
            Self {
                texts: texts.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, image: &Path) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts
                .get(&image_name(image))
                .cloned()
                .ok_or_else(|| AppError::Ocr("unreadable".to_string()))
        }
    }

    pub(crate) const CLEAN_SLIP: &str =
        "Points 1/15 Jalen Brunson +25.50% o21.5 -150 Josh Hart +30.00% u8 .5 7120";
    pub(crate) const FLAGGED_SLIP: &str =
        "Points 1/16 Jalen Brunson +25.50% o21.5 -150 Alex Sarr +30.00% o8.5 -120";

    pub(crate) async fn seeded() -> (SqlitePool, PlayerResolver) {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        upsert_active(&mut conn, 1628973, "Jalen Brunson").await.unwrap();
        upsert_active(&mut conn, 1628404, "Josh Hart").await.unwrap();
        let resolver = crate::roster::resolver::load(&mut conn).await.unwrap();
        (pool, resolver)
    }

    #[tokio::test]
    async fn clean_slip_is_ready_for_settlement() {
        let (pool, resolver) = seeded().await;
        let ocr = FakeTranscriber::new(&[("a.png", CLEAN_SLIP)]);
        let ingestor = Ingestor::new(&pool, &ocr, &resolver, ValidRanges::default(), 2025);

        let rows = ingestor.process_image(Path::new("/in/a.png")).await.unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status() == Some(BetStatus::Extracted)));
        assert_eq!(rows[0].player_id, Some(1628973));
        assert_eq!(rows[0].date.as_deref(), Some("2025-01-15"));
        assert_eq!(rows[1].odds, Some(-120));
        assert_eq!(rows[1].bet_line.as_deref(), Some("u8.5"));
        assert_eq!(rows[0].read_players.as_deref(), Some("\"Jalen Brunson\""));
    }

    #[tokio::test]
    async fn reingestion_does_not_transcribe_again() {
        let (pool, resolver) = seeded().await;
        let ocr = FakeTranscriber::new(&[("a.png", CLEAN_SLIP)]);
        let ingestor = Ingestor::new(&pool, &ocr, &resolver, ValidRanges::default(), 2025);

        let first = ingestor.process_image(Path::new("a.png")).await.unwrap().unwrap();
        let second = ingestor.process_image(Path::new("a.png")).await.unwrap().unwrap();
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            first.iter().map(|r| r.id).collect::<Vec<_>>(),
            second.iter().map(|r| r.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn one_bad_line_flags_the_whole_image() {
        let (pool, resolver) = seeded().await;
        let ocr = FakeTranscriber::new(&[("b.png", FLAGGED_SLIP)]);
        let ingestor = Ingestor::new(&pool, &ocr, &resolver, ValidRanges::default(), 2025);

        let rows = ingestor.process_image(Path::new("b.png")).await.unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.status() == Some(BetStatus::NeedsReview)));
    }

    #[tokio::test]
    async fn unreadable_image_persists_nothing() {
        let (pool, resolver) = seeded().await;
        let ocr = FakeTranscriber::new(&[("c.png", "no slip here")]);
        let ingestor = Ingestor::new(&pool, &ocr, &resolver, ValidRanges::default(), 2025);

        assert!(ingestor.process_image(Path::new("missing.png")).await.unwrap().is_none());
        assert!(ingestor.process_image(Path::new("c.png")).await.unwrap().is_none());
        let mut conn = pool.acquire().await.unwrap();
        assert!(bets::list_bets(&mut conn, None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn folder_picks_up_images_only() {
        let (pool, resolver) = seeded().await;
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.PNG", "b.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let ocr = FakeTranscriber::new(&[("a.PNG", CLEAN_SLIP), ("b.jpg", FLAGGED_SLIP)]);
        let ingestor = Ingestor::new(&pool, &ocr, &resolver, ValidRanges::default(), 2025);

        let summary = ingestor.process_folder(dir.path()).await.unwrap();
        assert_eq!(summary, IngestSummary { images: 2, skipped: 0, candidates: 4 });
    }
}
