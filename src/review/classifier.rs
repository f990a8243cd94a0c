use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::config::ValidRanges;
use crate::db::models::BetRow;
use crate::extract::NormalizedCandidate;
use crate::roster::PlayerResolver;
use crate::types::BetType;

static LINE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ou]\d+\.5$").expect("static regex"));

/// Textual view of the fields the classifier checks. Both pipeline output
/// and hand-edited review rows are classified through this shape, so a
/// blank or whitespace-only value counts as unresolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateFields {
    pub player_name: Option<String>,
    pub bet_type: Option<String>,
    pub score: Option<String>,
    pub date: Option<String>,
    pub bet_line: Option<String>,
    pub odds: Option<String>,
}

impl From<&NormalizedCandidate> for CandidateFields {
    fn from(c: &NormalizedCandidate) -> Self {
        Self {
            player_name: c.player_name.clone(),
            bet_type: c.bet_type.clone(),
            score: c.score.map(|s| s.to_string()),
            date: c.date.clone(),
            bet_line: c.bet_line.clone(),
            odds: c.odds.map(|o| o.to_string()),
        }
    }
}

impl From<&BetRow> for CandidateFields {
    fn from(b: &BetRow) -> Self {
        Self {
            player_name: b.player_name.clone(),
            bet_type: b.bet_type.clone(),
            score: b.score.map(|s| s.to_string()),
            date: b.date.clone(),
            bet_line: b.bet_line.clone(),
            odds: b.odds.map(|o| o.to_string()),
        }
    }
}

/// Outcome of classification: the set of reasons a human must look at the
/// candidate. Empty means it can be settled automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Review {
    pub reasons: BTreeSet<String>,
}

impl Review {
    pub fn needs_review(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn summary(&self) -> String {
        self.reasons.iter().cloned().collect::<Vec<_>>().join(", ")
    }

    fn flag(&mut self, reason: String) {
        self.reasons.insert(reason);
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Check one candidate. Total: every input yields a verdict.
pub fn classify(c: &CandidateFields, resolver: &PlayerResolver, ranges: &ValidRanges) -> Review {
    let mut review = Review::default();

    match present(&c.player_name) {
        None => review.flag("missing player name".to_string()),
        Some(name) if resolver.lookup(name).is_none() => {
            review.flag(format!("player not found: {name}"))
        }
        Some(_) => {}
    }

    match present(&c.bet_type) {
        None => review.flag("missing bet type".to_string()),
        Some(t) if t.parse::<BetType>().is_err() => review.flag(format!("invalid bet type: {t}")),
        Some(_) => {}
    }

    match present(&c.score) {
        None => review.flag("missing score".to_string()),
        Some(raw) => match raw.parse::<f64>() {
            Ok(score) if !score.is_finite() => review.flag(format!("invalid score format: {raw}")),
            Ok(score) => {
                let (lo, hi) = ranges.score;
                if score < lo || score > hi {
                    review.flag(format!("score out of expected range [{lo},{hi}]: {score:?}"));
                }
            }
            Err(_) => review.flag(format!("invalid score format: {raw}")),
        },
    }

    match present(&c.bet_line) {
        None => review.flag("missing bet line".to_string()),
        Some(line) if !LINE_FORMAT.is_match(line) => {
            review.flag(format!("invalid bet line format: {line}"))
        }
        Some(_) => {}
    }

    match present(&c.odds) {
        None => review.flag("missing odds".to_string()),
        Some(raw) => match raw.parse::<i64>() {
            Ok(odds) => {
                let (lo, hi) = ranges.odds;
                if odds < lo || odds > hi {
                    review.flag(format!("odds out of expected range [{lo},{hi}]: {odds}"));
                }
            }
            Err(_) => review.flag(format!("invalid odds format: {raw}")),
        },
    }

    match present(&c.date) {
        None => review.flag("missing date".to_string()),
        Some(d) if NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err() => {
            review.flag(format!("invalid date format: {d}"))
        }
        Some(_) => {}
    }

    review
}

/// All lines of one slip share a disposition: the image needs review if any
/// line does, and the reasons are the union over its lines.
pub fn classify_image<'a>(
    lines: impl IntoIterator<Item = &'a CandidateFields>,
    resolver: &PlayerResolver,
    ranges: &ValidRanges,
) -> Review {
    let mut image = Review::default();
    for line in lines {
        image.reasons.extend(classify(line, resolver, ranges).reasons);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolver() -> PlayerResolver {
        PlayerResolver::new(HashMap::from([("Jalen Brunson".to_string(), 1628973)]), &[])
    }

    fn good() -> CandidateFields {
        CandidateFields {
            player_name: Some("Jalen Brunson".to_string()),
            bet_type: Some("points".to_string()),
            score: Some("25.5".to_string()),
            date: Some("2025-01-15".to_string()),
            bet_line: Some("o21.5".to_string()),
            odds: Some("-150".to_string()),
        }
    }

    fn reasons(c: &CandidateFields) -> Vec<String> {
        classify(c, &resolver(), &ValidRanges::default())
            .reasons
            .into_iter()
            .collect()
    }

    #[test]
    fn clean_candidate_passes() {
        let review = classify(&good(), &resolver(), &ValidRanges::default());
        assert!(!review.needs_review());
    }

    #[test]
    fn low_score_gives_exactly_one_reason() {
        let c = CandidateFields { score: Some("15".to_string()), ..good() };
        assert_eq!(reasons(&c), vec!["score out of expected range [20,100]: 15.0"]);
    }

    #[test]
    fn empty_candidate_lists_every_missing_field() {
        assert_eq!(
            reasons(&CandidateFields::default()),
            vec![
                "missing bet line",
                "missing bet type",
                "missing date",
                "missing odds",
                "missing player name",
                "missing score",
            ]
        );
    }

    #[test]
    fn malformed_values() {
        let c = CandidateFields {
            player_name: Some("Nobody Special".to_string()),
            bet_type: Some("Points".to_string()),
            score: Some("2x.5".to_string()),
            date: Some("2025-02-30".to_string()),
            bet_line: Some("021.5".to_string()),
            odds: Some("-1-0".to_string()),
        };
        assert_eq!(
            reasons(&c),
            vec![
                "invalid bet line format: 021.5",
                "invalid bet type: Points",
                "invalid date format: 2025-02-30",
                "invalid odds format: -1-0",
                "invalid score format: 2x.5",
                "player not found: Nobody Special",
            ]
        );
    }

    #[test]
    fn odds_bounds_are_inclusive() {
        let edge = CandidateFields { odds: Some("-1000".to_string()), ..good() };
        assert!(reasons(&edge).is_empty());
        let over = CandidateFields { odds: Some("1200".to_string()), ..good() };
        assert_eq!(reasons(&over), vec!["odds out of expected range [-1000,1000]: 1200"]);
    }

    #[test]
    fn blank_cell_is_missing() {
        let c = CandidateFields { bet_line: Some("  ".to_string()), ..good() };
        assert_eq!(reasons(&c), vec!["missing bet line"]);
    }

    #[test]
    fn image_disposition_is_the_union() {
        let bad = CandidateFields { odds: None, ..good() };
        let review = classify_image([&good(), &bad], &resolver(), &ValidRanges::default());
        assert!(review.needs_review());
        assert_eq!(review.summary(), "missing odds");
    }
}
