use std::cmp::Reverse;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::BetType;

static PLUS_SPACING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\+\s*").expect("static regex"));

/// Precedence-ordered bet-type label matcher.
///
/// Labels are ranked by number of `+` components, descending; labels with the
/// same count keep the order they were given in. "Pts+Reb+Ast" therefore
/// wins over "Pts+Reb" on the same text, and among single-stat labels the
/// first one listed wins.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    labels: Vec<(String, BetType)>,
}

/// Slip labels in match order: composites first, then single stats with the
/// rarer categories ahead of points.
const SLIP_PRECEDENCE: [BetType; 11] = [
    BetType::Par,
    BetType::PtsRebs,
    BetType::PtsAsts,
    BetType::RebsAsts,
    BetType::Blocks,
    BetType::Steals,
    BetType::Turnovers,
    BetType::Points,
    BetType::Assists,
    BetType::Rebounds,
    BetType::ThreePointers,
];

impl LabelMatcher {
    pub fn new<'a>(labels: impl IntoIterator<Item = (&'a str, BetType)>) -> Self {
        let mut labels: Vec<(String, BetType)> = labels
            .into_iter()
            .map(|(label, bet_type)| (normalize_label_text(label), bet_type))
            .collect();
        labels.sort_by_key(|(label, _)| Reverse(components(label)));
        Self { labels }
    }

    /// Matcher over every bet type's slip label.
    pub fn bet_types() -> Self {
        let matcher = Self::new(SLIP_PRECEDENCE.iter().map(|t| (t.slip_label(), *t)));
        debug_assert!(matcher.precedence_holds());
        matcher
    }

    /// First label (in precedence order) present anywhere in `text`.
    pub fn find(&self, text: &str) -> Option<BetType> {
        let haystack = normalize_label_text(text);
        self.labels
            .iter()
            .find(|(label, _)| haystack.contains(label.as_str()))
            .map(|(_, bet_type)| *bet_type)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(|(label, _)| label.as_str())
    }

    /// No label is a substring of a label ranked after it.
    pub fn precedence_holds(&self) -> bool {
        let labels: Vec<&str> = self.labels().collect();
        labels
            .iter()
            .enumerate()
            .all(|(i, earlier)| labels[i + 1..].iter().all(|later| !later.contains(earlier)))
    }
}

fn components(label: &str) -> usize {
    label.matches('+').count() + 1
}

/// Lower-case and drop whitespace around `+` so "Pts + Reb" reads as "pts+reb".
fn normalize_label_text(text: &str) -> String {
    PLUS_SPACING.replace_all(&text.to_lowercase(), "+").into_owned()
}

/// Names from `candidates` found in `text`, case-insensitively, ordered by
/// first occurrence.
///
/// When two names start at the same offset the longer one wins, and a name
/// whose first occurrence overlaps an already accepted name is dropped.
pub fn find_names(text: &str, candidates: &[&str]) -> Vec<String> {
    let haystack = text.to_lowercase();
    let mut hits: Vec<(usize, usize, &str)> = candidates
        .iter()
        .filter(|name| !name.trim().is_empty())
        .filter_map(|name| {
            let needle = name.to_lowercase();
            haystack
                .find(&needle)
                .map(|start| (start, start + needle.len(), *name))
        })
        .collect();
    hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)));

    let mut accepted: Vec<String> = Vec::new();
    let mut covered_until = 0;
    for (start, end, name) in hits {
        if !accepted.is_empty() && start < covered_until {
            continue;
        }
        covered_until = end;
        accepted.push(name.to_string());
    }
    accepted
}
