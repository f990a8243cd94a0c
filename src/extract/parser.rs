use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::extract::matcher::{find_names, LabelMatcher};
use crate::roster::PlayerResolver;
use crate::types::BetType;

static DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{2}\b").expect("static regex"));

/// Boost score, over/under line and odds as they sit together on one slip
/// line. Requiring all three drops boosts under 20 and stray numbers.
/// The line prefix tolerates `0` read for `o`; the odds sign tolerates
/// `7`, `4`, `~` and `"` read for `-`.
static SCORE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\+[2-9]\d\s*\.\s*\d{2}%)\s*([0uo]\d*\s*\.\s*5)\s*([-+74~"]\d{3})"#)
        .expect("static regex")
});

/// One wagered line as read off the slip, before any cleanup.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub date: String,
    pub bet_type: Option<BetType>,
    /// Canonical roster spelling after alias substitution.
    pub player: Option<String>,
    pub score: Option<String>,
    pub bet_line: Option<String>,
    pub odds: Option<String>,
    /// Diagnostics: what was read at this position, even if discarded.
    pub read_player: Option<String>,
    pub read_score_pattern: Option<[String; 3]>,
}

/// Pull every wagered line out of one slip's text.
///
/// Returns `None` when the text has no date token or no score/line/odds
/// group, in which case the slip is discarded. When the number of player
/// names and the number of groups disagree the shorter side is left
/// unresolved on every line rather than guessing a pairing.
pub fn extract_candidates(
    raw_text: &str,
    labels: &LabelMatcher,
    resolver: &PlayerResolver,
) -> Option<Vec<RawCandidate>> {
    let Some(date) = DATE.find(raw_text) else {
        warn!("No date found in slip text");
        return None;
    };
    let date = date.as_str().to_string();

    let bet_type = labels.find(raw_text);

    let groups: Vec<[String; 3]> = SCORE_LINE
        .captures_iter(raw_text)
        .map(|c| [c[1].to_string(), c[2].to_string(), c[3].to_string()])
        .collect();
    if groups.is_empty() {
        warn!("No score lines found in slip text");
        return None;
    }

    let names = resolver.match_names();
    let players: Vec<String> = find_names(raw_text, &names)
        .into_iter()
        .map(|name| resolver.canonical(&name).to_string())
        .collect();

    let count = players.len().max(groups.len());
    let players_resolved = players.len() == count;
    let groups_resolved = groups.len() == count;
    if !players_resolved || !groups_resolved {
        debug!(
            players = players.len(),
            score_lines = groups.len(),
            "Player and score line counts disagree"
        );
    }

    Some(
        (0..count)
            .map(|i| {
                let group = groups.get(i).filter(|_| groups_resolved);
                RawCandidate {
                    date: date.clone(),
                    bet_type,
                    player: players.get(i).filter(|_| players_resolved).cloned(),
                    score: group.map(|g| g[0].clone()),
                    bet_line: group.map(|g| g[1].clone()),
                    odds: group.map(|g| g[2].clone()),
                    read_player: players.get(i).cloned(),
                    read_score_pattern: groups.get(i).cloned(),
                }
            })
            .collect(),
    )
}
