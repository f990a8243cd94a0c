//! Per-field cleanup of transcribed values.
//!
//! OCR misreads are repaired by an explicit correction table, one rule list
//! per field. A value that still fails to convert after its rules are applied
//! becomes unresolved; the other fields of the candidate are unaffected.

use chrono::NaiveDate;

use crate::extract::parser::RawCandidate;

/// One rewrite applied to a raw field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Drop every whitespace character.
    StripWhitespace,
    /// Replace a first character drawn from `from` with `to`.
    Leading { from: &'static [char], to: char },
    /// Replace `from` with `to` everywhere after the first character.
    Embedded { from: char, to: char },
    /// Strip these characters from both ends.
    Trim { chars: &'static [char] },
}

impl Correction {
    pub fn apply(&self, value: &str) -> String {
        match *self {
            Correction::StripWhitespace => value.chars().filter(|c| !c.is_whitespace()).collect(),
            Correction::Leading { from, to } => {
                let mut chars = value.chars();
                match chars.next() {
                    Some(first) if from.contains(&first) => {
                        std::iter::once(to).chain(chars).collect()
                    }
                    _ => value.to_string(),
                }
            }
            Correction::Embedded { from, to } => {
                let mut chars = value.chars();
                match chars.next() {
                    Some(first) => std::iter::once(first)
                        .chain(chars.map(|c| if c == from { to } else { c }))
                        .collect(),
                    None => String::new(),
                }
            }
            Correction::Trim { chars } => value.trim_matches(|c| chars.contains(&c)).to_string(),
        }
    }
}

/// `7`, `4`, `~` and `"` are the usual misreads of a leading minus; a minus
/// anywhere else is a misread `4`.
pub const ODDS_RULES: &[Correction] = &[
    Correction::StripWhitespace,
    Correction::Leading { from: &['7', '4', '~', '"'], to: '-' },
    Correction::Embedded { from: '-', to: '4' },
];

/// A leading `0` is a misread `o` (over).
pub const LINE_RULES: &[Correction] = &[
    Correction::StripWhitespace,
    Correction::Leading { from: &['0'], to: 'o' },
];

/// Boost scores are printed as `+25.50%`.
pub const SCORE_RULES: &[Correction] = &[
    Correction::StripWhitespace,
    Correction::Trim { chars: &['+', '%'] },
];

pub fn apply_rules(rules: &[Correction], value: &str) -> String {
    rules.iter().fold(value.to_string(), |acc, rule| rule.apply(&acc))
}

/// A candidate after cleanup. `None` means unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedCandidate {
    pub player_name: Option<String>,
    pub bet_type: Option<String>,
    pub score: Option<f64>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub bet_line: Option<String>,
    pub odds: Option<i64>,
    pub read_player: Option<String>,
    pub read_score_pattern: Option<[String; 3]>,
}

pub fn normalize(raw: &RawCandidate, year: i32) -> NormalizedCandidate {
    NormalizedCandidate {
        player_name: raw.player.clone(),
        bet_type: raw.bet_type.map(|t| t.as_str().to_string()),
        score: raw
            .score
            .as_deref()
            .and_then(|s| apply_rules(SCORE_RULES, s).parse().ok()),
        date: slip_date(&raw.date, year),
        bet_line: raw.bet_line.as_deref().map(|l| apply_rules(LINE_RULES, l)),
        odds: raw
            .odds
            .as_deref()
            .and_then(|o| apply_rules(ODDS_RULES, o).parse().ok()),
        read_player: raw.read_player.clone(),
        read_score_pattern: raw.read_score_pattern.clone(),
    }
}

/// `M/DD` plus the processing year as `YYYY-MM-DD`; `None` for an impossible
/// calendar date.
pub fn slip_date(month_day: &str, year: i32) -> Option<String> {
    let (month, day) = month_day.trim().split_once('/')?;
    let date = NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BetType;

    #[test]
    fn odds_sign_repair() {
        assert_eq!(apply_rules(ODDS_RULES, "7150"), "-150");
        assert_eq!(apply_rules(ODDS_RULES, "4110"), "-110");
        assert_eq!(apply_rules(ODDS_RULES, "~125"), "-125");
        assert_eq!(apply_rules(ODDS_RULES, "\"105"), "-105");
        assert_eq!(apply_rules(ODDS_RULES, "-1-0"), "-140");
        assert_eq!(apply_rules(ODDS_RULES, "+120"), "+120");
    }

    #[test]
    fn line_and_score_repair() {
        assert_eq!(apply_rules(LINE_RULES, "021 .5"), "o21.5");
        assert_eq!(apply_rules(LINE_RULES, "u8.5"), "u8.5");
        assert_eq!(apply_rules(SCORE_RULES, "+25 . 50%"), "25.50");
    }

    #[test]
    fn dates_take_the_processing_year() {
        assert_eq!(slip_date("1/05", 2025).as_deref(), Some("2025-01-05"));
        assert_eq!(slip_date("12/31", 2024).as_deref(), Some("2024-12-31"));
        assert_eq!(slip_date("2/30", 2025), None);
    }

    #[test]
    fn failed_field_does_not_spoil_the_rest() {
        let raw = RawCandidate {
            date: "13/45".to_string(),
            bet_type: Some(BetType::Points),
            player: Some("Jalen Brunson".to_string()),
            score: Some("+25.50%".to_string()),
            bet_line: Some("021.5".to_string()),
            odds: Some("7150".to_string()),
            read_player: Some("Jalen Brunson".to_string()),
            read_score_pattern: None,
        };
        let n = normalize(&raw, 2025);
        assert_eq!(n.date, None);
        assert_eq!(n.score, Some(25.5));
        assert_eq!(n.bet_line.as_deref(), Some("o21.5"));
        assert_eq!(n.odds, Some(-150));
        assert_eq!(n.bet_type.as_deref(), Some("points"));
    }
}
