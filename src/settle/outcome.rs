use thiserror::Error;

use crate::config::WIN_DELTA;
use crate::types::{BetResult, BetType, GameStatLine, OverUnder, ScoreRange};

/// Per-candidate settlement failures. These skip the candidate and leave it
/// unprocessed; they never abort the run.
#[derive(Debug, Error, PartialEq)]
pub enum SettleError {
    #[error("stat {stat} equals line {line}: a push is a misread")]
    Push { stat: f64, line: f64 },

    #[error("unknown bet type: {0}")]
    UnknownBetType(String),

    #[error("invalid bet line: {0}")]
    InvalidLine(String),

    #[error("score {0} is below the lowest reporting bucket")]
    ScoreBelowFloor(f64),

    #[error("odds of zero cannot be settled")]
    ZeroOdds,

    #[error("invalid bet date: {0}")]
    InvalidDate(String),

    #[error("bet is missing {0}")]
    MissingField(&'static str),

    #[error("stats service returned an empty game log")]
    EmptyGameLog,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub result: BetResult,
    pub delta: f64,
    pub over_under: OverUnder,
    pub stat_value: f64,
    pub line_value: f64,
    pub score_range: ScoreRange,
}

/// `o21.5` -> (Over, 21.5). Anything not starting with `o` is an under.
pub fn parse_line(bet_line: &str) -> Result<(OverUnder, f64), SettleError> {
    let line = bet_line.trim();
    let side = if line.starts_with('o') { OverUnder::Over } else { OverUnder::Under };
    let value = line
        .get(1..)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| SettleError::InvalidLine(bet_line.to_string()))?;
    Ok((side, value))
}

/// Payout in stake units: a flat +100 on a win; on a loss the odds
/// themselves when negative, otherwise the stake implied by positive odds.
pub fn payout_delta(result: BetResult, odds: i64) -> Result<f64, SettleError> {
    match result {
        BetResult::Win => Ok(WIN_DELTA),
        BetResult::Loss if odds < 0 => Ok(odds as f64),
        BetResult::Loss if odds == 0 => Err(SettleError::ZeroOdds),
        BetResult::Loss => Ok(-(100.0 / (odds as f64 / 100.0)).round_ties_even()),
    }
}

pub fn compute_outcome(
    line: &GameStatLine,
    bet_type: BetType,
    bet_line: &str,
    odds: i64,
    score: f64,
) -> Result<Outcome, SettleError> {
    let score_range = ScoreRange::from_score(score).ok_or(SettleError::ScoreBelowFloor(score))?;
    let (over_under, line_value) = parse_line(bet_line)?;
    let stat_value = line.stat(bet_type);

    if stat_value == line_value {
        return Err(SettleError::Push { stat: stat_value, line: line_value });
    }
    let went_over = stat_value > line_value;
    let result = match (over_under, went_over) {
        (OverUnder::Over, true) | (OverUnder::Under, false) => BetResult::Win,
        _ => BetResult::Loss,
    };

    Ok(Outcome {
        result,
        delta: payout_delta(result, odds)?,
        over_under,
        stat_value,
        line_value,
        score_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(pts: f64) -> GameStatLine {
        GameStatLine::from_counts(pts, 5.0, 5.0, 2.0, 0.0, 1.0, 3.0)
    }

    #[test]
    fn over_hits() {
        let o = compute_outcome(&points(25.0), BetType::Points, "o21.5", -150, 25.0).unwrap();
        assert_eq!(o.result, BetResult::Win);
        assert_eq!(o.delta, 100.0);
        assert_eq!(o.over_under, OverUnder::Over);
        assert_eq!(o.score_range, ScoreRange::From25);
    }

    #[test]
    fn over_misses_with_negative_odds() {
        let o = compute_outcome(&points(18.0), BetType::Points, "o21.5", -150, 25.0).unwrap();
        assert_eq!(o.result, BetResult::Loss);
        assert_eq!(o.delta, -150.0);
    }

    #[test]
    fn loss_at_positive_odds_uses_implied_stake() {
        let o = compute_outcome(&points(18.0), BetType::Points, "o21.5", 120, 25.0).unwrap();
        assert_eq!(o.delta, -83.0);
        assert_eq!(payout_delta(BetResult::Loss, 100).unwrap(), -100.0);
        assert_eq!(payout_delta(BetResult::Loss, 0), Err(SettleError::ZeroOdds));
    }

    #[test]
    fn under_hits() {
        let o = compute_outcome(&points(18.0), BetType::Points, "u21.5", -110, 31.0).unwrap();
        assert_eq!(o.result, BetResult::Win);
        assert_eq!(o.over_under, OverUnder::Under);
        assert_eq!(o.score_range, ScoreRange::From30);
    }

    #[test]
    fn composite_stat_is_used() {
        let o = compute_outcome(&points(20.0), BetType::Par, "o29.5", -110, 22.0).unwrap();
        assert_eq!(o.stat_value, 30.0);
        assert_eq!(o.result, BetResult::Win);
    }

    #[test]
    fn exact_tie_is_rejected() {
        let err = compute_outcome(&points(21.0), BetType::Points, "o21", -110, 25.0).unwrap_err();
        assert_eq!(err, SettleError::Push { stat: 21.0, line: 21.0 });
    }

    #[test]
    fn sub_twenty_score_is_rejected() {
        let err = compute_outcome(&points(25.0), BetType::Points, "o21.5", -110, 19.5).unwrap_err();
        assert_eq!(err, SettleError::ScoreBelowFloor(19.5));
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(parse_line("o").is_err());
        assert!(parse_line("oxx.5").is_err());
        assert_eq!(parse_line("u8.5").unwrap(), (OverUnder::Under, 8.5));
    }
}
