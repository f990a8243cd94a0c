use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Bet type
// ---------------------------------------------------------------------------

/// Canonical settlement categories. Each maps to one column of a game stat line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetType {
    Points,
    Assists,
    Rebounds,
    ThreePointers,
    Blocks,
    Steals,
    Turnovers,
    /// Points + rebounds + assists.
    Par,
    PtsRebs,
    PtsAsts,
    RebsAsts,
}

impl BetType {
    pub const ALL: [BetType; 11] = [
        BetType::Points,
        BetType::Assists,
        BetType::Rebounds,
        BetType::ThreePointers,
        BetType::Blocks,
        BetType::Steals,
        BetType::Turnovers,
        BetType::Par,
        BetType::PtsRebs,
        BetType::PtsAsts,
        BetType::RebsAsts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Points => "points",
            BetType::Assists => "assists",
            BetType::Rebounds => "rebounds",
            BetType::ThreePointers => "three_pointers",
            BetType::Blocks => "blocks",
            BetType::Steals => "steals",
            BetType::Turnovers => "turnovers",
            BetType::Par => "par",
            BetType::PtsRebs => "pts_rebs",
            BetType::PtsAsts => "pts_asts",
            BetType::RebsAsts => "rebs_asts",
        }
    }

    /// Label as printed on the slip.
    pub fn slip_label(&self) -> &'static str {
        match self {
            BetType::Points => "Points",
            BetType::Assists => "Assists",
            BetType::Rebounds => "Rebounds",
            BetType::ThreePointers => "3pts",
            BetType::Blocks => "Blocks",
            BetType::Steals => "Steals",
            BetType::Turnovers => "Turnovers",
            BetType::Par => "Pts+Reb+Ast",
            BetType::PtsRebs => "Pts+Reb",
            BetType::PtsAsts => "Pts+Ast",
            BetType::RebsAsts => "Reb+Ast",
        }
    }
}

impl FromStr for BetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BetType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown bet type: {s}"))
    }
}

impl std::fmt::Display for BetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Candidate disposition
// ---------------------------------------------------------------------------

/// Disposition of a bet candidate.
///
/// ```text
/// NeedsReview --void--> Voided
///      |
///      +--corrected--> Extracted --settle--> Settled
///                          |
///                          +--no game--> Unplayed
/// ```
///
/// Candidates are created as either `Extracted` or `NeedsReview`. `Voided`,
/// `Settled` and `Unplayed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    /// Passed classification, waiting for settlement.
    Extracted,
    NeedsReview,
    Voided,
    Settled,
    Unplayed,
}

impl BetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Extracted => "extracted",
            BetStatus::NeedsReview => "needs_review",
            BetStatus::Voided => "voided",
            BetStatus::Settled => "settled",
            BetStatus::Unplayed => "unplayed",
        }
    }

    /// Initial disposition assigned by the classifier.
    pub fn initial(needs_review: bool) -> Self {
        if needs_review {
            BetStatus::NeedsReview
        } else {
            BetStatus::Extracted
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BetStatus::Voided | BetStatus::Settled | BetStatus::Unplayed)
    }

    pub fn can_transition_to(&self, next: BetStatus) -> bool {
        matches!(
            (self, next),
            (BetStatus::NeedsReview, BetStatus::Voided)
                | (BetStatus::NeedsReview, BetStatus::Extracted)
                | (BetStatus::Extracted, BetStatus::Settled)
                | (BetStatus::Extracted, BetStatus::Unplayed)
        )
    }

    /// Legal next state or `None`.
    pub fn transition(self, next: BetStatus) -> Option<BetStatus> {
        self.can_transition_to(next).then_some(next)
    }
}

impl FromStr for BetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extracted" => Ok(BetStatus::Extracted),
            "needs_review" => Ok(BetStatus::NeedsReview),
            "voided" => Ok(BetStatus::Voided),
            "settled" => Ok(BetStatus::Settled),
            "unplayed" => Ok(BetStatus::Unplayed),
            other => Err(format!("unknown bet status: {other}")),
        }
    }
}

impl std::fmt::Display for BetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Settlement outcome
// ---------------------------------------------------------------------------

/// There is no push: every observed line ends in .5, so a tie means a misread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetResult {
    Win,
    Loss,
}

impl std::fmt::Display for BetResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BetResult::Win => write!(f, "Win"),
            BetResult::Loss => write!(f, "Loss"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverUnder {
    Over,
    Under,
}

impl std::fmt::Display for OverUnder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverUnder::Over => write!(f, "Over"),
            OverUnder::Under => write!(f, "Under"),
        }
    }
}

// ---------------------------------------------------------------------------
// Score range
// ---------------------------------------------------------------------------

/// Reporting bucket of a boost score: fixed 5-point buckets from 20 to 50,
/// then an open-ended "50+".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoreRange {
    From20,
    From25,
    From30,
    From35,
    From40,
    From45,
    Over50,
}

impl ScoreRange {
    pub const ALL: [ScoreRange; 7] = [
        ScoreRange::From20,
        ScoreRange::From25,
        ScoreRange::From30,
        ScoreRange::From35,
        ScoreRange::From40,
        ScoreRange::From45,
        ScoreRange::Over50,
    ];

    /// `None` for scores below the lowest bucket (or NaN).
    pub fn from_score(score: f64) -> Option<Self> {
        use crate::config::score_buckets::*;
        if score.is_nan() || score < FLOOR {
            return None;
        }
        if score >= CEILING {
            return Some(ScoreRange::Over50);
        }
        let idx = ((score - FLOOR) / WIDTH).floor() as usize;
        ScoreRange::ALL.get(idx).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreRange::From20 => "20-25",
            ScoreRange::From25 => "25-30",
            ScoreRange::From30 => "30-35",
            ScoreRange::From35 => "35-40",
            ScoreRange::From40 => "40-45",
            ScoreRange::From45 => "45-50",
            ScoreRange::Over50 => "50+",
        }
    }
}

impl FromStr for ScoreRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScoreRange::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown score range: {s}"))
    }
}

impl std::fmt::Display for ScoreRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Game stat line
// ---------------------------------------------------------------------------

/// Raw counting stats for one player in one game plus the composite totals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GameStatLine {
    pub points: f64,
    pub assists: f64,
    pub rebounds: f64,
    pub three_pointers: f64,
    pub blocks: f64,
    pub steals: f64,
    pub turnovers: f64,
    pub par: f64,
    pub pts_rebs: f64,
    pub pts_asts: f64,
    pub rebs_asts: f64,
}

impl GameStatLine {
    /// Build from raw counts, deriving the composites.
    pub fn from_counts(
        points: f64,
        assists: f64,
        rebounds: f64,
        three_pointers: f64,
        blocks: f64,
        steals: f64,
        turnovers: f64,
    ) -> Self {
        Self {
            points,
            assists,
            rebounds,
            three_pointers,
            blocks,
            steals,
            turnovers,
            par: points + rebounds + assists,
            pts_rebs: points + rebounds,
            pts_asts: points + assists,
            rebs_asts: rebounds + assists,
        }
    }

    pub fn stat(&self, bet_type: BetType) -> f64 {
        match bet_type {
            BetType::Points => self.points,
            BetType::Assists => self.assists,
            BetType::Rebounds => self.rebounds,
            BetType::ThreePointers => self.three_pointers,
            BetType::Blocks => self.blocks,
            BetType::Steals => self.steals,
            BetType::Turnovers => self.turnovers,
            BetType::Par => self.par,
            BetType::PtsRebs => self.pts_rebs,
            BetType::PtsAsts => self.pts_asts,
            BetType::RebsAsts => self.rebs_asts,
        }
    }
}
