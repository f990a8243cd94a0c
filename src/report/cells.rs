//! Fixed A1 layout of the results sheet.
//!
//! Row 1 holds headers; each bet type gets one row below it in declaration
//! order. Column A holds the bet type and every score range gets a
//! Result/Volume column pair starting at B.

use crate::types::{BetType, ScoreRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPair {
    pub result: String,
    pub volume: String,
}

pub fn cell_key(bet_type: BetType, range: ScoreRange) -> String {
    format!("{bet_type}:{range}")
}

pub fn cells_for(bet_type: BetType, range: ScoreRange) -> CellPair {
    let row = bet_type as usize + 2;
    let col = 1 + 2 * range as usize;
    CellPair {
        result: format!("{}{row}", column_name(col)),
        volume: format!("{}{row}", column_name(col + 1)),
    }
}

/// Zero-based column index to letters: 0 -> A, 25 -> Z, 26 -> AA.
fn column_name(mut idx: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn layout_is_fixed() {
        assert_eq!(
            cells_for(BetType::Points, ScoreRange::From20),
            CellPair { result: "B2".to_string(), volume: "C2".to_string() }
        );
        assert_eq!(cells_for(BetType::Rebounds, ScoreRange::Over50).volume, "O4");
        assert_eq!(cell_key(BetType::PtsRebs, ScoreRange::From45), "pts_rebs:45-50");
    }

    #[test]
    fn every_cell_is_distinct() {
        let mut seen = HashSet::new();
        for t in BetType::ALL {
            for r in ScoreRange::ALL {
                let pair = cells_for(t, r);
                assert!(seen.insert(pair.result));
                assert!(seen.insert(pair.volume));
            }
        }
        assert_eq!(seen.len(), BetType::ALL.len() * ScoreRange::ALL.len() * 2);
    }

    #[test]
    fn wide_columns() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
    }
}
