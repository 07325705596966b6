//! Bio-score composition.
//!
//! Start at 100, subtract a penalty per active exclusion zone (50 critical,
//! 25 medium, 15 low), add 5 per realized synergy up to 20, clamp to 0..=100.
//! With nothing active the score is a flat 50: there is nothing to judge.

use crate::types::ExclusionZone;

pub const BASE_SCORE: i32 = 100;
pub const NEUTRAL_SCORE: u8 = 50;
pub const SYNERGY_BONUS: i32 = 5;
pub const MAX_SYNERGY_BONUS: i32 = 20;

pub fn bio_score(active_compounds: usize, zones: &[ExclusionZone], realized_synergies: usize) -> u8 {
    if active_compounds == 0 {
        return NEUTRAL_SCORE;
    }

    let penalty: i32 = zones.iter().map(|z| z.severity.score_penalty()).sum();
    let realized = i32::try_from(realized_synergies).unwrap_or(i32::MAX);
    let bonus = realized.saturating_mul(SYNERGY_BONUS).min(MAX_SYNERGY_BONUS);

    (BASE_SCORE - penalty + bonus).clamp(0, 100) as u8
}
