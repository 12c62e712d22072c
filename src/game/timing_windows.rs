// Timing windows shared by judging and the miss sweep.

use crate::game::judgment::Judgment;
use serde::{Deserialize, Serialize};

// Half-widths in milliseconds (StepMania 4 style).
pub const BASE_MARVELOUS_MS: f32 = 22.5;
pub const BASE_PERFECT_MS: f32 = 45.0;
pub const BASE_GREAT_MS: f32 = 90.0;
pub const BASE_GOOD_MS: f32 = 135.0;
pub const BASE_BOO_MS: f32 = 180.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingWindow {
    pub judgment: Judgment,
    pub window_ms: f32,
    pub points: u32,
}

/// Windows ordered tightest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingTable {
    windows: Vec<TimingWindow>,
}

impl Default for TimingTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TimingTable {
    pub fn standard() -> Self {
        Self::new(vec![
            TimingWindow { judgment: Judgment::Marvelous, window_ms: BASE_MARVELOUS_MS, points: 5 },
            TimingWindow { judgment: Judgment::Perfect, window_ms: BASE_PERFECT_MS, points: 4 },
            TimingWindow { judgment: Judgment::Great, window_ms: BASE_GREAT_MS, points: 3 },
            TimingWindow { judgment: Judgment::Good, window_ms: BASE_GOOD_MS, points: 2 },
            TimingWindow { judgment: Judgment::Boo, window_ms: BASE_BOO_MS, points: 0 },
        ])
    }

    /// Sorts by half-width so lookups can stop at the first fit.
    pub fn new(mut windows: Vec<TimingWindow>) -> Self {
        windows.sort_by(|a, b| a.window_ms.total_cmp(&b.window_ms));
        Self { windows }
    }

    #[inline(always)]
    pub fn windows(&self) -> &[TimingWindow] {
        &self.windows
    }

    /// First window whose half-width covers `|offset_ms|`.
    pub fn classify(&self, offset_ms: f32) -> Option<Judgment> {
        let abs = offset_ms.abs();
        self.windows
            .iter()
            .find(|w| abs <= w.window_ms)
            .map(|w| w.judgment)
    }

    pub fn points_for(&self, judgment: Judgment) -> u32 {
        self.windows
            .iter()
            .find(|w| w.judgment == judgment)
            .map_or(0, |w| w.points)
    }

    /// Best grade on the table, used when a roll tap has no recorded head grade.
    pub fn best(&self) -> Judgment {
        self.windows.first().map_or(Judgment::Marvelous, |w| w.judgment)
    }

    #[inline(always)]
    pub fn widest_ms(&self) -> f32 {
        self.windows.last().map_or(0.0, |w| w.window_ms)
    }

    /// Whether a grade counts as a hit: anything strictly tighter than the
    /// widest window. The widest window and `Miss` leave the note pending.
    pub fn is_scorable(&self, judgment: Judgment) -> bool {
        if judgment == Judgment::Miss {
            return false;
        }
        self.windows.last().is_none_or(|w| w.judgment != judgment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_follows_window_boundaries() {
        let table = TimingTable::standard();
        assert_eq!(table.classify(20.0), Some(Judgment::Marvelous));
        assert_eq!(table.classify(22.5), Some(Judgment::Marvelous));
        assert_eq!(table.classify(44.0), Some(Judgment::Perfect));
        assert_eq!(table.classify(90.0), Some(Judgment::Great));
        assert_eq!(table.classify(135.0), Some(Judgment::Good));
        assert_eq!(table.classify(180.0), Some(Judgment::Boo));
        assert_eq!(table.classify(181.0), None);
    }

    #[test]
    fn classify_is_symmetric_and_never_improves_with_distance() {
        let table = TimingTable::standard();
        let mut previous = Judgment::Marvelous;
        for step in 0..400 {
            let d = step as f32 * 0.5;
            assert_eq!(table.classify(d), table.classify(-d), "asymmetric at {d}");
            let j = table.classify(d).unwrap_or(Judgment::Miss);
            assert!(j >= previous, "grade improved from {previous:?} to {j:?} at {d}ms");
            previous = j;
        }
    }

    #[test]
    fn widest_window_is_not_scorable() {
        let table = TimingTable::standard();
        assert!(table.is_scorable(Judgment::Good));
        assert!(!table.is_scorable(Judgment::Boo));
        assert!(!table.is_scorable(Judgment::Miss));
        assert_eq!(table.widest_ms(), BASE_BOO_MS);
        assert_eq!(table.best(), Judgment::Marvelous);
    }

    #[test]
    fn custom_tables_are_ordered_on_construction() {
        let table = TimingTable::new(vec![
            TimingWindow { judgment: Judgment::Great, window_ms: 100.0, points: 1 },
            TimingWindow { judgment: Judgment::Perfect, window_ms: 30.0, points: 2 },
        ]);
        assert_eq!(table.classify(10.0), Some(Judgment::Perfect));
        assert_eq!(table.points_for(Judgment::Great), 1);
        assert_eq!(table.points_for(Judgment::Boo), 0);
        assert!(!table.is_scorable(Judgment::Great));
    }
}
