use crate::game::timing_windows::TimingTable;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Judgment {
    Marvelous,
    Perfect,
    Great,
    Good,
    Boo,
    Miss,
}

impl Judgment {
    pub const ALL: [Judgment; 6] = [
        Judgment::Marvelous,
        Judgment::Perfect,
        Judgment::Great,
        Judgment::Good,
        Judgment::Boo,
        Judgment::Miss,
    ];
}

/// What a dropped hold costs. Silent by default.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DroppedHoldPolicy {
    #[default]
    None,
    BreakCombo,
}

impl DroppedHoldPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::BreakCombo => "BreakCombo",
        }
    }
}

impl FromStr for DroppedHoldPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "breakcombo" | "break_combo" => Ok(Self::BreakCombo),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub score: f64,
    pub combo: u32,
    pub max_combo: u32,
    pub tallies: Vec<(Judgment, u32)>,
    pub holds_dropped: u32,
}

/// Running score, combo and per-grade tallies for one play.
#[derive(Clone, Debug)]
pub struct Scoring {
    table: TimingTable,
    hold_score_per_second: f64,
    dropped_hold_policy: DroppedHoldPolicy,
    pub score: f64,
    pub combo: u32,
    pub max_combo: u32,
    pub holds_dropped: u32,
    tallies: FxHashMap<Judgment, u32>,
}

impl Scoring {
    pub fn new(table: TimingTable, hold_score_per_second: f64, dropped_hold_policy: DroppedHoldPolicy) -> Self {
        let mut scoring = Self {
            table,
            hold_score_per_second,
            dropped_hold_policy,
            score: 0.0,
            combo: 0,
            max_combo: 0,
            holds_dropped: 0,
            tallies: FxHashMap::default(),
        };
        scoring.reset();
        scoring
    }

    pub fn reset(&mut self) {
        self.score = 0.0;
        self.combo = 0;
        self.max_combo = 0;
        self.holds_dropped = 0;
        self.tallies.clear();
        for judgment in Judgment::ALL {
            self.tallies.insert(judgment, 0);
        }
    }

    #[inline(always)]
    pub fn table(&self) -> &TimingTable {
        &self.table
    }

    #[inline(always)]
    pub fn classify(&self, offset_ms: f32) -> Option<Judgment> {
        self.table.classify(offset_ms)
    }

    #[inline(always)]
    pub fn tally(&self, judgment: Judgment) -> u32 {
        self.tallies.get(&judgment).copied().unwrap_or(0)
    }

    pub fn add_hit(&mut self, judgment: Judgment) {
        self.combo = self.combo.saturating_add(1);
        self.max_combo = self.max_combo.max(self.combo);
        *self.tallies.entry(judgment).or_insert(0) += 1;
        self.score += f64::from(self.table.points_for(judgment));
    }

    pub fn add_miss(&mut self) {
        self.combo = 0;
        *self.tallies.entry(Judgment::Miss).or_insert(0) += 1;
    }

    pub fn add_hold_tick(&mut self, delta_ms: f64) {
        self.score += self.hold_score_per_second * (delta_ms / 1000.0);
    }

    pub fn dropped_hold(&mut self) {
        self.holds_dropped = self.holds_dropped.saturating_add(1);
        match self.dropped_hold_policy {
            DroppedHoldPolicy::None => {}
            DroppedHoldPolicy::BreakCombo => self.combo = 0,
        }
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        ScoreSnapshot {
            score: self.score,
            combo: self.combo,
            max_combo: self.max_combo,
            tallies: Judgment::ALL.iter().map(|&j| (j, self.tally(j))).collect(),
            holds_dropped: self.holds_dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoring() -> Scoring {
        Scoring::new(TimingTable::standard(), 10.0, DroppedHoldPolicy::None)
    }

    #[test]
    fn hits_build_combo_and_score() {
        let mut s = scoring();
        s.add_hit(Judgment::Marvelous);
        s.add_hit(Judgment::Great);
        assert_eq!(s.combo, 2);
        assert_eq!(s.max_combo, 2);
        assert_eq!(s.score, 8.0);
        assert_eq!(s.tally(Judgment::Marvelous), 1);
        assert_eq!(s.tally(Judgment::Great), 1);
    }

    #[test]
    fn miss_always_resets_combo_but_keeps_score() {
        let mut s = scoring();
        for _ in 0..5 {
            s.add_hit(Judgment::Perfect);
        }
        let score = s.score;
        s.add_miss();
        assert_eq!(s.combo, 0);
        assert_eq!(s.max_combo, 5);
        assert_eq!(s.score, score);
        assert_eq!(s.tally(Judgment::Miss), 1);
        s.add_miss();
        assert_eq!(s.combo, 0);
    }

    #[test]
    fn hit_never_decreases_score() {
        let mut s = scoring();
        for j in Judgment::ALL {
            let before = s.score;
            s.add_hit(j);
            assert!(s.score >= before, "{j:?} lowered the score");
        }
    }

    #[test]
    fn hold_ticks_score_by_time_without_combo() {
        let mut s = scoring();
        s.add_hold_tick(500.0);
        assert_eq!(s.score, 5.0);
        assert_eq!(s.combo, 0);
    }

    #[test]
    fn dropped_hold_is_silent_by_default() {
        let mut s = scoring();
        s.add_hit(Judgment::Marvelous);
        s.dropped_hold();
        assert_eq!(s.combo, 1);
        assert_eq!(s.score, 5.0);
        assert_eq!(s.holds_dropped, 1);

        let mut strict = Scoring::new(TimingTable::standard(), 10.0, DroppedHoldPolicy::BreakCombo);
        strict.add_hit(Judgment::Marvelous);
        strict.dropped_hold();
        assert_eq!(strict.combo, 0);
        assert_eq!(strict.tally(Judgment::Miss), 0);
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut s = scoring();
        s.add_hit(Judgment::Good);
        s.add_miss();
        s.add_hold_tick(100.0);
        s.reset();
        let snap = s.snapshot();
        assert_eq!(snap.score, 0.0);
        assert_eq!(snap.combo, 0);
        assert_eq!(snap.max_combo, 0);
        assert!(snap.tallies.iter().all(|&(_, n)| n == 0));
        assert_eq!(snap.tallies.len(), Judgment::ALL.len());
    }

    #[test]
    fn policy_parses_from_config_text() {
        assert_eq!("BreakCombo".parse::<DroppedHoldPolicy>(), Ok(DroppedHoldPolicy::BreakCombo));
        assert_eq!(" none ".parse::<DroppedHoldPolicy>(), Ok(DroppedHoldPolicy::None));
        assert!("x".parse::<DroppedHoldPolicy>().is_err());
    }
}
