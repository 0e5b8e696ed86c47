use serde::Serialize;
use tracing::warn;

use crate::catalog::HeroId;
use crate::score::Side;
use crate::sweep::ThresholdStat;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeTally {
    pub games: u64,
    pub radiant_wins: u64,
}

impl OutcomeTally {
    pub fn record(&mut self, radiant_won: bool) {
        self.games += 1;
        if radiant_won {
            self.radiant_wins += 1;
        }
    }

    pub fn merge(&mut self, other: &OutcomeTally) {
        self.games += other.games;
        self.radiant_wins += other.radiant_wins;
    }

    pub fn radiant_win_rate(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        self.radiant_wins as f64 / self.games as f64
    }

    pub fn dire_win_rate(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        (self.games - self.radiant_wins) as f64 / self.games as f64
    }
}

/// Outcome counts per fixed-width delta bin, with open tails on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaHistogram {
    width: f64,
    tail: f64,
    first: i64,
    // [below tail, interior bins..., above tail]
    bins: Vec<OutcomeTally>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinRow {
    pub label: String,
    pub games: u64,
    pub radiant_win_rate: f64,
    pub dire_win_rate: f64,
}

pub const DEFAULT_BIN_WIDTH: f64 = 2.0;
pub const DEFAULT_TAIL: f64 = 20.0;
pub const MAX_INTERIOR_BINS: usize = 10_000;

/// Number of interior bins between the tails, or `None` when `tail` is not a
/// positive whole multiple of `width` or the count exceeds `MAX_INTERIOR_BINS`.
pub fn interior_bins(width: f64, tail: f64) -> Option<usize> {
    if !(width.is_finite() && width > 0.0 && tail.is_finite() && tail > 0.0) {
        return None;
    }
    let steps = tail / width;
    let whole = steps.round();
    if whole < 1.0 || whole > (MAX_INTERIOR_BINS / 2) as f64 {
        return None;
    }
    if (steps - whole).abs() > 1e-9 * whole {
        return None;
    }
    Some(whole as usize * 2)
}

impl DeltaHistogram {
    /// Falls back to the default layout when `width` and `tail` do not give
    /// a usable bin count; configs are validated before this point.
    pub fn new(width: f64, tail: f64) -> Self {
        let (width, tail, interior) = match interior_bins(width, tail) {
            Some(interior) => (width, tail, interior),
            None => {
                warn!(width, tail, "unusable histogram layout, using defaults");
                let interior = (DEFAULT_TAIL / DEFAULT_BIN_WIDTH) as usize * 2;
                (DEFAULT_BIN_WIDTH, DEFAULT_TAIL, interior)
            }
        };
        Self {
            width,
            tail,
            first: -((interior / 2) as i64),
            bins: vec![OutcomeTally::default(); interior + 2],
        }
    }

    fn slot(&self, delta: f64) -> usize {
        if delta <= -self.tail {
            return 0;
        }
        if delta >= self.tail {
            return self.bins.len() - 1;
        }
        let k = (delta / self.width).floor() as i64;
        let interior = self.bins.len() - 2;
        ((k - self.first).clamp(0, interior as i64 - 1) as usize) + 1
    }

    pub fn observe(&mut self, delta: f64, radiant_won: bool) {
        let slot = self.slot(delta);
        self.bins[slot].record(radiant_won);
    }

    pub fn merge(&mut self, other: &DeltaHistogram) {
        for (mine, theirs) in self.bins.iter_mut().zip(&other.bins) {
            mine.merge(theirs);
        }
    }

    pub fn label_for(&self, delta: f64) -> String {
        self.label(self.slot(delta))
    }

    fn label(&self, slot: usize) -> String {
        if slot == 0 {
            return format!("<=-{}", self.tail);
        }
        if slot == self.bins.len() - 1 {
            return format!(">={}", self.tail);
        }
        let start = (self.first + slot as i64 - 1) as f64 * self.width;
        format!("{}..{}", start, start + self.width)
    }

    pub fn total_games(&self) -> u64 {
        self.bins.iter().map(|b| b.games).sum()
    }

    pub fn rows(&self) -> Vec<BinRow> {
        self.bins
            .iter()
            .enumerate()
            .map(|(slot, tally)| BinRow {
                label: self.label(slot),
                games: tally.games,
                radiant_win_rate: tally.radiant_win_rate(),
                dire_win_rate: tally.dire_win_rate(),
            })
            .collect()
    }
}

/// Outcome counts keyed by how many heroes on each side hold a positive
/// summed advantage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinationTable {
    cells: [[OutcomeTally; 6]; 6],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationRow {
    pub combination: String,
    pub games: u64,
    pub radiant_win_rate: f64,
    pub dire_win_rate: f64,
}

pub fn combination_key(radiant_positive: usize, dire_positive: usize) -> String {
    format!(
        "{}+ {}- vs {}+ {}-",
        radiant_positive,
        5 - radiant_positive,
        dire_positive,
        5 - dire_positive
    )
}

fn positive_count(advantages: &[f64]) -> usize {
    advantages.iter().filter(|a| **a > 0.0).count().min(5)
}

impl CombinationTable {
    pub fn observe(&mut self, radiant: &[f64], dire: &[f64], radiant_won: bool) {
        let r = positive_count(radiant);
        let d = positive_count(dire);
        self.cells[r][d].record(radiant_won);
    }

    pub fn merge(&mut self, other: &CombinationTable) {
        for (mine, theirs) in self.cells.iter_mut().zip(&other.cells) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                a.merge(b);
            }
        }
    }

    pub fn get(&self, radiant_positive: usize, dire_positive: usize) -> OutcomeTally {
        self.cells[radiant_positive.min(5)][dire_positive.min(5)]
    }

    /// All 36 combinations, radiant positives descending then dire
    /// positives descending.
    pub fn rows(&self) -> Vec<CombinationRow> {
        let mut out = Vec::with_capacity(36);
        for r in (0..=5).rev() {
            for d in (0..=5).rev() {
                let tally = self.cells[r][d];
                out.push(CombinationRow {
                    combination: combination_key(r, d),
                    games: tally.games,
                    radiant_win_rate: tally.radiant_win_rate(),
                    dire_win_rate: tally.dire_win_rate(),
                });
            }
        }
        out
    }
}

/// Accuracy of predicting with whichever side holds the single largest
/// per-hero advantage.
#[derive(Debug, Clone, PartialEq)]
pub struct MaxHeroSweep {
    pub thresholds: Vec<f64>,
    pub stats: Vec<ThresholdStat>,
}

impl MaxHeroSweep {
    pub fn new(thresholds: &[f64]) -> Self {
        Self {
            thresholds: thresholds.to_vec(),
            stats: vec![ThresholdStat::default(); thresholds.len()],
        }
    }

    pub fn observe(&mut self, radiant: &[f64], dire: &[f64], radiant_won: bool) {
        let r_max = radiant.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let d_max = dire.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let max = r_max.max(d_max);
        let side = if r_max >= d_max { Side::Radiant } else { Side::Dire };
        let correct = side.won(radiant_won);
        for (threshold, stat) in self.thresholds.iter().zip(self.stats.iter_mut()) {
            if max >= *threshold {
                stat.record(correct);
            }
        }
    }

    pub fn merge(&mut self, other: &MaxHeroSweep) {
        for (mine, theirs) in self.stats.iter_mut().zip(&other.stats) {
            mine.merge(theirs);
        }
    }
}

/// Win rate of a hero's own team, split by whether that hero's summed
/// advantage cleared `+t` or fell to `-t`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeroAdvantageTable {
    pub thresholds: Vec<f64>,
    positive: Vec<Vec<ThresholdStat>>,
    negative: Vec<Vec<ThresholdStat>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeroAdvantageRow {
    pub hero: HeroId,
    pub threshold: f64,
    pub positive: ThresholdStat,
    pub negative: ThresholdStat,
}

impl HeroAdvantageTable {
    pub fn new(hero_count: usize, thresholds: &[f64]) -> Self {
        let blank = vec![ThresholdStat::default(); thresholds.len()];
        Self {
            thresholds: thresholds.to_vec(),
            positive: vec![blank.clone(); hero_count],
            negative: vec![blank; hero_count],
        }
    }

    pub fn observe(&mut self, hero: HeroId, advantage: f64, team_won: bool) {
        let (Some(pos), Some(neg)) = (
            self.positive.get_mut(hero.0),
            self.negative.get_mut(hero.0),
        ) else {
            return;
        };
        for (i, threshold) in self.thresholds.iter().enumerate() {
            if advantage >= *threshold {
                pos[i].record(team_won);
            }
            if advantage <= -*threshold {
                neg[i].record(team_won);
            }
        }
    }

    pub fn merge(&mut self, other: &HeroAdvantageTable) {
        for (mine, theirs) in self.positive.iter_mut().zip(&other.positive) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                a.merge(b);
            }
        }
        for (mine, theirs) in self.negative.iter_mut().zip(&other.negative) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                a.merge(b);
            }
        }
    }

    /// Rows for heroes that were observed at least once at some threshold.
    pub fn rows(&self) -> Vec<HeroAdvantageRow> {
        let mut out = Vec::new();
        for (hero, (pos, neg)) in self.positive.iter().zip(&self.negative).enumerate() {
            if pos.iter().chain(neg).all(|s| s.games == 0) {
                continue;
            }
            for (i, threshold) in self.thresholds.iter().enumerate() {
                out.push(HeroAdvantageRow {
                    hero: HeroId(hero),
                    threshold: *threshold,
                    positive: pos[i],
                    negative: neg[i],
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_use_floor_and_open_tails() {
        let hist = DeltaHistogram::new(2.0, 20.0);
        assert_eq!(hist.label_for(-25.0), "<=-20");
        assert_eq!(hist.label_for(-20.0), "<=-20");
        assert_eq!(hist.label_for(-19.5), "-20..-18");
        assert_eq!(hist.label_for(-0.5), "-2..0");
        assert_eq!(hist.label_for(0.0), "0..2");
        assert_eq!(hist.label_for(3.9), "2..4");
        assert_eq!(hist.label_for(19.99), "18..20");
        assert_eq!(hist.label_for(20.0), ">=20");
        assert_eq!(hist.rows().len(), 22);
    }

    #[test]
    fn bin_count_needs_whole_steps_within_bounds() {
        assert_eq!(interior_bins(2.0, 20.0), Some(20));
        assert_eq!(interior_bins(0.5, 3.0), Some(12));
        assert_eq!(interior_bins(3.0, 20.0), None);
        assert_eq!(interior_bins(1e-300, 20.0), None);
        assert_eq!(interior_bins(1e-6, 20.0), None);
        assert_eq!(interior_bins(40.0, 20.0), None);
        assert_eq!(interior_bins(2.0, f64::INFINITY), None);
    }

    #[test]
    fn unusable_layout_falls_back_to_defaults() {
        let mut hist = DeltaHistogram::new(1e-300, 20.0);
        assert_eq!(hist, DeltaHistogram::new(DEFAULT_BIN_WIDTH, DEFAULT_TAIL));
        hist.observe(5.0, true);
        assert_eq!(hist.label_for(5.0), "4..6");
        assert_eq!(hist.total_games(), 1);
    }

    #[test]
    fn edge_bins_stop_at_the_tail() {
        let hist = DeltaHistogram::new(5.0, 20.0);
        let labels: Vec<String> = hist.rows().into_iter().map(|r| r.label).collect();
        assert_eq!(labels.first().map(String::as_str), Some("<=-20"));
        assert_eq!(labels[1], "-20..-15");
        assert_eq!(labels[labels.len() - 2], "15..20");
        assert_eq!(hist.label_for(19.0), "15..20");
        assert_eq!(hist.label_for(20.0), ">=20");
    }

    #[test]
    fn bin_rates_sum_to_one() {
        let mut hist = DeltaHistogram::new(2.0, 20.0);
        hist.observe(1.0, true);
        hist.observe(1.5, false);
        hist.observe(1.9, true);
        let row = hist.rows().into_iter().find(|r| r.label == "0..2").unwrap();
        assert_eq!(row.games, 3);
        assert!((row.radiant_win_rate + row.dire_win_rate - 1.0).abs() < 1e-12);
        assert_eq!(hist.total_games(), 3);
    }

    #[test]
    fn combination_rows_are_dense_and_sorted() {
        let mut table = CombinationTable::default();
        table.observe(&[1.0, 2.0, -1.0, 0.0, 3.0], &[-1.0; 5], true);
        let rows = table.rows();
        assert_eq!(rows.len(), 36);
        assert_eq!(rows[0].combination, "5+ 0- vs 5+ 0-");
        assert_eq!(rows[35].combination, "0+ 5- vs 0+ 5-");
        let hit = rows.iter().find(|r| r.games > 0).unwrap();
        assert_eq!(hit.combination, "3+ 2- vs 0+ 5-");
        assert_eq!(hit.radiant_win_rate, 1.0);
    }

    #[test]
    fn max_hero_prefers_radiant_on_tie() {
        let mut sweep = MaxHeroSweep::new(&[4.0, 8.0]);
        sweep.observe(&[6.0, 0.0], &[6.0, 1.0], true);
        assert_eq!(sweep.stats[0], ThresholdStat { games: 1, correct: 1 });
        assert_eq!(sweep.stats[1].games, 0);
    }

    #[test]
    fn hero_table_splits_by_sign() {
        let mut table = HeroAdvantageTable::new(3, &[5.0, 10.0]);
        table.observe(HeroId(1), 7.0, true);
        table.observe(HeroId(1), -12.0, false);
        let rows = table.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].positive, ThresholdStat { games: 1, correct: 1 });
        assert_eq!(rows[1].negative, ThresholdStat { games: 1, correct: 0 });
        assert_eq!(rows[1].positive.games, 0);
    }
}
