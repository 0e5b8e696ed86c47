use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::HeroCatalog;
use crate::config::BacktestConfig;
use crate::corpus::MatchRecord;
use crate::error::ScoreError;
use crate::rules::RuleTally;
use crate::score::{ScoredMatchup, Side, Signal, score_matchup};
use crate::views::{CombinationTable, DeltaHistogram, HeroAdvantageTable, MaxHeroSweep};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThresholdStat {
    pub games: u64,
    pub correct: u64,
}

impl ThresholdStat {
    pub fn record(&mut self, correct: bool) {
        self.games += 1;
        if correct {
            self.correct += 1;
        }
    }

    pub fn merge(&mut self, other: &ThresholdStat) {
        self.games += other.games;
        self.correct += other.correct;
    }

    /// Zero when no match met the threshold; read alongside `games`.
    pub fn accuracy(&self) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        self.correct as f64 / self.games as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSweep {
    pub signal: Signal,
    pub thresholds: Vec<f64>,
    pub stats: Vec<ThresholdStat>,
}

impl SignalSweep {
    pub fn new(signal: Signal, thresholds: &[f64]) -> Self {
        Self {
            signal,
            thresholds: thresholds.to_vec(),
            stats: vec![ThresholdStat::default(); thresholds.len()],
        }
    }

    pub fn observe(&mut self, delta: f64, radiant_won: bool) {
        let magnitude = delta.abs();
        let correct = Side::favored_by(delta).won(radiant_won);
        for (threshold, stat) in self.thresholds.iter().zip(self.stats.iter_mut()) {
            if magnitude >= *threshold {
                stat.record(correct);
            }
        }
    }

    pub fn merge(&mut self, other: &SignalSweep) {
        for (mine, theirs) in self.stats.iter_mut().zip(&other.stats) {
            mine.merge(theirs);
        }
    }

    pub fn stat_at(&self, threshold: f64) -> Option<ThresholdStat> {
        self.thresholds
            .iter()
            .position(|t| *t == threshold)
            .map(|i| self.stats[i])
    }
}

/// Every counter a backtest produces. Workers each own one and the results
/// are merged; merge is associative and commutative.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepAccumulator {
    pub signals: Vec<SignalSweep>,
    pub rules: RuleTally,
    pub max_hero: MaxHeroSweep,
    pub histogram: DeltaHistogram,
    pub combinations: CombinationTable,
    pub hero_advantage: HeroAdvantageTable,
    pub processed: u64,
    pub skipped: u64,
}

impl SweepAccumulator {
    pub fn new(config: &BacktestConfig, hero_count: usize) -> Self {
        Self {
            signals: Signal::ALL
                .into_iter()
                .map(|signal| SignalSweep::new(signal, config.thresholds.get(signal)))
                .collect(),
            rules: RuleTally::new(&config.rules),
            max_hero: MaxHeroSweep::new(&config.max_hero_thresholds),
            histogram: DeltaHistogram::new(config.histogram.bin_width, config.histogram.tail),
            combinations: CombinationTable::default(),
            hero_advantage: HeroAdvantageTable::new(hero_count, &config.hero_thresholds),
            processed: 0,
            skipped: 0,
        }
    }

    pub fn signal(&self, signal: Signal) -> Option<&SignalSweep> {
        self.signals.iter().find(|s| s.signal == signal)
    }

    pub fn observe(&mut self, config: &BacktestConfig, scored: &ScoredMatchup, radiant_won: bool) {
        let deltas = &scored.deltas;
        for sweep in &mut self.signals {
            sweep.observe(deltas.get(sweep.signal), radiant_won);
        }
        self.rules.observe(&config.rules, deltas, radiant_won);

        let radiant_adv = &scored.radiant.flat.per_hero_advantage;
        let dire_adv = &scored.dire.flat.per_hero_advantage;
        self.max_hero.observe(radiant_adv, dire_adv, radiant_won);
        self.histogram.observe(deltas.delta, radiant_won);
        self.combinations.observe(radiant_adv, dire_adv, radiant_won);
        for (hero, adv) in scored.radiant.heroes.iter().zip(radiant_adv) {
            self.hero_advantage.observe(*hero, *adv, radiant_won);
        }
        for (hero, adv) in scored.dire.heroes.iter().zip(dire_adv) {
            self.hero_advantage.observe(*hero, *adv, !radiant_won);
        }
        self.processed += 1;
    }

    pub fn merge(mut self, other: SweepAccumulator) -> SweepAccumulator {
        for (mine, theirs) in self.signals.iter_mut().zip(&other.signals) {
            mine.merge(theirs);
        }
        self.rules.merge(&other.rules);
        self.max_hero.merge(&other.max_hero);
        self.histogram.merge(&other.histogram);
        self.combinations.merge(&other.combinations);
        self.hero_advantage.merge(&other.hero_advantage);
        self.processed += other.processed;
        self.skipped += other.skipped;
        self
    }
}

/// Threshold backtest over a resolved corpus against one catalog.
pub struct Backtest<'a> {
    catalog: &'a HeroCatalog,
    config: &'a BacktestConfig,
}

impl<'a> Backtest<'a> {
    pub fn new(catalog: &'a HeroCatalog, config: &'a BacktestConfig) -> Self {
        Self { catalog, config }
    }

    pub fn accumulator(&self) -> SweepAccumulator {
        SweepAccumulator::new(self.config, self.catalog.len())
    }

    pub fn score(&self, record: &MatchRecord) -> Result<ScoredMatchup, ScoreError> {
        score_matchup(
            self.catalog,
            &record.radiant,
            &record.dire,
            self.config.strategy,
        )
    }

    /// Scores one record into `acc`. A record that cannot be scored only
    /// bumps the skip counter.
    pub fn observe(&self, acc: &mut SweepAccumulator, record: &MatchRecord) {
        match self.score(record) {
            Ok(scored) => acc.observe(self.config, &scored, record.radiant_won),
            Err(err) => {
                debug!(match_id = %record.match_id, error = %err, "match skipped");
                acc.skipped += 1;
            }
        }
    }

    pub fn run_sequential(&self, records: &[MatchRecord]) -> SweepAccumulator {
        let mut acc = self.accumulator();
        for record in records {
            self.observe(&mut acc, record);
        }
        acc
    }

    pub fn run(&self, records: &[MatchRecord]) -> SweepAccumulator {
        self.run_cancellable(records, &AtomicBool::new(false))
    }

    /// Parallel sweep. Once `cancel` is set, remaining records are left
    /// unprocessed and the partial counters are returned.
    pub fn run_cancellable(&self, records: &[MatchRecord], cancel: &AtomicBool) -> SweepAccumulator {
        let pool = build_sweep_pool(self.config.workers);
        let acc = with_sweep_pool(&pool, || {
            records
                .par_iter()
                .fold(
                    || self.accumulator(),
                    |mut acc, record| {
                        if !cancel.load(Ordering::Relaxed) {
                            self.observe(&mut acc, record);
                        }
                        acc
                    },
                )
                .reduce(|| self.accumulator(), SweepAccumulator::merge)
        });
        info!(
            records = records.len(),
            processed = acc.processed,
            skipped = acc.skipped,
            cancelled = cancel.load(Ordering::Relaxed),
            "sweep finished"
        );
        acc
    }
}

fn build_sweep_pool(workers: Option<usize>) -> Option<rayon::ThreadPool> {
    let threads = workers?;
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(1, 256))
        .thread_name(|i| format!("sweep-{i}"))
        .build()
        .ok()
}

fn with_sweep_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
