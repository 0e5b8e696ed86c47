use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::roles::AssignmentStrategy;
use crate::rules::{Rule, default_rules};
use crate::score::Signal;
use crate::views::{DEFAULT_BIN_WIDTH, DEFAULT_TAIL, MAX_INTERIOR_BINS, interior_bins};

fn series(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

fn default_delta() -> Vec<f64> {
    series(2.0, 2.0, 25)
}

fn default_kda() -> Vec<f64> {
    series(1.0, 1.0, 6)
}

fn default_popularity() -> Vec<f64> {
    series(500.0, 500.0, 10)
}

fn default_nw10() -> Vec<f64> {
    series(200.0, 200.0, 25)
}

fn default_nw20() -> Vec<f64> {
    series(500.0, 500.0, 20)
}

fn default_lane_advantage() -> Vec<f64> {
    series(2.0, 2.0, 30)
}

fn default_max_hero() -> Vec<f64> {
    series(4.0, 1.0, 7)
}

fn default_hero_thresholds() -> Vec<f64> {
    series(5.0, 1.0, 6)
}

/// Threshold series per signal. `flat_delta` shares the Delta series unless
/// given explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSeries {
    #[serde(default = "default_delta")]
    pub delta: Vec<f64>,
    #[serde(default)]
    pub flat_delta: Option<Vec<f64>>,
    #[serde(default = "default_kda")]
    pub kda: Vec<f64>,
    #[serde(default = "default_popularity")]
    pub d2pt: Vec<f64>,
    #[serde(default = "default_nw10")]
    pub nw10: Vec<f64>,
    #[serde(default = "default_nw20")]
    pub nw20: Vec<f64>,
    #[serde(default = "default_lane_advantage")]
    pub laneadv: Vec<f64>,
}

impl Default for ThresholdSeries {
    fn default() -> Self {
        Self {
            delta: default_delta(),
            flat_delta: None,
            kda: default_kda(),
            d2pt: default_popularity(),
            nw10: default_nw10(),
            nw20: default_nw20(),
            laneadv: default_lane_advantage(),
        }
    }
}

impl ThresholdSeries {
    pub fn get(&self, signal: Signal) -> &[f64] {
        match signal {
            Signal::Delta => &self.delta,
            Signal::FlatDelta => self.flat_delta.as_deref().unwrap_or(&self.delta),
            Signal::Kda => &self.kda,
            Signal::Popularity => &self.d2pt,
            Signal::NetWorth10 => &self.nw10,
            Signal::NetWorth20 => &self.nw20,
            Signal::LaneAdvantage => &self.laneadv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    #[serde(default = "default_bin_width")]
    pub bin_width: f64,
    #[serde(default = "default_tail")]
    pub tail: f64,
}

fn default_bin_width() -> f64 {
    DEFAULT_BIN_WIDTH
}

fn default_tail() -> f64 {
    DEFAULT_TAIL
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bin_width: default_bin_width(),
            tail: default_tail(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub strategy: AssignmentStrategy,
    #[serde(default)]
    pub thresholds: ThresholdSeries,
    #[serde(default = "default_rules")]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub histogram: HistogramConfig,
    #[serde(default = "default_max_hero")]
    pub max_hero_thresholds: Vec<f64>,
    #[serde(default = "default_hero_thresholds")]
    pub hero_thresholds: Vec<f64>,
    // None: rayon picks the worker count.
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            strategy: AssignmentStrategy::default(),
            thresholds: ThresholdSeries::default(),
            rules: default_rules(),
            histogram: HistogramConfig::default(),
            max_hero_thresholds: default_max_hero(),
            hero_thresholds: default_hero_thresholds(),
            workers: None,
        }
    }
}

fn check_series(name: &str, values: &[f64]) -> Result<(), ConfigError> {
    if values.is_empty() {
        return Err(ConfigError::Validation(format!("{name} thresholds are empty")));
    }
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ConfigError::Validation(format!(
            "{name} thresholds must be finite and non-negative"
        )));
    }
    if values.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ConfigError::Validation(format!(
            "{name} thresholds must be strictly increasing"
        )));
    }
    Ok(())
}

impl BacktestConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
                path: "<inline>".into(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BacktestConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for signal in Signal::ALL {
            check_series(signal.label(), self.thresholds.get(signal))?;
        }
        check_series("MaxHeroAdv", &self.max_hero_thresholds)?;
        check_series("hero advantage", &self.hero_thresholds)?;
        let hist = self.histogram;
        if !(hist.bin_width.is_finite() && hist.bin_width > 0.0) {
            return Err(ConfigError::Validation("histogram bin_width must be > 0".into()));
        }
        if !(hist.tail.is_finite() && hist.tail > 0.0) {
            return Err(ConfigError::Validation("histogram tail must be > 0".into()));
        }
        if interior_bins(hist.bin_width, hist.tail).is_none() {
            return Err(ConfigError::Validation(format!(
                "histogram tail must be a whole multiple of bin_width giving at most {MAX_INTERIOR_BINS} bins"
            )));
        }
        for rule in &self.rules {
            rule.validate().map_err(ConfigError::Validation)?;
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Validation("workers must be at least 1".into()));
        }
        Ok(())
    }

    /// `COUNTERPICK_WORKERS` and `COUNTERPICK_STRATEGY` override the file.
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = env::var("COUNTERPICK_WORKERS") {
            match raw.trim().parse::<usize>().ok().filter(|n| *n > 0) {
                Some(n) => self.workers = Some(n),
                None => warn!(value = %raw, "ignoring invalid COUNTERPICK_WORKERS"),
            }
        }
        if let Some(strategy) = strategy_from_env() {
            self.strategy = strategy;
        }
    }
}

/// Strategy named by `COUNTERPICK_STRATEGY`, if set and valid.
pub fn strategy_from_env() -> Option<AssignmentStrategy> {
    env::var("COUNTERPICK_STRATEGY")
        .ok()
        .and_then(|raw| parse_strategy_override(&raw))
}

fn parse_strategy_override(raw: &str) -> Option<AssignmentStrategy> {
    match raw.parse::<AssignmentStrategy>() {
        Ok(strategy) => Some(strategy),
        Err(err) => {
            warn!(error = %err, "ignoring invalid COUNTERPICK_STRATEGY");
            None
        }
    }
}
