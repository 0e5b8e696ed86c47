use std::fmt;

use serde::{Deserialize, Serialize};

use crate::score::{MatchDeltas, Side, Signal};
use crate::sweep::ThresholdStat;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub signal: Signal,
    pub threshold: f64,
}

impl Condition {
    pub fn new(signal: Signal, threshold: f64) -> Self {
        Self { signal, threshold }
    }

    pub fn holds(&self, deltas: &MatchDeltas) -> bool {
        deltas.get(self.signal).abs() >= self.threshold
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>={}", self.signal, self.threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    All,
    Any,
}

/// Compound threshold rule. A covered match is predicted by the sign of
/// the first condition's signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub combinator: Combinator,
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn all(conditions: Vec<Condition>) -> Self {
        Self {
            name: None,
            combinator: Combinator::All,
            conditions,
        }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            name: None,
            combinator: Combinator::Any,
            conditions,
        }
    }

    pub fn label(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        let joiner = match self.combinator {
            Combinator::All => " AND ",
            Combinator::Any => " OR ",
        };
        self.conditions
            .iter()
            .map(Condition::to_string)
            .collect::<Vec<_>>()
            .join(joiner)
    }

    pub fn covers(&self, deltas: &MatchDeltas) -> bool {
        match self.combinator {
            Combinator::All => self.conditions.iter().all(|c| c.holds(deltas)),
            Combinator::Any => self.conditions.iter().any(|c| c.holds(deltas)),
        }
    }

    pub fn predict(&self, deltas: &MatchDeltas) -> Option<Side> {
        let first = self.conditions.first()?;
        self.covers(deltas)
            .then(|| Side::favored_by(deltas.get(first.signal)))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.conditions.is_empty() {
            return Err(format!("rule `{}` has no conditions", self.label()));
        }
        for condition in &self.conditions {
            if !condition.threshold.is_finite() || condition.threshold < 0.0 {
                return Err(format!(
                    "rule `{}` has invalid threshold {}",
                    self.label(),
                    condition.threshold
                ));
            }
        }
        Ok(())
    }
}

pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::all(vec![Condition::new(Signal::Delta, 20.0)]),
        Rule::all(vec![
            Condition::new(Signal::Delta, 20.0),
            Condition::new(Signal::LaneAdvantage, 10.0),
        ]),
        Rule::any(vec![
            Condition::new(Signal::Delta, 20.0),
            Condition::new(Signal::LaneAdvantage, 10.0),
        ]),
        Rule::all(vec![
            Condition::new(Signal::Delta, 20.0),
            Condition::new(Signal::NetWorth20, 2000.0),
        ]),
        Rule::all(vec![
            Condition::new(Signal::Delta, 20.0),
            Condition::new(Signal::LaneAdvantage, 10.0),
            Condition::new(Signal::NetWorth20, 2000.0),
        ]),
    ]
}

/// One accuracy counter per configured rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTally {
    pub stats: Vec<ThresholdStat>,
}

impl RuleTally {
    pub fn new(rules: &[Rule]) -> Self {
        Self {
            stats: vec![ThresholdStat::default(); rules.len()],
        }
    }

    pub fn observe(&mut self, rules: &[Rule], deltas: &MatchDeltas, radiant_won: bool) {
        for (rule, stat) in rules.iter().zip(self.stats.iter_mut()) {
            if let Some(side) = rule.predict(deltas) {
                stat.record(side.won(radiant_won));
            }
        }
    }

    pub fn merge(&mut self, other: &RuleTally) {
        for (mine, theirs) in self.stats.iter_mut().zip(&other.stats) {
            mine.merge(theirs);
        }
    }
}
