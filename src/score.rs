use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::{HeroCatalog, HeroId, Role, RoleStat, fallback_zero};
use crate::error::ScoreError;
use crate::roles::{AssignmentStrategy, RoleAssignment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Radiant,
    Dire,
}

impl Side {
    /// A non-negative delta favors radiant.
    pub fn favored_by(delta: f64) -> Side {
        if delta >= 0.0 { Side::Radiant } else { Side::Dire }
    }

    pub fn won(self, radiant_won: bool) -> bool {
        match self {
            Side::Radiant => radiant_won,
            Side::Dire => !radiant_won,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Radiant => f.write_str("radiant"),
            Side::Dire => f.write_str("dire"),
        }
    }
}

/// Radiant-minus-dire quantity a threshold can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "Delta")]
    Delta,
    #[serde(rename = "FlatDelta")]
    FlatDelta,
    #[serde(rename = "KDA")]
    Kda,
    #[serde(rename = "D2PT")]
    Popularity,
    #[serde(rename = "NW10")]
    NetWorth10,
    #[serde(rename = "NW20")]
    NetWorth20,
    #[serde(rename = "LaneAdv")]
    LaneAdvantage,
}

impl Signal {
    pub const ALL: [Signal; 7] = [
        Signal::Delta,
        Signal::FlatDelta,
        Signal::Kda,
        Signal::Popularity,
        Signal::NetWorth10,
        Signal::NetWorth20,
        Signal::LaneAdvantage,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Signal::Delta => "Delta",
            Signal::FlatDelta => "FlatDelta",
            Signal::Kda => "KDA",
            Signal::Popularity => "D2PT",
            Signal::NetWorth10 => "NW10",
            Signal::NetWorth20 => "NW20",
            Signal::LaneAdvantage => "LaneAdv",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Signal::ALL
            .into_iter()
            .find(|signal| signal.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown signal `{wanted}`"))
    }
}

/// Flat team score: base win rates plus every pairwise advantage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamScore {
    pub base: f64,
    pub advantage: f64,
    pub total: f64,
    pub per_hero_advantage: Vec<f64>,
}

/// Sum of `win_rates[opponent][hero].advantage` over the opposing heroes.
pub fn hero_advantage(
    catalog: &HeroCatalog,
    hero: HeroId,
    opponents: &[HeroId],
) -> Result<f64, ScoreError> {
    catalog.check(hero)?;
    let mut total = 0.0;
    for &opponent in opponents {
        total += catalog.advantage(opponent, hero)?.advantage;
    }
    Ok(total)
}

/// Works on teams of any size, including partial drafts.
pub fn team_score(
    catalog: &HeroCatalog,
    team: &[HeroId],
    opponents: &[HeroId],
) -> Result<TeamScore, ScoreError> {
    let mut base = 0.0;
    for &hero in team {
        base += catalog.base_win_rate(hero)?;
    }
    for &opponent in opponents {
        catalog.check(opponent)?;
    }

    let mut total = base;
    let mut advantage = 0.0;
    let mut per_hero_advantage = Vec::with_capacity(team.len());
    for &hero in team {
        let adv = hero_advantage(catalog, hero, opponents)?;
        total += adv;
        advantage += adv;
        per_hero_advantage.push(adv);
    }

    Ok(TeamScore {
        base,
        advantage,
        total,
        per_hero_advantage,
    })
}

/// Role-aware aggregates for one five-hero side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RoleTotals {
    pub win_rate: f64,
    pub kda: f64,
    pub popularity: f64,
    pub nw10: f64,
    pub nw20: f64,
    pub lane_advantage: f64,
    pub advantage: f64,
}

impl RoleTotals {
    pub fn score(&self) -> f64 {
        self.win_rate + self.advantage
    }
}

pub fn role_aware_team_score(
    catalog: &HeroCatalog,
    team: &[HeroId],
    assignment: &RoleAssignment,
    opponents: &[HeroId],
) -> Result<RoleTotals, ScoreError> {
    let team = lineup(team)?;
    let mut totals = RoleTotals::default();
    for (&hero, &role) in team.iter().zip(assignment.roles()) {
        catalog.check(hero)?;
        let stat = |which: RoleStat| fallback_zero(catalog.role_stat(hero, role, which));
        totals.win_rate += stat(RoleStat::WinRate);
        totals.kda += stat(RoleStat::Kda);
        totals.popularity += stat(RoleStat::Popularity);
        totals.nw10 += stat(RoleStat::NetWorth10);
        totals.nw20 += stat(RoleStat::NetWorth20);
        totals.lane_advantage += stat(RoleStat::LaneAdvantage);
        totals.advantage += hero_advantage(catalog, hero, opponents)?;
    }
    Ok(totals)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MatchDeltas {
    pub delta: f64,
    pub flat_delta: f64,
    pub kda: f64,
    pub popularity: f64,
    pub nw10: f64,
    pub nw20: f64,
    pub lane_advantage: f64,
}

impl MatchDeltas {
    pub fn between(
        radiant: &RoleTotals,
        dire: &RoleTotals,
        radiant_flat: &TeamScore,
        dire_flat: &TeamScore,
    ) -> Self {
        Self {
            delta: radiant.score() - dire.score(),
            flat_delta: radiant_flat.total - dire_flat.total,
            kda: radiant.kda - dire.kda,
            popularity: radiant.popularity - dire.popularity,
            nw10: radiant.nw10 - dire.nw10,
            nw20: radiant.nw20 - dire.nw20,
            lane_advantage: radiant.lane_advantage - dire.lane_advantage,
        }
    }

    pub fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::Delta => self.delta,
            Signal::FlatDelta => self.flat_delta,
            Signal::Kda => self.kda,
            Signal::Popularity => self.popularity,
            Signal::NetWorth10 => self.nw10,
            Signal::NetWorth20 => self.nw20,
            Signal::LaneAdvantage => self.lane_advantage,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SideScore {
    pub heroes: [HeroId; 5],
    pub assignment: RoleAssignment,
    pub totals: RoleTotals,
    pub flat: TeamScore,
}

impl SideScore {
    pub fn role_of(&self, slot: usize) -> Role {
        self.assignment.roles()[slot]
    }
}

/// Both sides of one five-versus-five matchup, fully scored.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatchup {
    pub radiant: SideScore,
    pub dire: SideScore,
    pub deltas: MatchDeltas,
}

/// A team is exactly five distinct heroes.
pub fn lineup(team: &[HeroId]) -> Result<[HeroId; 5], ScoreError> {
    let heroes = <[HeroId; 5]>::try_from(team)
        .map_err(|_| ScoreError::IncompleteTeam { len: team.len() })?;
    for (slot, hero) in heroes.iter().enumerate() {
        if heroes[..slot].contains(hero) {
            return Err(ScoreError::RepeatedHero { index: hero.0 });
        }
    }
    Ok(heroes)
}

fn score_side(
    catalog: &HeroCatalog,
    team: [HeroId; 5],
    opponents: &[HeroId; 5],
    strategy: AssignmentStrategy,
) -> Result<SideScore, ScoreError> {
    let assignment = strategy.assign(catalog, &team)?;
    let totals = role_aware_team_score(catalog, &team, &assignment, opponents)?;
    let flat = team_score(catalog, &team, opponents)?;
    Ok(SideScore {
        heroes: team,
        assignment,
        totals,
        flat,
    })
}

pub fn score_matchup(
    catalog: &HeroCatalog,
    radiant: &[HeroId],
    dire: &[HeroId],
    strategy: AssignmentStrategy,
) -> Result<ScoredMatchup, ScoreError> {
    let radiant = lineup(radiant)?;
    let dire = lineup(dire)?;
    let radiant = score_side(catalog, radiant, &dire, strategy)?;
    let dire = score_side(catalog, dire, &radiant.heroes, strategy)?;
    let deltas = MatchDeltas::between(&radiant.totals, &dire.totals, &radiant.flat, &dire.flat);
    Ok(ScoredMatchup {
        radiant,
        dire,
        deltas,
    })
}
