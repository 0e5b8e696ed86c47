use std::fmt::Write as _;

use serde::Serialize;

use crate::catalog::{HeroCatalog, HeroId, Role, RoleStat, fallback_zero};
use crate::error::ScoreError;
use crate::roles::{AssignmentStrategy, FitnessMatrix, PermutationScore, role_fitness};
use crate::score::{
    MatchDeltas, RoleTotals, ScoredMatchup, Side, SideScore, Signal, TeamScore, hero_advantage,
    score_matchup,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeroLine {
    pub hero: HeroId,
    pub name: String,
    pub role: Role,
    pub fitness: f64,
    pub win_rate: f64,
    pub kda: f64,
    pub popularity: f64,
    pub nw10: f64,
    pub nw20: f64,
    pub lane_advantage: f64,
    pub advantage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamBreakdown {
    pub heroes: Vec<HeroLine>,
    pub totals: RoleTotals,
    pub flat: TeamScore,
    pub fitness: PermutationScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchupBreakdown {
    pub strategy: AssignmentStrategy,
    pub radiant: TeamBreakdown,
    pub dire: TeamBreakdown,
    pub deltas: MatchDeltas,
}

impl MatchupBreakdown {
    pub fn favored(&self, signal: Signal) -> Side {
        Side::favored_by(self.deltas.get(signal))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (label, team) in [("Radiant", &self.radiant), ("Dire", &self.dire)] {
            let _ = writeln!(out, "{label} (fitness {})", team.fitness);
            for line in &team.heroes {
                let _ = writeln!(
                    out,
                    "  {:<12} {:<20} wr {:>6.2}  kda {:>5.2}  d2pt {:>7.1}  nw20 {:>7.0}  lane {:>6.2}  adv {:>+7.2}",
                    line.role.key(),
                    line.name,
                    line.win_rate,
                    line.kda,
                    line.popularity,
                    line.nw20,
                    line.lane_advantage,
                    line.advantage
                );
            }
            let _ = writeln!(
                out,
                "  score {:.2} (role wr {:.2} + adv {:+.2}), flat {:.2}",
                team.totals.score(),
                team.totals.win_rate,
                team.totals.advantage,
                team.flat.total
            );
        }
        out.push_str("Signals\n");
        for signal in Signal::ALL {
            let _ = writeln!(
                out,
                "  {:<10} {:>+10.2}  favors {}",
                signal.label(),
                self.deltas.get(signal),
                self.favored(signal)
            );
        }
        out
    }
}

fn team_breakdown(
    catalog: &HeroCatalog,
    side: &SideScore,
    opponents: &[HeroId; 5],
) -> Result<TeamBreakdown, ScoreError> {
    let matrix = FitnessMatrix::for_team(catalog, &side.heroes)?;
    let mut heroes = Vec::with_capacity(5);
    for (slot, &hero) in side.heroes.iter().enumerate() {
        let role = side.role_of(slot);
        let stat = |which: RoleStat| fallback_zero(catalog.role_stat(hero, role, which));
        heroes.push(HeroLine {
            hero,
            name: catalog.hero_name(hero).unwrap_or_default().to_string(),
            role,
            fitness: role_fitness(catalog, hero, role),
            win_rate: stat(RoleStat::WinRate),
            kda: stat(RoleStat::Kda),
            popularity: stat(RoleStat::Popularity),
            nw10: stat(RoleStat::NetWorth10),
            nw20: stat(RoleStat::NetWorth20),
            lane_advantage: stat(RoleStat::LaneAdvantage),
            advantage: hero_advantage(catalog, hero, opponents)?,
        });
    }
    Ok(TeamBreakdown {
        heroes,
        totals: side.totals,
        flat: side.flat.clone(),
        fitness: matrix.score(side.assignment.roles()),
    })
}

pub fn breakdown(
    catalog: &HeroCatalog,
    scored: &ScoredMatchup,
    strategy: AssignmentStrategy,
) -> Result<MatchupBreakdown, ScoreError> {
    Ok(MatchupBreakdown {
        strategy,
        radiant: team_breakdown(catalog, &scored.radiant, &scored.dire.heroes)?,
        dire: team_breakdown(catalog, &scored.dire, &scored.radiant.heroes)?,
        deltas: scored.deltas,
    })
}

/// Scores one 5v5 pairing and explains every number behind the deltas.
pub fn explain_matchup(
    catalog: &HeroCatalog,
    radiant: &[HeroId],
    dire: &[HeroId],
    strategy: AssignmentStrategy,
) -> Result<MatchupBreakdown, ScoreError> {
    let scored = score_matchup(catalog, radiant, dire, strategy)?;
    breakdown(catalog, &scored, strategy)
}
