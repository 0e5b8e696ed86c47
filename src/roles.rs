use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::catalog::{HeroCatalog, HeroId, Role, RoleStat, fallback_excluding, fallback_zero};
use crate::error::ScoreError;
use crate::score::lineup;

const POPULARITY_WEIGHT: f64 = 10.0;
const NW20_WEIGHT: f64 = 0.01;
const KDA_WEIGHT: f64 = 100.0;
// Fewer viable roles dominates the greedy ordering; the best fitness only
// breaks ties within the same viability count.
const VIABLE_WEIGHT: f64 = 100_000.0;

/// All 120 role orders, lexicographic over `Role::ALL`.
static PERMUTATIONS: Lazy<Vec<[Role; 5]>> = Lazy::new(|| {
    let mut out = Vec::with_capacity(120);
    let mut current = Vec::with_capacity(5);
    let mut used = [false; 5];
    permute(&mut current, &mut used, &mut out);
    out
});

fn permute(current: &mut Vec<Role>, used: &mut [bool; 5], out: &mut Vec<[Role; 5]>) {
    if current.len() == 5 {
        out.push([current[0], current[1], current[2], current[3], current[4]]);
        return;
    }
    for role in Role::ALL {
        if used[role.index()] {
            continue;
        }
        used[role.index()] = true;
        current.push(role);
        permute(current, used, out);
        current.pop();
        used[role.index()] = false;
    }
}

pub fn permutations() -> &'static [[Role; 5]] {
    &PERMUTATIONS
}

/// Slot `i` of the team plays `roles[i]`. Always a bijection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RoleAssignment {
    roles: [Role; 5],
}

impl RoleAssignment {
    pub fn new(roles: [Role; 5]) -> Option<Self> {
        let mut seen = [false; 5];
        for role in roles {
            if std::mem::replace(&mut seen[role.index()], true) {
                return None;
            }
        }
        Some(Self { roles })
    }

    pub fn roles(&self) -> &[Role; 5] {
        &self.roles
    }

    pub fn slot_of(&self, role: Role) -> usize {
        self.roles.iter().position(|r| *r == role).unwrap_or(0)
    }
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.roles.iter().map(|r| r.key()).collect();
        f.write_str(&keys.join(","))
    }
}

/// Fitness of `hero` in `role`. Negative infinity when the role has no
/// positive popularity figure, so the role is avoided by every solver.
pub fn role_fitness(catalog: &HeroCatalog, hero: HeroId, role: Role) -> f64 {
    let popularity = catalog
        .role_stat(hero, role, RoleStat::Popularity)
        .filter(|v| *v > 0.0);
    let Some(popularity) = popularity else {
        return fallback_excluding(None);
    };
    let nw20 = fallback_zero(catalog.role_stat(hero, role, RoleStat::NetWorth20));
    let kda = fallback_zero(catalog.role_stat(hero, role, RoleStat::Kda));
    popularity * POPULARITY_WEIGHT + nw20 * NW20_WEIGHT + kda * KDA_WEIGHT
}

/// `fitness[slot][role]` for a five-hero team.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessMatrix(pub [[f64; 5]; 5]);

impl FitnessMatrix {
    pub fn for_team(catalog: &HeroCatalog, team: &[HeroId]) -> Result<Self, ScoreError> {
        let team = lineup(team)?;
        let mut cells = [[0.0; 5]; 5];
        for (slot, &hero) in team.iter().enumerate() {
            catalog.check(hero)?;
            for role in Role::ALL {
                cells[slot][role.index()] = role_fitness(catalog, hero, role);
            }
        }
        Ok(Self(cells))
    }

    pub fn get(&self, slot: usize, role: Role) -> f64 {
        self.0[slot][role.index()]
    }

    pub fn score(&self, roles: &[Role; 5]) -> PermutationScore {
        let mut excluded = 0;
        let mut total = 0.0;
        for (slot, role) in roles.iter().enumerate() {
            let value = self.get(slot, *role);
            if value.is_finite() {
                total += value;
            } else {
                excluded += 1;
            }
        }
        PermutationScore { excluded, total }
    }
}

/// Ranking key for a permutation: fewest excluded cells, then the highest
/// finite total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PermutationScore {
    pub excluded: usize,
    pub total: f64,
}

impl PermutationScore {
    pub fn beats(&self, other: &PermutationScore) -> bool {
        self.excluded < other.excluded || (self.excluded == other.excluded && self.total > other.total)
    }
}

impl fmt::Display for PermutationScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.excluded == 0 {
            write!(f, "{:.1}", self.total)
        } else {
            write!(f, "{:.1} ({} excluded)", self.total, self.excluded)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentStrategy {
    #[default]
    Exhaustive,
    GreedyPopularity,
    GreedyConstrained,
}

impl AssignmentStrategy {
    pub fn label(self) -> &'static str {
        match self {
            AssignmentStrategy::Exhaustive => "exhaustive",
            AssignmentStrategy::GreedyPopularity => "greedy-popularity",
            AssignmentStrategy::GreedyConstrained => "greedy-constrained",
        }
    }

    pub fn assign(self, catalog: &HeroCatalog, team: &[HeroId]) -> Result<RoleAssignment, ScoreError> {
        let matrix = FitnessMatrix::for_team(catalog, team)?;
        let roles = match self {
            AssignmentStrategy::Exhaustive => exhaustive(&matrix),
            AssignmentStrategy::GreedyPopularity => greedy_popularity(catalog, team),
            AssignmentStrategy::GreedyConstrained => greedy_constrained(&matrix),
        };
        Ok(RoleAssignment { roles })
    }
}

impl fmt::Display for AssignmentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AssignmentStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "exhaustive" => Ok(AssignmentStrategy::Exhaustive),
            "greedy-popularity" | "greedy" => Ok(AssignmentStrategy::GreedyPopularity),
            "greedy-constrained" => Ok(AssignmentStrategy::GreedyConstrained),
            other => Err(format!("unknown assignment strategy `{other}`")),
        }
    }
}

/// Optimal assignment over all 120 permutations.
pub fn assign_roles(catalog: &HeroCatalog, team: &[HeroId]) -> Result<RoleAssignment, ScoreError> {
    AssignmentStrategy::Exhaustive.assign(catalog, team)
}

fn exhaustive(matrix: &FitnessMatrix) -> [Role; 5] {
    let perms = permutations();
    let mut best = perms[0];
    let mut best_score = matrix.score(&best);
    for perm in &perms[1..] {
        let score = matrix.score(perm);
        // Strict improvement only, so ties keep the earliest permutation.
        if score.beats(&best_score) {
            best = *perm;
            best_score = score;
        }
    }
    best
}

fn first_free(taken: &[bool; 5]) -> Role {
    Role::ALL
        .into_iter()
        .find(|r| !taken[r.index()])
        .unwrap_or(Role::Carry)
}

fn greedy_popularity(catalog: &HeroCatalog, team: &[HeroId]) -> [Role; 5] {
    let popularity = |slot: usize, role: Role| {
        fallback_zero(catalog.role_stat(team[slot], role, RoleStat::Popularity))
    };
    let preferences: Vec<Vec<Role>> = (0..5)
        .map(|slot| {
            let mut roles = Role::ALL.to_vec();
            roles.sort_by(|a, b| popularity(slot, *b).total_cmp(&popularity(slot, *a)));
            roles
        })
        .collect();

    let mut order: Vec<usize> = (0..5).collect();
    order.sort_by(|&a, &b| {
        popularity(b, preferences[b][0]).total_cmp(&popularity(a, preferences[a][0]))
    });

    let mut roles = [Role::Carry; 5];
    let mut taken = [false; 5];
    for slot in order {
        let role = preferences[slot]
            .iter()
            .copied()
            .find(|r| !taken[r.index()])
            .unwrap_or_else(|| first_free(&taken));
        taken[role.index()] = true;
        roles[slot] = role;
    }
    roles
}

fn greedy_constrained(matrix: &FitnessMatrix) -> [Role; 5] {
    let priority = |slot: usize| {
        let row = &matrix.0[slot];
        let viable = row.iter().filter(|v| v.is_finite() && **v > 0.0).count();
        let best = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (6 - viable) as f64 * VIABLE_WEIGHT + best
    };
    let mut order: Vec<usize> = (0..5).collect();
    order.sort_by(|&a, &b| priority(b).partial_cmp(&priority(a)).unwrap_or(Ordering::Equal));

    let mut roles = [Role::Carry; 5];
    let mut taken = [false; 5];
    for slot in order {
        let mut pick: Option<(Role, f64)> = None;
        for role in Role::ALL {
            if taken[role.index()] {
                continue;
            }
            let value = matrix.get(slot, role);
            if value.is_finite() && pick.is_none_or(|(_, best)| value > best) {
                pick = Some((role, value));
            }
        }
        let role = pick.map(|(role, _)| role).unwrap_or_else(|| first_free(&taken));
        taken[role.index()] = true;
        roles[slot] = role;
    }
    roles
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uniform_catalog() -> HeroCatalog {
        let pop = vec![100; 5];
        HeroCatalog::from_json_value(json!({
            "heroes": ["A", "B", "C", "D", "E"],
            "win_rates": [],
            "heroes_roles_d2pt": {
                "carry": pop, "mid": pop, "offlane": pop,
                "softsupport": pop, "hardsupport": pop
            }
        }))
        .unwrap()
    }

    fn team() -> Vec<HeroId> {
        (0..5).map(HeroId).collect()
    }

    #[test]
    fn permutations_are_complete_and_ordered() {
        let perms = permutations();
        assert_eq!(perms.len(), 120);
        assert_eq!(perms[0], Role::ALL);
        assert_eq!(
            perms[119],
            [
                Role::HardSupport,
                Role::SoftSupport,
                Role::Offlane,
                Role::Mid,
                Role::Carry
            ]
        );
        assert!(perms.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn ties_keep_identity_order() {
        let catalog = uniform_catalog();
        let assignment = assign_roles(&catalog, &team()).unwrap();
        assert_eq!(assignment.roles(), &Role::ALL);
    }

    #[test]
    fn fitness_formula_and_exclusion() {
        let catalog = HeroCatalog::from_json_value(json!({
            "heroes": ["A"],
            "win_rates": [],
            "heroes_roles_d2pt": { "carry": [200], "mid": [0] },
            "heroes_roles": { "carry": { "nw20": [10000] } },
            "heroes_roles_db_wrkda": { "carry": { "kda": [3.5] } }
        }))
        .unwrap();
        assert_eq!(role_fitness(&catalog, HeroId(0), Role::Carry), 2000.0 + 100.0 + 350.0);
        assert_eq!(role_fitness(&catalog, HeroId(0), Role::Mid), f64::NEG_INFINITY);
        assert_eq!(role_fitness(&catalog, HeroId(0), Role::Offlane), f64::NEG_INFINITY);
    }

    #[test]
    fn avoids_roles_without_data() {
        // Hero 0 only has data for hardsupport; everyone else is flexible.
        let catalog = HeroCatalog::from_json_value(json!({
            "heroes": ["A", "B", "C", "D", "E"],
            "win_rates": [],
            "heroes_roles_d2pt": {
                "carry": [0, 500, 500, 500, 500],
                "mid": [0, 400, 400, 400, 400],
                "offlane": [0, 300, 300, 300, 300],
                "softsupport": [0, 200, 200, 200, 200],
                "hardsupport": [10, 100, 100, 100, 100]
            }
        }))
        .unwrap();
        for strategy in [
            AssignmentStrategy::Exhaustive,
            AssignmentStrategy::GreedyPopularity,
            AssignmentStrategy::GreedyConstrained,
        ] {
            let assignment = strategy.assign(&catalog, &team()).unwrap();
            assert_eq!(assignment.roles()[0], Role::HardSupport, "{strategy}");
        }
    }

    #[test]
    fn excluded_cells_rank_before_totals() {
        let fewer = PermutationScore { excluded: 0, total: 1.0 };
        let more = PermutationScore { excluded: 1, total: 1e9 };
        assert!(fewer.beats(&more));
        assert!(!more.beats(&fewer));
        assert!(!fewer.beats(&fewer));
    }

    #[test]
    fn no_data_still_yields_a_bijection() {
        let catalog = HeroCatalog::from_json_value(json!({
            "heroes": ["A", "B", "C", "D", "E"],
            "win_rates": []
        }))
        .unwrap();
        for strategy in [
            AssignmentStrategy::Exhaustive,
            AssignmentStrategy::GreedyPopularity,
            AssignmentStrategy::GreedyConstrained,
        ] {
            let assignment = strategy.assign(&catalog, &team()).unwrap();
            assert!(RoleAssignment::new(*assignment.roles()).is_some());
        }
    }

    #[test]
    fn four_heroes_is_incomplete() {
        let catalog = uniform_catalog();
        let err = assign_roles(&catalog, &team()[..4]).unwrap_err();
        assert_eq!(err, ScoreError::IncompleteTeam { len: 4 });
    }

    #[test]
    fn one_hero_cannot_fill_every_role() {
        let catalog = uniform_catalog();
        let err = assign_roles(&catalog, &[HeroId(0); 5]).unwrap_err();
        assert_eq!(err, ScoreError::RepeatedHero { index: 0 });
    }

    #[test]
    fn strategy_names_parse() {
        assert_eq!(
            "greedy_constrained".parse::<AssignmentStrategy>(),
            Ok(AssignmentStrategy::GreedyConstrained)
        );
        assert_eq!(
            "Exhaustive".parse::<AssignmentStrategy>(),
            Ok(AssignmentStrategy::Exhaustive)
        );
        assert!("random".parse::<AssignmentStrategy>().is_err());
    }
}
