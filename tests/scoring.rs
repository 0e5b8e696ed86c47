use std::fs;
use std::path::PathBuf;

use counterpick::catalog::{HeroCatalog, HeroId, Role, RoleStat, load_catalog};
use counterpick::error::{CatalogError, ScoreError};
use counterpick::score::{hero_advantage, role_aware_team_score, team_score};
use counterpick::roles::{AssignmentStrategy, RoleAssignment};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

const A: HeroId = HeroId(0);
const B: HeroId = HeroId(1);
const C: HeroId = HeroId(2);

#[test]
fn one_hero_against_one_opponent_scores_sixty() {
    let catalog = HeroCatalog::from_json_str(&read_fixture("matchup_db.json")).unwrap();
    let score = team_score(&catalog, &[A], &[B]).unwrap();
    assert_eq!(score.total, 60.0);
    assert_eq!(score.per_hero_advantage, vec![10.0]);
}

#[test]
fn advantage_is_not_assumed_symmetric() {
    let catalog = HeroCatalog::from_json_str(&read_fixture("matchup_db.json")).unwrap();
    let heroes = [A, B, C];
    let mut asymmetric = 0;
    for &i in &heroes {
        for &j in &heroes {
            let forward = hero_advantage(&catalog, i, &[j]).unwrap();
            let backward = hero_advantage(&catalog, j, &[i]).unwrap();
            let cell = catalog.advantage(j, i).unwrap();
            assert_eq!(forward, cell.advantage);
            if i != j && forward != -backward {
                asymmetric += 1;
            }
        }
    }
    // A vs B: +10 one way, -3.5 the other.
    assert_eq!(hero_advantage(&catalog, A, &[B]).unwrap(), 10.0);
    assert_eq!(hero_advantage(&catalog, B, &[A]).unwrap(), -3.5);
    assert!(asymmetric > 0);
}

#[test]
fn empty_opponents_give_zero_advantage() {
    let catalog = HeroCatalog::from_json_str(&read_fixture("matchup_db.json")).unwrap();
    assert_eq!(hero_advantage(&catalog, C, &[]).unwrap(), 0.0);
}

#[test]
fn self_matchup_reads_the_diagonal() {
    let catalog = HeroCatalog::from_json_str(&read_fixture("matchup_db.json")).unwrap();
    assert_eq!(hero_advantage(&catalog, A, &[A]).unwrap(), 0.0);
}

#[test]
fn partial_teams_score_but_role_scoring_needs_five() {
    let catalog = HeroCatalog::from_json_str(&read_fixture("matchup_db.json")).unwrap();
    let score = team_score(&catalog, &[A, C], &[B]).unwrap();
    assert_eq!(score.base, 100.0);
    assert_eq!(score.total, 100.0 + 10.0 + 2.0);

    let assignment = RoleAssignment::new(Role::ALL).unwrap();
    let err = role_aware_team_score(&catalog, &[A, C], &assignment, &[B]).unwrap_err();
    assert_eq!(err, ScoreError::IncompleteTeam { len: 2 });
    let err = AssignmentStrategy::Exhaustive.assign(&catalog, &[A, B, C]).unwrap_err();
    assert_eq!(err, ScoreError::IncompleteTeam { len: 3 });
}

#[test]
fn unknown_hero_index_is_reported() {
    let catalog = HeroCatalog::from_json_str(&read_fixture("matchup_db.json")).unwrap();
    assert_eq!(
        hero_advantage(&catalog, HeroId(3), &[A]),
        Err(ScoreError::InvalidHeroIndex { index: 3, len: 3 })
    );
}

#[test]
fn layered_catalog_keeps_first_names_and_adds_roles() {
    let catalog = load_catalog(&[fixture_path("matchup_db.json"), fixture_path("roles_layer.json")])
        .unwrap();
    assert_eq!(catalog.heroes(), ["Anti-Mage", "Bane", "Crystal Maiden"]);
    assert_eq!(catalog.update_time(), Some("2025-03-02T08:00:00Z"));
    assert_eq!(catalog.role_stat(A, Role::Carry, RoleStat::Popularity), Some(4200.0));
    assert_eq!(catalog.role_stat(B, Role::Carry, RoleStat::Popularity), Some(0.0));
    assert_eq!(catalog.role_stat(C, Role::Mid, RoleStat::NetWorth20), Some(4700.0));
    assert_eq!(catalog.role_stat(C, Role::HardSupport, RoleStat::WinRate), Some(50.7));
    assert_eq!(catalog.role_stat(A, Role::HardSupport, RoleStat::WinRate), None);
}

#[test]
fn missing_file_and_bad_json_fail_fast() {
    let missing = load_catalog(&[fixture_path("no_such_catalog.json")]);
    assert!(matches!(missing, Err(CatalogError::Read { .. })));

    let bad = HeroCatalog::from_json_str("{\"heroes\": [\"A\"], \"win_rates\": 7}");
    assert!(matches!(bad, Err(CatalogError::Parse { .. })));
}

#[test]
fn role_aware_totals_follow_the_assignment() {
    let base = read_fixture("matchup_db.json");
    let mut value: serde_json::Value = serde_json::from_str(&base).unwrap();
    let names = ["Anti-Mage", "Bane", "Crystal Maiden", "Axe", "Puck"];
    value["heroes"] = serde_json::json!(names);
    value["heroes_roles_db_wrkda"] = serde_json::json!({
        "carry": { "wr": [55, 40, 40, 40, 40], "kda": [4, 1, 1, 1, 1] },
        "mid": { "wr": [45, 40, 40, 40, 52], "kda": [2, 1, 1, 1, 3.5] }
    });
    value["heroes_roles"] = serde_json::json!({
        "carry": { "laneadv": [6.5, null, null, null, null] },
        "mid": { "nw10": [null, null, null, null, 4100] }
    });
    let catalog = HeroCatalog::from_json_value(value).unwrap();
    let team: Vec<HeroId> = (0..5).map(HeroId).collect();
    let opponents = [A, B, C, HeroId(3), HeroId(4)];

    let carry_first = RoleAssignment::new(Role::ALL).unwrap();
    let totals = role_aware_team_score(&catalog, &team, &carry_first, &opponents).unwrap();
    // Carry = Anti-Mage (55), Mid = Bane (40), others have no wr entry.
    assert_eq!(totals.win_rate, 95.0);
    assert_eq!(totals.kda, 5.0);
    assert_eq!(totals.lane_advantage, 6.5);
    assert_eq!(totals.nw10, 0.0);

    let puck_mid = RoleAssignment::new([
        Role::Carry,
        Role::Offlane,
        Role::SoftSupport,
        Role::HardSupport,
        Role::Mid,
    ])
    .unwrap();
    let totals = role_aware_team_score(&catalog, &team, &puck_mid, &opponents).unwrap();
    assert_eq!(totals.win_rate, 107.0);
    assert_eq!(totals.nw10, 4100.0);
    assert_eq!(totals.score(), totals.win_rate + totals.advantage);
}
