use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

use counterpick::catalog::{HeroCatalog, HeroId, load_catalog};
use counterpick::config::BacktestConfig;
use counterpick::corpus::{MatchRecord, load_corpus};
use counterpick::report::{RunSummary, write_report_dir};
use counterpick::score::Signal;
use counterpick::sweep::{Backtest, ThresholdStat};
use counterpick::views::combination_key;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn fixture_corpus() -> (HeroCatalog, Vec<MatchRecord>) {
    let catalog = load_catalog(&[fixture_path("sweep_catalog.json")]).unwrap();
    let corpus = load_corpus(&catalog, &fixture_path("sweep_matches.csv")).unwrap();
    (catalog, corpus.records)
}

#[test]
fn corpus_ingest_skips_bad_rows() {
    let catalog = load_catalog(&[fixture_path("sweep_catalog.json")]).unwrap();
    let corpus = load_corpus(&catalog, &fixture_path("sweep_matches.csv")).unwrap();
    assert_eq!(corpus.stats.rows, 5);
    assert_eq!(corpus.stats.accepted, 2);
    assert_eq!(corpus.stats.duplicates, 1);
    assert_eq!(corpus.stats.unresolved_hero, 1);
    assert_eq!(corpus.stats.roster_size, 1);
    assert_eq!(corpus.records[0].match_id, "1001");
    assert!(corpus.records[0].radiant_won);
    assert_eq!(corpus.records[1].dire[0], HeroId(0));
}

#[test]
fn two_match_delta_sweep() {
    let (catalog, records) = fixture_corpus();
    let config = BacktestConfig::from_json_str(
        r#"{"thresholds": {"delta": [20, 40]}, "workers": 2}"#,
    )
    .unwrap();
    let acc = Backtest::new(&catalog, &config).run(&records);
    assert_eq!(acc.processed, 2);
    assert_eq!(acc.skipped, 0);

    let delta = acc.signal(Signal::Delta).unwrap();
    let at_20 = delta.stat_at(20.0).unwrap();
    assert_eq!(at_20, ThresholdStat { games: 2, correct: 2 });
    assert_eq!(at_20.accuracy(), 1.0);
    let at_40 = delta.stat_at(40.0).unwrap();
    assert_eq!(at_40.games, 0);
    assert_eq!(at_40.accuracy(), 0.0);

    // No role tables and equal base rates: the flat delta agrees.
    let flat = acc.signal(Signal::FlatDelta).unwrap();
    assert_eq!(flat.stat_at(20.0).unwrap(), at_20);
}

#[test]
fn derived_views_from_fixture() {
    let (catalog, records) = fixture_corpus();
    let config = BacktestConfig::default();
    let acc = Backtest::new(&catalog, &config).run_sequential(&records);

    let bins = acc.histogram.rows();
    let above = bins.iter().find(|b| b.label == ">=20").unwrap();
    let below = bins.iter().find(|b| b.label == "<=-20").unwrap();
    assert_eq!((above.games, above.radiant_win_rate), (1, 1.0));
    assert_eq!((below.games, below.dire_win_rate), (1, 1.0));

    let rows = acc.combinations.rows();
    assert_eq!(rows.len(), 36);
    let won = rows.iter().find(|r| r.combination == combination_key(1, 0)).unwrap();
    assert_eq!(won.games, 1);
    assert_eq!(won.radiant_win_rate, 1.0);
    let lost = rows.iter().find(|r| r.combination == "0+ 5- vs 1+ 4-").unwrap();
    assert_eq!(lost.dire_win_rate, 1.0);
    assert_eq!(rows.iter().map(|r| r.games).sum::<u64>(), 2);

    for stat in &acc.max_hero.stats {
        assert_eq!(*stat, ThresholdStat { games: 2, correct: 2 });
    }

    // Delta>=20, then the AND rule that lane advantage never satisfies.
    assert_eq!(acc.rules.stats[0], ThresholdStat { games: 2, correct: 2 });
    assert_eq!(acc.rules.stats[1].games, 0);
    assert_eq!(acc.rules.stats[2].games, 2);

    let heroes = acc.hero_advantage.rows();
    let anti_mage: Vec<_> = heroes.iter().filter(|r| r.hero == HeroId(0)).collect();
    assert_eq!(anti_mage.len(), config.hero_thresholds.len());
    assert!(anti_mage.iter().all(|r| r.positive == ThresholdStat { games: 1, correct: 1 }));
    assert!(heroes.iter().any(|r| r.hero == HeroId(2) && r.positive.correct == 1));
}

#[test]
fn cancelled_run_returns_empty_counters() {
    let (catalog, records) = fixture_corpus();
    let config = BacktestConfig::default();
    let backtest = Backtest::new(&catalog, &config);
    let cancel = AtomicBool::new(true);
    let acc = backtest.run_cancellable(&records, &cancel);
    assert_eq!(acc.processed, 0);
    assert_eq!(acc, backtest.accumulator());

    let corpus = load_corpus(&catalog, &fixture_path("sweep_matches.csv")).unwrap();
    let summary = RunSummary::new(&catalog, corpus.stats, &acc, &config, true);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["cancelled"], true);
    assert_eq!(json["processed"], 0);
    assert_eq!(json["ingest"]["accepted"], 2);
}

#[test]
fn malformed_records_are_skipped_not_fatal() {
    let (catalog, mut records) = fixture_corpus();
    let mut short = records[0].clone();
    short.match_id = "short".into();
    short.radiant.pop();
    let mut out_of_range = records[0].clone();
    out_of_range.match_id = "oob".into();
    out_of_range.dire[0] = HeroId(99);
    let mut repeated = records[0].clone();
    repeated.match_id = "repeated".into();
    repeated.radiant = vec![repeated.radiant[0]; 5];
    records.push(short);
    records.push(out_of_range);
    records.push(repeated);

    let config = BacktestConfig::default();
    let backtest = Backtest::new(&catalog, &config);
    let acc = backtest.run(&records);
    assert_eq!(acc.processed, 2);
    assert_eq!(acc.skipped, 3);
    assert_eq!(backtest.run_sequential(&records), acc);
    assert_eq!(acc.histogram.total_games(), 2);
}

fn random_world(seed: u64, heroes: usize, matches: usize) -> (HeroCatalog, Vec<MatchRecord>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let names: Vec<String> = (0..heroes).map(|i| format!("Hero {i}")).collect();
    let matrix: Vec<Vec<Vec<f64>>> = (0..heroes)
        .map(|_| {
            (0..heroes)
                .map(|_| vec![rng.gen_range(-6.0..6.0), 50.0, 100.0])
                .collect()
        })
        .collect();
    let series = |rng: &mut StdRng, lo: f64, hi: f64| -> Vec<f64> {
        (0..heroes).map(|_| rng.gen_range(lo..hi)).collect()
    };
    let mut roles = serde_json::Map::new();
    let mut d2pt = serde_json::Map::new();
    let mut wrkda = serde_json::Map::new();
    for role in ["carry", "mid", "offlane", "softsupport", "hardsupport"] {
        roles.insert(
            role.into(),
            json!({
                "nw10": series(&mut rng, 1500.0, 5000.0),
                "nw20": series(&mut rng, 4000.0, 13000.0),
                "laneadv": series(&mut rng, -20.0, 20.0)
            }),
        );
        d2pt.insert(role.into(), json!(series(&mut rng, 0.0, 3000.0)));
        wrkda.insert(
            role.into(),
            json!({ "wr": series(&mut rng, 44.0, 56.0), "kda": series(&mut rng, 1.0, 5.0) }),
        );
    }
    let catalog = HeroCatalog::from_json_value(json!({
        "heroes": names,
        "heroes_wr": series(&mut rng, 45.0, 55.0),
        "win_rates": matrix,
        "heroes_roles": roles,
        "heroes_roles_d2pt": d2pt,
        "heroes_roles_db_wrkda": wrkda
    }))
    .unwrap();

    let mut pool: Vec<usize> = (0..heroes).collect();
    let records = (0..matches)
        .map(|i| {
            pool.shuffle(&mut rng);
            MatchRecord {
                match_id: format!("m{i}"),
                radiant: pool[..5].iter().copied().map(HeroId).collect(),
                dire: pool[5..10].iter().copied().map(HeroId).collect(),
                radiant_won: rng.gen_bool(0.5),
            }
        })
        .collect();
    (catalog, records)
}

#[test]
fn games_never_increase_with_threshold() {
    let (catalog, records) = random_world(11, 24, 300);
    let config = BacktestConfig::default();
    let acc = Backtest::new(&catalog, &config).run(&records);
    assert_eq!(acc.processed, 300);
    for sweep in &acc.signals {
        for pair in sweep.stats.windows(2) {
            assert!(pair[1].games <= pair[0].games, "{}", sweep.signal);
        }
        for stat in &sweep.stats {
            assert!(stat.correct <= stat.games);
        }
    }
    assert_eq!(acc.histogram.total_games(), 300);
    assert_eq!(acc.combinations.rows().len(), 36);
}

#[test]
fn parallel_sweep_matches_sequential_and_is_repeatable() {
    let (catalog, records) = random_world(23, 30, 400);
    let mut config = BacktestConfig::default();
    config.workers = Some(4);
    let backtest = Backtest::new(&catalog, &config);
    let sequential = backtest.run_sequential(&records);
    let parallel = backtest.run(&records);
    assert_eq!(parallel, sequential);
    assert_eq!(backtest.run(&records), parallel);
}

#[test]
fn report_directory_contains_every_table() {
    let (catalog, records) = fixture_corpus();
    let config = BacktestConfig::default();
    let acc = Backtest::new(&catalog, &config).run(&records);
    let corpus = load_corpus(&catalog, &fixture_path("sweep_matches.csv")).unwrap();
    let summary = RunSummary::new(&catalog, corpus.stats, &acc, &config, false);

    let dir = std::env::temp_dir().join(format!("counterpick_report_{}", std::process::id()));
    let written = write_report_dir(&dir, &catalog, &acc, &config, &summary).unwrap();
    assert_eq!(written.len(), 6);

    let thresholds = fs::read_to_string(dir.join("thresholds.csv")).unwrap();
    assert!(thresholds.lines().any(|l| l == "Delta,20,2,1.0000,2"));
    assert!(thresholds.lines().any(|l| l == "Delta,40,0,0.0000,0"));

    let combos = fs::read_to_string(dir.join("combinations.csv")).unwrap();
    assert_eq!(combos.lines().count(), 37);

    let heroes = fs::read_to_string(dir.join("hero_advantage.csv")).unwrap();
    assert!(heroes.lines().any(|l| l == "0,Anti-Mage,+5,1,1.0000"));
    assert!(heroes.lines().any(|l| l == "0,Anti-Mage,-5,0,0.0000"));

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["processed"], 2);
    assert_eq!(summary["ingest"]["duplicates"], 1);
    assert_eq!(summary["catalog_update_time"], "2025-03-02T08:00:00Z");

    let _ = fs::remove_dir_all(&dir);
}
