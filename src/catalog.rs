use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CatalogError, ScoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeroId(pub usize);

impl HeroId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for HeroId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lane role, in the fixed order used for tie-breaking and permutation
/// enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Carry,
    Mid,
    Offlane,
    SoftSupport,
    HardSupport,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Carry,
        Role::Mid,
        Role::Offlane,
        Role::SoftSupport,
        Role::HardSupport,
    ];

    pub fn index(self) -> usize {
        match self {
            Role::Carry => 0,
            Role::Mid => 1,
            Role::Offlane => 2,
            Role::SoftSupport => 3,
            Role::HardSupport => 4,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Role::Carry => "carry",
            Role::Mid => "mid",
            Role::Offlane => "offlane",
            Role::SoftSupport => "softsupport",
            Role::HardSupport => "hardsupport",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "carry" => Ok(Role::Carry),
            "mid" => Ok(Role::Mid),
            "offlane" => Ok(Role::Offlane),
            "softsupport" => Ok(Role::SoftSupport),
            "hardsupport" => Ok(Role::HardSupport),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// Per-role statistic a catalog can answer for a hero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleStat {
    WinRate,
    Kda,
    Popularity,
    NetWorth10,
    NetWorth20,
    LaneAdvantage,
}

/// Pairwise matchup entry, read from `win_rates[opponent][hero]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdvantageCell {
    pub advantage: f64,
    pub win_rate: f64,
    pub samples: u32,
}

/// Missing numeric value counts as zero.
pub fn fallback_zero(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0)
}

/// Missing numeric value makes the option unusable; the caller sees
/// negative infinity and any sum it enters.
pub fn fallback_excluding(value: Option<f64>) -> f64 {
    value.unwrap_or(f64::NEG_INFINITY)
}

/// Lowercase, drop apostrophes, turn separators into spaces and collapse
/// whitespace. "Nature's Prophet", "natures-prophet" and "NATURES  PROPHET"
/// all normalize to "natures prophet".
pub fn normalize_hero_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}' | '`'))
        .map(|c| if matches!(c, '-' | '_' | '.') { ' ' } else { c })
        .collect::<String>()
        .to_lowercase();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Catalog numbers arrive either as JSON numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    pub fn value(&self) -> Option<f64> {
        let v = match self {
            LooseNumber::Number(v) => *v,
            LooseNumber::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }
}

type RawSeries = Vec<Option<LooseNumber>>;
type RawCell = Option<Vec<Option<LooseNumber>>>;
type RawRow = Option<Vec<RawCell>>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWrKda {
    #[serde(default)]
    pub wr: Option<RawSeries>,
    #[serde(default)]
    pub kda: Option<RawSeries>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLaneStats {
    #[serde(default)]
    pub nw10: Option<RawSeries>,
    #[serde(default)]
    pub nw20: Option<RawSeries>,
    #[serde(default)]
    pub laneadv: Option<RawSeries>,
}

/// One catalog file as found on disk. Every table is optional here; the
/// required ones are enforced when the layers are validated.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCatalog {
    #[serde(default)]
    pub heroes: Option<Vec<String>>,
    #[serde(default)]
    pub heroes_wr: Option<RawSeries>,
    #[serde(default)]
    pub win_rates: Option<Vec<RawRow>>,
    #[serde(default)]
    pub update_time: Option<String>,
    #[serde(default)]
    pub heroes_roles_db_wrkda: Option<HashMap<String, RawWrKda>>,
    #[serde(default)]
    pub heroes_roles: Option<HashMap<String, RawLaneStats>>,
    #[serde(default)]
    pub heroes_roles_d2pt: Option<HashMap<String, Option<RawSeries>>>,
    #[serde(default)]
    pub heroes_d2pt: Option<RawSeries>,
    #[serde(default)]
    pub heroes_nw10: Option<RawSeries>,
    #[serde(default)]
    pub heroes_nw20: Option<RawSeries>,
    #[serde(default)]
    pub heroes_laneadv: Option<RawSeries>,
}

impl RawCatalog {
    /// Fills whatever this layer lacks from `later`. Tables already present
    /// win; role maps are merged per role key.
    pub fn layer(mut self, later: RawCatalog) -> RawCatalog {
        fill(&mut self.heroes, later.heroes);
        fill(&mut self.heroes_wr, later.heroes_wr);
        fill(&mut self.win_rates, later.win_rates);
        fill(&mut self.update_time, later.update_time);
        fill_roles(&mut self.heroes_roles_db_wrkda, later.heroes_roles_db_wrkda);
        fill_roles(&mut self.heroes_roles, later.heroes_roles);
        fill_roles(&mut self.heroes_roles_d2pt, later.heroes_roles_d2pt);
        fill(&mut self.heroes_d2pt, later.heroes_d2pt);
        fill(&mut self.heroes_nw10, later.heroes_nw10);
        fill(&mut self.heroes_nw20, later.heroes_nw20);
        fill(&mut self.heroes_laneadv, later.heroes_laneadv);
        self
    }
}

fn fill<T>(slot: &mut Option<T>, later: Option<T>) {
    if slot.is_none() {
        *slot = later;
    }
}

fn fill_roles<T>(slot: &mut Option<HashMap<String, T>>, later: Option<HashMap<String, T>>) {
    let Some(later) = later else { return };
    match slot {
        Some(current) => {
            for (key, value) in later {
                current.entry(key).or_insert(value);
            }
        }
        None => *slot = Some(later),
    }
}

#[derive(Debug, Clone)]
struct RoleColumns {
    win_rate: Vec<Option<f64>>,
    kda: Vec<Option<f64>>,
    popularity: Vec<Option<f64>>,
    nw10: Vec<Option<f64>>,
    nw20: Vec<Option<f64>>,
    lane_advantage: Vec<Option<f64>>,
}

/// Validated, read-only hero statistics. Built once and shared by reference
/// across sweep workers.
#[derive(Debug, Clone)]
pub struct HeroCatalog {
    heroes: Vec<String>,
    name_index: HashMap<String, HeroId>,
    base_win_rate: Vec<f64>,
    // Row-major by opponent: cell (opponent, hero) at opponent * n + hero.
    advantage: Vec<AdvantageCell>,
    roles: [RoleColumns; 5],
    flat: RoleColumns,
    update_time: Option<String>,
}

impl HeroCatalog {
    pub fn from_raw(raw: RawCatalog) -> Result<Self, CatalogError> {
        let heroes = match raw.heroes {
            Some(heroes) if !heroes.is_empty() => heroes,
            _ => return Err(CatalogError::MissingTable("heroes")),
        };
        let n = heroes.len();
        let name_index = build_name_index(&heroes)?;

        let base_win_rate = match raw.heroes_wr {
            None => vec![50.0; n],
            Some(series) => per_hero("heroes_wr", series, n)?
                .into_iter()
                .map(fallback_zero)
                .collect(),
        };

        let rows = raw
            .win_rates
            .ok_or(CatalogError::MissingTable("win_rates"))?;
        let advantage = advantage_matrix(rows, n)?;

        let mut roles: [RoleColumns; 5] = std::array::from_fn(|_| RoleColumns::empty(n));
        if let Some(table) = raw.heroes_roles_db_wrkda {
            for (key, entry) in table {
                let role = role_key("heroes_roles_db_wrkda", &key)?;
                let columns = &mut roles[role.index()];
                columns.win_rate = optional_series("heroes_roles_db_wrkda.wr", entry.wr, n)?;
                columns.kda = optional_series("heroes_roles_db_wrkda.kda", entry.kda, n)?;
            }
        }
        if let Some(table) = raw.heroes_roles {
            for (key, entry) in table {
                let role = role_key("heroes_roles", &key)?;
                let columns = &mut roles[role.index()];
                columns.nw10 = optional_series("heroes_roles.nw10", entry.nw10, n)?;
                columns.nw20 = optional_series("heroes_roles.nw20", entry.nw20, n)?;
                columns.lane_advantage =
                    optional_series("heroes_roles.laneadv", entry.laneadv, n)?;
            }
        }
        if let Some(table) = raw.heroes_roles_d2pt {
            for (key, series) in table {
                let role = role_key("heroes_roles_d2pt", &key)?;
                roles[role.index()].popularity = optional_series("heroes_roles_d2pt", series, n)?;
            }
        }

        let flat = RoleColumns {
            win_rate: vec![None; n],
            kda: vec![None; n],
            popularity: optional_series("heroes_d2pt", raw.heroes_d2pt, n)?,
            nw10: optional_series("heroes_nw10", raw.heroes_nw10, n)?,
            nw20: optional_series("heroes_nw20", raw.heroes_nw20, n)?,
            lane_advantage: optional_series("heroes_laneadv", raw.heroes_laneadv, n)?,
        };

        Ok(Self {
            heroes,
            name_index,
            base_win_rate,
            advantage,
            roles,
            flat,
            update_time: raw.update_time,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let parsed: RawCatalog = serde_json::from_str(raw).map_err(|source| CatalogError::Parse {
            path: "<inline>".into(),
            source,
        })?;
        Self::from_raw(parsed)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, CatalogError> {
        let parsed: RawCatalog =
            serde_json::from_value(value).map_err(|source| CatalogError::Parse {
                path: "<inline>".into(),
                source,
            })?;
        Self::from_raw(parsed)
    }

    pub fn len(&self) -> usize {
        self.heroes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heroes.is_empty()
    }

    pub fn heroes(&self) -> &[String] {
        &self.heroes
    }

    pub fn update_time(&self) -> Option<&str> {
        self.update_time.as_deref()
    }

    pub fn hero_name(&self, hero: HeroId) -> Option<&str> {
        self.heroes.get(hero.0).map(String::as_str)
    }

    pub fn check(&self, hero: HeroId) -> Result<HeroId, ScoreError> {
        if hero.0 < self.heroes.len() {
            Ok(hero)
        } else {
            Err(ScoreError::InvalidHeroIndex {
                index: hero.0,
                len: self.heroes.len(),
            })
        }
    }

    /// Exact display name first, then the normalized form.
    pub fn resolve(&self, name: &str) -> Option<HeroId> {
        let trimmed = name.trim();
        if let Some(id) = self.name_index.get(trimmed) {
            return Some(*id);
        }
        self.name_index.get(&normalize_hero_name(trimmed)).copied()
    }

    pub fn base_win_rate(&self, hero: HeroId) -> Result<f64, ScoreError> {
        self.check(hero)?;
        Ok(self.base_win_rate[hero.0])
    }

    pub fn advantage(&self, opponent: HeroId, hero: HeroId) -> Result<AdvantageCell, ScoreError> {
        self.check(opponent)?;
        self.check(hero)?;
        Ok(self.advantage[opponent.0 * self.heroes.len() + hero.0])
    }

    /// Role-keyed stat, falling back to the flat per-hero table for the
    /// stats that have one. `None` means no data; callers pick the fallback.
    pub fn role_stat(&self, hero: HeroId, role: Role, stat: RoleStat) -> Option<f64> {
        let idx = hero.0;
        let by_role = self.roles[role.index()].column(stat).get(idx).copied().flatten();
        by_role.or_else(|| self.flat.column(stat).get(idx).copied().flatten())
    }
}

impl RoleColumns {
    fn empty(n: usize) -> Self {
        Self {
            win_rate: vec![None; n],
            kda: vec![None; n],
            popularity: vec![None; n],
            nw10: vec![None; n],
            nw20: vec![None; n],
            lane_advantage: vec![None; n],
        }
    }

    fn column(&self, stat: RoleStat) -> &[Option<f64>] {
        match stat {
            RoleStat::WinRate => &self.win_rate,
            RoleStat::Kda => &self.kda,
            RoleStat::Popularity => &self.popularity,
            RoleStat::NetWorth10 => &self.nw10,
            RoleStat::NetWorth20 => &self.nw20,
            RoleStat::LaneAdvantage => &self.lane_advantage,
        }
    }
}

fn build_name_index(heroes: &[String]) -> Result<HashMap<String, HeroId>, CatalogError> {
    let mut exact = HashSet::new();
    let mut index = HashMap::new();
    for (i, name) in heroes.iter().enumerate() {
        if !exact.insert(name.as_str()) {
            return Err(CatalogError::Shape(format!("duplicate hero name `{name}`")));
        }
        index.insert(name.clone(), HeroId(i));
    }
    for (i, name) in heroes.iter().enumerate() {
        let normalized = normalize_hero_name(name);
        match index.get(&normalized) {
            Some(existing) if existing.0 != i => {
                return Err(CatalogError::Shape(format!(
                    "hero names `{}` and `{name}` normalize to the same key",
                    heroes[existing.0]
                )));
            }
            Some(_) => {}
            None => {
                index.insert(normalized, HeroId(i));
            }
        }
    }
    Ok(index)
}

fn advantage_matrix(rows: Vec<RawRow>, n: usize) -> Result<Vec<AdvantageCell>, CatalogError> {
    if rows.len() > n {
        return Err(CatalogError::Shape(format!(
            "win_rates has {} rows for {n} heroes",
            rows.len()
        )));
    }
    let mut cells = vec![AdvantageCell::default(); n * n];
    for (opponent, row) in rows.into_iter().enumerate() {
        let Some(row) = row else { continue };
        if row.len() > n {
            return Err(CatalogError::Shape(format!(
                "win_rates row {opponent} has {} columns for {n} heroes",
                row.len()
            )));
        }
        for (hero, cell) in row.into_iter().enumerate() {
            let Some(values) = cell else { continue };
            let at = |i: usize| values.get(i).and_then(|v| v.as_ref()).and_then(LooseNumber::value);
            cells[opponent * n + hero] = AdvantageCell {
                advantage: fallback_zero(at(0)),
                win_rate: fallback_zero(at(1)),
                samples: fallback_zero(at(2)).max(0.0).round() as u32,
            };
        }
    }
    Ok(cells)
}

fn per_hero(table: &str, series: RawSeries, n: usize) -> Result<Vec<Option<f64>>, CatalogError> {
    if series.len() > n {
        return Err(CatalogError::Shape(format!(
            "{table} has {} entries for {n} heroes",
            series.len()
        )));
    }
    let mut out: Vec<Option<f64>> = series
        .iter()
        .map(|v| v.as_ref().and_then(LooseNumber::value))
        .collect();
    out.resize(n, None);
    Ok(out)
}

fn optional_series(
    table: &str,
    series: Option<RawSeries>,
    n: usize,
) -> Result<Vec<Option<f64>>, CatalogError> {
    match series {
        Some(series) => per_hero(table, series, n),
        None => Ok(vec![None; n]),
    }
}

fn role_key(table: &str, key: &str) -> Result<Role, CatalogError> {
    key.parse::<Role>()
        .map_err(|err| CatalogError::Shape(format!("{table}: {err}")))
}

/// Reads and layers catalog files in order. Earlier files take precedence;
/// later files only supply tables the earlier ones lack.
pub fn load_catalog<P: AsRef<Path>>(paths: &[P]) -> Result<HeroCatalog, CatalogError> {
    let mut merged = RawCatalog::default();
    for path in paths {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let layer: RawCatalog =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "catalog layer parsed");
        merged = merged.layer(layer);
    }
    let catalog = HeroCatalog::from_raw(merged)?;
    info!(
        heroes = catalog.len(),
        update_time = catalog.update_time().unwrap_or("unknown"),
        "hero catalog loaded"
    );
    Ok(catalog)
}
