use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::{HeroCatalog, HeroId};
use crate::error::CorpusError;
use crate::score::Side;

/// Raw corpus row. Extra CSV columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatchRow {
    pub match_id: String,
    pub dire_heroes: String,
    pub radiant_heroes: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub radiant_win: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub radiant: Vec<HeroId>,
    pub dire: Vec<HeroId>,
    pub radiant_won: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowRejection {
    #[error("unknown hero `{name}` on {side}")]
    UnresolvedHero { side: Side, name: String },

    #[error("{side} roster has {len} heroes")]
    RosterSize { side: Side, len: usize },

    #[error("{side} roster lists `{name}` more than once")]
    RepeatedHero { side: Side, name: String },

    #[error("duplicate match id")]
    DuplicateMatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub rows: usize,
    pub malformed: usize,
    pub unresolved_hero: usize,
    pub roster_size: usize,
    pub repeated_hero: usize,
    pub duplicates: usize,
    pub accepted: usize,
}

impl IngestStats {
    fn reject(&mut self, rejection: &RowRejection) {
        match rejection {
            RowRejection::UnresolvedHero { .. } => self.unresolved_hero += 1,
            RowRejection::RosterSize { .. } => self.roster_size += 1,
            RowRejection::RepeatedHero { .. } => self.repeated_hero += 1,
            RowRejection::DuplicateMatch => self.duplicates += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.malformed
            + self.unresolved_hero
            + self.roster_size
            + self.repeated_hero
            + self.duplicates
    }
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub records: Vec<MatchRecord>,
    pub stats: IngestStats,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "radiant_win must be 1/0 or true/false, got `{other}`"
        ))),
    }
}

/// Splits a pipe-delimited roster, dropping blank entries.
pub fn split_roster(field: &str) -> Vec<&str> {
    field
        .split('|')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

pub fn resolve_roster(
    catalog: &HeroCatalog,
    field: &str,
    side: Side,
) -> Result<Vec<HeroId>, RowRejection> {
    split_roster(field)
        .into_iter()
        .map(|name| {
            catalog.resolve(name).ok_or_else(|| RowRejection::UnresolvedHero {
                side,
                name: name.to_string(),
            })
        })
        .collect()
}

pub fn resolve_row(catalog: &HeroCatalog, row: &MatchRow) -> Result<MatchRecord, RowRejection> {
    let radiant = resolve_roster(catalog, &row.radiant_heroes, Side::Radiant)?;
    let dire = resolve_roster(catalog, &row.dire_heroes, Side::Dire)?;
    for (side, roster) in [(Side::Radiant, &radiant), (Side::Dire, &dire)] {
        if roster.len() != 5 {
            return Err(RowRejection::RosterSize {
                side,
                len: roster.len(),
            });
        }
        for (slot, hero) in roster.iter().enumerate() {
            if roster[..slot].contains(hero) {
                return Err(RowRejection::RepeatedHero {
                    side,
                    name: catalog.hero_name(*hero).unwrap_or_default().to_string(),
                });
            }
        }
    }
    Ok(MatchRecord {
        match_id: row.match_id.trim().to_string(),
        radiant,
        dire,
        radiant_won: row.radiant_win,
    })
}

/// Parses corpus rows. Rows that fail to deserialize are counted in the
/// returned malformed total and dropped; I/O failures abort.
pub fn parse_match_rows<R: io::Read>(reader: R) -> Result<(Vec<MatchRow>, usize), CorpusError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    let mut malformed = 0;
    for result in rdr.deserialize::<MatchRow>() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                warn!(error = %err, "skipping malformed corpus row");
                malformed += 1;
            }
        }
    }
    Ok((rows, malformed))
}

/// Resolves rows against the catalog. The first occurrence of a match id
/// wins; later duplicates are dropped.
pub fn ingest_rows(catalog: &HeroCatalog, rows: &[MatchRow], malformed: usize) -> Corpus {
    let mut stats = IngestStats {
        rows: rows.len() + malformed,
        malformed,
        ..IngestStats::default()
    };
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let outcome = if seen.contains(row.match_id.trim()) {
            Err(RowRejection::DuplicateMatch)
        } else {
            resolve_row(catalog, row)
        };
        match outcome {
            Ok(record) => {
                seen.insert(record.match_id.clone());
                records.push(record);
            }
            Err(rejection) => {
                debug!(match_id = %row.match_id, reason = %rejection, "corpus row rejected");
                stats.reject(&rejection);
            }
        }
    }
    stats.accepted = records.len();
    Corpus { records, stats }
}

pub fn load_corpus(catalog: &HeroCatalog, path: &Path) -> Result<Corpus, CorpusError> {
    let file = File::open(path).map_err(|source| CorpusError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let (rows, malformed) = parse_match_rows(file)?;
    let corpus = ingest_rows(catalog, &rows, malformed);
    if corpus.stats.skipped() > 0 {
        warn!(
            path = %path.display(),
            skipped = corpus.stats.skipped(),
            unresolved_hero = corpus.stats.unresolved_hero,
            roster_size = corpus.stats.roster_size,
            repeated_hero = corpus.stats.repeated_hero,
            duplicates = corpus.stats.duplicates,
            malformed = corpus.stats.malformed,
            "some corpus rows were skipped"
        );
    }
    Ok(corpus)
}
