//! Per-test-case ranking of solver variants.
//!
//! Builds a test case × column energy matrix from stored info records,
//! ranks each row and assigns a colour tier to every cell.
//!
//! # Modules
//!
//! - [`render`]: HTML table
//! - [`export`]: flat per-test-case records (CSV / JSON)

pub mod export;
pub mod render;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Energy, INVALID_ENERGY};
use crate::error::{StoreError, TracebenchError};
use crate::store::read_info;

pub use export::{export_records, write_csv, write_json, RankingExport, RankingRecord};
pub use render::render_html;

/// Tier colours and the sentinel energy, injected into the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Colours for ranks `0..palette.len()`, best first.
    pub palette: Vec<String>,
    /// Colour for cells strictly worse than the default baseline.
    pub worse_than_baseline: String,
    /// Colour for valid cells outside the palette.
    pub neutral: String,
    /// Energy value that marks a cell as not comparable.
    pub invalid_energy: Energy,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            palette: vec![
                "#33ff33".to_string(),
                "#99ff99".to_string(),
                "#ccffcc".to_string(),
            ],
            worse_than_baseline: "#ff9999".to_string(),
            neutral: "#ffffff".to_string(),
            invalid_energy: INVALID_ENERGY,
        }
    }
}

/// Role of a column in the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// The reference baseline; cells worse than it are flagged.
    DefaultBaseline,
    /// Hand-authored traces.
    HandBaseline,
    Variant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn default_baseline() -> Self {
        Self {
            name: "default".to_string(),
            kind: ColumnKind::DefaultBaseline,
        }
    }

    pub fn hand_baseline() -> Self {
        Self {
            name: "hand".to_string(),
            kind: ColumnKind::HandBaseline,
        }
    }

    pub fn variant(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Variant,
        }
    }
}

/// Column source on disk: a directory of `<title>.json` info records.
#[derive(Debug, Clone)]
pub struct ColumnSource {
    pub column: Column,
    pub info_dir: PathBuf,
}

/// Reject column sets where two columns share a name. Rendered headers
/// and CSV columns are keyed by name, so duplicates would be ambiguous.
pub fn validate_columns(columns: &[Column]) -> Result<(), TracebenchError> {
    for (i, column) in columns.iter().enumerate() {
        if columns[..i].iter().any(|earlier| earlier.name == column.name) {
            return Err(TracebenchError::InvalidConfig(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
    }
    Ok(())
}

/// One row of energies, aligned with [`EnergyMatrix::columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub test_case: String,
    pub energies: Vec<Energy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyMatrix {
    pub columns: Vec<Column>,
    pub rows: Vec<MatrixRow>,
}

impl EnergyMatrix {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. `energies` must have one entry per column.
    pub fn push_row(&mut self, test_case: impl Into<String>, energies: Vec<Energy>) {
        debug_assert_eq!(energies.len(), self.columns.len());
        self.rows.push(MatrixRow {
            test_case: test_case.into(),
            energies,
        });
    }

    /// Load a matrix from info directories. A missing or unsuccessful record
    /// becomes `invalid_energy`.
    pub fn load(
        titles: &[String],
        sources: &[ColumnSource],
        invalid_energy: Energy,
    ) -> Result<Self, StoreError> {
        let mut matrix = Self::new(sources.iter().map(|s| s.column.clone()).collect());
        for title in titles {
            let mut energies = Vec::with_capacity(sources.len());
            for source in sources {
                energies.push(load_cell(&source.info_dir, title, invalid_energy)?);
            }
            matrix.push_row(title.clone(), energies);
        }
        Ok(matrix)
    }
}

fn load_cell(info_dir: &Path, title: &str, invalid_energy: Energy) -> Result<Energy, StoreError> {
    let record = read_info(&info_dir.join(format!("{title}.json")))?;
    Ok(match record {
        Some(info) if info.is_success() => info.energy,
        _ => invalid_energy,
    })
}

/// Colour tier of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "index", rename_all = "snake_case")]
pub enum Tier {
    /// Invalid energy: rendered empty, never ranked.
    Empty,
    /// Palette entry for the given rank.
    Palette(usize),
    WorseThanBaseline,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCell {
    pub energy: Option<Energy>,
    pub rank: Option<usize>,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRow {
    pub test_case: String,
    pub cells: Vec<RankedCell>,
    /// Minimum valid energy of the row.
    pub best: Option<Energy>,
}

/// Ranked matrix plus the config it was ranked with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    pub columns: Vec<Column>,
    pub rows: Vec<RankedRow>,
    pub config: RankingConfig,
}

impl Ranking {
    /// Colour for a tier, `None` for empty cells.
    pub fn color(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Empty => None,
            Tier::Palette(i) => self.config.palette.get(i).map(String::as_str),
            Tier::WorseThanBaseline => Some(&self.config.worse_than_baseline),
            Tier::Neutral => Some(&self.config.neutral),
        }
    }
}

pub struct RankingEngine {
    config: RankingConfig,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn rank(&self, matrix: &EnergyMatrix) -> Ranking {
        let baseline = matrix
            .columns
            .iter()
            .position(|c| c.kind == ColumnKind::DefaultBaseline);

        let rows = matrix
            .rows
            .iter()
            .map(|row| self.rank_row(&matrix.columns, baseline, row))
            .collect();

        Ranking {
            columns: matrix.columns.clone(),
            rows,
            config: self.config.clone(),
        }
    }

    fn rank_row(&self, columns: &[Column], baseline: Option<usize>, row: &MatrixRow) -> RankedRow {
        let invalid = self.config.invalid_energy;

        // Ascending energy; order among equal energies is whatever the sort leaves.
        let mut order: Vec<usize> = (0..row.energies.len())
            .filter(|&i| row.energies[i] != invalid)
            .collect();
        order.sort_by_key(|&i| row.energies[i]);

        let mut ranks = vec![None; row.energies.len()];
        for (rank, &i) in order.iter().enumerate() {
            ranks[i] = Some(rank);
        }

        let baseline_energy = baseline
            .map(|b| row.energies[b])
            .filter(|&e| e != invalid);

        let cells = row
            .energies
            .iter()
            .enumerate()
            .map(|(i, &energy)| {
                let Some(rank) = ranks[i] else {
                    return RankedCell {
                        energy: None,
                        rank: None,
                        tier: Tier::Empty,
                    };
                };
                let tier = if baseline_energy.map(|b| energy > b).unwrap_or(false) {
                    Tier::WorseThanBaseline
                } else if columns[i].kind == ColumnKind::DefaultBaseline {
                    Tier::Neutral
                } else if rank < self.config.palette.len() {
                    Tier::Palette(rank)
                } else {
                    Tier::Neutral
                };
                RankedCell {
                    energy: Some(energy),
                    rank: Some(rank),
                    tier,
                }
            })
            .collect();

        RankedRow {
            test_case: row.test_case.clone(),
            cells,
            best: order.first().map(|&i| row.energies[i]),
        }
    }
}
