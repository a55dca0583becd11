//! Flat export of a [`Ranking`]: one record per test case.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Energy;
use crate::error::StoreError;
use crate::store::{write_atomic, write_json_atomic};

use super::{Column, Ranking};

/// Energies of one test case, plus the row minimum. `energies[i]` belongs
/// to `RankingExport::columns[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingRecord {
    pub test_case: String,
    pub energies: Vec<Option<Energy>>,
    pub best: Option<Energy>,
}

/// JSON export document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingExport {
    pub generated_at: DateTime<Utc>,
    pub columns: Vec<Column>,
    pub records: Vec<RankingRecord>,
}

pub fn export_records(ranking: &Ranking) -> Vec<RankingRecord> {
    ranking
        .rows
        .iter()
        .map(|row| RankingRecord {
            test_case: row.test_case.clone(),
            energies: row.cells.iter().map(|cell| cell.energy).collect(),
            best: row.best,
        })
        .collect()
}

/// Write `model_name,<column..>,best` CSV. Invalid cells are empty.
pub fn write_csv(path: &Path, ranking: &Ranking) -> Result<(), StoreError> {
    let mut out = String::from("model_name");
    for column in &ranking.columns {
        out.push(',');
        out.push_str(&column.name);
    }
    out.push_str(",best\n");

    for row in &ranking.rows {
        out.push_str(&row.test_case);
        for cell in &row.cells {
            out.push(',');
            if let Some(energy) = cell.energy {
                out.push_str(&energy.to_string());
            }
        }
        out.push(',');
        if let Some(best) = row.best {
            out.push_str(&best.to_string());
        }
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())
}

/// Write the records as pretty JSON.
pub fn write_json(path: &Path, ranking: &Ranking) -> Result<(), StoreError> {
    let export = RankingExport {
        generated_at: Utc::now(),
        columns: ranking.columns.clone(),
        records: export_records(ranking),
    };
    write_json_atomic(path, &export)
}
