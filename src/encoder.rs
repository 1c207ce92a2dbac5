//! Result table encoding
//!
//! Tables leave the engine either as one JSON document wrapped in a run
//! envelope or as one NDJSON body per table. Null rates stay JSON `null`.

use crate::error::ComputeError;
use crate::org::FlaggedUnit;
use crate::pipeline::{RunOutput, RunParams, RunWindow};
use crate::types::ResultTables;
use crate::{ENGINE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Producer metadata stamped on every document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub run_id: String,
}

/// A complete encoded run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    pub producer: Producer,
    pub computed_at_utc: String,
    pub params: RunParams,
    pub window: RunWindow,
    pub flagged_units: Vec<FlaggedUnit>,
    pub tables: ResultTables,
}

/// Encoder for result tables
pub struct TableEncoder {
    run_id: String,
}

impl Default for TableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableEncoder {
    /// Create a new encoder with a fresh run id
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific run id
    pub fn with_run_id(run_id: String) -> Self {
        Self { run_id }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn document(&self, output: &RunOutput) -> TableDocument {
        TableDocument {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: ENGINE_VERSION.to_string(),
                run_id: self.run_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            params: output.params,
            window: output.window,
            flagged_units: output.flagged_units.clone(),
            tables: output.tables.clone(),
        }
    }

    /// Encode the whole run as one JSON document
    pub fn encode_to_json(
        &self,
        output: &RunOutput,
        pretty: bool,
    ) -> Result<String, ComputeError> {
        let document = self.document(output);
        let json = if pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        Ok(json)
    }

    /// One NDJSON body per table, in table order.
    pub fn encode_ndjson(
        tables: &ResultTables,
    ) -> Result<Vec<(&'static str, String)>, ComputeError> {
        let names = ResultTables::TABLE_NAMES;
        Ok(vec![
            (names[0], to_ndjson(&tables.coverage_weekly)?),
            (names[1], to_ndjson(&tables.coverage_weekly_by_org)?),
            (names[2], to_ndjson(&tables.active_rate_daily)?),
            (names[3], to_ndjson(&tables.message_volume_weekly)?),
            (names[4], to_ndjson(&tables.message_distribution_weekly)?),
            (names[5], to_ndjson(&tables.message_leaderboard)?),
            (names[6], to_ndjson(&tables.activation_cohort_monthly)?),
            (names[7], to_ndjson(&tables.activation_cohort_monthly_by_org)?),
            (names[8], to_ndjson(&tables.retention_cohort_monthly)?),
            (names[9], to_ndjson(&tables.retention_cohort_monthly_by_org)?),
        ])
    }

    /// Write `<table>.ndjson` files into `dir`, replacing existing ones.
    pub fn write_ndjson_dir(
        tables: &ResultTables,
        dir: &Path,
    ) -> Result<Vec<PathBuf>, ComputeError> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for (name, body) in Self::encode_ndjson(tables)? {
            let path = dir.join(format!("{}.ndjson", name));
            fs::write(&path, body)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn to_ndjson<T: Serialize>(rows: &[T]) -> Result<String, ComputeError> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}
