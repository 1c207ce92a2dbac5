//! Source file reader
//!
//! Each upstream source is one file of records, either NDJSON (one object per
//! line) or a single JSON array. Lines that fail to parse are skipped and
//! reported instead of aborting the run.

use crate::error::ComputeError;
use crate::types::{ActivationEvent, EmploymentRecord, MessageEvent, OrgUnit, SourceSnapshot};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// File names expected in an input directory.
pub const EMPLOYEES_FILE: &str = "employees.ndjson";
pub const ACTIVATIONS_FILE: &str = "activations.ndjson";
pub const MESSAGES_FILE: &str = "messages.ndjson";
pub const ORG_UNITS_FILE: &str = "org_units.ndjson";

/// A record that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedLine {
    /// 1-based line number, or array position + 1 for array input
    pub line: usize,
    pub reason: String,
}

/// Parse outcome for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    /// `false` when the file did not exist and the source was read as empty
    pub present: bool,
    pub total: usize,
    pub accepted: usize,
    pub rejected: Vec<RejectedLine>,
}

/// Parsed records plus their report.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub report: SourceReport,
}

/// Snapshot loaded from an input directory.
#[derive(Debug, Clone, Default)]
pub struct LoadedSources {
    pub snapshot: SourceSnapshot,
    pub reports: Vec<SourceReport>,
}

impl LoadedSources {
    pub fn rejected_count(&self) -> usize {
        self.reports.iter().map(|r| r.rejected.len()).sum()
    }
}

/// Reader for source files
pub struct SourceReader;

impl SourceReader {
    /// Parse NDJSON, skipping blank lines and rejecting malformed ones.
    pub fn parse_ndjson<T: DeserializeOwned>(source: &str, content: &str) -> Parsed<T> {
        let mut records = Vec::new();
        let mut report = SourceReport {
            source: source.to_string(),
            present: true,
            ..Default::default()
        };

        for (line_num, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            report.total += 1;
            match serde_json::from_str::<T>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(source, line = line_num + 1, error = %e, "skipping malformed line");
                    report.rejected.push(RejectedLine {
                        line: line_num + 1,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.accepted = records.len();
        Parsed { records, report }
    }

    /// Parse a JSON array. Elements are decoded one at a time so a bad
    /// element only rejects itself; a document that is not an array fails.
    pub fn parse_array<T: DeserializeOwned>(
        source: &str,
        content: &str,
    ) -> Result<Parsed<T>, ComputeError> {
        let values: Vec<serde_json::Value> = serde_json::from_str(content)?;
        let mut records = Vec::with_capacity(values.len());
        let mut report = SourceReport {
            source: source.to_string(),
            present: true,
            total: values.len(),
            ..Default::default()
        };

        for (idx, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<T>(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(source, element = idx + 1, error = %e, "skipping malformed element");
                    report.rejected.push(RejectedLine {
                        line: idx + 1,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.accepted = records.len();
        Ok(Parsed { records, report })
    }

    /// Parse either form, detected from the first non-whitespace character.
    pub fn parse_auto<T: DeserializeOwned>(
        source: &str,
        content: &str,
    ) -> Result<Parsed<T>, ComputeError> {
        if content.trim_start().starts_with('[') {
            Self::parse_array(source, content)
        } else {
            Ok(Self::parse_ndjson(source, content))
        }
    }

    /// Read one source file. A missing file is an empty source.
    pub fn read_file<T: DeserializeOwned>(path: &Path) -> Result<Parsed<T>, ComputeError> {
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match fs::read_to_string(path) {
            Ok(content) => Self::parse_auto(&source, &content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "source file not found, treating as empty");
                Ok(Parsed {
                    records: Vec::new(),
                    report: SourceReport {
                        source,
                        present: false,
                        ..Default::default()
                    },
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Load all four sources from `dir`.
    pub fn load_dir(dir: &Path) -> Result<LoadedSources, ComputeError> {
        if !dir.is_dir() {
            return Err(ComputeError::ParseError(format!(
                "input directory not found: {}",
                dir.display()
            )));
        }

        let employment: Parsed<EmploymentRecord> = Self::read_file(&dir.join(EMPLOYEES_FILE))?;
        let activations: Parsed<ActivationEvent> = Self::read_file(&dir.join(ACTIVATIONS_FILE))?;
        let messages: Parsed<MessageEvent> = Self::read_file(&dir.join(MESSAGES_FILE))?;
        let org_units: Parsed<OrgUnit> = Self::read_file(&dir.join(ORG_UNITS_FILE))?;

        let reports = vec![
            employment.report,
            activations.report,
            messages.report,
            org_units.report,
        ];
        for report in &reports {
            debug!(
                source = %report.source,
                accepted = report.accepted,
                rejected = report.rejected.len(),
                "source parsed"
            );
        }

        let loaded = LoadedSources {
            snapshot: SourceSnapshot {
                employment: employment.records,
                activations: activations.records,
                messages: messages.records,
                org_units: org_units.records,
            },
            reports,
        };
        info!(
            dir = %dir.display(),
            rejected = loaded.rejected_count(),
            "sources loaded"
        );
        Ok(loaded)
    }
}
