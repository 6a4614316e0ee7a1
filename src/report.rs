use std::collections::HashSet;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::GdcError;
use crate::format::MutationRow;
use crate::store::write_bytes_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_rows: usize,
    pub unique_rows: usize,
    pub path: String,
}

/// Collapses rows sharing a DNA change (first seen wins) and sorts by cohort
/// then portal affected cases, both descending. The sort is stable.
pub fn dedupe_and_sort(rows: Vec<MutationRow>) -> Vec<MutationRow> {
    let mut seen = HashSet::new();
    let mut unique: Vec<MutationRow> = rows
        .into_iter()
        .filter(|row| seen.insert(row.dna_change.clone()))
        .collect();
    unique.sort_by(|a, b| {
        b.num_cohort_ssm_affected_cases
            .cmp(&a.num_cohort_ssm_affected_cases)
            .then(b.num_gdc_ssm_affected_cases.cmp(&a.num_gdc_ssm_affected_cases))
    });
    unique
}

/// Serializes rows as tab-separated text with a header row.
pub fn to_tsv(rows: &[MutationRow]) -> Result<Vec<u8>, GdcError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_writer(Vec::new());
    if rows.is_empty() {
        writer
            .write_record(crate::format::COLUMNS)
            .map_err(|err| GdcError::Output(err.to_string()))?;
    }
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| GdcError::Output(err.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|err| GdcError::Output(err.to_string()))
}

/// Dedupes, sorts and writes all rows of a site. Returns `None` without
/// touching the filesystem when there is nothing to write.
pub fn save_all_mutations(
    rows: Vec<MutationRow>,
    path: &Utf8Path,
) -> Result<Option<ReportSummary>, GdcError> {
    if rows.is_empty() {
        warn!("no mutations to save");
        return Ok(None);
    }

    let total_rows = rows.len();
    let unique = dedupe_and_sort(rows);
    info!(
        unique = unique.len(),
        total = total_rows,
        "deduplicated mutations by DNA change"
    );

    let content = to_tsv(&unique)?;
    write_bytes_atomic(path, &content)?;
    info!(rows = unique.len(), path = %path, "saved mutations");

    Ok(Some(ReportSummary {
        total_rows,
        unique_rows: unique.len(),
        path: path.to_string(),
    }))
}
