use serde::Serialize;
use serde_json::Value;

use crate::domain::GeneSymbol;
use crate::response::SsmHit;

/// Column order of the report.
pub const COLUMNS: [&str; 17] = [
    "ssm_id",
    "gene",
    "dna_change",
    "protein_change",
    "type",
    "consequence",
    "num_cohort_ssm_affected_cases",
    "num_cohort_ssm_cases",
    "cohort_ssm_affected_cases_percentage",
    "num_gdc_ssm_affected_cases",
    "num_gdc_ssm_cases",
    "gdc_ssm_affected_cases_percentage",
    "vep_impact",
    "sift_impact",
    "sift_score",
    "polyphen_impact",
    "polyphen_score",
];

/// One report row. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationRow {
    pub ssm_id: String,
    pub gene: String,
    pub dna_change: String,
    pub protein_change: String,
    #[serde(rename = "type")]
    pub mutation_type: String,
    pub consequence: String,
    pub num_cohort_ssm_affected_cases: usize,
    pub num_cohort_ssm_cases: usize,
    pub cohort_ssm_affected_cases_percentage: f64,
    pub num_gdc_ssm_affected_cases: usize,
    pub num_gdc_ssm_cases: usize,
    pub gdc_ssm_affected_cases_percentage: f64,
    pub vep_impact: String,
    pub sift_impact: String,
    pub sift_score: String,
    pub polyphen_impact: String,
    pub polyphen_score: String,
}

/// Case totals of the gene a mutation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneTotals {
    /// Distinct cohort cases with any mutation in the gene.
    pub cohort_cases: usize,
    /// Distinct portal-wide cases with any mutation in the gene.
    pub portal_cases: usize,
}

/// Builds the report row for one mutation. Pure; performs no I/O.
pub fn format_mutation(
    hit: &SsmHit,
    symbol: &GeneSymbol,
    cohort_affected: usize,
    totals: GeneTotals,
    portal_affected: usize,
) -> MutationRow {
    let transcript = hit.first_transcript();
    let annotation = transcript.and_then(|transcript| transcript.annotation.as_ref());

    let aa_change = transcript
        .and_then(|transcript| transcript.aa_change.as_deref())
        .unwrap_or("");
    let protein_change = if aa_change.is_empty() {
        String::new()
    } else {
        format!("{symbol} {aa_change}")
    };

    MutationRow {
        ssm_id: hit.ssm_id.clone().unwrap_or_default(),
        gene: symbol.to_string(),
        dna_change: hit.genomic_dna_change.clone().unwrap_or_default(),
        protein_change,
        mutation_type: hit.mutation_subtype.clone().unwrap_or_default(),
        consequence: transcript
            .and_then(|transcript| transcript.consequence_type.clone())
            .unwrap_or_default(),
        num_cohort_ssm_affected_cases: cohort_affected,
        num_cohort_ssm_cases: totals.cohort_cases,
        cohort_ssm_affected_cases_percentage: round2(percentage(
            cohort_affected,
            totals.cohort_cases,
        )),
        num_gdc_ssm_affected_cases: portal_affected,
        num_gdc_ssm_cases: totals.portal_cases,
        gdc_ssm_affected_cases_percentage: round2(percentage(
            portal_affected,
            totals.portal_cases,
        )),
        vep_impact: annotation_text(annotation.and_then(|a| a.vep_impact.as_ref())),
        sift_impact: annotation_text(annotation.and_then(|a| a.sift_impact.as_ref())),
        sift_score: annotation_text(annotation.and_then(|a| a.sift_score.as_ref())),
        polyphen_impact: annotation_text(annotation.and_then(|a| a.polyphen_impact.as_ref())),
        polyphen_score: annotation_text(annotation.and_then(|a| a.polyphen_score.as_ref())),
    }
}

/// Rounds half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percentage(part: usize, whole: usize) -> f64 {
    crate::aggregator::affected_percentage(part, whole)
}

fn annotation_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
