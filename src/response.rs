//! Typed shapes of the portal's JSON responses.
//!
//! Every field that the portal may omit is optional or defaulted here, so the
//! rest of the crate never chains permissive lookups over raw JSON.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Top-level envelope. `data` must be present; everything below it is defaulted.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "H: Deserialize<'de>"))]
pub struct SearchResponse<H> {
    pub data: SearchData<H>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "H: Deserialize<'de>"))]
pub struct SearchData<H> {
    #[serde(default)]
    pub hits: Vec<H>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub aggregations: HashMap<String, Aggregation>,
}

impl<H> SearchData<H> {
    /// Buckets of one facet, empty when the facet is absent.
    pub fn buckets(&self, facet: &str) -> &[Bucket] {
        self.aggregations
            .get(facet)
            .map(|agg| agg.buckets.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Aggregation {
    #[serde(default)]
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub doc_count: u64,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CaseHit {
    #[serde(default)]
    pub case_id: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct GeneHit {
    #[serde(default)]
    pub gene_id: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub is_cancer_gene_census: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Occurrence {
    #[serde(default)]
    pub case: Option<OccurrenceCase>,
}

impl Occurrence {
    pub fn case_id(&self) -> Option<&str> {
        self.case.as_ref().and_then(|case| case.case_id.as_deref())
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct OccurrenceCase {
    #[serde(default)]
    pub case_id: Option<String>,
}

/// Mutation hit as returned by the SSM search with transcript, annotation and
/// occurrence expansion.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SsmHit {
    #[serde(default)]
    pub ssm_id: Option<String>,
    #[serde(default)]
    pub genomic_dna_change: Option<String>,
    #[serde(default)]
    pub mutation_subtype: Option<String>,
    #[serde(default)]
    pub consequence: Vec<Consequence>,
    #[serde(default)]
    pub occurrence: Vec<Occurrence>,
}

impl SsmHit {
    /// Transcript of the first consequence, if the portal returned one.
    pub fn first_transcript(&self) -> Option<&Transcript> {
        self.consequence
            .first()
            .and_then(|consequence| consequence.transcript.as_ref())
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Consequence {
    #[serde(default)]
    pub transcript: Option<Transcript>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub aa_change: Option<String>,
    #[serde(default)]
    pub consequence_type: Option<String>,
    #[serde(default)]
    pub annotation: Option<Annotation>,
}

/// Impact predictors. Scores are kept as raw JSON so they print verbatim.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub vep_impact: Option<Value>,
    #[serde(default)]
    pub sift_impact: Option<Value>,
    #[serde(default)]
    pub sift_score: Option<Value>,
    #[serde(default)]
    pub polyphen_impact: Option<Value>,
    #[serde(default)]
    pub polyphen_score: Option<Value>,
}
