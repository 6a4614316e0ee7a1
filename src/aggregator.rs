use tracing::debug;

use crate::control::{CancelToken, Step};
use crate::domain::{GeneId, PrimarySite};
use crate::error::GdcError;
use crate::gdc::GdcApi;
use crate::response::SsmHit;

/// A mutation hit that passed the affected-percentage threshold.
#[derive(Debug, Clone)]
pub struct QualifiedMutation {
    pub hit: SsmHit,
    pub num_affected: usize,
    pub affected_pct: f64,
}

impl QualifiedMutation {
    pub fn ssm_id(&self) -> &str {
        self.hit.ssm_id.as_deref().unwrap_or("")
    }
}

/// Percentage of `total` represented by `affected`; zero when `total` is zero.
pub fn affected_percentage(affected: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    affected as f64 / total as f64 * 100.0
}

/// Keeps only records strictly above the threshold.
pub fn passes_threshold(affected_pct: f64, min_affected_pct: f64) -> bool {
    affected_pct > min_affected_pct
}

pub struct MutationAggregator {
    min_affected_pct: f64,
}

impl MutationAggregator {
    pub fn new(min_affected_pct: f64) -> Self {
        Self { min_affected_pct }
    }

    /// Walks every mutation page of the gene and keeps qualifying hits.
    ///
    /// `total_cohort_cases` is the cohort size captured when the cohort was resolved.
    pub fn fetch_mutations(
        &self,
        api: &mut dyn GdcApi,
        gene: &GeneId,
        site: &PrimarySite,
        total_cohort_cases: usize,
        cancel: &CancelToken,
    ) -> Result<Step<Vec<QualifiedMutation>>, GdcError> {
        let mut kept = Vec::new();
        let mut seen = 0usize;
        for page in api.mutation_pages(gene, site) {
            if cancel.is_cancelled() {
                return Ok(Step::Interrupted);
            }
            for hit in page? {
                seen += 1;
                let num_affected = hit.occurrence.len();
                let affected_pct = affected_percentage(num_affected, total_cohort_cases);
                if passes_threshold(affected_pct, self.min_affected_pct) {
                    kept.push(QualifiedMutation {
                        hit,
                        num_affected,
                        affected_pct,
                    });
                }
            }
        }
        debug!(gene = %gene, seen, kept = kept.len(), "filtered mutations");
        Ok(Step::Completed(kept))
    }

    /// Occurrences of the mutation across the whole portal, not cohort-restricted.
    pub fn portal_wide_stats(api: &mut dyn GdcApi, ssm_id: &str) -> Result<usize, GdcError> {
        api.portal_occurrence_count(ssm_id)
    }
}
