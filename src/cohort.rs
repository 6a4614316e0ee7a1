use tracing::{info, warn};

use crate::domain::{CaseIdSet, PrimarySite};
use crate::error::GdcError;
use crate::gdc::{CaseIdBatch, GdcApi, QUERY_CAP};

/// Fraction of [`QUERY_CAP`] at which a result is reported as close to the cap.
pub const CAP_WARNING_RATIO: f64 = 0.9;

/// Case population of one site, fixed for the rest of the run.
#[derive(Debug, Clone)]
pub struct Cohort {
    site: PrimarySite,
    case_ids: CaseIdSet,
    truncated: bool,
}

impl Cohort {
    pub fn new(site: PrimarySite, case_ids: CaseIdSet) -> Self {
        Self {
            site,
            case_ids,
            truncated: false,
        }
    }

    /// Marks the cohort as cut off by the query cap.
    pub fn with_truncation(mut self, truncated: bool) -> Self {
        self.truncated = truncated;
        self
    }

    pub fn site(&self) -> &PrimarySite {
        &self.site
    }

    pub fn case_ids(&self) -> &CaseIdSet {
        &self.case_ids
    }

    /// Denominator for cohort-affected percentages.
    pub fn size(&self) -> usize {
        self.case_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.case_ids.is_empty()
    }

    /// True when the portal matched more hits than the query returned.
    /// Duplicate or missing case ids among the returned hits do not count.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

pub struct CohortResolver;

impl CohortResolver {
    /// Resolves the open-access MAF cohort of a site.
    ///
    /// An empty cohort is a valid result; callers decide whether to skip the site.
    pub fn resolve(api: &mut dyn GdcApi, site: &PrimarySite) -> Result<Cohort, GdcError> {
        info!(site = %site, "fetching open-access MAF cohort");
        let batch = api.open_maf_case_ids(site)?;
        flag_cap(&batch, &format!("cohort of {site}"));

        let truncated = batch.is_truncated();
        let case_ids: CaseIdSet = batch.case_ids.into_iter().collect();
        info!(site = %site, cases = case_ids.len(), "resolved cohort");
        Ok(Cohort::new(site.clone(), case_ids).with_truncation(truncated))
    }
}

/// Logs when a capped query was cut off or came close to the cap.
pub fn flag_cap(batch: &CaseIdBatch, what: &str) {
    if batch.is_truncated() {
        warn!(
            reported = batch.reported_hits,
            returned = batch.returned_hits,
            "{what}: portal matched more than {QUERY_CAP} hits, the remainder is not counted"
        );
    } else if batch.returned_hits as f64 >= QUERY_CAP as f64 * CAP_WARNING_RATIO {
        warn!(
            returned = batch.returned_hits,
            "{what}: result is close to the {QUERY_CAP} hit cap"
        );
    }
}
