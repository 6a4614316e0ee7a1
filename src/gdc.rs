//! Logical operations against the GDC API.
//!
//! [`GdcApi`] is the seam the pipeline stages talk to; [`GdcClient`] implements
//! it on top of the rate-limited [`HttpClient`].

use serde::Serialize;

use crate::domain::{GeneId, GeneSymbol, PrimarySite};
use crate::error::GdcError;
use crate::filters::{self, Filter};
use crate::http::{HttpClient, HttpSettings, QueryParams, ReqwestTransport, Transport};
use crate::rate_limit::{Clock, SystemClock};
use crate::response::{CaseHit, GeneHit, SearchResponse, SsmHit};

pub const CASES_ENDPOINT: &str = "cases";
pub const SSMS_ENDPOINT: &str = "ssms";
pub const GENES_ENDPOINT: &str = "genes";
pub const SSM_OCCURRENCES_ENDPOINT: &str = "ssm_occurrences";

/// Hit cap of the single-shot cohort and case-count queries.
pub const QUERY_CAP: usize = 10_000;

pub const GENE_SYMBOL_FACET: &str = "ssm.consequence.transcript.gene.symbol";
pub const PRIMARY_SITE_FACET: &str = "primary_site";

const MUTATION_FIELDS: &str = "ssm_id,genomic_dna_change,mutation_subtype,\
consequence.transcript.gene.symbol,consequence.transcript.aa_change,\
consequence.transcript.consequence_type,consequence.transcript.annotation.vep_impact,\
consequence.transcript.annotation.sift_impact,consequence.transcript.annotation.sift_score,\
consequence.transcript.annotation.polyphen_impact,consequence.transcript.annotation.polyphen_score,\
occurrence.case.case_id";

const MUTATION_EXPAND: &str = "consequence.transcript.annotation,occurrence.case";

/// Case identifiers returned by a capped single-shot query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseIdBatch {
    pub case_ids: Vec<String>,
    /// Hit count the portal reported for the query.
    pub reported_hits: u64,
    /// Hits actually returned, at most [`QUERY_CAP`].
    pub returned_hits: usize,
}

impl CaseIdBatch {
    pub fn is_truncated(&self) -> bool {
        self.reported_hits > self.returned_hits as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolCount {
    pub symbol: String,
    pub occurrences: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    pub id: GeneId,
    pub symbol: Option<String>,
    pub is_census: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteSummary {
    pub site: String,
    pub case_count: u64,
}

pub type MutationPages<'a> = Box<dyn Iterator<Item = Result<Vec<SsmHit>, GdcError>> + 'a>;

pub trait GdcApi {
    /// Cases of the site with at least one open-access MAF file, up to [`QUERY_CAP`].
    fn open_maf_case_ids(&mut self, site: &PrimarySite) -> Result<CaseIdBatch, GdcError>;

    /// Total cases recorded for the site, without file filters.
    fn site_case_count(&mut self, site: &PrimarySite) -> Result<u64, GdcError>;

    /// Primary sites that have open-access MAF cases, with their case counts.
    fn primary_sites(&mut self) -> Result<Vec<SiteSummary>, GdcError>;

    /// Gene symbols bucketed over mutation occurrences of the site.
    fn mutated_gene_symbols(&mut self, site: &PrimarySite) -> Result<Vec<SymbolCount>, GdcError>;

    fn gene_by_symbol(&mut self, symbol: &GeneSymbol) -> Result<Option<GeneRecord>, GdcError>;

    /// All genes flagged as cancer gene census members.
    fn census_genes(&mut self) -> Result<Vec<GeneRecord>, GdcError>;

    /// Raw case identifiers of every occurrence of a mutation in the gene,
    /// optionally restricted to a site. Duplicates are not removed.
    fn gene_case_ids(
        &mut self,
        gene: &GeneId,
        site: Option<&PrimarySite>,
    ) -> Result<CaseIdBatch, GdcError>;

    /// Pages of fully expanded mutation hits for the gene within the site.
    fn mutation_pages<'a>(&'a mut self, gene: &GeneId, site: &PrimarySite) -> MutationPages<'a>;

    /// Occurrences of one mutation across the whole portal.
    fn portal_occurrence_count(&mut self, ssm_id: &str) -> Result<usize, GdcError>;
}

pub struct GdcClient<T: Transport, C: Clock = SystemClock> {
    http: HttpClient<T, C>,
}

impl GdcClient<ReqwestTransport, SystemClock> {
    pub fn connect(settings: HttpSettings) -> Result<Self, GdcError> {
        let transport = ReqwestTransport::new(settings.timeout)?;
        Ok(Self::new(HttpClient::new(transport, settings)))
    }
}

impl<T: Transport, C: Clock> GdcClient<T, C> {
    pub fn new(http: HttpClient<T, C>) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient<T, C> {
        &self.http
    }

    fn search<H>(&mut self, endpoint: &str, params: QueryParams) -> Result<SearchResponse<H>, GdcError>
    where
        H: serde::de::DeserializeOwned,
    {
        self.http.fetch_as(endpoint, &params)
    }
}

fn params(pairs: &[(&str, String)]) -> QueryParams {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

impl<T: Transport, C: Clock> GdcApi for GdcClient<T, C> {
    fn open_maf_case_ids(&mut self, site: &PrimarySite) -> Result<CaseIdBatch, GdcError> {
        let filter = Filter::and(vec![
            Filter::eq("primary_site", site.as_str()),
            filters::open_access_maf(),
        ]);
        let response: SearchResponse<CaseHit> = self.search(
            CASES_ENDPOINT,
            params(&[
                ("filters", filter.to_param()),
                ("fields", "case_id".to_string()),
                ("size", QUERY_CAP.to_string()),
            ]),
        )?;

        let returned_hits = response.data.hits.len();
        let case_ids = response
            .data
            .hits
            .into_iter()
            .filter_map(|hit| hit.case_id)
            .filter(|id| !id.is_empty())
            .collect();
        Ok(CaseIdBatch {
            case_ids,
            reported_hits: response.data.pagination.total,
            returned_hits,
        })
    }

    fn site_case_count(&mut self, site: &PrimarySite) -> Result<u64, GdcError> {
        let filter = Filter::eq("primary_site", site.as_str());
        let response: SearchResponse<CaseHit> = self.search(
            CASES_ENDPOINT,
            params(&[("filters", filter.to_param()), ("size", "0".to_string())]),
        )?;
        Ok(response.data.pagination.total)
    }

    fn primary_sites(&mut self) -> Result<Vec<SiteSummary>, GdcError> {
        let response: SearchResponse<CaseHit> = self.search(
            CASES_ENDPOINT,
            params(&[
                ("filters", filters::open_access_maf().to_param()),
                ("facets", PRIMARY_SITE_FACET.to_string()),
                ("size", "0".to_string()),
            ]),
        )?;
        Ok(response
            .data
            .buckets(PRIMARY_SITE_FACET)
            .iter()
            .filter(|bucket| !bucket.key.is_empty() && bucket.doc_count > 0)
            .map(|bucket| SiteSummary {
                site: bucket.key.clone(),
                case_count: bucket.doc_count,
            })
            .collect())
    }

    fn mutated_gene_symbols(&mut self, site: &PrimarySite) -> Result<Vec<SymbolCount>, GdcError> {
        let filter = Filter::eq("case.primary_site", site.as_str());
        let response: SearchResponse<serde_json::Value> = self.search(
            SSM_OCCURRENCES_ENDPOINT,
            params(&[
                ("filters", filter.to_param()),
                ("facets", GENE_SYMBOL_FACET.to_string()),
                ("size", "0".to_string()),
            ]),
        )?;
        Ok(response
            .data
            .buckets(GENE_SYMBOL_FACET)
            .iter()
            .filter(|bucket| !bucket.key.is_empty())
            .map(|bucket| SymbolCount {
                symbol: bucket.key.clone(),
                occurrences: bucket.doc_count,
            })
            .collect())
    }

    fn gene_by_symbol(&mut self, symbol: &GeneSymbol) -> Result<Option<GeneRecord>, GdcError> {
        let filter = Filter::eq("symbol", symbol.as_str());
        let response: SearchResponse<GeneHit> = self.search(
            GENES_ENDPOINT,
            params(&[
                ("filters", filter.to_param()),
                ("fields", "gene_id,symbol,is_cancer_gene_census".to_string()),
                ("size", "1".to_string()),
            ]),
        )?;
        Ok(response.data.hits.into_iter().next().and_then(gene_record))
    }

    fn census_genes(&mut self) -> Result<Vec<GeneRecord>, GdcError> {
        let filter = Filter::eq("is_cancer_gene_census", true);
        let base = params(&[
            ("filters", filter.to_param()),
            ("fields", "gene_id,symbol,is_cancer_gene_census".to_string()),
        ]);
        let page_size = self.http.settings().page_size;

        let mut genes = Vec::new();
        for page in self.http.paginate::<GeneHit>(GENES_ENDPOINT, base, page_size) {
            genes.extend(page?.into_iter().filter_map(gene_record));
        }
        Ok(genes)
    }

    fn gene_case_ids(
        &mut self,
        gene: &GeneId,
        site: Option<&PrimarySite>,
    ) -> Result<CaseIdBatch, GdcError> {
        let mut clauses = vec![Filter::eq(
            "consequence.transcript.gene.gene_id",
            gene.as_str(),
        )];
        if let Some(site) = site {
            clauses.push(Filter::eq("occurrence.case.primary_site", site.as_str()));
        }
        let response: SearchResponse<SsmHit> = self.search(
            SSMS_ENDPOINT,
            params(&[
                ("filters", Filter::and(clauses).to_param()),
                ("fields", "occurrence.case.case_id".to_string()),
                ("expand", "occurrence.case".to_string()),
                ("size", QUERY_CAP.to_string()),
            ]),
        )?;

        let returned_hits = response.data.hits.len();
        let case_ids = response
            .data
            .hits
            .iter()
            .flat_map(|hit| hit.occurrence.iter())
            .filter_map(|occurrence| occurrence.case_id())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        Ok(CaseIdBatch {
            case_ids,
            reported_hits: response.data.pagination.total,
            returned_hits,
        })
    }

    fn mutation_pages<'a>(&'a mut self, gene: &GeneId, site: &PrimarySite) -> MutationPages<'a> {
        let filter = Filter::and(vec![
            Filter::eq("consequence.transcript.gene.gene_id", gene.as_str()),
            Filter::eq("occurrence.case.primary_site", site.as_str()),
        ]);
        let base = params(&[
            ("filters", filter.to_param()),
            ("fields", MUTATION_FIELDS.to_string()),
            ("expand", MUTATION_EXPAND.to_string()),
            ("format", "JSON".to_string()),
        ]);
        let page_size = self.http.settings().page_size;
        Box::new(self.http.paginate::<SsmHit>(SSMS_ENDPOINT, base, page_size))
    }

    fn portal_occurrence_count(&mut self, ssm_id: &str) -> Result<usize, GdcError> {
        let filter = Filter::eq("ssm_id", ssm_id);
        let response: SearchResponse<SsmHit> = self.search(
            SSMS_ENDPOINT,
            params(&[
                ("filters", filter.to_param()),
                ("fields", "ssm_id,occurrence.case.case_id".to_string()),
                ("size", "1".to_string()),
            ]),
        )?;
        Ok(response
            .data
            .hits
            .first()
            .map(|hit| hit.occurrence.len())
            .unwrap_or(0))
    }
}

fn gene_record(hit: GeneHit) -> Option<GeneRecord> {
    let id = hit.gene_id.filter(|id| !id.is_empty())?;
    Some(GeneRecord {
        id: GeneId::new(id),
        symbol: hit.symbol,
        is_census: hit.is_cancer_gene_census.unwrap_or(false),
    })
}
