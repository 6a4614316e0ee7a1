#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use gdc_frequent_mutations::domain::{GeneId, GeneSymbol, PrimarySite};
use gdc_frequent_mutations::error::{GdcError, RequestFailure};
use gdc_frequent_mutations::gdc::{
    CaseIdBatch, GdcApi, GeneRecord, MutationPages, SiteSummary, SymbolCount,
};
use gdc_frequent_mutations::http::{Transport, TransportError, TransportResponse};
use gdc_frequent_mutations::rate_limit::Clock;
use gdc_frequent_mutations::response::SsmHit;

/// Clock that only moves when slept on or advanced.
#[derive(Clone)]
pub struct ManualClock {
    state: Rc<RefCell<ClockState>>,
}

struct ClockState {
    now: Instant,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ClockState {
                now: Instant::now(),
                sleeps: Vec::new(),
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.state.borrow_mut().now += duration;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.borrow().sleeps.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.state.borrow().sleeps.iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.borrow().now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.state.borrow_mut();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

pub type Call = (String, Vec<(String, String)>);

/// Transport that replays canned responses in order and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<TransportResponse, TransportError>>>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, body: Value) -> &Self {
        self.push_status(200, &body.to_string())
    }

    pub fn push_status(&self, status: u16, body: &str) -> &Self {
        self.responses.borrow_mut().push_back(Ok(TransportResponse {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn push_error(&self, error: TransportError) -> &Self {
        self.responses.borrow_mut().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.calls
            .borrow_mut()
            .push((url.to_string(), query.to_vec()));
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(TransportResponse {
                status: 500,
                body: "script exhausted".to_string(),
            }))
    }
}

pub fn param<'a>(call: &'a Call, key: &str) -> Option<&'a str> {
    call.1
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

pub fn search_page(hits: Value, total: u64) -> Value {
    json!({ "data": { "hits": hits, "pagination": { "total": total } } })
}

pub fn ssm(value: Value) -> SsmHit {
    serde_json::from_value(value).unwrap()
}

/// Mutation hit with `cases` occurrences and a first transcript.
pub fn ssm_with_cases(ssm_id: &str, dna_change: &str, cases: usize) -> SsmHit {
    let occurrence: Vec<Value> = (0..cases)
        .map(|i| json!({ "case": { "case_id": format!("{ssm_id}-case-{i}") } }))
        .collect();
    ssm(json!({
        "ssm_id": ssm_id,
        "genomic_dna_change": dna_change,
        "mutation_subtype": "Single base substitution",
        "consequence": [{
            "transcript": {
                "aa_change": "p.X1Y",
                "consequence_type": "missense_variant",
                "annotation": { "vep_impact": "MODERATE", "sift_score": 0.05 }
            }
        }],
        "occurrence": occurrence
    }))
}

pub fn site(name: &str) -> PrimarySite {
    name.parse().unwrap()
}

pub fn symbol(name: &str) -> GeneSymbol {
    name.parse().unwrap()
}

/// In-memory portal.
#[derive(Default)]
pub struct MockApi {
    pub site_cases: u64,
    pub cohort: Vec<String>,
    pub cohort_reported: Option<u64>,
    pub cohort_returned: Option<usize>,
    pub sites: Vec<SiteSummary>,
    pub symbol_buckets: Vec<SymbolCount>,
    pub genes: HashMap<String, GeneRecord>,
    pub census: Vec<GeneRecord>,
    /// gene id -> case ids of site-restricted occurrences
    pub site_case_ids: HashMap<String, Vec<String>>,
    /// gene id -> case ids of portal-wide occurrences
    pub portal_case_ids: HashMap<String, Vec<String>>,
    pub mutations: HashMap<String, Vec<Vec<SsmHit>>>,
    pub portal_counts: HashMap<String, usize>,
    pub fail_mutations_for: Option<String>,

    pub mutation_calls: Vec<String>,
    pub gene_lookups: Vec<String>,
    pub portal_count_calls: Vec<String>,
}

impl MockApi {
    pub fn add_gene(&mut self, symbol: &str, id: &str, is_census: bool) {
        self.genes.insert(
            symbol.to_string(),
            GeneRecord {
                id: GeneId::new(id),
                symbol: Some(symbol.to_string()),
                is_census,
            },
        );
    }

    pub fn bucket(&mut self, symbol: &str, occurrences: u64) {
        self.symbol_buckets.push(SymbolCount {
            symbol: symbol.to_string(),
            occurrences,
        });
    }
}

fn request_failure(endpoint: &str) -> GdcError {
    GdcError::Request {
        endpoint: endpoint.to_string(),
        params: String::new(),
        source: RequestFailure::Status {
            status: 400,
            message: "bad request".to_string(),
        },
    }
}

impl GdcApi for MockApi {
    fn open_maf_case_ids(&mut self, _site: &PrimarySite) -> Result<CaseIdBatch, GdcError> {
        Ok(CaseIdBatch {
            case_ids: self.cohort.clone(),
            reported_hits: self.cohort_reported.unwrap_or(self.cohort.len() as u64),
            returned_hits: self.cohort_returned.unwrap_or(self.cohort.len()),
        })
    }

    fn site_case_count(&mut self, _site: &PrimarySite) -> Result<u64, GdcError> {
        Ok(self.site_cases)
    }

    fn primary_sites(&mut self) -> Result<Vec<SiteSummary>, GdcError> {
        Ok(self.sites.clone())
    }

    fn mutated_gene_symbols(&mut self, _site: &PrimarySite) -> Result<Vec<SymbolCount>, GdcError> {
        Ok(self.symbol_buckets.clone())
    }

    fn gene_by_symbol(&mut self, symbol: &GeneSymbol) -> Result<Option<GeneRecord>, GdcError> {
        self.gene_lookups.push(symbol.to_string());
        Ok(self.genes.get(symbol.as_str()).cloned())
    }

    fn census_genes(&mut self) -> Result<Vec<GeneRecord>, GdcError> {
        Ok(self.census.clone())
    }

    fn gene_case_ids(
        &mut self,
        gene: &GeneId,
        site: Option<&PrimarySite>,
    ) -> Result<CaseIdBatch, GdcError> {
        let source = if site.is_some() {
            &self.site_case_ids
        } else {
            &self.portal_case_ids
        };
        let case_ids = source.get(gene.as_str()).cloned().unwrap_or_default();
        Ok(CaseIdBatch {
            reported_hits: case_ids.len() as u64,
            returned_hits: case_ids.len(),
            case_ids,
        })
    }

    fn mutation_pages<'a>(&'a mut self, gene: &GeneId, _site: &PrimarySite) -> MutationPages<'a> {
        self.mutation_calls.push(gene.to_string());
        if self.fail_mutations_for.as_deref() == Some(gene.as_str()) {
            return Box::new(std::iter::once(Err::<Vec<SsmHit>, _>(request_failure("ssms"))));
        }
        let pages = self.mutations.get(gene.as_str()).cloned().unwrap_or_default();
        Box::new(pages.into_iter().map(Ok::<_, GdcError>))
    }

    fn portal_occurrence_count(&mut self, ssm_id: &str) -> Result<usize, GdcError> {
        self.portal_count_calls.push(ssm_id.to_string());
        Ok(self.portal_counts.get(ssm_id).copied().unwrap_or(0))
    }
}
