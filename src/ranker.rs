//! Gene discovery and ranking by affected cohort cases.
//!
//! Two discovery strategies exist and are selected per run. Census discovery
//! trusts its reference list as given; aggregation discovery starts from the
//! site's mutated symbols and keeps only census members. Ranking is shared.

use std::collections::HashSet;
use std::fs;

use camino::Utf8Path;
use tracing::{debug, info, warn};

use crate::cohort::{Cohort, flag_cap};
use crate::control::{CancelToken, ProgressEvent, ProgressSink, Step};
use crate::domain::{CaseIdSet, GeneCandidate, GeneId, GeneSymbol, PrimarySite, RankedGene};
use crate::error::GdcError;
use crate::gdc::{GdcApi, GeneRecord};

/// Candidates produced by a discovery strategy, plus what it had to skip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    pub candidates: Vec<GeneCandidate>,
    /// Symbols that could not be resolved to a gene identifier.
    pub unresolved: Vec<String>,
    /// Resolved genes dropped for not being census members.
    pub non_census: usize,
}

pub trait GeneDiscovery {
    fn name(&self) -> &'static str;

    fn discover(
        &self,
        api: &mut dyn GdcApi,
        site: &PrimarySite,
        cancel: &CancelToken,
    ) -> Result<Step<Discovery>, GdcError>;
}

/// Where the census strategy gets its reference list from.
#[derive(Debug, Clone, PartialEq)]
pub enum CensusSource {
    /// Genes flagged as census members by the portal.
    Portal,
    /// A local list of symbols, resolved through the gene lookup.
    Symbols(Vec<GeneSymbol>),
}

impl CensusSource {
    /// Reads one symbol per line. Blank lines and `#` comments are ignored.
    pub fn from_file(path: &Utf8Path) -> Result<Self, GdcError> {
        let content = fs::read_to_string(path.as_std_path()).map_err(|err| GdcError::CensusRead {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let symbols = parse_symbol_list(&content)?;
        if symbols.is_empty() {
            return Err(GdcError::CensusRead {
                path: path.to_path_buf(),
                message: "no gene symbols found".to_string(),
            });
        }
        Ok(CensusSource::Symbols(symbols))
    }
}

pub fn parse_symbol_list(content: &str) -> Result<Vec<GeneSymbol>, GdcError> {
    let mut seen = HashSet::new();
    let mut symbols = Vec::new();
    for line in content.lines() {
        let entry = line.split('#').next().unwrap_or("").trim();
        // Census exports are often tab separated with the symbol first.
        let Some(first) = entry.split(['\t', ',']).next().map(str::trim) else {
            continue;
        };
        if first.is_empty() {
            continue;
        }
        let symbol: GeneSymbol = first.parse()?;
        if seen.insert(symbol.clone()) {
            symbols.push(symbol);
        }
    }
    Ok(symbols)
}

pub struct CensusDiscovery {
    source: CensusSource,
}

impl CensusDiscovery {
    pub fn new(source: CensusSource) -> Self {
        Self { source }
    }
}

impl GeneDiscovery for CensusDiscovery {
    fn name(&self) -> &'static str {
        "census"
    }

    fn discover(
        &self,
        api: &mut dyn GdcApi,
        _site: &PrimarySite,
        cancel: &CancelToken,
    ) -> Result<Step<Discovery>, GdcError> {
        let mut discovery = Discovery::default();
        match &self.source {
            CensusSource::Portal => {
                info!("fetching cancer gene census genes");
                for record in api.census_genes()? {
                    let symbol = record
                        .symbol
                        .as_deref()
                        .and_then(|symbol| symbol.parse::<GeneSymbol>().ok());
                    match symbol {
                        Some(symbol) => discovery.candidates.push(GeneCandidate {
                            id: record.id,
                            symbol,
                            is_census: true,
                        }),
                        None => {
                            warn!(gene_id = %record.id, "census gene without a usable symbol, skipping");
                            discovery.unresolved.push(record.id.to_string());
                        }
                    }
                }
            }
            CensusSource::Symbols(symbols) => {
                for symbol in symbols {
                    if cancel.is_cancelled() {
                        return Ok(Step::Interrupted);
                    }
                    match api.gene_by_symbol(symbol)? {
                        Some(record) => discovery.candidates.push(GeneCandidate {
                            id: record.id,
                            symbol: symbol.clone(),
                            is_census: record.is_census,
                        }),
                        None => {
                            warn!(symbol = %symbol, "could not find gene_id, skipping");
                            discovery.unresolved.push(symbol.to_string());
                        }
                    }
                }
            }
        }
        info!(genes = discovery.candidates.len(), "census candidates");
        Ok(Step::Completed(discovery))
    }
}

pub struct AggregationDiscovery;

impl GeneDiscovery for AggregationDiscovery {
    fn name(&self) -> &'static str {
        "aggregation"
    }

    fn discover(
        &self,
        api: &mut dyn GdcApi,
        site: &PrimarySite,
        cancel: &CancelToken,
    ) -> Result<Step<Discovery>, GdcError> {
        info!(site = %site, "aggregating mutated genes");
        let buckets = api.mutated_gene_symbols(site)?;
        info!(genes = buckets.len(), "retrieved genes from aggregation");

        let mut discovery = Discovery::default();
        let mut seen = HashSet::new();
        for bucket in buckets {
            if cancel.is_cancelled() {
                return Ok(Step::Interrupted);
            }
            debug!(symbol = %bucket.symbol, occurrences = bucket.occurrences, "aggregated gene");
            let symbol: GeneSymbol = match bucket.symbol.parse() {
                Ok(symbol) => symbol,
                Err(_) => {
                    warn!(symbol = %bucket.symbol, "unusable gene symbol, skipping");
                    discovery.unresolved.push(bucket.symbol);
                    continue;
                }
            };
            if !seen.insert(symbol.clone()) {
                continue;
            }

            match api.gene_by_symbol(&symbol)? {
                Some(GeneRecord { id, is_census, .. }) => {
                    if !is_census {
                        discovery.non_census += 1;
                        continue;
                    }
                    discovery.candidates.push(GeneCandidate {
                        id,
                        symbol,
                        is_census,
                    });
                }
                None => {
                    warn!(symbol = %symbol, "could not find gene_id, skipping");
                    discovery.unresolved.push(symbol.to_string());
                }
            }
        }
        debug!(dropped = discovery.non_census, "dropped genes outside the census");
        Ok(Step::Completed(discovery))
    }
}

/// Number of distinct cases with a mutation in the gene.
///
/// The portal has no set-membership filter, so `restrict_to` is applied
/// locally to the returned case identifiers.
pub fn count_cases(
    api: &mut dyn GdcApi,
    gene: &GeneId,
    site: Option<&PrimarySite>,
    restrict_to: Option<&CaseIdSet>,
) -> Result<usize, GdcError> {
    let batch = api.gene_case_ids(gene, site)?;
    flag_cap(&batch, &format!("case count of {gene}"));

    let distinct: HashSet<&str> = batch
        .case_ids
        .iter()
        .map(String::as_str)
        .filter(|id| restrict_to.is_none_or(|allowed| allowed.contains(*id)))
        .collect();
    Ok(distinct.len())
}

/// Drops zero counts, sorts descending (ties keep input order) and keeps `top_n`.
pub fn rank_genes(mut genes: Vec<RankedGene>, top_n: usize) -> Vec<RankedGene> {
    genes.retain(|gene| gene.cohort_affected_cases > 0);
    genes.sort_by(|a, b| b.cohort_affected_cases.cmp(&a.cohort_affected_cases));
    genes.truncate(top_n);
    genes
}

pub struct GeneRanker {
    top_n: usize,
    candidate_limit: Option<usize>,
}

impl GeneRanker {
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            candidate_limit: None,
        }
    }

    /// Only the first `limit` candidates are counted.
    pub fn with_candidate_limit(mut self, limit: Option<usize>) -> Self {
        self.candidate_limit = limit;
        self
    }

    pub fn rank(
        &self,
        api: &mut dyn GdcApi,
        cohort: &Cohort,
        discovery: &dyn GeneDiscovery,
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<Step<Vec<RankedGene>>, GdcError> {
        sink.event(ProgressEvent::Phase(format!(
            "discovering genes ({})",
            discovery.name()
        )));
        let Step::Completed(found) = discovery.discover(api, cohort.site(), cancel)? else {
            return Ok(Step::Interrupted);
        };
        if !found.unresolved.is_empty() {
            warn!(count = found.unresolved.len(), "genes skipped without a gene_id");
        }

        let mut candidates = found.candidates;
        if let Some(limit) = self.candidate_limit {
            candidates.truncate(limit);
        }
        let outside_census = candidates.iter().filter(|c| !c.is_census).count();
        if outside_census > 0 {
            info!(genes = outside_census, "candidates not flagged as census genes");
        }

        sink.event(ProgressEvent::Begin {
            label: "counting affected cases".to_string(),
            total: candidates.len() as u64,
        });
        let mut counted = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if cancel.is_cancelled() {
                sink.event(ProgressEvent::End);
                return Ok(Step::Interrupted);
            }
            let affected = count_cases(
                api,
                &candidate.id,
                Some(cohort.site()),
                Some(cohort.case_ids()),
            )?;
            debug!(symbol = %candidate.symbol, affected, "cohort affected cases");
            sink.event(ProgressEvent::Tick {
                message: candidate.symbol.to_string(),
            });
            counted.push(RankedGene {
                id: candidate.id,
                symbol: candidate.symbol,
                cohort_affected_cases: affected,
            });
        }
        sink.event(ProgressEvent::End);

        let ranked = rank_genes(counted, self.top_n);
        info!("top genes by affected cohort cases:");
        for (index, gene) in ranked.iter().take(10).enumerate() {
            info!("  {}. {}: {} cases", index + 1, gene.symbol, gene.cohort_affected_cases);
        }
        Ok(Step::Completed(ranked))
    }
}
