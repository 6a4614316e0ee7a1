//! Per-site orchestration: cohort, ranking, mutation collection, report.
//!
//! Interrupts surface as [`Step::Interrupted`] / [`SiteOutcome::Interrupted`],
//! never as errors. The progress log only ever records whole genes.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::aggregator::MutationAggregator;
use crate::cohort::{Cohort, CohortResolver};
use crate::config::Settings;
use crate::control::{CancelToken, ProgressEvent, ProgressSink, Step};
use crate::domain::{DiscoveryStrategy, PrimarySite, RankedGene};
use crate::error::GdcError;
use crate::format::{GeneTotals, MutationRow, format_mutation};
use crate::gdc::{GdcApi, SiteSummary};
use crate::progress::ProgressLog;
use crate::ranker::{
    AggregationDiscovery, CensusDiscovery, CensusSource, GeneDiscovery, GeneRanker, count_cases,
};
use crate::report::{ReportSummary, save_all_mutations};
use crate::store::SiteLayout;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SiteOutcome {
    Completed {
        genes: usize,
        report: Option<ReportSummary>,
    },
    SkippedEmptyCohort,
    Interrupted {
        completed_genes: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeneOutcome {
    Rows(Vec<MutationRow>),
    NoMutations,
    Interrupted,
}

#[derive(Debug, Clone)]
pub struct AllSitesOptions {
    pub min_cases: u64,
    pub skip_downloaded: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AllSitesSummary {
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub interrupted: bool,
}

pub struct Pipeline<'a> {
    api: &'a mut dyn GdcApi,
    settings: &'a Settings,
    cancel: CancelToken,
    sink: &'a dyn ProgressSink,
    today: NaiveDate,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        api: &'a mut dyn GdcApi,
        settings: &'a Settings,
        cancel: CancelToken,
        sink: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            api,
            settings,
            cancel,
            sink,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Date used in report file names.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.today = date;
        self
    }

    pub fn layout(&self, site: &PrimarySite) -> SiteLayout {
        SiteLayout::new(&self.settings.output_dir, site)
    }

    fn discovery(&self) -> Result<Box<dyn GeneDiscovery>, GdcError> {
        Ok(match self.settings.strategy {
            DiscoveryStrategy::Aggregation => Box::new(AggregationDiscovery),
            DiscoveryStrategy::Census => {
                let source = match &self.settings.census_file {
                    Some(path) => CensusSource::from_file(path)?,
                    None => CensusSource::Portal,
                };
                Box::new(CensusDiscovery::new(source))
            }
        })
    }

    pub fn run_site(&mut self, site: &PrimarySite) -> Result<SiteOutcome, GdcError> {
        let layout = self.layout(site);
        let mut progress = ProgressLog::load(&layout.progress_path())?;

        self.sink.event(ProgressEvent::Phase(format!("processing {site}")));
        info!(
            site = %site,
            top_genes = self.settings.top_n_genes,
            min_affected_pct = self.settings.min_affected_pct,
            strategy = %self.settings.strategy,
            "starting site"
        );
        if !progress.is_empty() {
            info!(genes = progress.len(), "resuming from progress log");
        }

        let site_cases = self.api.site_case_count(site)?;
        info!(site = %site, cases = site_cases, "total cases for primary site");

        let cohort = CohortResolver::resolve(&mut *self.api, site)?;
        if cohort.is_empty() {
            warn!(site = %site, "no open-access MAF cases found, skipping site");
            return Ok(SiteOutcome::SkippedEmptyCohort);
        }

        let discovery = self.discovery()?;
        let ranker =
            GeneRanker::new(self.settings.top_n_genes).with_candidate_limit(self.settings.gene_limit);
        let ranked = match ranker.rank(
            &mut *self.api,
            &cohort,
            discovery.as_ref(),
            &self.cancel,
            self.sink,
        )? {
            Step::Completed(ranked) => ranked,
            Step::Interrupted => {
                return Ok(SiteOutcome::Interrupted {
                    completed_genes: progress.len(),
                });
            }
        };
        info!(genes = ranked.len(), "processing ranked genes");

        let rows = match self.process_genes(&ranked, &cohort, &mut progress)? {
            Step::Completed(rows) => rows,
            Step::Interrupted => {
                return Ok(SiteOutcome::Interrupted {
                    completed_genes: progress.len(),
                });
            }
        };
        info!(mutations = rows.len(), "total mutations collected");

        let report = save_all_mutations(rows, &layout.report_path(self.today))?;
        progress.clear()?;
        Ok(SiteOutcome::Completed {
            genes: ranked.len(),
            report,
        })
    }

    /// Collects rows for every ranked gene not already in the progress log.
    /// Each finished gene is flushed to the log before the next one starts.
    pub fn process_genes(
        &mut self,
        genes: &[RankedGene],
        cohort: &Cohort,
        progress: &mut ProgressLog,
    ) -> Result<Step<Vec<MutationRow>>, GdcError> {
        let mut rows = Vec::new();
        self.sink.event(ProgressEvent::Begin {
            label: format!("mutations for {}", cohort.site()),
            total: genes.len() as u64,
        });

        for (index, gene) in genes.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.sink.event(ProgressEvent::End);
                return Ok(Step::Interrupted);
            }
            if progress.contains(&gene.symbol) {
                info!(symbol = %gene.symbol, "already completed, skipping");
                self.sink.event(ProgressEvent::Tick {
                    message: gene.symbol.to_string(),
                });
                continue;
            }

            info!("[{}/{}] processing {}", index + 1, genes.len(), gene.symbol);
            match self.process_gene(gene, cohort)? {
                GeneOutcome::Rows(gene_rows) => {
                    info!(symbol = %gene.symbol, mutations = gene_rows.len(), "collected mutations");
                    rows.extend(gene_rows);
                }
                GeneOutcome::NoMutations => {
                    warn!(symbol = %gene.symbol, "no mutations found");
                }
                GeneOutcome::Interrupted => {
                    self.sink.event(ProgressEvent::End);
                    return Ok(Step::Interrupted);
                }
            }
            progress.mark_completed(&gene.symbol)?;
            self.sink.event(ProgressEvent::Tick {
                message: gene.symbol.to_string(),
            });
        }

        self.sink.event(ProgressEvent::End);
        Ok(Step::Completed(rows))
    }

    pub fn process_gene(
        &mut self,
        gene: &RankedGene,
        cohort: &Cohort,
    ) -> Result<GeneOutcome, GdcError> {
        let portal_cases = count_cases(&mut *self.api, &gene.id, None, None)?;
        info!(
            symbol = %gene.symbol,
            cohort = gene.cohort_affected_cases,
            gdc = portal_cases,
            "gene case counts"
        );

        let aggregator = MutationAggregator::new(self.settings.min_affected_pct);
        let mutations = match aggregator.fetch_mutations(
            &mut *self.api,
            &gene.id,
            cohort.site(),
            cohort.size(),
            &self.cancel,
        )? {
            Step::Completed(mutations) => mutations,
            Step::Interrupted => return Ok(GeneOutcome::Interrupted),
        };
        if mutations.is_empty() {
            return Ok(GeneOutcome::NoMutations);
        }

        let totals = GeneTotals {
            cohort_cases: gene.cohort_affected_cases,
            portal_cases,
        };
        let mut rows = Vec::with_capacity(mutations.len());
        for mutation in &mutations {
            if self.cancel.is_cancelled() {
                return Ok(GeneOutcome::Interrupted);
            }
            let portal_affected =
                MutationAggregator::portal_wide_stats(&mut *self.api, mutation.ssm_id())?;
            rows.push(format_mutation(
                &mutation.hit,
                &gene.symbol,
                mutation.num_affected,
                totals,
                portal_affected,
            ));
        }
        Ok(GeneOutcome::Rows(rows))
    }

    /// Sites eligible for an all-sites run, after the case-count and
    /// already-downloaded filters.
    pub fn eligible_sites(
        &mut self,
        options: &AllSitesOptions,
    ) -> Result<(Vec<SiteSummary>, Vec<String>), GdcError> {
        let sites = self.api.primary_sites()?;
        info!(sites = sites.len(), "found primary sites");

        let mut eligible = Vec::new();
        let mut skipped = Vec::new();
        for summary in sites {
            if summary.case_count < options.min_cases {
                continue;
            }
            if options.skip_downloaded {
                let downloaded = match summary.site.parse::<PrimarySite>() {
                    Ok(site) => self.layout(&site).has_report()?,
                    Err(_) => false,
                };
                if downloaded {
                    skipped.push(summary.site);
                    continue;
                }
            }
            eligible.push(summary);
        }
        if !skipped.is_empty() {
            info!(count = skipped.len(), "skipping already downloaded sites");
        }
        Ok((eligible, skipped))
    }

    /// Runs every eligible site. A failing site is logged and the run moves on;
    /// an interrupt stops the whole run.
    pub fn run_all_sites(&mut self, options: &AllSitesOptions) -> Result<AllSitesSummary, GdcError> {
        let (sites, skipped) = self.eligible_sites(options)?;
        let mut summary = AllSitesSummary {
            skipped,
            ..AllSitesSummary::default()
        };

        info!(
            sites = sites.len(),
            min_cases = options.min_cases,
            "processing primary sites"
        );
        for (index, entry) in sites.iter().enumerate() {
            info!("  {}. {}: {} cases", index + 1, entry.site, entry.case_count);
        }

        for (index, entry) in sites.iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }
            info!("[{}/{}] starting {}", index + 1, sites.len(), entry.site);
            let site: PrimarySite = match entry.site.parse() {
                Ok(site) => site,
                Err(err) => {
                    warn!(site = %entry.site, "{err}");
                    summary.failed.push(entry.site.clone());
                    continue;
                }
            };
            match self.run_site(&site) {
                Ok(SiteOutcome::Completed { .. }) => summary.processed.push(entry.site.clone()),
                Ok(SiteOutcome::SkippedEmptyCohort) => summary.skipped.push(entry.site.clone()),
                Ok(SiteOutcome::Interrupted { .. }) => {
                    summary.interrupted = true;
                    break;
                }
                Err(err) => {
                    error!(site = %entry.site, "site failed: {err}");
                    summary.failed.push(entry.site.clone());
                }
            }
        }
        Ok(summary)
    }
}
