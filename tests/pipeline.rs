mod support;

use std::cell::Cell;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;

use gdc_frequent_mutations::config::{Config, ConfigLoader, Settings};
use gdc_frequent_mutations::control::{CancelToken, NoopSink, ProgressEvent, ProgressSink};
use gdc_frequent_mutations::gdc::SiteSummary;
use gdc_frequent_mutations::pipeline::{AllSitesOptions, Pipeline, SiteOutcome};
use gdc_frequent_mutations::progress::ProgressLog;
use gdc_frequent_mutations::store::SiteLayout;

use support::{MockApi, site, ssm_with_cases, symbol};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

fn settings(root: &Utf8Path) -> Settings {
    ConfigLoader::resolve_config(Config {
        output_dir: Some(root.to_string()),
        top_n_genes: Some(10),
        ..Config::default()
    })
    .unwrap()
}

fn ids(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i}")).collect()
}

/// Cohort of four cases with TP53 mutated in three and KRAS in two.
fn portal() -> MockApi {
    let mut api = MockApi {
        site_cases: 1098,
        cohort: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        ..MockApi::default()
    };
    api.bucket("TP53", 30);
    api.bucket("KRAS", 20);
    api.add_gene("TP53", "G-TP53", true);
    api.add_gene("KRAS", "G-KRAS", true);
    api.site_case_ids
        .insert("G-TP53".into(), vec!["a".into(), "b".into(), "c".into(), "zz".into()]);
    api.site_case_ids
        .insert("G-KRAS".into(), vec!["a".into(), "b".into()]);
    api.portal_case_ids.insert("G-TP53".into(), ids("p", 40));
    api.portal_case_ids.insert("G-KRAS".into(), ids("k", 20));
    api.mutations.insert(
        "G-TP53".into(),
        vec![vec![
            ssm_with_cases("m1", "chr17:g.7675088C>T", 2),
            ssm_with_cases("m2", "chr17:g.7674220C>T", 1),
        ]],
    );
    api.mutations.insert(
        "G-KRAS".into(),
        vec![vec![ssm_with_cases("m3", "chr12:g.25245350C>T", 2)]],
    );
    api.portal_counts.insert("m1".into(), 8);
    api.portal_counts.insert("m2".into(), 4);
    api.portal_counts.insert("m3".into(), 10);
    api
}

fn report_rows(path: &Utf8PathBuf) -> Vec<Vec<String>> {
    std::fs::read_to_string(path.as_std_path())
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

/// Cancels the run once the first gene of the mutation phase finished.
struct CancelAfterFirstGene {
    cancel: CancelToken,
    armed: Cell<bool>,
}

impl ProgressSink for CancelAfterFirstGene {
    fn event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Begin { label, .. } => self.armed.set(label.starts_with("mutations")),
            ProgressEvent::Tick { .. } if self.armed.get() => self.cancel.cancel(),
            _ => {}
        }
    }
}

#[test]
fn run_site_writes_sorted_report_and_clears_progress() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let settings = settings(root);
    let breast = site("Breast");
    let mut api = portal();

    let outcome = Pipeline::new(&mut api, &settings, CancelToken::new(), &NoopSink)
        .with_date(date())
        .run_site(&breast)
        .unwrap();

    let layout = SiteLayout::new(root, &breast);
    let report = layout.report_path(date());
    assert_matches!(
        outcome,
        SiteOutcome::Completed { genes: 2, report: Some(ref summary) } if summary.unique_rows == 3
    );
    assert!(report.as_str().ends_with("Breast Cancer/frequent-mutations.2024-05-01.tsv"));
    assert!(!layout.progress_path().as_std_path().exists());

    let rows = report_rows(&report);
    let order: Vec<&str> = rows.iter().map(|row| row[0].as_str()).collect();
    assert_eq!(order, ["m3", "m1", "m2"]);

    // m1: 2 of the 3 cohort cases with TP53, 8 of its 40 portal cases
    let m1 = &rows[1];
    assert_eq!(m1[1], "TP53");
    assert_eq!(m1[6], "2");
    assert_eq!(m1[7], "3");
    assert_eq!(m1[8], "66.67");
    assert_eq!(m1[9], "8");
    assert_eq!(m1[10], "40");
    assert_eq!(m1[11], "20.0");
    assert_eq!(api.mutation_calls, ["G-TP53", "G-KRAS"]);
}

#[test]
fn interrupted_run_resumes_without_redoing_genes() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let settings = settings(root);
    let breast = site("Breast");
    let layout = SiteLayout::new(root, &breast);
    let mut api = portal();

    let cancel = CancelToken::new();
    let sink = CancelAfterFirstGene {
        cancel: cancel.clone(),
        armed: Cell::new(false),
    };
    let outcome = Pipeline::new(&mut api, &settings, cancel, &sink)
        .with_date(date())
        .run_site(&breast)
        .unwrap();
    assert_eq!(outcome, SiteOutcome::Interrupted { completed_genes: 1 });
    assert!(!layout.report_path(date()).as_std_path().exists());

    let progress = ProgressLog::load(&layout.progress_path()).unwrap();
    assert_eq!(progress.completed(), ["TP53"]);

    api.mutation_calls.clear();
    let outcome = Pipeline::new(&mut api, &settings, CancelToken::new(), &NoopSink)
        .with_date(date())
        .run_site(&breast)
        .unwrap();
    assert_matches!(outcome, SiteOutcome::Completed { genes: 2, .. });
    assert_eq!(api.mutation_calls, ["G-KRAS"]);

    let rows = report_rows(&layout.report_path(date()));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], "KRAS");
    assert!(!layout.progress_path().as_std_path().exists());
}

#[test]
fn genes_without_mutations_count_as_completed() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let settings = settings(root);
    let breast = site("Breast");
    let mut api = portal();
    api.mutations.remove("G-KRAS");

    let outcome = Pipeline::new(&mut api, &settings, CancelToken::new(), &NoopSink)
        .with_date(date())
        .run_site(&breast)
        .unwrap();
    assert_matches!(outcome, SiteOutcome::Completed { report: Some(ref summary), .. } if summary.unique_rows == 2);
}

#[test]
fn failure_keeps_progress_of_finished_genes() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let settings = settings(root);
    let breast = site("Breast");
    let mut api = portal();
    api.fail_mutations_for = Some("G-KRAS".into());

    let result = Pipeline::new(&mut api, &settings, CancelToken::new(), &NoopSink)
        .with_date(date())
        .run_site(&breast);
    assert!(result.is_err_and(|err| err.is_request()));

    let layout = SiteLayout::new(root, &breast);
    let progress = ProgressLog::load(&layout.progress_path()).unwrap();
    assert!(progress.contains(&symbol("TP53")));
    assert!(!progress.contains(&symbol("KRAS")));
}

#[test]
fn empty_cohort_skips_site() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let settings = settings(root);
    let mut api = portal();
    api.cohort.clear();

    let outcome = Pipeline::new(&mut api, &settings, CancelToken::new(), &NoopSink)
        .run_site(&site("Eye and adnexa"))
        .unwrap();
    assert_eq!(outcome, SiteOutcome::SkippedEmptyCohort);
    assert!(api.mutation_calls.is_empty());
    assert!(api.gene_lookups.is_empty());
}

#[test]
fn all_sites_filters_and_skips_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let settings = settings(root);
    let mut api = portal();
    api.sites = vec![
        SiteSummary { site: "Breast".into(), case_count: 1098 },
        SiteSummary { site: "Kidney".into(), case_count: 5 },
        SiteSummary { site: "Skin".into(), case_count: 470 },
    ];
    let skin_dir = root.join("Skin Cancer");
    std::fs::create_dir_all(skin_dir.as_std_path()).unwrap();
    std::fs::write(skin_dir.join("frequent-mutations.2024-01-01.tsv").as_std_path(), "").unwrap();

    let options = AllSitesOptions {
        min_cases: 10,
        skip_downloaded: true,
    };
    let summary = Pipeline::new(&mut api, &settings, CancelToken::new(), &NoopSink)
        .with_date(date())
        .run_all_sites(&options)
        .unwrap();

    assert_eq!(summary.processed, ["Breast"]);
    assert_eq!(summary.skipped, ["Skin"]);
    assert!(summary.failed.is_empty());
    assert!(!summary.interrupted);
}

#[test]
fn all_sites_continues_after_a_failing_site() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let settings = settings(root);
    let mut api = portal();
    api.fail_mutations_for = Some("G-TP53".into());
    api.sites = vec![
        SiteSummary { site: "Breast".into(), case_count: 1098 },
        SiteSummary { site: "Bronchus and lung".into(), case_count: 1089 },
    ];

    let options = AllSitesOptions {
        min_cases: 0,
        skip_downloaded: false,
    };
    let summary = Pipeline::new(&mut api, &settings, CancelToken::new(), &NoopSink)
        .run_all_sites(&options)
        .unwrap();
    assert_eq!(summary.failed, ["Breast", "Bronchus and lung"]);
    assert!(summary.processed.is_empty());
}

#[test]
fn cancelled_all_sites_run_stops() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let settings = settings(root);
    let mut api = portal();
    api.sites = vec![SiteSummary { site: "Breast".into(), case_count: 1098 }];
    let cancel = CancelToken::new();
    cancel.cancel();

    let summary = Pipeline::new(&mut api, &settings, cancel, &NoopSink)
        .run_all_sites(&AllSitesOptions { min_cases: 0, skip_downloaded: false })
        .unwrap();
    assert!(summary.interrupted);
    assert!(summary.processed.is_empty());
}
