use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use indicatif::MultiProgress;
use miette::IntoDiagnostic;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gdc_frequent_mutations::config::{Config, ConfigLoader, Settings};
use gdc_frequent_mutations::control::{CancelToken, Interrupt, ProgressSink};
use gdc_frequent_mutations::domain::DiscoveryStrategy;
use gdc_frequent_mutations::error::GdcError;
use gdc_frequent_mutations::gdc::{GdcApi, GdcClient};
use gdc_frequent_mutations::output::{BarSink, JsonOutput, LogWriter, OutputMode};
use gdc_frequent_mutations::pipeline::{AllSitesOptions, Pipeline, SiteOutcome};

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "gdc-fm")]
#[command(about = "Frequent somatic mutations of top cancer genes from the GDC portal")]
#[command(version, author)]
struct Cli {
    /// Settings file (defaults to ./gdc-fm.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print JSON results instead of progress bars
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download frequent mutations for one primary site")]
    Run(RunArgs),
    #[command(about = "Download frequent mutations for every primary site")]
    All(AllArgs),
    #[command(about = "List primary sites with open-access MAF cases")]
    Sites,
}

#[derive(Args, Clone, Default)]
struct Overrides {
    #[arg(long)]
    top_genes: Option<usize>,

    #[arg(long)]
    min_affected_pct: Option<f64>,

    #[arg(long)]
    output_dir: Option<String>,

    #[arg(long)]
    strategy: Option<DiscoveryStrategy>,

    /// Local cancer gene census list, one symbol per line
    #[arg(long)]
    census_file: Option<String>,

    /// Only count the first N discovered genes
    #[arg(long)]
    gene_limit: Option<usize>,

    #[arg(long)]
    page_size: Option<usize>,

    #[arg(long)]
    max_retries: Option<usize>,

    /// Requests allowed per rate-limit window
    #[arg(long)]
    rate_limit: Option<usize>,

    /// Rate-limit window in seconds
    #[arg(long)]
    rate_window: Option<f64>,

    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Primary site, e.g. "Breast"
    #[arg(long)]
    site: Option<String>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Args, Clone)]
struct AllArgs {
    /// Skip sites with fewer cases than this
    #[arg(long, default_value_t = 0)]
    min_cases: u64,

    /// Re-download sites that already have a report
    #[arg(long)]
    no_skip_downloaded: bool,

    #[command(flatten)]
    overrides: Overrides,
}

enum RunStatus {
    Done,
    Interrupted,
}

fn main() -> ExitCode {
    match run() {
        Ok(RunStatus::Done) => ExitCode::SUCCESS,
        Ok(RunStatus::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(gdc) = report.downcast_ref::<GdcError>() {
                return ExitCode::from(map_exit_code(gdc));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &GdcError) -> u8 {
    match error {
        GdcError::Request { .. } | GdcError::HttpSetup(_) => 3,
        GdcError::ConfigRead(_)
        | GdcError::ConfigParse(_)
        | GdcError::InvalidGeneSymbol(_)
        | GdcError::InvalidSite(_)
        | GdcError::CensusRead { .. } => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<RunStatus> {
    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let bars = MultiProgress::new();
    let log_bars = bars.clone();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(move || LogWriter::new(log_bars.clone()))
        .init();

    let config = ConfigLoader::load(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Commands::Run(RunArgs::default()));

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || match handler_token.signal() {
        Interrupt::First => {
            eprintln!("interrupt received, stopping after the current request (press again to quit now)");
        }
        // The progress log is only ever replaced atomically, so it stays valid.
        Interrupt::Repeated => std::process::exit(i32::from(EXIT_INTERRUPTED)),
    }) {
        warn!("could not install interrupt handler: {err}");
    }

    match command {
        Commands::Run(args) => {
            let mut config = apply_overrides(config, &args.overrides);
            if args.site.is_some() {
                config.primary_site = args.site;
            }
            let settings = ConfigLoader::resolve_config(config)?;
            run_site(&settings, cancel, output_mode, bars)
        }
        Commands::All(args) => {
            let settings = ConfigLoader::resolve_config(apply_overrides(config, &args.overrides))?;
            let options = AllSitesOptions {
                min_cases: args.min_cases,
                skip_downloaded: !args.no_skip_downloaded,
            };
            run_all(&settings, &options, cancel, output_mode, bars)
        }
        Commands::Sites => {
            let settings = ConfigLoader::resolve_config(config)?;
            let mut client = GdcClient::connect(settings.http.clone())?;
            let sites = client.primary_sites()?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_sites(&sites).into_diagnostic()?,
                OutputMode::Interactive => {
                    for (index, site) in sites.iter().enumerate() {
                        println!("{:>3}. {}: {} cases", index + 1, site.site, site.case_count);
                    }
                }
            }
            Ok(RunStatus::Done)
        }
    }
}

fn apply_overrides(mut config: Config, overrides: &Overrides) -> Config {
    let overrides = overrides.clone();
    if overrides.top_genes.is_some() {
        config.top_n_genes = overrides.top_genes;
    }
    if overrides.min_affected_pct.is_some() {
        config.min_affected_pct = overrides.min_affected_pct;
    }
    if overrides.output_dir.is_some() {
        config.output_dir = overrides.output_dir;
    }
    if overrides.strategy.is_some() {
        config.strategy = overrides.strategy;
    }
    if overrides.census_file.is_some() {
        config.census_file = overrides.census_file;
    }
    if overrides.gene_limit.is_some() {
        config.gene_limit = overrides.gene_limit;
    }
    if overrides.page_size.is_some() {
        config.page_size = overrides.page_size;
    }
    if overrides.max_retries.is_some() {
        config.max_retries = overrides.max_retries;
    }
    if overrides.base_url.is_some() {
        config.base_url = overrides.base_url;
    }
    if overrides.rate_limit.is_some() || overrides.rate_window.is_some() {
        let mut rate_limit = config.rate_limit.take().unwrap_or_default();
        if overrides.rate_limit.is_some() {
            rate_limit.max_requests = overrides.rate_limit;
        }
        if overrides.rate_window.is_some() {
            rate_limit.window_secs = overrides.rate_window;
        }
        config.rate_limit = Some(rate_limit);
    }
    config
}

fn make_sink(output_mode: OutputMode, bars: MultiProgress) -> Box<dyn ProgressSink> {
    match output_mode {
        OutputMode::Interactive => Box::new(BarSink::new(bars)),
        OutputMode::NonInteractive => Box::new(JsonOutput),
    }
}

fn run_site(
    settings: &Settings,
    cancel: CancelToken,
    output_mode: OutputMode,
    bars: MultiProgress,
) -> miette::Result<RunStatus> {
    let mut client = GdcClient::connect(settings.http.clone())?;
    let sink = make_sink(output_mode, bars);
    let mut pipeline = Pipeline::new(&mut client, settings, cancel, sink.as_ref());

    let site = settings.primary_site.clone();
    let outcome = pipeline.run_site(&site)?;
    if let OutputMode::NonInteractive = output_mode {
        JsonOutput::print_site(&outcome).into_diagnostic()?;
    }

    match outcome {
        SiteOutcome::Completed { report, .. } => {
            match report {
                Some(report) => info!(path = %report.path, rows = report.unique_rows, "download complete"),
                None => warn!("download complete, no mutations qualified"),
            }
            Ok(RunStatus::Done)
        }
        SiteOutcome::SkippedEmptyCohort => Ok(RunStatus::Done),
        SiteOutcome::Interrupted { completed_genes } => {
            warn!(completed_genes, "download interrupted, progress saved; run again to resume");
            Ok(RunStatus::Interrupted)
        }
    }
}

fn run_all(
    settings: &Settings,
    options: &AllSitesOptions,
    cancel: CancelToken,
    output_mode: OutputMode,
    bars: MultiProgress,
) -> miette::Result<RunStatus> {
    let mut client = GdcClient::connect(settings.http.clone())?;
    let sink = make_sink(output_mode, bars);
    let mut pipeline = Pipeline::new(&mut client, settings, cancel, sink.as_ref());

    let summary = pipeline.run_all_sites(options)?;
    if let OutputMode::NonInteractive = output_mode {
        JsonOutput::print_all_sites(&summary).into_diagnostic()?;
    }
    info!(
        processed = summary.processed.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "all sites finished"
    );

    if summary.interrupted {
        warn!("download interrupted");
        return Ok(RunStatus::Interrupted);
    }
    Ok(RunStatus::Done)
}
