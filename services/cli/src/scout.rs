use crate::cli::Cli;
use rental_scout::config::{AppConfig, SearchConfig};
use rental_scout::error::AppError;
use rental_scout::search::{
    DedupStore, Emitter, FeeEnricher, HttpFetcher, ListingEnricher, NoEnrichment,
    PipelineSettings, QueryPlanner, RetryPolicy, SearchPipeline,
};
use rental_scout::telemetry;
use std::fs;
use std::io;
use tracing::{info, warn};

pub(crate) fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if cli.verbose {
        config.telemetry.verbose = true;
    }
    if let Some(path) = cli.config {
        config.search_config_path = path;
    }

    telemetry::init(&config.telemetry)?;
    let metrics = match cli.metrics_file {
        Some(_) => Some(telemetry::install_metrics()?),
        None => None,
    };

    let mut search = SearchConfig::from_path(&config.search_config_path)?;
    if cli.no_fees {
        search.criteria.fetch_fees = false;
    }
    let queries = QueryPlanner::new(&search.criteria).plan(cli.neighborhood.as_deref())?;

    let mut history = DedupStore::new(&search.history.path);
    if cli.clear_history {
        history.clear()?;
        info!(path = %history.path().display(), "dedup history cleared");
    }
    match history.load() {
        Ok(known) => info!(known, path = %history.path().display(), "dedup history loaded"),
        Err(err) => warn!(error = %err, "dedup history unreadable, starting empty"),
    }

    let fetcher = HttpFetcher::new(&config.http)?;
    let enricher: Box<dyn ListingEnricher + '_> = if search.criteria.fetch_fees {
        Box::new(
            FeeEnricher::new(&fetcher)
                .with_retry(RetryPolicy::from_config(&config.http))
                .with_timeout(config.http.detail_timeout)
                .with_pause(config.pacing.between_details),
        )
    } else {
        Box::new(NoEnrichment)
    };

    let filter_duplicates = search.history.filter_duplicates && !cli.no_dedup;
    let settings = PipelineSettings::from_config(
        &search.criteria,
        filter_duplicates,
        &config.http,
        &config.pacing,
    );
    info!(
        neighborhoods = queries.len(),
        max_pages = settings.max_pages,
        filter_duplicates,
        fetch_fees = search.criteria.fetch_fees,
        "starting search"
    );

    let pipeline = SearchPipeline::new(&search.criteria, &fetcher, settings).with_enricher(enricher);
    let stdout = io::stdout();
    let mut emitter = Emitter::new(stdout.lock());
    let summary = pipeline.run(&queries, &mut history, &mut emitter)?;

    let elapsed = summary.finished_at - summary.started_at;
    info!(
        emitted = summary.emitted(),
        failed_queries = summary.failures().count(),
        elapsed_secs = elapsed.num_seconds(),
        "search finished"
    );
    for failure in summary.failures() {
        warn!(neighborhood = %failure.neighborhood, page = failure.page, error = %failure.source, "neighborhood incomplete");
    }
    if let Some(err) = &summary.history_error {
        eprintln!("warning: listings were emitted but the history was not saved: {err}");
    }

    if let (Some(path), Some(handle)) = (&cli.metrics_file, &metrics) {
        fs::write(path, handle.render())?;
    }

    if summary.nothing_retrieved() {
        return Err(AppError::NothingRetrieved {
            failed_queries: summary.failures().count(),
        });
    }
    Ok(())
}
