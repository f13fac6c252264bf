use std::time::Instant;

use etl_core::contract::{PipelineRoute, RunMode};
use etl_core::grid::Grid;
use etl_core::keys::assign_surrogate_keys;
use etl_core::report::{discover_periods, latest_period, object_key, Dataset, ReportPeriod};
use etl_core::schema::{LoadMethod, SqlValue, TableRecord};
use etl_core::transform::{BalanceRecord, DatasetRecord, EgresoRecord, IngresoRecord};
use etl_core::EtlError;

use crate::adapters::report_source::ReportSource;
use crate::adapters::warehouse::Warehouse;
use crate::adapters::workbook::WorkbookDecoder;
use crate::logging::PipelineLog;

/// Adapters one pipeline run reads from and writes to.
pub struct PipelineDeps<'a> {
    pub source: &'a dyn ReportSource,
    pub decoder: &'a dyn WorkbookDecoder,
    pub warehouse: &'a dyn Warehouse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub route: PipelineRoute,
    pub periods: Vec<ReportPeriod>,
    pub rows_loaded: u64,
}

pub async fn run_pipeline(
    route: PipelineRoute,
    deps: &PipelineDeps<'_>,
    log: &mut PipelineLog,
) -> Result<PipelineSummary, EtlError> {
    let started_at = Instant::now();
    let (periods, rows_loaded) = match route.dataset() {
        Dataset::EgresosDetallado => run_mode::<EgresoRecord>(route.mode(), deps, log).await?,
        Dataset::IngresosDetallado => run_mode::<IngresoRecord>(route.mode(), deps, log).await?,
        Dataset::BalancePresupuestario => {
            run_mode::<BalanceRecord>(route.mode(), deps, log).await?
        }
    };
    tracing::info!(
        component = "pipeline",
        event = "pipeline_completed",
        pipeline = route.pipeline_name(),
        periods = periods.len(),
        rows_loaded,
        duration_ms = started_at.elapsed().as_millis() as u64,
    );
    Ok(PipelineSummary {
        route,
        periods,
        rows_loaded,
    })
}

async fn run_mode<R: DatasetRecord>(
    mode: RunMode,
    deps: &PipelineDeps<'_>,
    log: &mut PipelineLog,
) -> Result<(Vec<ReportPeriod>, u64), EtlError> {
    match mode {
        RunMode::Single => run_single::<R>(deps, log).await,
        RunMode::Bulk => run_bulk::<R>(deps, log).await,
    }
}

async fn run_single<R: DatasetRecord>(
    deps: &PipelineDeps<'_>,
    log: &mut PipelineLog,
) -> Result<(Vec<ReportPeriod>, u64), EtlError> {
    let dataset = R::DATASET;
    log.info(100, format!("Starting ETL pipeline for {}", dataset.label()));

    let keys = list_report_keys(deps, dataset).await?;
    let period = latest_period(dataset, keys.iter().map(String::as_str)).ok_or_else(|| {
        EtlError::SourceMissing(format!(
            "No valid {} file found in {}.",
            dataset.label(),
            deps.source.name()
        ))
    })?;
    log.info(110, format!("Latest file detected: {period}"));

    log.info(200, format!("Extracting data from {}", deps.source.name()));
    let (grid, location) = extract(deps, dataset, period).await?;
    log.info(
        210,
        format!("Extracted rows: {} from {location}", grid.height()),
    );

    log.info(300, "Transforming data");
    let records = transform::<R>(&grid)?;
    log.info(310, format!("Transformed rows: {}", records.len()));

    log.info(400, "Preparing DB objects");
    log.info(410, "Loading data into PostgreSQL (upsert)");
    let loaded = load(deps, records, RunMode::Single.load_method())
        .await
        .map_err(|error| EtlError::warehouse(format!("Single load (upsert) failed: {error}")))?;
    log.info(499, "Load completed successfully");

    Ok((vec![period], loaded))
}

async fn run_bulk<R: DatasetRecord>(
    deps: &PipelineDeps<'_>,
    log: &mut PipelineLog,
) -> Result<(Vec<ReportPeriod>, u64), EtlError> {
    let dataset = R::DATASET;
    log.note(format!("Starting bulk pipeline run for {}", dataset.label()));

    let keys = list_report_keys(deps, dataset).await?;
    let periods = discover_periods(dataset, keys.iter().map(String::as_str));
    if periods.is_empty() {
        return Err(EtlError::SourceMissing(format!(
            "No valid {} files found for bulk processing.",
            dataset.label()
        )));
    }

    let mut processed = Vec::with_capacity(periods.len());
    let mut records: Vec<R> = Vec::new();
    for period in periods {
        log.info(100, format!("Processing {period}"));
        let grid = match extract(deps, dataset, period).await {
            Ok((grid, _)) => grid,
            Err(error @ EtlError::UnreadableReport { .. }) => {
                log.warn(400, strip_code(&error.to_string()));
                continue;
            }
            Err(error) => return Err(error),
        };
        records.extend(transform::<R>(&grid)?);
        processed.push(period);
    }

    if processed.is_empty() {
        return Err(EtlError::layout(
            "No data was extracted and transformed from any of the files.",
        ));
    }

    let loaded = load(deps, records, RunMode::Bulk.load_method())
        .await
        .map_err(|error| EtlError::warehouse(format!("Bulk load failed: {error}")))?;
    log.note(format!(
        "Loaded {loaded} rows from {} files",
        processed.len()
    ));
    Ok((processed, loaded))
}

async fn list_report_keys(
    deps: &PipelineDeps<'_>,
    dataset: Dataset,
) -> Result<Vec<String>, EtlError> {
    deps.source
        .list_keys(dataset.object_prefix())
        .await
        .map_err(EtlError::storage)
}

/// Reads and decodes one period's report; unreadable or blank sheets are
/// reported as [`EtlError::UnreadableReport`].
async fn extract(
    deps: &PipelineDeps<'_>,
    dataset: Dataset,
    period: ReportPeriod,
) -> Result<(Grid, String), EtlError> {
    let key = object_key(dataset, period);
    let location = deps.source.location(&key);
    let unreadable = |detail: String| {
        tracing::warn!(
            component = "pipeline",
            event = "report_unreadable",
            location = location.as_str(),
            error = detail.as_str(),
        );
        EtlError::UnreadableReport {
            location: location.clone(),
        }
    };

    let bytes = deps.source.read_object(&key).await.map_err(&unreadable)?;
    let grid = deps
        .decoder
        .decode(&bytes, dataset.sheet_name())
        .map_err(&unreadable)?;
    if grid.is_empty() {
        return Err(unreadable("sheet has no cells".to_string()));
    }
    Ok((grid, location.clone()))
}

fn transform<R: DatasetRecord>(grid: &Grid) -> Result<Vec<R>, EtlError> {
    let mut records = R::from_grid(grid)?;
    assign_surrogate_keys(&mut records);
    Ok(records)
}

async fn load<R: DatasetRecord>(
    deps: &PipelineDeps<'_>,
    records: Vec<R>,
    method: LoadMethod,
) -> Result<u64, String> {
    let rows: Vec<Vec<SqlValue>> = records.iter().map(TableRecord::values).collect();
    deps.warehouse.load(&R::table(), rows, method).await
}

fn strip_code(message: &str) -> &str {
    message
        .split_once(" | ")
        .map(|(_, rest)| rest)
        .unwrap_or(message)
}
