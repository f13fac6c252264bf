use std::time::Duration;

use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use etl_core::contract::InvocationResponse;
use etl_core::EtlError;

use crate::adapters::report_source::{LocalReportSource, ReportSource, S3ReportSource};
use crate::adapters::run_log_store::{PgRunLogStore, RunLogStore};
use crate::adapters::warehouse::PgWarehouse;
use crate::adapters::workbook::XlsxDecoder;
use crate::config::{DatabaseConfig, EtlConfig, SourceConfig};
use crate::handlers::invocation::{handle_invocation, InvocationDeps};
use crate::handlers::pipeline::PipelineDeps;

/// Long-lived adapters shared by every invocation of a warm container.
pub struct EtlRuntime {
    config: EtlConfig,
    source: Box<dyn ReportSource>,
    decoder: XlsxDecoder,
    warehouse: PgWarehouse,
    run_log: Option<PgRunLogStore>,
}

impl EtlRuntime {
    pub async fn from_config(config: EtlConfig) -> Self {
        let source: Box<dyn ReportSource> = match &config.source {
            SourceConfig::S3 { bucket } => {
                let aws_config =
                    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                Box::new(S3ReportSource::new(
                    bucket.clone(),
                    aws_sdk_s3::Client::new(&aws_config),
                ))
            }
            SourceConfig::Local { root } => Box::new(LocalReportSource::new(root.clone())),
        };

        let warehouse = PgWarehouse::new(lazy_pool(&config.warehouse));
        let run_log = config
            .run_log
            .as_ref()
            .map(|database| PgRunLogStore::new(lazy_pool(database)));

        tracing::info!(
            component = "runtime",
            event = "runtime_ready",
            source = source.name(),
            db_logging = run_log.is_some(),
        );

        Self {
            config,
            source,
            decoder: XlsxDecoder,
            warehouse,
            run_log,
        }
    }

    pub async fn handle(&self, event: Value) -> Result<InvocationResponse, EtlError> {
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: self.source.as_ref(),
                decoder: &self.decoder,
                warehouse: &self.warehouse,
            },
            run_log: self
                .run_log
                .as_ref()
                .map(|store| store as &dyn RunLogStore),
            log_dir: &self.config.log_dir,
            default_target: self.config.pipeline_target.as_deref(),
        };
        handle_invocation(event, &deps).await
    }
}

/// Connections open on first query so a cold start never blocks on the database.
fn lazy_pool(database: &DatabaseConfig) -> PgPool {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect_lazy_with(database.connect_options())
}
