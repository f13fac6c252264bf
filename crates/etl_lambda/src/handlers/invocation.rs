use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};

use etl_core::contract::{decode_request, resolve_target, InvocationResponse, PipelineRoute};
use etl_core::run_log::{RunLogEntry, RunStatus};
use etl_core::EtlError;

use crate::adapters::run_log_store::RunLogStore;
use crate::handlers::pipeline::{run_pipeline, PipelineDeps, PipelineSummary};
use crate::logging::PipelineLog;

pub struct InvocationDeps<'a> {
    pub pipeline: PipelineDeps<'a>,
    /// Metadata store; runs are not recorded when absent.
    pub run_log: Option<&'a dyn RunLogStore>,
    pub log_dir: &'a Path,
    /// Used when the event does not name a pipeline.
    pub default_target: Option<&'a str>,
}

pub async fn handle_invocation(
    event: Value,
    deps: &InvocationDeps<'_>,
) -> Result<InvocationResponse, EtlError> {
    let request = decode_request(event)?;
    let target = resolve_target(&request, deps.default_target);
    let route = PipelineRoute::parse(&target)?;
    tracing::info!(
        component = "invocation",
        event = "invocation_received",
        pipeline = target.as_str(),
        db_logging = deps.run_log.is_some(),
    );

    run_with_metadata(route, deps).await?;

    Ok(InvocationResponse {
        ok: true,
        pipeline: target,
        db_logging: deps.run_log.is_some(),
    })
}

/// Runs `route` between a `start` record and a `success`/`fail` record.
///
/// The pipeline's own error wins over a failure to write the closing record.
pub async fn run_with_metadata(
    route: PipelineRoute,
    deps: &InvocationDeps<'_>,
) -> Result<PipelineSummary, EtlError> {
    let pipeline_name = route.pipeline_name();
    let config = json!({
        "pipeline": route.as_str(),
        "load_method": route.mode().load_method().as_str(),
    });
    let mut log = PipelineLog::new(pipeline_name);

    let run_id = match deps.run_log {
        Some(store) => {
            let run_id = store
                .next_run_id(pipeline_name)
                .await
                .map_err(EtlError::RunLog)?;
            store
                .record(&run_log_entry(pipeline_name, run_id, RunStatus::Start, &config, None))
                .await
                .map_err(EtlError::RunLog)?;
            Some(run_id)
        }
        None => None,
    };

    let outcome = run_pipeline(route, &deps.pipeline, &mut log).await;
    let status = match &outcome {
        Ok(_) => {
            log.note("Pipeline run successful");
            RunStatus::Success
        }
        Err(error) => {
            log.failure(format!("Pipeline run failed. See detailed logs: {error}"));
            RunStatus::Fail
        }
    };

    let mut closing_error = None;
    if let (Some(store), Some(run_id)) = (deps.run_log, run_id) {
        let entry = run_log_entry(
            pipeline_name,
            run_id,
            status,
            &config,
            Some(log.contents()),
        );
        if let Err(error) = store.record(&entry).await {
            tracing::error!(
                component = "invocation",
                event = "run_log_failed",
                pipeline = pipeline_name,
                run_id,
                error = error.as_str(),
            );
            closing_error = Some(EtlError::RunLog(error));
        }
    }

    if let Err(error) = log.persist(deps.log_dir).await {
        tracing::warn!(
            component = "invocation",
            event = "log_file_failed",
            pipeline = pipeline_name,
            error = error.as_str(),
        );
    }

    let summary = outcome?;
    match closing_error {
        Some(error) => Err(error),
        None => Ok(summary),
    }
}

fn run_log_entry(
    pipeline_name: &str,
    run_id: i32,
    status: RunStatus,
    config: &Value,
    logs: Option<String>,
) -> RunLogEntry {
    RunLogEntry {
        pipeline_name: pipeline_name.to_string(),
        run_id,
        timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        status,
        config: config.clone(),
        logs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use etl_core::report::Quarter;

    use crate::handlers::pipeline::tests::{
        balance_grid, balance_key, egresos_grid, egresos_key, text_column, MemorySource,
        NamedGridDecoder, RecordingWarehouse,
    };

    #[derive(Default)]
    struct RecordingRunLog {
        entries: Mutex<Vec<RunLogEntry>>,
        fail_closing_record: bool,
    }

    impl RecordingRunLog {
        fn entries(&self) -> Vec<RunLogEntry> {
            self.entries.lock().expect("poisoned mutex").clone()
        }
    }

    #[async_trait]
    impl RunLogStore for RecordingRunLog {
        async fn next_run_id(&self, pipeline_name: &str) -> Result<i32, String> {
            let current = self
                .entries
                .lock()
                .expect("poisoned mutex")
                .iter()
                .filter(|entry| entry.pipeline_name == pipeline_name)
                .map(|entry| entry.run_id)
                .max();
            Ok(etl_core::run_log::next_run_id(current))
        }

        async fn record(&self, entry: &RunLogEntry) -> Result<(), String> {
            if self.fail_closing_record && entry.status != RunStatus::Start {
                return Err("metadata database unavailable".to_string());
            }
            self.entries
                .lock()
                .expect("poisoned mutex")
                .push(entry.clone());
            Ok(())
        }
    }

    fn balance_source() -> MemorySource {
        MemorySource::new(&[(balance_key(2024, Quarter::Q1), "q1")])
    }

    fn balance_decoder() -> NamedGridDecoder {
        NamedGridDecoder::new(vec![("q1", balance_grid("al 31 de marzo de 2024"))])
    }

    #[tokio::test]
    async fn runs_requested_pipeline_without_metadata() {
        let logs = tempfile::tempdir().expect("tempdir should be created");
        let source = balance_source();
        let decoder = balance_decoder();
        let warehouse = RecordingWarehouse::default();
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: &source,
                decoder: &decoder,
                warehouse: &warehouse,
            },
            run_log: None,
            log_dir: logs.path(),
            default_target: Some("egresos_single"),
        };

        let response = handle_invocation(json!({"pipeline": "balance_single"}), &deps)
            .await
            .expect("invocation should succeed");

        assert_eq!(
            response,
            InvocationResponse {
                ok: true,
                pipeline: "balance_single".to_string(),
                db_logging: false,
            }
        );
        assert_eq!(warehouse.calls().len(), 1);
        let written: Vec<_> = std::fs::read_dir(logs.path())
            .expect("log dir should exist")
            .collect();
        assert_eq!(written.len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_default_target() {
        let logs = tempfile::tempdir().expect("tempdir should be created");
        let source = balance_source();
        let decoder = balance_decoder();
        let warehouse = RecordingWarehouse::default();
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: &source,
                decoder: &decoder,
                warehouse: &warehouse,
            },
            run_log: None,
            log_dir: logs.path(),
            default_target: Some("balance_bulk"),
        };

        let response = handle_invocation(Value::Null, &deps)
            .await
            .expect("invocation should succeed");
        assert_eq!(response.pipeline, "balance_bulk");
        assert_eq!(
            warehouse.calls()[0].method,
            etl_core::schema::LoadMethod::Replace
        );
    }

    #[tokio::test]
    async fn rejects_unknown_pipeline_before_running() {
        let logs = tempfile::tempdir().expect("tempdir should be created");
        let source = balance_source();
        let decoder = balance_decoder();
        let warehouse = RecordingWarehouse::default();
        let run_log = RecordingRunLog::default();
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: &source,
                decoder: &decoder,
                warehouse: &warehouse,
            },
            run_log: Some(&run_log),
            log_dir: logs.path(),
            default_target: None,
        };

        let error = handle_invocation(json!({"pipeline": "gastos"}), &deps)
            .await
            .expect_err("unknown pipeline should fail");

        assert_eq!(
            error.to_string(),
            "Unknown pipeline 'gastos'. Valid: ['egresos_single', 'egresos_bulk', \
             'ingresos_single', 'ingresos_bulk', 'balance_single', 'balance_bulk']"
        );
        assert!(run_log.entries().is_empty());
        assert!(warehouse.calls().is_empty());
    }

    #[tokio::test]
    async fn records_start_and_success_with_logs() {
        let logs = tempfile::tempdir().expect("tempdir should be created");
        let source = balance_source();
        let decoder = balance_decoder();
        let warehouse = RecordingWarehouse::default();
        let run_log = RecordingRunLog::default();
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: &source,
                decoder: &decoder,
                warehouse: &warehouse,
            },
            run_log: Some(&run_log),
            log_dir: logs.path(),
            default_target: None,
        };

        let response = handle_invocation(json!({"pipeline": "balance_single"}), &deps)
            .await
            .expect("invocation should succeed");
        assert!(response.db_logging);

        let entries = run_log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, RunStatus::Start);
        assert_eq!(entries[0].run_id, 1);
        assert_eq!(entries[0].logs, None);
        assert_eq!(entries[1].status, RunStatus::Success);
        assert_eq!(entries[1].pipeline_name, "balance_presupuestario_pipeline");
        assert_eq!(entries[1].config["load_method"], "upsert");
        let logs_text = entries[1].logs.clone().unwrap_or_default();
        assert!(logs_text.contains("499 | Load completed successfully"));
        assert!(logs_text.contains("Pipeline run successful"));
    }

    #[tokio::test]
    async fn records_failure_and_still_propagates_error() {
        let logs = tempfile::tempdir().expect("tempdir should be created");
        let source = balance_source();
        let decoder = balance_decoder();
        let warehouse = RecordingWarehouse::failing("disk full");
        let run_log = RecordingRunLog::default();
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: &source,
                decoder: &decoder,
                warehouse: &warehouse,
            },
            run_log: Some(&run_log),
            log_dir: logs.path(),
            default_target: None,
        };

        let error = handle_invocation(json!({"pipeline": "balance_single"}), &deps)
            .await
            .expect_err("load failure should propagate");
        assert_eq!(error.to_string(), "Single load (upsert) failed: disk full");

        let entries = run_log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].status, RunStatus::Fail);
        assert!(entries[1]
            .logs
            .as_deref()
            .unwrap_or_default()
            .contains("Pipeline run failed. See detailed logs: Single load (upsert) failed"));
    }

    #[tokio::test]
    async fn run_ids_increment_per_pipeline() {
        let logs = tempfile::tempdir().expect("tempdir should be created");
        let source = balance_source();
        let decoder = balance_decoder();
        let warehouse = RecordingWarehouse::default();
        let run_log = RecordingRunLog::default();
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: &source,
                decoder: &decoder,
                warehouse: &warehouse,
            },
            run_log: Some(&run_log),
            log_dir: logs.path(),
            default_target: None,
        };

        for _ in 0..2 {
            handle_invocation(json!({"pipeline": "balance_single"}), &deps)
                .await
                .expect("invocation should succeed");
        }
        let run_ids: Vec<i32> = run_log.entries().iter().map(|entry| entry.run_id).collect();
        assert_eq!(run_ids, vec![1, 1, 2, 2]);
    }

    #[tokio::test]
    async fn closing_record_failure_surfaces_after_successful_run() {
        let logs = tempfile::tempdir().expect("tempdir should be created");
        let source = balance_source();
        let decoder = balance_decoder();
        let warehouse = RecordingWarehouse::default();
        let run_log = RecordingRunLog {
            fail_closing_record: true,
            ..RecordingRunLog::default()
        };
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: &source,
                decoder: &decoder,
                warehouse: &warehouse,
            },
            run_log: Some(&run_log),
            log_dir: logs.path(),
            default_target: None,
        };

        let error = handle_invocation(json!({"pipeline": "balance_single"}), &deps)
            .await
            .expect_err("metadata failure should surface");
        assert_eq!(
            error.to_string(),
            "Failed to log metadata: metadata database unavailable"
        );
        assert_eq!(warehouse.calls().len(), 1);
    }

    #[tokio::test]
    async fn egresos_single_upserts_sections_and_reports_route() {
        let logs = tempfile::tempdir().expect("tempdir should be created");
        let source = MemorySource::new(&[(egresos_key(2024, Quarter::Q1), "egresos-q1")]);
        let decoder = NamedGridDecoder::new(vec![("egresos-q1", egresos_grid())]);
        let warehouse = RecordingWarehouse::default();
        let deps = InvocationDeps {
            pipeline: PipelineDeps {
                source: &source,
                decoder: &decoder,
                warehouse: &warehouse,
            },
            run_log: None,
            log_dir: logs.path(),
            default_target: None,
        };

        let response = handle_invocation(json!({"pipeline": "egresos_single"}), &deps)
            .await
            .expect("invocation should succeed");

        assert_eq!(
            serde_json::to_value(&response).expect("response should serialize"),
            json!({"ok": true, "pipeline": "egresos_single", "db_logging": false})
        );
        let calls = warehouse.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].table, "nuevo_leon_egresos_detallado");
        assert_eq!(calls[0].method, etl_core::schema::LoadMethod::Upsert);
        // Rows after the blank concept cell are not part of section II.
        let sections: Vec<(Option<String>, Option<String>)> = calls[0]
            .rows
            .iter()
            .map(|row| (text_column(row, 1), text_column(row, 11)))
            .collect();
        assert_eq!(
            sections,
            vec![
                (Some("A1".to_string()), Some("I".to_string())),
                (Some("B1".to_string()), Some("II".to_string())),
            ]
        );
    }
}
