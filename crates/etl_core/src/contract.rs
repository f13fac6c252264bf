use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EtlError;
use crate::report::Dataset;
use crate::schema::LoadMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Latest published period only, upserted.
    Single,
    /// Every published period, replacing the table contents.
    Bulk,
}

impl RunMode {
    pub fn load_method(self) -> LoadMethod {
        match self {
            Self::Single => LoadMethod::Upsert,
            Self::Bulk => LoadMethod::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineRoute {
    EgresosSingle,
    EgresosBulk,
    IngresosSingle,
    IngresosBulk,
    BalanceSingle,
    BalanceBulk,
}

impl PipelineRoute {
    pub const ALL: [PipelineRoute; 6] = [
        Self::EgresosSingle,
        Self::EgresosBulk,
        Self::IngresosSingle,
        Self::IngresosBulk,
        Self::BalanceSingle,
        Self::BalanceBulk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EgresosSingle => "egresos_single",
            Self::EgresosBulk => "egresos_bulk",
            Self::IngresosSingle => "ingresos_single",
            Self::IngresosBulk => "ingresos_bulk",
            Self::BalanceSingle => "balance_single",
            Self::BalanceBulk => "balance_bulk",
        }
    }

    pub fn parse(target: &str) -> Result<Self, EtlError> {
        Self::ALL
            .into_iter()
            .find(|route| route.as_str() == target)
            .ok_or_else(|| EtlError::UnknownPipeline {
                target: target.to_string(),
                valid: Self::ALL
                    .iter()
                    .map(|route| format!("'{}'", route.as_str()))
                    .collect(),
            })
    }

    pub fn dataset(self) -> Dataset {
        match self {
            Self::EgresosSingle | Self::EgresosBulk => Dataset::EgresosDetallado,
            Self::IngresosSingle | Self::IngresosBulk => Dataset::IngresosDetallado,
            Self::BalanceSingle | Self::BalanceBulk => Dataset::BalancePresupuestario,
        }
    }

    pub fn mode(self) -> RunMode {
        match self {
            Self::EgresosSingle | Self::IngresosSingle | Self::BalanceSingle => RunMode::Single,
            Self::EgresosBulk | Self::IngresosBulk | Self::BalanceBulk => RunMode::Bulk,
        }
    }

    /// Name recorded in run logs and the metadata table.
    pub fn pipeline_name(self) -> &'static str {
        match self {
            Self::EgresosSingle => "egresos_detallado_pipeline",
            Self::EgresosBulk => "egresos_detallado_bulk_pipeline",
            Self::IngresosSingle => "ingresos_detallado_pipeline",
            Self::IngresosBulk => "ingresos_detallado_bulk_pipeline",
            Self::BalanceSingle => "balance_presupuestario_pipeline",
            Self::BalanceBulk => "balance_presupuestario_bulk_pipeline",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationRequest {
    #[serde(default)]
    pub pipeline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationResponse {
    pub ok: bool,
    pub pipeline: String,
    pub db_logging: bool,
}

/// Decodes a raw invocation event. `null` is treated as an empty request;
/// unrecognized keys are ignored. A non-string `pipeline` keeps its JSON text
/// so route lookup reports it as an unknown pipeline.
pub fn decode_request(event: Value) -> Result<InvocationRequest, EtlError> {
    match event {
        Value::Null => Ok(InvocationRequest::default()),
        Value::Object(mut fields) => {
            let pipeline = match fields.remove("pipeline") {
                None | Some(Value::Null) => None,
                Some(Value::String(name)) => Some(name),
                Some(other) => Some(other.to_string()),
            };
            Ok(InvocationRequest { pipeline })
        }
        _ => Err(EtlError::config(
            "invocation payload must be a JSON object",
        )),
    }
}

/// Target from the request, falling back to the configured default.
pub fn resolve_target(request: &InvocationRequest, fallback: Option<&str>) -> String {
    request
        .pipeline
        .as_deref()
        .filter(|value| !value.is_empty())
        .or(fallback)
        .unwrap_or_default()
        .to_string()
}
