use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

use etl_lambda::config::EtlConfig;
use etl_lambda::logging::init_tracing;
use etl_lambda::runtime::EtlRuntime;

async fn handle_request(runtime: &EtlRuntime, event: LambdaEvent<Value>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    let response = runtime.handle(payload).await.map_err(|error| {
        tracing::error!(
            component = "lambda",
            event = "invocation_failed",
            request_id = context.request_id.as_str(),
            error = %error,
        );
        Error::from(error.to_string())
    })?;
    serde_json::to_value(response)
        .map_err(|error| Error::from(format!("failed to serialize response: {error}")))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = EtlConfig::from_env().map_err(|error| Error::from(error.to_string()))?;
    let runtime = Arc::new(EtlRuntime::from_config(config).await);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let runtime = Arc::clone(&runtime);
        async move { handle_request(&runtime, event).await }
    }))
    .await
}
