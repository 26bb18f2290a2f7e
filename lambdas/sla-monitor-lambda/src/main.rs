use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::Utc;
use civic_shared::config::PipelineConfig;
use civic_shared::event_sink;
use civic_shared::pipeline::SlaMonitor;
use civic_shared::store::DynamoStore;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    let pipeline_config = PipelineConfig::from_env();
    let monitor = Arc::new(build_monitor(&pipeline_config).await);

    // Daemon mode runs the sweep on its own timer instead of a schedule rule
    if std::env::var("SLA_MONITOR_MODE").as_deref() == Ok("daemon") {
        Arc::clone(&monitor).spawn(pipeline_config.sla_sweep_interval).await?;
        return Ok(());
    }

    run(service_fn(move |event: LambdaEvent<serde_json::Value>| {
        let monitor = Arc::clone(&monitor);
        async move { function_handler(event, monitor).await }
    }))
    .await
}

async fn build_monitor(pipeline_config: &PipelineConfig) -> SlaMonitor {
    let config = aws_config::load_from_env().await;
    let dynamo_client = DynamoClient::new(&config);

    let api_gateway_client = std::env::var("WS_API_ENDPOINT").ok().map(|endpoint| {
        let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(&config)
            .endpoint_url(endpoint)
            .build();
        ApiGatewayManagementClient::from_conf(api_config)
    });

    let store = Arc::new(DynamoStore::new(
        dynamo_client.clone(),
        pipeline_config.table_name.clone(),
    ));
    let events = event_sink(pipeline_config, dynamo_client, api_gateway_client);
    SlaMonitor::new(store, events)
}

/// One sweep per scheduled invocation
async fn function_handler(
    event: LambdaEvent<serde_json::Value>,
    monitor: Arc<SlaMonitor>,
) -> Result<serde_json::Value, Error> {
    let source = event
        .payload
        .get("detail-type")
        .and_then(|v| v.as_str())
        .unwrap_or("direct invocation");
    tracing::info!("SLA sweep triggered by {} ({})", source, event.context.request_id);

    let report = monitor.sweep(Utc::now()).await?;
    Ok(serde_json::to_value(report)?)
}
