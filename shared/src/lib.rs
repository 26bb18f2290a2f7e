pub mod types;
pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod pipeline;
pub mod complaints;
pub mod directory;
pub mod responses;
pub mod sockets;
pub mod s3;

use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;

use config::PipelineConfig;
use events::{EventSink, LogEventSink};
use pipeline::{Classifier, HttpClassifier, IntakeService};
use sockets::WebSocketEventSink;
use store::DynamoStore;

/// Shared application state
pub struct AppState {
    pub config: PipelineConfig,
    pub store: Arc<DynamoStore>,
    pub s3_client: S3Client,
    pub events: Arc<dyn EventSink>,
    pub intake: IntakeService,
}

impl AppState {
    pub fn new(
        config: PipelineConfig,
        dynamo_client: DynamoClient,
        s3_client: S3Client,
        api_gateway_client: Option<ApiGatewayManagementClient>,
    ) -> Arc<Self> {
        let store = Arc::new(DynamoStore::new(dynamo_client.clone(), config.table_name.clone()));
        let events = event_sink(&config, dynamo_client, api_gateway_client);
        let classifier = classifier(&config);

        let intake = IntakeService::new(
            config.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            classifier,
            events.clone(),
        );

        Arc::new(Self {
            config,
            store,
            s3_client,
            events,
            intake,
        })
    }
}

/// WebSocket delivery when an endpoint is configured, log-only otherwise.
pub fn event_sink(
    config: &PipelineConfig,
    dynamo_client: DynamoClient,
    api_gateway_client: Option<ApiGatewayManagementClient>,
) -> Arc<dyn EventSink> {
    match api_gateway_client {
        Some(client) => Arc::new(WebSocketEventSink::new(
            dynamo_client,
            client,
            config.table_name.clone(),
        )),
        None => {
            tracing::info!("WS_API_ENDPOINT not set, events are logged only");
            Arc::new(LogEventSink)
        }
    }
}

fn classifier(config: &PipelineConfig) -> Option<Arc<dyn Classifier>> {
    let url = config.classifier_url.as_ref()?;
    match HttpClassifier::new(url.clone(), config.classifier_timeout) {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            tracing::warn!("Classifier disabled, using heuristic only: {}", e);
            None
        }
    }
}
