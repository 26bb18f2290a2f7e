use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;
use civic_shared::config::PipelineConfig;
use civic_shared::sockets::{handle_websocket_event, is_websocket_event};
use civic_shared::AppState;
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let pipeline_config = PipelineConfig::from_env();

    // Initialize AWS clients once at startup
    let config = aws_config::load_from_env().await;

    // API Gateway Management client for WebSocket (optional endpoint)
    let api_gateway_client = std::env::var("WS_API_ENDPOINT").ok().map(|endpoint| {
        let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(&config)
            .endpoint_url(endpoint)
            .build();
        ApiGatewayManagementClient::from_conf(api_config)
    });

    let state = AppState::new(
        pipeline_config,
        DynamoClient::new(&config),
        S3Client::new(&config),
        api_gateway_client,
    );

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move {
            if is_websocket_event(&event) {
                handle_websocket_event(event, state).await
            } else {
                http_handler::function_handler(event, state).await
            }
        }
    }))
    .await
}
