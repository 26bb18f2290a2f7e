use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;

use super::connections::{get_connections_for_channel, remove_connection};
use crate::error::EventError;
use crate::events::{ComplaintEvent, EventSink};

/// Posts each event to every WebSocket connection on the event's channel.
pub struct WebSocketEventSink {
    dynamo_client: DynamoClient,
    api_gateway_client: ApiGatewayManagementClient,
    table_name: String,
}

impl WebSocketEventSink {
    pub fn new(
        dynamo_client: DynamoClient,
        api_gateway_client: ApiGatewayManagementClient,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            dynamo_client,
            api_gateway_client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl EventSink for WebSocketEventSink {
    async fn publish(&self, event: &ComplaintEvent) -> Result<(), EventError> {
        let connections =
            get_connections_for_channel(&self.dynamo_client, &self.table_name, &event.channel)
                .await?;
        let message_json =
            serde_json::to_string(event).map_err(|e| EventError::Delivery(e.to_string()))?;

        tracing::info!(
            "Broadcasting {:?} for {} to {} connections on {}",
            event.kind,
            event.complaint_id,
            connections.len(),
            event.channel
        );

        for conn in connections {
            let result = self
                .api_gateway_client
                .post_to_connection()
                .connection_id(&conn.connection_id)
                .data(message_json.as_bytes().to_vec().into())
                .send()
                .await;

            if let Err(e) = result {
                let gone = e
                    .as_service_error()
                    .map(|se| se.is_gone_exception())
                    .unwrap_or(false);
                tracing::warn!(
                    "Failed to send to connection {}: {}. Connection may be stale.",
                    conn.connection_id,
                    e
                );
                if gone {
                    if let Err(e) =
                        remove_connection(&self.dynamo_client, &self.table_name, &conn.connection_id)
                            .await
                    {
                        tracing::warn!("Failed to remove stale connection: {}", e);
                    }
                }
            }
        }

        Ok(())
    }
}
