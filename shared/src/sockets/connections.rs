use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::dynamo::{backend, timestamp};

/// WebSocket connection stored in DynamoDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub channel: String,
    pub connected_at: String,
}

/// Save a WebSocket connection subscribed to `channel`
pub async fn save_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
    user_id: &str,
    channel: &str,
) -> Result<(), StoreError> {
    let pk = format!("CONNECTION#{}", connection_id);

    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("connection_id", AttributeValue::S(connection_id.to_string()))
        .item("user_id", AttributeValue::S(user_id.to_string()))
        .item("channel", AttributeValue::S(channel.to_string()))
        .item("connected_at", AttributeValue::S(timestamp(chrono::Utc::now())))
        .item("entity_type", AttributeValue::S("connection".to_string()))
        .send()
        .await
        .map_err(|e| backend("put_item", e))?;

    tracing::info!(
        "Connection saved: {} (user: {}, channel: {})",
        connection_id,
        user_id,
        channel
    );
    Ok(())
}

pub async fn remove_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
) -> Result<(), StoreError> {
    let pk = format!("CONNECTION#{}", connection_id);

    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await
        .map_err(|e| backend("delete_item", e))?;

    tracing::info!("Connection removed: {}", connection_id);
    Ok(())
}

/// All connections subscribed to `channel`
pub async fn get_connections_for_channel(
    client: &DynamoClient,
    table_name: &str,
    channel: &str,
) -> Result<Vec<Connection>, StoreError> {
    let mut connections = Vec::new();
    let mut start_key = None;

    loop {
        let result = client
            .scan()
            .table_name(table_name)
            .filter_expression("entity_type = :type AND #channel = :channel")
            .expression_attribute_names("#channel", "channel")
            .expression_attribute_values(":type", AttributeValue::S("connection".to_string()))
            .expression_attribute_values(":channel", AttributeValue::S(channel.to_string()))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await
            .map_err(|e| backend("scan", e))?;

        for item in result.items() {
            if let (Some(conn_id), Some(user_id), Some(connected_at)) = (
                item.get("connection_id").and_then(|v| v.as_s().ok()),
                item.get("user_id").and_then(|v| v.as_s().ok()),
                item.get("connected_at").and_then(|v| v.as_s().ok()),
            ) {
                connections.push(Connection {
                    connection_id: conn_id.clone(),
                    user_id: user_id.clone(),
                    channel: channel.to_string(),
                    connected_at: connected_at.clone(),
                });
            }
        }

        match result.last_evaluated_key() {
            Some(key) if !key.is_empty() => start_key = Some(key.clone()),
            _ => break,
        }
    }

    Ok(connections)
}
