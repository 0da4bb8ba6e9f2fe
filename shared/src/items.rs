//! Helpers for reading and writing DynamoDB items.
//!
//! Everything lives in one table. Keys follow `PK`/`SK`, and every record
//! carries an `entity_type` so scans can pick one kind of record.

use aws_sdk_dynamodb::{
    types::{AttributeValue, KeysAndAttributes},
    Client as DynamoClient,
};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

use crate::error::ApiError;

pub type Item = HashMap<String, AttributeValue>;

pub const ENTITY_USER: &str = "user";
pub const ENTITY_EMAIL: &str = "email";
pub const ENTITY_FOOD: &str = "food";
pub const ENTITY_CART: &str = "cart";
pub const ENTITY_ORDER: &str = "order";

const BATCH_GET_LIMIT: usize = 100;
const BATCH_GET_ATTEMPTS: usize = 5;

pub fn s(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

pub fn n(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

pub fn json_attr<T: Serialize>(value: &T) -> Result<AttributeValue, ApiError> {
    serde_json::to_string(value)
        .map(AttributeValue::S)
        .map_err(|e| ApiError::Internal(format!("Failed to encode attribute: {}", e)))
}

pub fn key(pk: impl Into<String>, sk: impl Into<String>) -> Item {
    HashMap::from([("PK".to_string(), s(pk)), ("SK".to_string(), s(sk))])
}

pub fn get_string(item: &Item, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

pub fn require_string(item: &Item, name: &str) -> Result<String, ApiError> {
    get_string(item, name).ok_or_else(|| missing(name))
}

pub fn get_f64(item: &Item, name: &str) -> Option<f64> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<f64>().ok())
}

pub fn require_f64(item: &Item, name: &str) -> Result<f64, ApiError> {
    get_f64(item, name).ok_or_else(|| missing(name))
}

pub fn get_u64(item: &Item, name: &str) -> Option<u64> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<u64>().ok())
}

pub fn get_bool(item: &Item, name: &str) -> Option<bool> {
    item.get(name).and_then(|v| v.as_bool().ok()).copied()
}

/// Decode an attribute stored as a JSON string
pub fn get_json<T: DeserializeOwned>(item: &Item, name: &str) -> Result<Option<T>, ApiError> {
    match get_string(item, name) {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ApiError::Internal(format!("Corrupt attribute '{}': {}", name, e))),
        None => Ok(None),
    }
}

/// Strip the `PREFIX#` part of a key
pub fn id_from_key(value: &str) -> &str {
    value.split_once('#').map(|(_, id)| id).unwrap_or(value)
}

fn missing(name: &str) -> ApiError {
    ApiError::Internal(format!("Stored item is missing '{}'", name))
}

/// Scan every item of one entity type, optionally narrowed to `attribute = value`.
/// Follows `LastEvaluatedKey` until the table is exhausted.
pub async fn scan_entities(
    client: &DynamoClient,
    table_name: &str,
    entity_type: &str,
    filter: Option<(&str, AttributeValue)>,
) -> Result<Vec<Item>, ApiError> {
    let mut items = Vec::new();
    let mut start_key: Option<Item> = None;

    loop {
        let mut req = client
            .scan()
            .table_name(table_name)
            .expression_attribute_names("#entity", "entity_type")
            .expression_attribute_values(":entity", s(entity_type));

        req = match &filter {
            Some((attribute, value)) => req
                .filter_expression("#entity = :entity AND #attr = :value")
                .expression_attribute_names("#attr", *attribute)
                .expression_attribute_values(":value", value.clone()),
            None => req.filter_expression("#entity = :entity"),
        };

        let result = req.set_exclusive_start_key(start_key.take()).send().await?;

        if let Some(page) = result.items {
            items.extend(page);
        }

        match result.last_evaluated_key {
            Some(next) if !next.is_empty() => start_key = Some(next),
            _ => break,
        }
    }

    tracing::debug!(entity_type, count = items.len(), "Scan complete");
    Ok(items)
}

/// Fetch many items by key, 100 keys per request. Unprocessed keys are retried
/// a few times. Missing items are simply absent from the result.
pub async fn batch_get(
    client: &DynamoClient,
    table_name: &str,
    keys: Vec<Item>,
) -> Result<Vec<Item>, ApiError> {
    let mut found = Vec::new();

    for chunk in keys.chunks(BATCH_GET_LIMIT) {
        let mut pending = chunk.to_vec();
        let mut attempts = 0;

        while !pending.is_empty() {
            if attempts == BATCH_GET_ATTEMPTS {
                return Err(ApiError::Database(format!(
                    "{} keys still unprocessed after {} attempts",
                    pending.len(),
                    attempts
                )));
            }
            attempts += 1;

            let request = KeysAndAttributes::builder()
                .set_keys(Some(std::mem::take(&mut pending)))
                .build()?;
            let result = client
                .batch_get_item()
                .request_items(table_name, request)
                .send()
                .await?;

            if let Some(mut responses) = result.responses {
                found.extend(responses.remove(table_name).unwrap_or_default());
            }
            if let Some(unprocessed) = result
                .unprocessed_keys
                .as_ref()
                .and_then(|keys| keys.get(table_name))
            {
                pending = unprocessed.keys().to_vec();
            }
        }
    }

    tracing::debug!(requested = keys.len(), found = found.len(), "Batch get complete");
    Ok(found)
}

/// A client that never leaves the process, for building requests in tests
#[cfg(test)]
pub(crate) fn offline_client() -> DynamoClient {
    use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};

    let config = aws_sdk_dynamodb::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "static"))
        .build();
    DynamoClient::from_conf(config)
}
