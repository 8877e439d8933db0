//! DynamoDB table backend

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use log::debug;
use serde_json::{Map, Number, Value};

use crate::table::{KeyValueTable, TableConfig, TableError, TableResult};

/// Directory table stored in DynamoDB
pub struct DynamoTable {
    client: Client,
    table_name: String,
}

impl DynamoTable {
    pub async fn from_config(config: &TableConfig) -> TableResult<Self> {
        if config.table_name.is_empty() {
            return Err(TableError::configuration("Missing table name"));
        }

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_dynamodb::config::Region::new(config.region.clone()))
            .load()
            .await;

        Ok(Self {
            client: Client::new(&aws_config),
            table_name: config.table_name.clone(),
        })
    }

    fn value_of(
        primary: &str,
        secondary: &str,
        item: &HashMap<String, AttributeValue>,
    ) -> TableResult<Value> {
        let malformed = |message: &str| TableError::Malformed {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
            message: message.to_string(),
        };
        match item.get("value") {
            // Older writers stored the value as a JSON document string
            Some(AttributeValue::S(raw)) => {
                serde_json::from_str(raw).map_err(|e| malformed(&e.to_string()))
            }
            Some(other) => Ok(to_json(other)),
            None => Err(malformed("missing value attribute")),
        }
    }
}

/// Unmarshal a DynamoDB attribute into JSON
pub fn to_json(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => n
            .parse::<i64>()
            .ok()
            .map(Number::from)
            .or_else(|| n.parse::<f64>().ok().and_then(Number::from_f64))
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(n.clone())),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(items) => Value::Array(items.iter().map(to_json).collect()),
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        AttributeValue::Ss(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
        _ => Value::Null,
    }
}

fn secondary_of(item: &HashMap<String, AttributeValue>) -> String {
    match item.get("secondary_id") {
        Some(AttributeValue::S(s)) => s.clone(),
        _ => String::new(),
    }
}

#[async_trait]
impl KeyValueTable for DynamoTable {
    async fn get_item(&self, primary: &str, secondary: &str) -> TableResult<Option<Value>> {
        debug!("dynamodb get {} {}/{}", self.table_name, primary, secondary);
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("primary_id", AttributeValue::S(primary.to_string()))
            .key("secondary_id", AttributeValue::S(secondary.to_string()))
            .send()
            .await
            .map_err(|e| TableError::Aws(e.to_string()))?;

        match output.item() {
            Some(item) => Ok(Some(Self::value_of(primary, secondary, item)?)),
            None => Ok(None),
        }
    }

    async fn query(&self, primary: &str, prefix: &str) -> TableResult<Vec<Value>> {
        debug!("dynamodb query {} {}/{}*", self.table_name, primary, prefix);
        let mut values = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("primary_id = :id AND begins_with(secondary_id, :prefix)")
                .expression_attribute_values(":id", AttributeValue::S(primary.to_string()))
                .expression_attribute_values(":prefix", AttributeValue::S(prefix.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| TableError::Aws(e.to_string()))?;

            for item in output.items() {
                values.push(Self::value_of(primary, &secondary_of(item), item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(values)
    }
}
