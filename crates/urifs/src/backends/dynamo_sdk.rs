//! Key-value table client backed by `aws-sdk-dynamodb`.
//!
//! Credentials are read as described in the shared SDK configuration.
//! Items convert to JSON attribute by attribute: strings, numbers, booleans,
//! nulls, lists, maps and string/number sets are supported; binary
//! attributes are refused.

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{AttributeValue, KeyType, ScalarAttributeType};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::Arc;

use super::dynamo::{Item, KeyKind, KeyValueConnector, KeyValueStore, ScanPage, TableInfo};
use crate::error::{Error, Result};
use crate::map::Value;
use crate::options::Credentials;

const BACKEND: &str = "dynamodb";

type Attributes = HashMap<String, AttributeValue>;

/// Builds SDK table clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamoConnector;

#[async_trait]
impl KeyValueConnector for DynamoConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<Arc<dyn KeyValueStore>> {
        let shared = super::sdk::load_config(credentials).await?;
        Ok(Arc::new(SdkTables {
            client: Client::new(&shared),
        }))
    }
}

struct SdkTables {
    client: Client,
}

fn not_found(table: &str) -> Error {
    std::io::Error::new(ErrorKind::NotFound, format!("dynamodb://{table} not found")).into()
}

#[async_trait]
impl KeyValueStore for SdkTables {
    async fn describe(&self, table: &str) -> Result<TableInfo> {
        let output = match self.client.describe_table().table_name(table).send().await {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                return Err(not_found(table));
            }
            Err(err) => return Err(Error::backend(BACKEND, err)),
        };
        let description = output
            .table()
            .ok_or_else(|| Error::backend(BACKEND, format!("{table}: no table description")))?;

        let schema = description.key_schema();
        let key_attribute = schema
            .iter()
            .find(|element| element.key_type() == &KeyType::Hash)
            .or_else(|| schema.first())
            .map(|element| element.attribute_name().to_string())
            .ok_or_else(|| Error::backend(BACKEND, format!("{table}: no key schema")))?;
        let key_kind = match description
            .attribute_definitions()
            .iter()
            .find(|definition| definition.attribute_name() == key_attribute)
            .map(|definition| definition.attribute_type())
        {
            Some(ScalarAttributeType::N) => KeyKind::Number,
            Some(ScalarAttributeType::S) | None => KeyKind::String,
            Some(other) => {
                return Err(Error::NotImplemented(format!(
                    "{table}: {other:?} partition keys are not supported"
                )));
            }
        };

        Ok(TableInfo {
            key_attribute,
            key_kind,
            item_count: description
                .item_count()
                .and_then(|count| u64::try_from(count).ok())
                .unwrap_or(0),
        })
    }

    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_attributes(key)))
            .send()
            .await
            .map_err(|err| Error::backend(BACKEND, err))?;
        output.item().map(from_attributes).transpose()
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_attributes(&item)))
            .send()
            .await
            .map_err(|err| Error::backend(BACKEND, err))?;
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_attributes(key)))
            .send()
            .await
            .map_err(|err| Error::backend(BACKEND, err))?;
        Ok(())
    }

    async fn scan(&self, table: &str, start: Option<Item>) -> Result<ScanPage> {
        let output = self
            .client
            .scan()
            .table_name(table)
            .set_exclusive_start_key(start.as_ref().map(to_attributes))
            .send()
            .await
            .map_err(|err| Error::backend(BACKEND, err))?;
        Ok(ScanPage {
            items: output
                .items()
                .iter()
                .map(from_attributes)
                .collect::<Result<_>>()?,
            last_evaluated_key: output.last_evaluated_key().map(from_attributes).transpose()?,
        })
    }
}

fn to_attributes(item: &Item) -> Attributes {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(flag) => AttributeValue::Bool(*flag),
        Value::Number(number) => AttributeValue::N(number.to_string()),
        Value::String(text) => AttributeValue::S(text.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(to_attributes(fields)),
    }
}

fn from_attributes(attributes: &Attributes) -> Result<Item> {
    attributes
        .iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute(value)?)))
        .collect()
}

fn number(text: &str) -> Result<Value> {
    serde_json::from_str::<serde_json::Number>(text)
        .map(Value::Number)
        .map_err(|_| Error::Parse(format!("not a number: {text}")))
}

fn from_attribute(value: &AttributeValue) -> Result<Value> {
    Ok(match value {
        AttributeValue::S(text) => Value::String(text.clone()),
        AttributeValue::N(text) => number(text)?,
        AttributeValue::Bool(flag) => Value::Bool(*flag),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => {
            Value::Array(values.iter().map(from_attribute).collect::<Result<_>>()?)
        }
        AttributeValue::M(fields) => Value::Object(from_attributes(fields)?),
        AttributeValue::Ss(texts) => Value::Array(texts.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(texts) => {
            Value::Array(texts.iter().map(|text| number(text)).collect::<Result<_>>()?)
        }
        other => {
            return Err(Error::NotImplemented(format!(
                "unsupported attribute type: {other:?}"
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_item_converts_both_ways() {
        let Value::Object(item) = json!({
            "name": "alice",
            "age": 30,
            "admin": false,
            "manager": null,
            "tags": ["a", "b"],
            "address": {"city": "Oslo", "zip": 150}
        }) else {
            unreachable!()
        };
        let attributes = to_attributes(&item);
        assert_eq!(attributes["age"], AttributeValue::N("30".into()));
        assert_eq!(from_attributes(&attributes).unwrap(), item);
    }

    #[test]
    fn sets_become_arrays() {
        let set = AttributeValue::Ns(vec!["1".into(), "2.5".into()]);
        assert_eq!(from_attribute(&set).unwrap(), json!([1, 2.5]));
    }

    #[test]
    fn binary_is_refused() {
        let blob = AttributeValue::B(aws_sdk_dynamodb::primitives::Blob::new(vec![1u8]));
        assert!(matches!(from_attribute(&blob), Err(Error::NotImplemented(_))));
    }
}
