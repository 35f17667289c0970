use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Number, Value, json};

use super::{Document, DocumentSource};
use crate::auth::AuthProvider;
use crate::error::RemoteError;

/// 写入时编码为 `timestampValue` 的顶层字段
const TIMESTAMP_FIELDS: &[&str] = &["createdAt"];

/// Firestore REST v1 文档源
pub struct FirestoreSource {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: Arc<dyn AuthProvider>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreSource {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        project_id: &str,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            auth,
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}/{}",
            self.base_url, self.project_id, collection, id
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth.access_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl DocumentSource for FirestoreSource {
    async fn fetch_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RemoteError> {
        let request = self.authorize(self.http.get(self.document_url(collection, id)));
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("Document {}/{} not found", collection, id);
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let document: FirestoreDocument = response.json().await?;
        Ok(Some(decode_fields(document.fields)?))
    }

    async fn put_document(
        &self,
        collection: &str,
        id: &str,
        document: Document,
    ) -> Result<(), RemoteError> {
        let body = json!({ "fields": encode_fields(document) });
        let request = self.authorize(self.http.patch(self.document_url(collection, id)));
        let response = request.json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// Firestore 类型化字段转换为普通 JSON
pub(crate) fn decode_fields(fields: Map<String, Value>) -> Result<Document, RemoteError> {
    fields
        .into_iter()
        .map(|(key, value)| decode_value(value).map(|v| (key, v)))
        .collect()
}

fn decode_value(value: Value) -> Result<Value, RemoteError> {
    let typed = match value {
        Value::Object(typed) => typed,
        other => {
            return Err(RemoteError::Decode(format!(
                "expected typed value, got {}",
                other
            )));
        }
    };
    let Some((kind, inner)) = typed.into_iter().next() else {
        return Err(RemoteError::Decode("empty typed value".into()));
    };

    match (kind.as_str(), inner) {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", Value::Bool(b)) => Ok(Value::Bool(b)),
        ("integerValue", Value::String(s)) => s
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|e| RemoteError::Decode(format!("integerValue {}: {}", s, e))),
        ("integerValue", Value::Number(n)) => Ok(Value::Number(n)),
        ("doubleValue", Value::Number(n)) => Ok(Value::Number(n)),
        ("doubleValue", Value::String(s)) => s
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| RemoteError::Decode(format!("doubleValue {}", s))),
        ("stringValue" | "timestampValue" | "referenceValue" | "bytesValue", Value::String(s)) => {
            Ok(Value::String(s))
        }
        ("geoPointValue", point @ Value::Object(_)) => Ok(point),
        ("mapValue", Value::Object(mut map)) => match map.remove("fields") {
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            _ => Ok(Value::Object(Map::new())),
        },
        ("arrayValue", Value::Object(mut array)) => match array.remove("values") {
            Some(Value::Array(values)) => values
                .into_iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Ok(Value::Array(Vec::new())),
        },
        (kind, inner) => Err(RemoteError::Decode(format!("unsupported {}: {}", kind, inner))),
    }
}

/// 普通 JSON 转换为 Firestore 类型化字段
pub(crate) fn encode_fields(document: Document) -> Map<String, Value> {
    document
        .into_iter()
        .map(|(key, value)| {
            let encoded = match value {
                Value::String(s) if TIMESTAMP_FIELDS.contains(&key.as_str()) => {
                    json!({ "timestampValue": s })
                }
                other => encode_value(other),
            };
            (key, encoded)
        })
        .collect()
}

fn encode_value(value: Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => {
            let values: Vec<Value> = values.into_iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, encode_value(v)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}
