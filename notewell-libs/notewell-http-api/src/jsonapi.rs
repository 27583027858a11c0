use crate::error::APIError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONAPI_CONTENT_TYPE: &str = "application/vnd.api+json";
pub const JSONAPI_VERSION: &str = "1.1";

/// Incoming JSON:API document: `{"data": {"type": ..., "id"?: ..., "attributes": ...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonApiDocument<T> {
    pub data: JsonApiData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonApiData<T> {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub id: Option<String>,
    pub attributes: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonApiLinks {
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Builds a single-resource response document.
pub fn resource_document(resource_type: &str, id: &str, attributes: Value, self_link: Option<String>) -> Value {
    let mut doc = json!({
        "data": {
            "type": resource_type,
            "id": id,
            "attributes": attributes,
        },
        "jsonapi": {"version": JSONAPI_VERSION},
    });
    if let Some(link) = self_link {
        doc["links"] = json!({"self": link});
    }
    doc
}

/// Builds a resource-collection response document with `meta.count` and
/// `page[number]`/`page[size]` pagination links.
pub fn collection_document(
    resources: Vec<Value>,
    base_url: &str,
    page_number: usize,
    page_size: usize,
    total: usize,
) -> Value {
    let last_page = if total == 0 {
        1
    } else {
        (total + page_size - 1) / page_size
    };
    let page_link = |n: usize| format!("{}?page[number]={}&page[size]={}", base_url, n, page_size);

    let mut links = json!({
        "self": page_link(page_number),
        "first": page_link(1),
        "last": page_link(last_page),
    });
    if page_number > 1 {
        links["prev"] = Value::String(page_link(page_number - 1));
    }
    if page_number < last_page {
        links["next"] = Value::String(page_link(page_number + 1));
    }

    json!({
        "data": resources,
        "jsonapi": {"version": JSONAPI_VERSION},
        "links": links,
        "meta": {"count": total},
    })
}

/// JSON:API error document for an [`APIError`].
pub fn error_document(error: &APIError) -> Value {
    json!({
        "errors": [{
            "status": error.code.to_string(),
            "title": error.error,
            "detail": error.message,
        }],
        "jsonapi": {"version": JSONAPI_VERSION},
    })
}
