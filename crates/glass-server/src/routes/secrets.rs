//! Secret API routes
//!
//! Thin handlers: normalize parameters, call the secured service, shape
//! the JSON response. Authorization happens inside the service; handlers
//! only translate errors to status codes.

use crate::{
    error::{ServerError, ServerResult},
    state::AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Extension, Query, State},
    Json,
};
use glass_core::{normalize_key, normalize_prefix, RequestScope, Subject};
use glass_store::SecretItem;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn scope_from(subject: Option<Extension<Subject>>) -> RequestScope {
    match subject {
        Some(Extension(subject)) => RequestScope::with_subject(subject),
        None => RequestScope::anonymous(),
    }
}

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    #[serde(default)]
    key: String,
}

#[derive(Debug, Serialize)]
pub struct ValueResponse {
    value: String,
}

/// `GET /v1/secret?key=K`
pub async fn get_secret(
    State(state): State<AppState>,
    subject: Option<Extension<Subject>>,
    Query(query): Query<KeyQuery>,
) -> ServerResult<Json<ValueResponse>> {
    let key = normalize_key(&query.key);
    if key.is_empty() {
        return Err(ServerError::BadRequest(
            "missing query parameter: key".to_string(),
        ));
    }

    let scope = scope_from(subject);
    let value = state.secrets.get_secret(&scope, &key).await?;
    Ok(Json(ValueResponse { value }))
}

/// `GET /v1/secret/meta?key=K`
pub async fn get_secret_meta(
    State(state): State<AppState>,
    subject: Option<Extension<Subject>>,
    Query(query): Query<KeyQuery>,
) -> ServerResult<Json<glass_store::SecretMeta>> {
    let key = normalize_key(&query.key);
    if key.is_empty() {
        return Err(ServerError::BadRequest(
            "missing query parameter: key".to_string(),
        ));
    }

    let scope = scope_from(subject);
    let meta = state.secrets.get_secret_meta(&scope, &key).await?;
    Ok(Json(meta))
}

#[derive(Debug, Deserialize)]
pub struct PutRequest {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Serialize)]
pub struct PutResponse {
    key: String,
    version: i64,
}

/// `PUT /v1/secret` with body `{"key", "value"}`
pub async fn put_secret(
    State(state): State<AppState>,
    subject: Option<Extension<Subject>>,
    payload: Result<Json<PutRequest>, JsonRejection>,
) -> ServerResult<Json<PutResponse>> {
    let Json(request) =
        payload.map_err(|_| ServerError::BadRequest("invalid json body".to_string()))?;

    let key = normalize_key(&request.key);
    if key.is_empty() {
        return Err(ServerError::BadRequest("missing field: key".to_string()));
    }

    let scope = scope_from(subject);
    let version = state.secrets.put_secret(&scope, &key, &request.value).await?;
    Ok(Json(PutResponse { key, version }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    prefix: String,

    #[serde(default, rename = "withMeta")]
    with_meta: Option<String>,

    #[serde(default)]
    format: Option<String>,

    #[serde(default)]
    keys: Option<String>,

    #[serde(default)]
    flatten: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListFormat {
    Map,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyStyle {
    Relative,
    Full,
}

/// `GET /v1/secrets?prefix=P[&withMeta][&format=map|list][&keys=relative|full][&flatten]`
pub async fn list_secrets(
    State(state): State<AppState>,
    subject: Option<Extension<Subject>>,
    Query(query): Query<ListQuery>,
) -> ServerResult<Json<Value>> {
    let prefix = normalize_prefix(&query.prefix);
    if prefix.is_empty() {
        return Err(ServerError::BadRequest(
            "missing query parameter: prefix".to_string(),
        ));
    }

    let with_meta = matches!(query.with_meta.as_deref(), Some("true") | Some("1"));

    let format = match query.format.as_deref() {
        None | Some("map") => ListFormat::Map,
        Some("list") => ListFormat::List,
        Some(other) => {
            return Err(ServerError::BadRequest(format!(
                "invalid format {:?} (expected map or list)",
                other
            )))
        }
    };

    let key_style = match query.keys.as_deref() {
        None | Some("relative") => KeyStyle::Relative,
        Some("full") => KeyStyle::Full,
        Some(other) => {
            return Err(ServerError::BadRequest(format!(
                "invalid keys {:?} (expected relative or full)",
                other
            )))
        }
    };

    let flatten = match query.flatten.as_deref() {
        None | Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(other) => {
            return Err(ServerError::BadRequest(format!(
                "invalid flatten {:?} (expected true or false)",
                other
            )))
        }
    };

    let scope = scope_from(subject);
    let items = state.secrets.list_secrets(&scope, &prefix).await?;

    Ok(Json(render_listing(
        &prefix, items, format, key_style, flatten, with_meta,
    )))
}

/// Shape the listing response.
///
/// Relative keys drop the prefix; flattening replaces `/` with `_` in
/// relative keys so they are usable as env-style names. Full keys are
/// returned untouched.
fn render_listing(
    prefix: &str,
    items: Vec<SecretItem>,
    format: ListFormat,
    key_style: KeyStyle,
    flatten: bool,
    with_meta: bool,
) -> Value {
    let display_key = |key: &str| -> String {
        match key_style {
            KeyStyle::Full => key.to_string(),
            KeyStyle::Relative => {
                let relative = key.strip_prefix(prefix).unwrap_or(key);
                if flatten {
                    relative.replace('/', "_")
                } else {
                    relative.to_string()
                }
            }
        }
    };

    let entry = |item: &SecretItem| -> Value {
        if with_meta {
            json!({
                "value": item.value,
                "version": item.version,
                "created_at": item.created_at,
                "created_by": item.created_by,
            })
        } else {
            Value::String(item.value.clone())
        }
    };

    match format {
        ListFormat::Map => {
            let mut map = serde_json::Map::new();
            for item in &items {
                map.insert(display_key(&item.key), entry(item));
            }
            Value::Object(map)
        }
        ListFormat::List => {
            let list: Vec<Value> = items
                .iter()
                .map(|item| {
                    if with_meta {
                        json!({
                            "key": display_key(&item.key),
                            "value": item.value,
                            "version": item.version,
                            "created_at": item.created_at,
                            "created_by": item.created_by,
                        })
                    } else {
                        json!({
                            "key": display_key(&item.key),
                            "value": item.value,
                        })
                    }
                })
                .collect();
            json!({ "items": list })
        }
    }
}
