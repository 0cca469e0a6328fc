//! Pure merge logic for the forward pipeline.
//!
//! Everything here is in-memory data manipulation with no I/O: upstream path
//! template resolution, header/query/body merging. The handler in
//! [`factory`](crate::core::factory) sequences these steps per request.
use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;
use http::HeaderMap;

use crate::core::{
    definition::{Method, PLACEHOLDER, QueryValue},
    factory::HandlerError,
    headers,
    payload::{Payload, PayloadTransform},
};

/// Substitute `{name}` placeholders in an upstream path template with the
/// matched path parameters. Substituted values are percent-encoded (the
/// router hands them over decoded).
///
/// A placeholder with no matching parameter is a request-time error, never
/// silently left in the path.
pub fn resolve_upstream_path(
    template: &str,
    params: &[(String, String)],
) -> Result<String, HandlerError> {
    let mut resolved = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let Some(matched) = caps.get(0) else {
            continue;
        };
        let name = &caps[1];
        let value = params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| HandlerError::PathParameter(name.to_string()))?;
        resolved.push_str(&template[last..matched.start()]);
        resolved.push_str(&urlencoding::encode(value));
        last = matched.end();
    }
    resolved.push_str(&template[last..]);
    Ok(resolved)
}

/// Combine inbound headers with route-level static headers, then apply the
/// proxy-level exclusion set. A static header is added only when the inbound
/// request does not already carry that name.
pub fn merge_headers(
    inbound: &HeaderMap,
    static_headers: &HeaderMap,
    excluded: Option<&HashSet<String>>,
) -> HeaderMap {
    let mut combined = inbound.clone();
    for (name, value) in static_headers {
        if !combined.contains_key(name) {
            combined.append(name.clone(), value.clone());
        }
    }
    match excluded {
        Some(excluded) => headers::filter(&combined, excluded),
        None => combined,
    }
}

/// Merge the inbound query string with the route's static parameters.
///
/// Inbound pairs keep their order; a static parameter whose key is already
/// present concatenates onto the existing value with a comma instead of
/// overwriting it.
pub fn merge_query(
    raw_query: Option<&str>,
    static_params: &BTreeMap<String, QueryValue>,
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = raw_query
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    for (key, value) in static_params {
        if let Some(existing) = pairs.iter_mut().find(|(k, _)| k == key) {
            existing.1 = format!("{},{}", existing.1, value);
        } else {
            pairs.push((key.clone(), value.to_string()));
        }
    }
    pairs
}

/// Derive the outbound body from the inbound bytes and the route's static
/// body.
///
/// GET and DELETE forwards never carry a body. When a static body is
/// configured it wins key collisions against an inbound JSON object and
/// replaces any other inbound body outright. Without one, inbound bytes are
/// forwarded as parsed JSON when they parse, otherwise run through the
/// payload transform capability as raw bytes.
pub fn merge_body(
    method: Method,
    static_body: Option<&serde_json::Value>,
    inbound: &Bytes,
    transform: &dyn PayloadTransform,
) -> Option<Payload> {
    if !method.allows_body() {
        return None;
    }

    if let Some(static_value) = static_body {
        if !inbound.is_empty() {
            if let (Ok(serde_json::Value::Object(mut merged)), serde_json::Value::Object(statics)) = (
                serde_json::from_slice::<serde_json::Value>(inbound),
                static_value,
            ) {
                for (key, value) in statics {
                    merged.insert(key.clone(), value.clone());
                }
                return Some(Payload::Json(serde_json::Value::Object(merged)));
            }
        }
        return Some(Payload::Json(static_value.clone()));
    }

    if inbound.is_empty() {
        return None;
    }

    match serde_json::from_slice(inbound) {
        Ok(value) => Some(Payload::Json(value)),
        Err(_) => Some(Payload::Bytes(transform.transform(inbound.clone()))),
    }
}
