//! Response handling: key normalization and error classification.
//!
//! The API answers in PascalCase (`DetailPageURL`, `BrowseNodeInfo`); items
//! are handed to the extractor with snake_case keys (`detail_page_url`,
//! `browse_node_info`).

use serde_json::{Map, Value};

use crate::model::SearchPage;
use crate::traits::SearchError;

/// Error codes meaning the credential is being throttled.
const THROTTLE_CODES: [&str; 2] = ["TooManyRequests", "RequestThrottled"];

/// Error codes that no retry or later unit of work can fix.
const FATAL_CODES: [&str; 7] = [
    "InvalidSignature",
    "IncompleteSignature",
    "UnrecognizedClient",
    "InvalidPartnerTag",
    "InvalidAssociate",
    "AccessDenied",
    "AccessDeniedAwsUsers",
];

/// A successful search with nothing to return.
const NO_RESULTS: &str = "NoResults";

pub fn to_snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_uppercase() {
            out.push(c);
            continue;
        }
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let boundary = match prev {
            Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
            // End of an acronym: "URLPath" -> "url_path"
            Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
            _ => false,
        };
        if boundary {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Recursively rewrites every object key to snake_case.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (to_snake_case(&k), normalize_keys(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

/// First `(code, message)` in a response's `Errors` list.
fn first_error(body: &Value) -> Option<(String, String)> {
    let error = body.get("Errors")?.as_array()?.first()?;
    let code = error
        .get("Code")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let message = error
        .get("Message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((code, message))
}

fn classify_error(status: u16, code: String, message: String) -> SearchError {
    if status == 429 || THROTTLE_CODES.contains(&code.as_str()) {
        SearchError::RateLimited { code, message }
    } else if status == 401 || status == 403 || FATAL_CODES.contains(&code.as_str()) {
        SearchError::Rejected { code, message }
    } else {
        SearchError::Provider {
            status,
            code,
            message,
        }
    }
}

/// Turns a raw `SearchItems` response into a page or a classified error.
pub fn parse_search_response(status: u16, body: &str) -> Result<SearchPage, SearchError> {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) if (200..300).contains(&status) => {
            return Err(SearchError::MalformedResponse(e.to_string()))
        }
        Err(_) => {
            return Err(classify_error(
                status,
                format!("HTTP{}", status),
                body.chars().take(200).collect(),
            ))
        }
    };

    let error = first_error(&parsed);
    if matches!(&error, Some((code, _)) if code == NO_RESULTS) {
        return Ok(SearchPage::default());
    }
    if !(200..300).contains(&status) {
        let (code, message) = error.unwrap_or_else(|| (format!("HTTP{}", status), String::new()));
        return Err(classify_error(status, code, message));
    }

    let result = match parsed.get("SearchResult") {
        Some(Value::Object(result)) => result,
        Some(Value::Null) | None => return Ok(SearchPage::default()),
        Some(_) => {
            return Err(SearchError::MalformedResponse(
                "SearchResult is not an object".to_string(),
            ))
        }
    };

    let items = match result.get("Items") {
        Some(Value::Array(items)) => items.iter().cloned().map(normalize_keys).collect(),
        _ => Vec::new(),
    };

    Ok(SearchPage {
        items,
        total_result_count: result.get("TotalResultCount").and_then(Value::as_u64),
    })
}

/// Child node ids from a `GetBrowseNodes` response.
pub fn parse_browse_node_children(status: u16, body: &str) -> Result<Vec<String>, SearchError> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        if (200..300).contains(&status) {
            SearchError::MalformedResponse(e.to_string())
        } else {
            classify_error(status, format!("HTTP{}", status), String::new())
        }
    })?;

    if !(200..300).contains(&status) {
        let (code, message) =
            first_error(&parsed).unwrap_or_else(|| (format!("HTTP{}", status), String::new()));
        return Err(classify_error(status, code, message));
    }

    let nodes = parsed
        .pointer("/BrowseNodesResult/BrowseNodes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    Ok(nodes
        .iter()
        .filter_map(|node| node.get("Children")?.as_array())
        .flatten()
        .filter_map(|child| match child.get("Id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
        .collect())
}
