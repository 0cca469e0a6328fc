//! Header block-list filtering.
use std::collections::HashSet;

use http::HeaderMap;

/// Return a copy of `headers` without any entry whose name is in `excluded`,
/// compared case-insensitively. Everything else passes through unchanged,
/// repeated values included.
pub fn filter(headers: &HeaderMap, excluded: &HashSet<String>) -> HeaderMap {
    let mut kept = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let blocked = excluded
            .iter()
            .any(|ex| ex.eq_ignore_ascii_case(name.as_str()));
        if !blocked {
            kept.append(name.clone(), value.clone());
        }
    }
    kept
}
