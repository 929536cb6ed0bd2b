use reqwest::header::{HeaderMap, SET_COOKIE};
use std::collections::BTreeMap;

/// Parses one `Set-Cookie` value into `(name, value)`.
///
/// A cookie expired by `Max-Age<=0` comes back with an empty value, which
/// cookie jars treat as a deletion.
pub(crate) fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let mut value = value.trim().trim_matches('"').to_string();

    for attribute in parts {
        let (key, attr_value) = attribute.split_once('=').unwrap_or((attribute, ""));
        if key.trim().eq_ignore_ascii_case("max-age") {
            if let Ok(age) = attr_value.trim().parse::<i64>() {
                if age <= 0 {
                    value.clear();
                }
            }
        }
    }

    Some((name.to_string(), value))
}

pub(crate) fn response_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect()
}

/// Flattens headers; repeated names are joined with `, `. `Set-Cookie` is
/// left out since cookies are reported separately.
pub(crate) fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        if name == SET_COOKIE {
            continue;
        }
        let Ok(value) = value.to_str() else { continue };
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    flat
}
