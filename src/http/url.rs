//! Small helpers for working with request URLs as text.

use url::Url;

use super::request::KeyValue;

const UNNAMED_REQUEST: &str = "Unnamed Request";

/// Derive a display name for a request from its URL path.
pub fn request_name_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().trim_matches('/').to_string(),
        Err(_) => {
            let without_scheme = url
                .strip_prefix("https://")
                .or_else(|| url.strip_prefix("http://"))
                .unwrap_or(url);
            let without_host = without_scheme
                .split_once('/')
                .map_or("", |(_, rest)| rest);
            let path_only = without_host.split(['?', '#']).next().unwrap_or_default();
            path_only.trim_matches('/').to_string()
        }
    };

    if path.is_empty() {
        UNNAMED_REQUEST.to_string()
    } else {
        path
    }
}

/// Parse the query string of `url` into enabled parameters.
///
/// Pairs with an empty key are skipped.
pub fn parse_query_params(url: &str) -> Vec<KeyValue> {
    let Some((_, query)) = url.split_once('?') else {
        return Vec::new();
    };
    let query = query.split('#').next().unwrap_or_default();

    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| KeyValue::new(key, value))
        .collect()
}
