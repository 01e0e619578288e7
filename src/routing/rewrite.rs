//! Upstream URL construction.
//!
//! # Responsibilities
//! - Keep the validated base URL's scheme and authority
//! - Replace the path with the inbound path
//! - Rebuild the query, dropping every credential-shaped parameter
//! - Inject the resolved credential as exactly one `apiKey` parameter
//!
//! # Design Decisions
//! - Keys are emitted in sorted order, values in inbound order, so the same
//!   inbound request always yields the same upstream URL
//! - Inbound keys and values are forwarded exactly as received, still
//!   percent-encoded; decoding could rewrite bytes that are not UTF-8
//! - Credential-shaped means case-insensitive and underscore-insensitive
//!   equality with `apikey` after decoding the key; the value is never
//!   inspected

use std::borrow::Cow;
use std::collections::BTreeMap;

use url::{form_urlencoded, Url};

use crate::security::credentials::ApiKey;

/// Query parameter carrying the credential upstream.
pub const API_KEY_PARAM: &str = "apiKey";

/// True for `apiKey`, `APIKEY`, `api_key`, `API_KEY`, `a_p_i_k_e_y`, ...
pub fn is_credential_param(name: &str) -> bool {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .eq("apikey".chars())
}

/// Split a raw query string into ordered key/value pairs.
///
/// Both halves stay percent-encoded. A segment without `=` has an empty
/// value; empty segments are skipped.
pub fn parse_query(raw: Option<&str>) -> Vec<(String, String)> {
    raw.into_iter()
        .flat_map(|query| query.split('&'))
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
            (key.to_string(), value.to_string())
        })
        .collect()
}

/// Decoded form of a still-encoded key, for classification only.
fn decode_key(raw: &str) -> Cow<'_, str> {
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(key, _)| key)
        .unwrap_or(Cow::Borrowed(raw))
}

/// Build the outbound URL for one proxied call.
///
/// `query` holds encoded pairs as returned by [`parse_query`].
pub fn build_upstream_url(
    base: &Url,
    path: &str,
    query: &[(String, String)],
    api_key: &ApiKey,
) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_fragment(None);

    let encoded_key: String = form_urlencoded::byte_serialize(api_key.expose().as_bytes()).collect();

    let mut params: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (key, value) in query {
        if is_credential_param(&decode_key(key)) {
            continue;
        }
        params.entry(key.as_str()).or_default().push(value.as_str());
    }
    params.insert(API_KEY_PARAM, vec![encoded_key.as_str()]);

    let rebuilt = params
        .iter()
        .flat_map(|(key, values)| values.iter().map(move |value| format!("{key}={value}")))
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&rebuilt));

    url
}
