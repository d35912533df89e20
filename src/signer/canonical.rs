//! Canonical request construction.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use url::form_urlencoded::byte_serialize;

/// Lower-cased, sorted, `;`-joined header names.
pub(crate) fn header_names(headers: &BTreeMap<String, String>) -> String {
    lowered(headers)
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(";")
}

/// Sorted `name:value\n` header lines with lower-cased names and trimmed
/// values.
pub(crate) fn header_lines(headers: &BTreeMap<String, String>) -> String {
    lowered(headers)
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

/// Sorted, percent-encoded `key=value` pairs joined by `&`.
pub(crate) fn query_string(parameters: &BTreeMap<String, String>) -> String {
    let mut encoded = parameters
        .iter()
        .map(|(key, value)| (encode(key), encode(value)))
        .collect::<Vec<_>>();
    encoded.sort();
    encoded
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Assembles the canonical request string.
pub(crate) fn request(
    method: &str,
    path: &str,
    query: &str,
    header_lines: &str,
    header_names: &str,
    body_digest: &str,
) -> String {
    format!("{method}\n{path}\n{query}\n{header_lines}\n{header_names}\n{body_digest}")
}

/// Lower-case hex SHA-256 of the given bytes.
pub(crate) fn sha256_hex(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

// Form encoding turns spaces into `+` and leaves `*` alone; the signing
// scheme expects RFC 3986 escapes.
fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

fn lowered(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_owned()))
        .collect()
}
