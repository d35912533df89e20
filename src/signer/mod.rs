//! Request signing for the provider's HTTP API (signature version 4, header
//! variant).
//!
//! Signing takes a [`SignatureQuery`] and a timestamp, derives a scoped key
//! from the secret through a chain of HMAC-SHA256 rounds, and produces the
//! `Authorization` header value. The output is fully determined by the query
//! and the timestamp.

mod canonical;
mod query;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub use query::{DEFAULT_METHOD, HOST_SUFFIX, SignatureQuery, SignatureQueryBuilder};

/// SHA-256 of an empty body.
pub const EMPTY_BODY_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Scheme and algorithm label used in the string to sign and the header.
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

const SCHEME: &str = "AWS4";
const TERMINATOR: &str = "aws4_request";
const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_FORMAT: &str = "%Y%m%d";

/// Header carrying the request timestamp.
pub const HEADER_DATE: &str = "x-amz-date";
/// Header carrying the body digest.
pub const HEADER_CONTENT_SHA256: &str = "x-amz-content-sha256";
/// Host header name as inserted by the signer.
pub const HEADER_HOST: &str = "Host";
/// Header carrying the computed signature.
pub const HEADER_AUTHORIZATION: &str = "Authorization";

type HmacSha256 = Hmac<Sha256>;

/// Errors raised while building or signing a query.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SignatureError {
    /// Raised when a required query field is absent or blank.
    #[error("missing or empty signature field: {0}")]
    MissingField(&'static str),
    /// Raised when a derived key cannot seed the keyed hash.
    #[error("invalid signing key: {0}")]
    Key(String),
}

/// A request ready to hand to the gateway.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedRequest {
    /// HTTP method.
    pub method: String,
    /// Target URL.
    pub url: String,
    /// Request body.
    pub body: Option<String>,
    /// Every signed header plus `Authorization`.
    pub headers: BTreeMap<String, String>,
}

/// Computes the `Authorization` header value for `query` at `now`.
///
/// The date, body digest, and host headers are inserted into
/// `query.headers` before canonicalisation.
///
/// # Errors
///
/// Returns [`SignatureError::Key`] when the keyed hash cannot be seeded.
pub fn sign(query: &mut SignatureQuery, now: DateTime<Utc>) -> Result<String, SignatureError> {
    let date_time = now.format(DATE_TIME_FORMAT).to_string();
    let date = now.format(DATE_FORMAT).to_string();
    let body_digest = query
        .body
        .as_deref()
        .map_or_else(|| EMPTY_BODY_SHA256.to_owned(), |body| canonical::sha256_hex(body));

    query
        .headers
        .insert(HEADER_DATE.to_owned(), date_time.clone());
    query
        .headers
        .insert(HEADER_CONTENT_SHA256.to_owned(), body_digest.clone());
    let host = query.host();
    query.headers.insert(HEADER_HOST.to_owned(), host);

    let names = canonical::header_names(&query.headers);
    let lines = canonical::header_lines(&query.headers);
    let canonical_query = canonical::query_string(&query.query_parameters);
    let canonical_request = canonical::request(
        &query.method,
        &query.path,
        &canonical_query,
        &lines,
        &names,
        &body_digest,
    );

    let scope = format!("{date}/{}/{}/{TERMINATOR}", query.region, query.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{date_time}\n{scope}\n{}",
        canonical::sha256_hex(&canonical_request)
    );

    let secret = format!("{SCHEME}{}", query.secret_key);
    let key_date = hmac(secret.as_bytes(), &date)?;
    let key_region = hmac(&key_date, &query.region)?;
    let key_service = hmac(&key_region, &query.service)?;
    let key_signing = hmac(&key_service, TERMINATOR)?;
    let signature = hex::encode(hmac(&key_signing, &string_to_sign)?);

    Ok(format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={names}, Signature={signature}",
        query.access_key
    ))
}

/// Signs `query` and assembles the request the gateway will send.
///
/// # Errors
///
/// Propagates [`sign`] failures.
pub fn sign_request(
    mut query: SignatureQuery,
    now: DateTime<Utc>,
) -> Result<SignedRequest, SignatureError> {
    let authorization = sign(&mut query, now)?;
    let url = query.url();
    let mut headers = query.headers;
    headers.insert(HEADER_AUTHORIZATION.to_owned(), authorization);
    Ok(SignedRequest {
        method: query.method,
        url,
        body: query.body,
        headers,
    })
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|err| SignatureError::Key(err.to_string()))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests;
