//! Signature query model and its validating builder.

use std::collections::BTreeMap;

use super::SignatureError;

/// HTTP method used when the caller never sets one.
pub const DEFAULT_METHOD: &str = "POST";

/// Provider host suffix appended to `<service>.<region>`.
pub const HOST_SUFFIX: &str = "amazonaws.com";

/// Inputs required to sign a single provider request.
///
/// A query is built fresh for every call. Signing inserts the date, body
/// digest, and host headers into [`SignatureQuery::headers`] so the signed
/// header set and the transmitted header set stay identical.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureQuery {
    /// HTTP method, upper case.
    pub method: String,
    /// Absolute request path, for example `/`.
    pub path: String,
    /// Provider service name, for example `ec2`.
    pub service: String,
    /// Provider region, for example `eu-west-1`.
    pub region: String,
    /// Access key identifier included in the credential scope.
    pub access_key: String,
    /// Secret key used to derive the signing key.
    pub secret_key: String,
    /// Request body; `None` signs the empty-body digest.
    pub body: Option<String>,
    /// Request headers, extended during signing.
    pub headers: BTreeMap<String, String>,
    /// Query string parameters.
    pub query_parameters: BTreeMap<String, String>,
}

impl SignatureQuery {
    /// Starts a builder for a [`SignatureQuery`].
    #[must_use]
    pub fn builder() -> SignatureQueryBuilder {
        SignatureQueryBuilder::new()
    }

    /// Returns the host derived from the service and region.
    #[must_use]
    pub fn host(&self) -> String {
        format!("{}.{}.{HOST_SUFFIX}", self.service, self.region)
    }

    /// Returns the target URL for this query.
    #[must_use]
    pub fn url(&self) -> String {
        format!("https://{}{}", self.host(), self.path)
    }
}

/// Builder for [`SignatureQuery`] that rejects incomplete queries before any
/// signing happens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureQueryBuilder {
    method: Option<String>,
    path: Option<String>,
    service: Option<String>,
    region: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    body: Option<String>,
    headers: BTreeMap<String, String>,
    query_parameters: BTreeMap<String, String>,
}

impl Default for SignatureQueryBuilder {
    fn default() -> Self {
        Self {
            method: Some(DEFAULT_METHOD.to_owned()),
            path: None,
            service: None,
            region: None,
            access_key: None,
            secret_key: None,
            body: None,
            headers: BTreeMap::new(),
            query_parameters: BTreeMap::new(),
        }
    }
}

impl SignatureQueryBuilder {
    /// Creates a builder with the default `POST` method.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP method. Passing `None` clears it, which fails the build.
    #[must_use]
    pub fn method(mut self, value: Option<&str>) -> Self {
        self.method = value.map(str::to_owned);
        self
    }

    /// Sets the request path.
    #[must_use]
    pub fn path(mut self, value: impl Into<String>) -> Self {
        self.path = Some(value.into());
        self
    }

    /// Sets the service name.
    #[must_use]
    pub fn service(mut self, value: impl Into<String>) -> Self {
        self.service = Some(value.into());
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn region(mut self, value: impl Into<String>) -> Self {
        self.region = Some(value.into());
        self
    }

    /// Sets the access key identifier.
    #[must_use]
    pub fn access_key(mut self, value: impl Into<String>) -> Self {
        self.access_key = Some(value.into());
        self
    }

    /// Sets the secret key.
    #[must_use]
    pub fn secret_key(mut self, value: impl Into<String>) -> Self {
        self.secret_key = Some(value.into());
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, value: impl Into<String>) -> Self {
        self.body = Some(value.into());
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replaces the request headers.
    #[must_use]
    pub fn headers(mut self, value: BTreeMap<String, String>) -> Self {
        self.headers = value;
        self
    }

    /// Replaces the query string parameters.
    #[must_use]
    pub fn query_parameters(mut self, value: BTreeMap<String, String>) -> Self {
        self.query_parameters = value;
        self
    }

    /// Builds the query.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::MissingField`] naming the first required
    /// field that is absent or blank.
    pub fn build(self) -> Result<SignatureQuery, SignatureError> {
        Ok(SignatureQuery {
            path: require(self.path, "path")?,
            service: require(self.service, "service")?,
            region: require(self.region, "region")?,
            access_key: require(self.access_key, "access_key")?,
            secret_key: require(self.secret_key, "secret_key")?,
            method: require(self.method, "method")?,
            body: self.body,
            headers: self.headers,
            query_parameters: self.query_parameters,
        })
    }
}

fn require(value: Option<String>, field: &'static str) -> Result<String, SignatureError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_owned()),
        _ => Err(SignatureError::MissingField(field)),
    }
}
