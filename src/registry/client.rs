use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HOST, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::descriptor::RegistryDescriptor;
use super::identity::ClientIdentity;
use super::reference::ImageReference;
use crate::error::RegistryError;

pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const VIEWER_COUNTRY: HeaderName = HeaderName::from_static("cloudfront-viewer-country");

/// Body of a token endpoint response. Registries disagree on the field name.
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl TokenResponse {
    /// Returns the first non-empty of `token` and `access_token`.
    ///
    /// # Errors
    ///
    /// Returns `TokenMissing` when neither field carries a value.
    pub fn into_token(self) -> Result<String, RegistryError> {
        [self.token, self.access_token]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty())
            .ok_or(RegistryError::TokenMissing)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClientTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

/// Performs the two-step pull handshake against one registry. Cheap to clone;
/// all clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: Client,
    descriptor: Arc<RegistryDescriptor>,
}

impl RegistryClient {
    /// Builds a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(
        descriptor: Arc<RegistryDescriptor>,
        timeouts: ClientTimeouts,
    ) -> Result<Self, RegistryError> {
        let http = Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|err| RegistryError::BuildClient { source: err })?;
        Ok(Self { http, descriptor })
    }

    #[must_use]
    pub fn token_url(&self, repository: &str) -> Url {
        let mut url = self.descriptor.token_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("service", &self.descriptor.service)
            .append_pair("scope", &format!("repository:{}:pull", repository));
        url
    }

    /// Builds `<pull endpoint>/v2/<repository>/manifests/<reference>`.
    ///
    /// # Errors
    ///
    /// Returns an error when the joined URL does not parse.
    pub fn manifest_url(&self, image: &ImageReference) -> Result<Url, RegistryError> {
        let base = self.descriptor.pull_endpoint.as_str().trim_end_matches('/');
        let raw = format!(
            "{}/v2/{}/manifests/{}",
            base, image.repository, image.reference
        );
        Url::parse(&raw).map_err(|err| RegistryError::InvalidUrl {
            url: raw,
            source: err,
        })
    }

    /// Requests an anonymous pull token scoped to `repository`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-200 status, an
    /// undecodable body or a body without a token.
    pub async fn fetch_token(&self, repository: &str) -> Result<String, RegistryError> {
        let response = self
            .http
            .get(self.token_url(repository))
            .send()
            .await
            .map_err(|err| RegistryError::TokenRequest { source: err })?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("Token endpoint answered {} for {}", status, repository);
            return Err(RegistryError::TokenStatus {
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| RegistryError::TokenDecode { source: err })?;
        body.into_token()
    }

    /// Requests the manifest and reports the HTTP status. Any response counts;
    /// only transport failures are errors. The body is not read.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be built or sent.
    pub async fn fetch_manifest(
        &self,
        image: &ImageReference,
        token: &str,
        identity: &ClientIdentity,
    ) -> Result<u16, RegistryError> {
        let url = self.manifest_url(image)?;
        let headers = self.manifest_headers(token, identity)?;
        let response = self
            .http
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|err| RegistryError::ManifestRequest { source: err })?;
        Ok(response.status().as_u16())
    }

    fn manifest_headers(
        &self,
        token: &str,
        identity: &ClientIdentity,
    ) -> Result<HeaderMap, RegistryError> {
        let host = self.descriptor.pull_host();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(MANIFEST_V2_MEDIA_TYPE));
        headers.insert(
            AUTHORIZATION,
            header_value("authorization", &format!("Bearer {}", token))?,
        );
        headers.insert(USER_AGENT, header_value("user-agent", &identity.user_agent)?);
        headers.insert(X_FORWARDED_FOR, header_value("x-forwarded-for", &identity.ip)?);
        headers.insert(X_REAL_IP, header_value("x-real-ip", &identity.ip)?);
        headers.insert(HOST, header_value("host", &host)?);
        headers.insert(X_FORWARDED_HOST, header_value("x-forwarded-host", &host)?);
        headers.insert(
            X_REQUEST_ID,
            header_value("x-request-id", &identity.request_id)?,
        );
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        headers.insert(VIEWER_COUNTRY, HeaderValue::from_static(identity.region));
        Ok(headers)
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, RegistryError> {
    HeaderValue::from_str(value).map_err(|_invalid| RegistryError::InvalidHeader { name })
}
