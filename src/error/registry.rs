use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid registry URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("token request failed: {source}")]
    TokenRequest {
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to get token, status: {status}")]
    TokenStatus { status: u16 },
    #[error("failed to decode token response: {source}")]
    TokenDecode {
        #[source]
        source: reqwest::Error,
    },
    #[error("token response contained neither 'token' nor 'access_token'")]
    TokenMissing,
    #[error("invalid header value for {name}")]
    InvalidHeader { name: &'static str },
    #[error("error requesting manifest: {source}")]
    ManifestRequest {
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to build HTTP client: {source}")]
    BuildClient {
        #[source]
        source: reqwest::Error,
    },
}
