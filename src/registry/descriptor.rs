use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, ValidationError};

/// How a registry expects repository names to be shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// Single-segment names live under `library/`.
    DockerHub,
    /// A leading `ghcr.io/` segment is dropped.
    Ghcr,
    #[default]
    None,
}

/// Static description of a registry's token and pull endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDescriptor {
    pub name: String,
    pub token_endpoint: Url,
    pub pull_endpoint: Url,
    pub service: String,
    pub normalization: Normalization,
}

impl RegistryDescriptor {
    /// Host (and port, when explicit) of the pull endpoint, as sent in the
    /// `Host` and `X-Forwarded-Host` headers.
    #[must_use]
    pub fn pull_host(&self) -> String {
        let host = self.pull_endpoint.host_str().unwrap_or_default();
        match self.pull_endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_owned(),
        }
    }

    fn builtin(
        name: &str,
        token_endpoint: &str,
        pull_endpoint: &str,
        service: &str,
        normalization: Normalization,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            name: name.to_owned(),
            token_endpoint: Url::parse(token_endpoint)?,
            pull_endpoint: Url::parse(pull_endpoint)?,
            service: service.to_owned(),
            normalization,
        })
    }
}

/// Registries addressable by `--registry`, keyed by their short name.
#[derive(Debug, Clone, Default)]
pub struct RegistryCatalog {
    entries: BTreeMap<String, Arc<RegistryDescriptor>>,
}

impl RegistryCatalog {
    pub const DOCKER_HUB: &'static str = "dockerhub";
    pub const GHCR: &'static str = "ghcr";

    /// Catalog holding Docker Hub and the GitHub Container Registry.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        let builtins = [
            (
                Self::DOCKER_HUB,
                RegistryDescriptor::builtin(
                    "Docker Hub",
                    "https://auth.docker.io/token",
                    "https://registry-1.docker.io",
                    "registry.docker.io",
                    Normalization::DockerHub,
                ),
            ),
            (
                Self::GHCR,
                RegistryDescriptor::builtin(
                    "GitHub Container Registry",
                    "https://ghcr.io/token",
                    "https://ghcr.io",
                    "ghcr.io",
                    Normalization::Ghcr,
                ),
            ),
        ];
        for (key, descriptor) in builtins {
            if let Ok(descriptor) = descriptor {
                catalog.entries.insert(key.to_owned(), Arc::new(descriptor));
            }
        }
        catalog
    }

    /// Adds a registry defined in the config file.
    ///
    /// # Errors
    ///
    /// Returns an error when the key shadows a built-in registry.
    pub fn insert(&mut self, key: &str, descriptor: RegistryDescriptor) -> Result<(), ConfigError> {
        if key == Self::DOCKER_HUB || key == Self::GHCR {
            return Err(ConfigError::BuiltinRegistryOverride {
                key: key.to_owned(),
            });
        }
        self.entries.insert(key.to_owned(), Arc::new(descriptor));
        Ok(())
    }

    /// Looks up a registry by key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRegistry` listing the supported keys when `key` is not
    /// in the catalog.
    pub fn lookup(&self, key: &str) -> Result<Arc<RegistryDescriptor>, ValidationError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownRegistry {
                name: key.to_owned(),
                supported: self.keys().join(", "),
            })
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}
