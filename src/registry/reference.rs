use std::fmt;

use super::descriptor::Normalization;
use crate::error::ValidationError;

const DEFAULT_TAG: &str = "latest";
const DOCKER_HUB_NAMESPACE: &str = "library/";
const DOCKER_HUB_PREFIX: &str = "docker.io/";
const GHCR_PREFIX: &str = "ghcr.io/";

/// A repository plus the tag (or digest) whose manifest is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub repository: String,
    pub reference: String,
    pub by_digest: bool,
}

impl ImageReference {
    /// Parses `repo[:tag]` or `repo@digest` and normalizes the repository
    /// for the target registry.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty image, an empty repository or an empty
    /// tag/digest.
    pub fn parse(image: &str, normalization: Normalization) -> Result<Self, ValidationError> {
        let image = image.trim();
        if image.is_empty() {
            return Err(ValidationError::EmptyImage);
        }
        let invalid = || ValidationError::InvalidImage {
            value: image.to_owned(),
        };

        let by_digest = image.contains('@');
        let (repository, reference) = if let Some((repo, digest)) = image.split_once('@') {
            (repo, digest)
        } else {
            // A colon before the last '/' belongs to a registry host port.
            let last_segment_start = image.rfind('/').map_or(0, |idx| idx.saturating_add(1));
            let last_segment = image.get(last_segment_start..).unwrap_or_default();
            match last_segment.rfind(':') {
                Some(colon) => {
                    let split_at = last_segment_start.saturating_add(colon);
                    let repo = image.get(..split_at).ok_or_else(invalid)?;
                    let tag = image.get(split_at.saturating_add(1)..).ok_or_else(invalid)?;
                    (repo, tag)
                }
                None => (image, DEFAULT_TAG),
            }
        };

        if repository.is_empty() || reference.is_empty() {
            return Err(invalid());
        }

        let repository = normalize_repository(repository, normalization);
        if repository.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            repository,
            reference: reference.to_owned(),
            by_digest,
        })
    }
}

fn normalize_repository(repository: &str, normalization: Normalization) -> String {
    match normalization {
        Normalization::DockerHub => {
            let repository = repository
                .strip_prefix(DOCKER_HUB_PREFIX)
                .unwrap_or(repository);
            if repository.contains('/') {
                repository.to_owned()
            } else {
                format!("{}{}", DOCKER_HUB_NAMESPACE, repository)
            }
        }
        Normalization::Ghcr => repository
            .strip_prefix(GHCR_PREFIX)
            .unwrap_or(repository)
            .to_owned(),
        Normalization::None => repository.to_owned(),
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.by_digest {
            write!(f, "{}@{}", self.repository, self.reference)
        } else {
            write!(f, "{}:{}", self.repository, self.reference)
        }
    }
}
