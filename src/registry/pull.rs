use async_trait::async_trait;
use tracing::debug;

use super::client::RegistryClient;
use super::identity::ClientIdentity;
use super::reference::ImageReference;
use crate::dispatch::{AttemptReport, AttemptSpec, Outcome, PullAttempt};

/// One simulated `docker pull`: token, then manifest, with a fresh synthetic
/// identity per attempt.
#[derive(Debug, Clone)]
pub struct RegistryPull {
    client: RegistryClient,
    image: ImageReference,
}

impl RegistryPull {
    #[must_use]
    pub const fn new(client: RegistryClient, image: ImageReference) -> Self {
        Self { client, image }
    }

    #[must_use]
    pub const fn image(&self) -> &ImageReference {
        &self.image
    }
}

#[async_trait]
impl PullAttempt for RegistryPull {
    fn target(&self) -> String {
        self.image.to_string()
    }

    async fn attempt(&self, spec: &AttemptSpec) -> AttemptReport {
        let identity = ClientIdentity::generate(&mut rand::thread_rng());

        let token = match self.client.fetch_token(&self.image.repository).await {
            Ok(token) => token,
            Err(err) => {
                debug!("Pull {}: token request failed: {}", spec.id, err);
                return Outcome::AuthFailure {
                    cause: err.to_string(),
                }
                .into();
            }
        };

        match self
            .client
            .fetch_manifest(&self.image, &token, &identity)
            .await
        {
            Ok(status_code) => AttemptReport {
                outcome: Outcome::Success { status_code },
                origin: Some(identity.describe()),
            },
            Err(err) => AttemptReport {
                outcome: Outcome::RequestFailure {
                    cause: err.to_string(),
                },
                origin: Some(identity.describe()),
            },
        }
    }
}
