//! Registry side of a simulated pull: endpoint descriptors, image reference
//! parsing, synthetic client identities and the token + manifest handshake.
mod client;
mod descriptor;
mod identity;
mod pull;
mod reference;


pub use client::{ClientTimeouts, MANIFEST_V2_MEDIA_TYPE, RegistryClient, TokenResponse};
pub use descriptor::{Normalization, RegistryCatalog, RegistryDescriptor};
pub use identity::ClientIdentity;
pub use pull::RegistryPull;
pub use reference::ImageReference;
