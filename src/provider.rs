//! Provider-facing endpoint descriptors.
//!
//! A [`ProviderDescriptor`] is pure data: the authorize page, token endpoint, token-info
//! endpoint, and upstream API origin. Flows never hard-code URLs, so tests and staging
//! deployments swap the whole set by building a different descriptor.

pub mod descriptor;

pub use descriptor::*;
