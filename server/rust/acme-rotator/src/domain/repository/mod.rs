pub mod acme_client;
pub mod key_generator;
pub mod secret_store;

pub use acme_client::{AcmeClient, AcmeClientFactory, AcmeError, IssueRequest};
pub use key_generator::{KeyGenerationError, KeyGenerator};
pub use secret_store::{SecretStore, SecretStoreError};
