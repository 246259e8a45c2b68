pub mod acme;

pub use acme::{HttpAcmeClientFactory, PollConfig};
