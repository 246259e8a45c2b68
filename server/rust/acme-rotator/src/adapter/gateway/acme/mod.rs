pub mod client;
pub mod jws;
pub mod protocol;

pub use client::{HttpAcmeClient, HttpAcmeClientFactory, PollConfig};
