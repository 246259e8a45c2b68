pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod memory;
pub mod propagation;
pub mod provider;
pub mod resolver;

pub use config::ChallengeConfig;
pub use coordinator::{record_name, Challenge, ChallengeHandler, Dns01Coordinator, DNS01_CHALLENGE};
pub use error::{ChallengeError, DnsProviderError, ResolveError};
pub use http::HttpDnsProvider;
pub use memory::{DnsOperation, InMemoryDns};
pub use propagation::wait_for_propagation;
pub use provider::{quote_txt_value, unquote_txt_value, DnsProvider};
pub use resolver::{HickoryTxtResolver, TxtResolver};

#[cfg(feature = "mock")]
pub use coordinator::MockChallengeHandler;
#[cfg(feature = "mock")]
pub use provider::MockDnsProvider;
#[cfg(feature = "mock")]
pub use resolver::MockTxtResolver;
