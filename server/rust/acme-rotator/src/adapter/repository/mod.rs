pub mod secret_store_http;
pub mod secret_store_in_memory;

pub use secret_store_http::HttpSecretStore;
pub use secret_store_in_memory::InMemorySecretStore;
