pub mod adapter;
pub mod domain;
pub mod infrastructure;
pub mod test_support;
pub mod usecase;
