pub mod config;
pub mod key_generator;
pub mod logging;
pub mod parameters;
