// src/config/mod.rs
pub mod credentials;
pub mod run;

pub use credentials::Credentials;
pub use run::{RunConfig, TransportConfig};
