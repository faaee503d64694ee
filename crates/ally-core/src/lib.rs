#![doc = include_str!("../README.md")]

pub mod config;
pub mod env;
pub mod error;
pub mod user;

// Re-exports for convenience
pub use config::{ConfigProvider, DriverConfig, EnvConfig};
pub use error::{AllyError, ErrorCode, Result};
pub use user::{AllyUser, UserFields, UserToken};
