#![doc = include_str!("../README.md")]

pub mod authorization_url;
pub mod code_exchange;
pub mod provider;
pub mod providers;
pub mod scheme;
pub mod tokens;

// Re-exports
pub use authorization_url::{QueryParams, create_authorization_url};
pub use code_exchange::exchange_code_for_token;
pub use provider::{AllyDriver, CallbackParams};
pub use providers::BitbucketDriver;
pub use scheme::{OAuth2Scheme, TokenExchangeClient};
pub use tokens::AccessTokenResult;
