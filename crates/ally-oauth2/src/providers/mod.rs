// Provider drivers.
//
// Each driver composes the OAuth2 base scheme (`crate::scheme`) and adds its
// own endpoints, default scopes and profile normalization.

pub mod bitbucket;
pub use bitbucket::*;
