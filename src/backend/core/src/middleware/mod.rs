//! HTTP middleware for OrgAuth Core.
pub mod auth;

pub use auth::{
    AuthConfig, AuthContext, AuthError, AuthLayer, AuthMethod, Authenticator, Claims, SigningAlgorithm,
};
