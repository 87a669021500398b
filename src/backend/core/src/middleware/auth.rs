//! Bearer-token authentication.
//!
//! Tokens are HMAC-signed JWTs (HS256, HS384 or HS512, chosen in config).
//! A valid token yields an [`AuthContext`] whose `user_id` is the `sub` claim.
//!
//! Authentication only establishes *who* the caller is. Organization roles are
//! never read from token claims; they are resolved per request from the
//! membership store by the authorization layer.
//!
//! # Example
//!
//! ```rust,ignore
//! use orgauth_core::middleware::auth::{AuthConfig, AuthLayer, SigningAlgorithm};
//!
//! let config = AuthConfig::builder()
//!     .jwt_secret("your-secret-key")
//!     .algorithm(SigningAlgorithm::Hs384)
//!     .build();
//!
//! let app = Router::new()
//!     .route("/api/v1/organizations/:org_id/members", get(list_members))
//!     .layer(AuthLayer::from_config(config)?);
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ErrorCode, OrgAuthError};
use crate::rbac::UserId;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication credentials")]
    MissingCredentials,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token validation error: {0}")]
    ValidationError(String),

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl From<AuthError> for OrgAuthError {
    fn from(error: AuthError) -> Self {
        let (code, message) = match &error {
            AuthError::MissingCredentials => (
                ErrorCode::Unauthorized,
                "Authentication credentials are required",
            ),
            AuthError::InvalidToken | AuthError::ValidationError(_) => {
                (ErrorCode::InvalidToken, "The provided token is invalid")
            }
            AuthError::TokenExpired => (
                ErrorCode::TokenExpired,
                "The authentication token has expired",
            ),
            AuthError::Internal(_) => (
                ErrorCode::InternalError,
                "An authentication error occurred",
            ),
        };
        OrgAuthError::with_internal(code, message, error.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        OrgAuthError::from(self).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Claims
// ═══════════════════════════════════════════════════════════════════════════════

/// Registered claims the service reads. Anything else in the token is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the caller's user id.
    pub sub: String,

    #[serde(default = "new_token_id")]
    pub jti: String,

    pub iat: i64,

    pub exp: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

fn new_token_id() -> String {
    Uuid::new_v4().to_string()
}

impl Claims {
    /// Claims for `user_id`, valid for one hour.
    pub fn builder(user_id: impl Into<String>) -> ClaimsBuilder {
        let now = Utc::now();
        ClaimsBuilder {
            claims: Claims {
                sub: user_id.into(),
                jti: new_token_id(),
                iat: now.timestamp(),
                exp: (now + Duration::hours(1)).timestamp(),
                iss: None,
                aud: None,
            },
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

pub struct ClaimsBuilder {
    claims: Claims,
}

impl ClaimsBuilder {
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.claims.exp = (Utc::now() + duration).timestamp();
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.claims.iss = Some(issuer.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.claims.aud = Some(audience.into());
        self
    }

    pub fn build(self) -> Claims {
        self.claims
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// HMAC algorithms accepted for bearer tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    #[default]
    #[serde(rename = "HS256")]
    Hs256,
    #[serde(rename = "HS384")]
    Hs384,
    #[serde(rename = "HS512")]
    Hs512,
}

impl From<SigningAlgorithm> for Algorithm {
    fn from(algorithm: SigningAlgorithm) -> Self {
        match algorithm {
            SigningAlgorithm::Hs256 => Algorithm::HS256,
            SigningAlgorithm::Hs384 => Algorithm::HS384,
            SigningAlgorithm::Hs512 => Algorithm::HS512,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared HMAC secret. Required.
    pub jwt_secret: Option<String>,

    pub algorithm: SigningAlgorithm,

    /// Expected `iss` claim, if any.
    pub issuer: Option<String>,

    /// Expected `aud` claim, if any.
    pub audience: Option<String>,

    /// Clock skew tolerance for `exp`, in seconds.
    pub leeway_secs: u64,

    /// Paths served without a token. A trailing `*` matches a prefix.
    pub public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            algorithm: SigningAlgorithm::default(),
            issuer: None,
            audience: None,
            leeway_secs: 60,
            public_paths: ["/health", "/ready", "/metrics"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl AuthConfig {
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    pub fn algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.issuer = Some(issuer.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.config.audience = Some(audience.into());
        self
    }

    pub fn leeway_secs(mut self, secs: u64) -> Self {
        self.config.leeway_secs = secs;
        self
    }

    pub fn add_public_path(mut self, path: impl Into<String>) -> Self {
        self.config.public_paths.push(path.into());
        self
    }

    pub fn build(self) -> AuthConfig {
        self.config
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authentication Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Who made the request. Inserted into request extensions by [`AuthLayer`].
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub auth_method: AuthMethod,
    pub token_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Correlation id from `X-Request-ID`, or a fresh one.
    pub request_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Jwt,
    /// Public path, no credentials checked.
    Anonymous,
}

impl AuthContext {
    fn from_claims(claims: Claims, request_id: String) -> Self {
        Self {
            expires_at: claims.expires_at(),
            user_id: UserId::new(claims.sub),
            auth_method: AuthMethod::Jwt,
            token_id: Some(claims.jti),
            request_id,
        }
    }

    fn anonymous(request_id: String) -> Self {
        Self {
            user_id: UserId::new("anonymous"),
            auth_method: AuthMethod::Anonymous,
            token_id: None,
            expires_at: None,
            request_id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_method != AuthMethod::Anonymous
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Authenticator
// ═══════════════════════════════════════════════════════════════════════════════

/// Validates bearer tokens and mints them for tooling and tests.
pub struct Authenticator {
    public_paths: Vec<String>,
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let secret = config
            .jwt_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AuthError::Internal("JWT secret is not configured".into()))?;

        let algorithm = Algorithm::from(config.algorithm);
        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        if let Some(audience) = &config.audience {
            validation.set_audience(&[audience]);
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            public_paths: config.public_paths,
        })
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| match p.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == p,
        })
    }

    /// Authenticate a request from its headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingCredentials)?;

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "JWT validation failed");
                match e.kind() {
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    ErrorKind::InvalidToken | ErrorKind::InvalidSignature => AuthError::InvalidToken,
                    _ => AuthError::ValidationError(e.to_string()),
                }
            })?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        counter!("orgauth_auth_success_total", "method" => "jwt").increment(1);
        Ok(AuthContext::from_claims(claims, request_id(headers)))
    }

    /// Sign `claims` with the configured secret and algorithm.
    pub fn generate_token(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to generate token: {}", e)))
    }
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer for Tower.
#[derive(Clone)]
pub struct AuthLayer {
    authenticator: Arc<Authenticator>,
}

impl AuthLayer {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }

    pub fn from_config(config: AuthConfig) -> Result<Self, AuthError> {
        Ok(Self::new(Arc::new(Authenticator::new(config)?)))
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    authenticator: Arc<Authenticator>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let authenticator = self.authenticator.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let context = if authenticator.is_public_path(request.uri().path()) {
                AuthContext::anonymous(request_id(request.headers()))
            } else {
                match authenticator.authenticate(request.headers()) {
                    Ok(context) => context,
                    Err(e) => return Ok(e.into_response()),
                }
            };

            request.extensions_mut().insert(context);
            inner.call(request).await
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
