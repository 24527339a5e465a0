//! Authentication extractor.
//!
//! Every user-facing route takes an [`AuthUser`], built from the bearer JWT
//! issued by the identity provider. Two verification modes exist:
//!
//! - **HS256** with the shared `AUTH_JWT_SECRET`, when configured
//! - **RS256** against the provider's JWKS, cached in [`JwksCache`]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crewcal_core::UserId;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Constants
// ============================================================================

/// How long to cache JWKS keys before refreshing.
const JWKS_CACHE_DURATION: Duration = Duration::from_secs(3600);

/// Timeout for JWKS fetch requests.
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// An authenticated user extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user ID (`sub` claim).
    pub user_id: UserId,
    /// Email claim, if the token carries one.
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = validate_jwt(token, state).await?;

        let user_id = claims.sub.parse::<UserId>().map_err(|_| {
            tracing::debug!(sub = %claims.sub, "JWT subject is not a user id");
            ApiError::Unauthorized
        })?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
        })
    }
}

/// JWT claims read from identity tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Audience (string or array).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Expiration time.
    pub exp: i64,
}

async fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    let config = &state.config;

    let (key, mut validation) = if let Some(secret) = &config.auth_jwt_secret {
        (
            DecodingKey::from_secret(secret.as_bytes()),
            Validation::new(Algorithm::HS256),
        )
    } else {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(error = %e, "Failed to decode JWT header");
            ApiError::Unauthorized
        })?;
        let key = state.jwks.decoding_key(header.kid.as_deref(), config).await?;
        (key, Validation::new(Algorithm::RS256))
    };
    validation.set_audience(&[&config.auth_audience]);

    decode::<JwtClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })
}

// ============================================================================
// JWKS Cache
// ============================================================================

/// JWKS (JSON Web Key Set) response structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    /// List of JWK keys.
    pub keys: Vec<Jwk>,
}

/// Single JSON Web Key.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA").
    pub kty: String,
    /// Key ID.
    pub kid: Option<String>,
    /// RSA public key modulus (base64url encoded).
    pub n: Option<String>,
    /// RSA public key exponent (base64url encoded).
    pub e: Option<String>,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    default_key: Option<DecodingKey>,
    fetched_at: Option<Instant>,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < JWKS_CACHE_DURATION)
    }

    fn lookup(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self.keys.get(kid).cloned(),
            None => self.default_key.clone(),
        }
    }
}

/// Identity-provider signing keys, refreshed hourly or on an unknown `kid`.
///
/// Lives in [`AppState`], so every state (and every test) has its own cache.
pub struct JwksCache {
    client: reqwest::Client,
    inner: RwLock<CachedKeys>,
}

impl JwksCache {
    /// An empty cache; keys are fetched on first use.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            inner: RwLock::new(CachedKeys {
                keys: HashMap::new(),
                default_key: None,
                fetched_at: None,
            }),
        }
    }

    async fn decoding_key(
        &self,
        kid: Option<&str>,
        config: &ServiceConfig,
    ) -> Result<DecodingKey, ApiError> {
        {
            let cached = self.inner.read().await;
            if cached.is_fresh() {
                if let Some(key) = cached.lookup(kid) {
                    return Ok(key);
                }
            }
        }

        let jwks = self.fetch(&config.auth_jwks_url).await?;

        let mut cached = self.inner.write().await;
        cached.keys.clear();
        cached.default_key = None;
        cached.fetched_at = Some(Instant::now());

        for jwk in &jwks.keys {
            if let Some(key) = jwk_to_decoding_key(jwk) {
                if let Some(key_kid) = &jwk.kid {
                    cached.keys.insert(key_kid.clone(), key.clone());
                }
                if cached.default_key.is_none() {
                    cached.default_key = Some(key);
                }
            }
        }

        cached.lookup(kid).ok_or(ApiError::Unauthorized)
    }

    async fn fetch(&self, url: &str) -> Result<Jwks, ApiError> {
        tracing::debug!(url = %url, "Fetching JWKS");

        let unavailable = || ApiError::ServiceUnavailable("Failed to fetch authentication keys".into());

        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::error!(error = %e, url = %url, "Failed to fetch JWKS");
            unavailable()
        })?;

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), url = %url, "JWKS fetch returned non-success status");
            return Err(unavailable());
        }

        let jwks: Jwks = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            unavailable()
        })?;

        tracing::info!(keys_count = %jwks.keys.len(), "JWKS fetched successfully");
        Ok(jwks)
    }
}

impl Default for JwksCache {
    fn default() -> Self {
        Self::new()
    }
}

fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    if jwk.kty != "RSA" {
        tracing::debug!(kty = %jwk.kty, "Skipping non-RSA JWK");
        return None;
    }
    DecodingKey::from_rsa_components(jwk.n.as_ref()?, jwk.e.as_ref()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_rsa_keys_are_skipped() {
        let jwk = Jwk {
            kty: "EC".into(),
            kid: Some("k1".into()),
            n: None,
            e: None,
        };
        assert!(jwk_to_decoding_key(&jwk).is_none());
    }

    #[test]
    fn empty_cache_is_stale() {
        let cache = JwksCache::new();
        let inner = cache.inner.try_read().unwrap();
        assert!(!inner.is_fresh());
        assert!(inner.lookup(None).is_none());
    }
}
