//! Application state.

use std::sync::Arc;

use crewcal_core::{Profile, UserId};
use crewcal_store::Store;

use crate::auth::{AuthUser, JwksCache};
use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::provider::BillingProvider;
use crate::stripe::{StripeClient, StripeError};

/// Application state shared across handlers.
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Payment provider (optional).
    pub billing: Option<Arc<dyn BillingProvider>>,

    /// Identity-provider signing keys.
    pub jwks: JwksCache,
}

impl AppState {
    /// Create a new application state, connecting Stripe if a key is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe HTTP client cannot be built.
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Result<Self, StripeError> {
        let billing: Option<Arc<dyn BillingProvider>> = match &config.stripe_api_key {
            Some(key) => {
                tracing::info!(base_url = %config.stripe_api_base, "Stripe integration enabled");
                Some(Arc::new(StripeClient::new(key, &config.stripe_api_base)?))
            }
            None => {
                tracing::warn!("Stripe not configured - billing will not be available");
                None
            }
        };

        Ok(Self::with_provider(store, config, billing))
    }

    /// Create a state around an explicit provider.
    #[must_use]
    pub fn with_provider(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        billing: Option<Arc<dyn BillingProvider>>,
    ) -> Self {
        Self {
            store,
            config,
            billing,
            jwks: JwksCache::new(),
        }
    }

    /// The payment provider, or 503 when it is not configured.
    pub fn billing(&self) -> Result<&Arc<dyn BillingProvider>, ApiError> {
        self.billing
            .as_ref()
            .ok_or_else(|| ApiError::ServiceUnavailable("Billing is not configured".into()))
    }

    /// Load the caller's profile, creating it on first contact.
    pub fn ensure_profile(&self, user: &AuthUser) -> Result<Profile, ApiError> {
        if let Some(profile) = self.store.get_profile(&user.user_id)? {
            return Ok(profile);
        }
        self.create_profile(user.user_id, user.email.clone())
    }

    fn create_profile(&self, user_id: UserId, email: Option<String>) -> Result<Profile, ApiError> {
        let profile = Profile::new(user_id, email);
        self.store.put_profile(&profile)?;
        tracing::info!(
            user_id = %user_id,
            system_account_id = %profile.system_account_id,
            "Profile created"
        );
        Ok(profile)
    }
}
