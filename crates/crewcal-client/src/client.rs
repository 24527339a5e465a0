//! Crewcal HTTP client implementation.

use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

use crewcal_core::{BillingFrequency, ExportDateFormat, PlanTier};

use crate::error::ClientError;
use crate::types::{
    ActionResponse, ApiErrorResponse, CheckoutSession, Dashboard, ImportSummary, PaymentMethod,
    PaymentMethodsResponse, PlanChangeOutcome, PlanRequest, PlansResponse, SubscriptionResponse,
    SubscriptionTarget,
};

/// Crewcal API client.
///
/// Every call except [`CrewcalClient::list_plans`] is made on behalf of the
/// user whose bearer token the client was built with.
#[derive(Debug, Clone)]
pub struct CrewcalClient {
    client: Client,
    base_url: String,
    token: String,
}

impl CrewcalClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the crewcal service (e.g., `"http://crewcal:8080"`)
    /// * `token` - The user's identity-provider access token
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, token, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        token: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// The same client acting with a fresh token.
    #[must_use]
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..self.clone()
        }
    }

    // =========================================================================
    // Plans and subscription
    // =========================================================================

    /// List plans and prices. Needs no authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_plans(&self) -> Result<PlansResponse, ClientError> {
        let response = self.client.get(self.url("/v1/plans")).send().await?;
        Self::handle_response(response).await
    }

    /// The current subscription (if any) and recent invoices.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_subscription(&self) -> Result<SubscriptionResponse, ClientError> {
        self.send(self.client.get(self.url("/v1/subscription")))
            .await
    }

    /// Start a hosted checkout for a first subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error,
    /// e.g. a 409 when the user already has an active subscription.
    pub async fn start_checkout(
        &self,
        plan_id: PlanTier,
        frequency: BillingFrequency,
        return_url: Option<&str>,
    ) -> Result<CheckoutSession, ClientError> {
        let request = PlanRequest {
            plan_id,
            frequency,
            return_url: return_url.map(String::from),
        };
        self.send(
            self.client
                .post(self.url("/v1/subscription/checkout"))
                .json(&request),
        )
        .await
    }

    /// Change the active subscription's plan.
    ///
    /// Returns [`PlanChangeOutcome::Redirect`] when the user has no payment
    /// method on file and must complete a checkout instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn change_plan(
        &self,
        plan_id: PlanTier,
        frequency: BillingFrequency,
    ) -> Result<PlanChangeOutcome, ClientError> {
        let request = PlanRequest {
            plan_id,
            frequency,
            return_url: None,
        };
        self.send(
            self.client
                .post(self.url("/v1/subscription/change-plan"))
                .json(&request),
        )
        .await
    }

    /// Cancel the active subscription at the end of its billing period.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when there is no active subscription.
    pub async fn cancel(&self, subscription_id: Option<&str>) -> Result<ActionResponse, ClientError> {
        self.subscription_action("/v1/subscription/cancel", subscription_id)
            .await
    }

    /// Undo a pending cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when there is no active subscription.
    pub async fn reactivate(
        &self,
        subscription_id: Option<&str>,
    ) -> Result<ActionResponse, ClientError> {
        self.subscription_action("/v1/subscription/reactivate", subscription_id)
            .await
    }

    /// Cards on file.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, ClientError> {
        let response: PaymentMethodsResponse = self
            .send(self.client.get(self.url("/v1/payment-methods")))
            .await?;
        Ok(response.payment_methods)
    }

    // =========================================================================
    // Team
    // =========================================================================

    /// Upload a CSV, XLSX or XLS file of team members.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the file is rejected.
    pub async fn import_team_members(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ImportSummary, ClientError> {
        tracing::debug!(filename = %filename, size = bytes.len(), "Uploading team members");
        self.send(
            self.client
                .post(self.url("/v1/team-members/import"))
                .query(&[("filename", filename)])
                .header("content-type", "application/octet-stream")
                .body(bytes),
        )
        .await
    }

    /// Download the team as CSV, dates rendered in `date_format`.
    ///
    /// An account without members receives a single template row.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn export_team_members(
        &self,
        date_format: ExportDateFormat,
    ) -> Result<Vec<u8>, ClientError> {
        let response = self
            .client
            .get(self.url("/v1/team-members/export"))
            .query(&[("format", "csv"), ("dateFormat", date_format.as_str())])
            .bearer_auth(&self.token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    /// Dashboard aggregates.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn dashboard(&self) -> Result<Dashboard, ClientError> {
        self.send(self.client.get(self.url("/v1/dashboard"))).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn subscription_action(
        &self,
        path: &str,
        subscription_id: Option<&str>,
    ) -> Result<ActionResponse, ClientError> {
        let target = SubscriptionTarget {
            subscription_id: subscription_id.map(String::from),
        };
        self.send(self.client.post(self.url(path)).json(&target))
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = builder.bearer_auth(&self.token).send().await?;
        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }

        Err(Self::error_from(response).await)
    }

    /// Convert an error response into a [`ClientError`].
    async fn error_from(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match (status, error_body) {
            (StatusCode::UNAUTHORIZED, _) => ClientError::Unauthorized,
            (StatusCode::NOT_FOUND, Ok(body)) => ClientError::NotFound(body.error),
            (_, Ok(body)) => ClientError::Api {
                code: body.code.unwrap_or_else(|| "unknown".to_string()),
                message: body.error,
                status: status.as_u16(),
            },
            (_, Err(_)) => ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            },
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30). Imports of large workbooks
    /// may need more.
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = CrewcalClient::new("http://localhost:8080/", "token").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.url("/v1/plans"), "http://localhost:8080/v1/plans");
    }

    #[test]
    fn with_token_keeps_base_url() {
        let client = CrewcalClient::new("http://localhost:8080", "old").unwrap();
        let refreshed = client.with_token("new");
        assert_eq!(refreshed.token, "new");
        assert_eq!(refreshed.base_url, client.base_url);
    }
}
