//! Shared test harness: a service on a temporary store with an in-process
//! payment provider.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum_test::{TestResponse, TestServer};
use chrono::{Months, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;

use crewcal_core::{SubscriptionRecord, UserId};
use crewcal_service::auth::JwtClaims;
use crewcal_service::provider::{CheckoutRequest, SubscriptionUpdate};
use crewcal_service::stripe::{
    sign_payload, Card, CheckoutSession, Customer, Invoice, PaymentMethod, Price, Product,
    Recurring, StripeError, StripeList, Subscription, SubscriptionItem,
};
use crewcal_service::{create_router, AppState, BillingProvider, ServiceConfig};
use crewcal_store::{RocksStore, Store};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Id of the loyalty price.
pub const LOYALTY_PRICE_ID: &str = "price_loyalty";
pub const LOYALTY_PRICE_CENTS: i64 = 19_900;

// ============================================================================
// Fake provider
// ============================================================================

/// Everything the fake provider knows and every call it received.
#[derive(Default)]
pub struct FakeState {
    pub subscriptions: HashMap<String, Subscription>,
    pub prices: Vec<Price>,
    pub products: HashMap<String, Product>,
    pub payment_methods: HashMap<String, Vec<PaymentMethod>>,
    pub invoices: HashMap<String, Vec<Invoice>>,
    pub checkout_requests: Vec<CheckoutRequest>,
    pub updates: Vec<(String, SubscriptionUpdate)>,
    pub canceled_now: Vec<String>,
    pub customers_created: usize,
    next_id: usize,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }
}

/// Runs once, right after the provider accepts a subscription update.
type UpdateHook = Box<dyn FnOnce() + Send>;

/// In-process stand-in for Stripe.
pub struct FakeProvider {
    state: Mutex<FakeState>,
    after_update: Mutex<Option<UpdateHook>>,
}

impl FakeProvider {
    /// A provider with prices for every self-serve plan plus the loyalty price.
    pub fn new() -> Self {
        let mut state = FakeState::default();
        for (tier, monthly_cents) in [("starter", 1_000), ("growth", 3_000), ("pro", 9_000)] {
            state.products.insert(
                format!("prod_{tier}"),
                Product {
                    id: format!("prod_{tier}"),
                    name: format!("{tier} plan"),
                    metadata: HashMap::from([("plan_id".to_string(), tier.to_string())]),
                },
            );
            state
                .prices
                .push(price(&format!("{tier}_monthly"), monthly_cents, tier, "month"));
            state
                .prices
                .push(price(&format!("{tier}_yearly"), monthly_cents * 9, tier, "year"));
        }
        state.prices.push(Price {
            id: LOYALTY_PRICE_ID.into(),
            lookup_key: Some("monthly_discounted".into()),
            unit_amount: Some(LOYALTY_PRICE_CENTS),
            product: "prod_growth".into(),
            recurring: Some(Recurring {
                interval: "month".into(),
            }),
        });

        Self {
            state: Mutex::new(state),
            after_update: Mutex::new(None),
        }
    }

    /// Run `hook` after the next subscription update, e.g. to land a
    /// concurrent local write while the caller waits on the provider.
    pub fn on_next_update(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_update.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn apply_update(
        &self,
        subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, StripeError> {
        let mut state = self.state();
        state
            .updates
            .push((subscription_id.to_string(), update.clone()));

        let new_price = match &update.price {
            Some((_, price_id)) => Some(
                state
                    .prices
                    .iter()
                    .find(|p| &p.id == price_id)
                    .cloned()
                    .ok_or_else(|| Self::missing("price", price_id))?,
            ),
            None => None,
        };

        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| Self::missing("subscription", subscription_id))?;
        if let Some(price) = new_price {
            subscription.items.data[0].price = price;
        }
        if let Some(flag) = update.cancel_at_period_end {
            subscription.cancel_at_period_end = flag;
        }
        Ok(subscription.clone())
    }

    pub fn insert_subscription(&self, subscription: Subscription) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    pub fn subscription(&self, id: &str) -> Subscription {
        self.state().subscriptions[id].clone()
    }

    pub fn add_card(&self, customer_id: &str) {
        self.state()
            .payment_methods
            .entry(customer_id.to_string())
            .or_default()
            .push(PaymentMethod {
                id: format!("pm_{customer_id}"),
                method_type: "card".into(),
                card: Some(Card {
                    brand: "visa".into(),
                    last4: "4242".into(),
                    exp_month: 12,
                    exp_year: 2030,
                }),
            });
    }

    pub fn add_invoice(&self, customer_id: &str, invoice: Invoice) {
        self.state()
            .invoices
            .entry(customer_id.to_string())
            .or_default()
            .push(invoice);
    }

    fn missing(kind: &str, id: &str) -> StripeError {
        StripeError::Api {
            error_type: "invalid_request_error".into(),
            message: format!("No such {kind}: '{id}'"),
            code: Some("resource_missing".into()),
        }
    }
}

#[async_trait]
impl BillingProvider for FakeProvider {
    async fn create_customer(
        &self,
        _user_id: &UserId,
        email: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut state = self.state();
        state.customers_created += 1;
        Ok(Customer {
            id: state.next_id("cus"),
            email: email.map(String::from),
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        self.state()
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| Self::missing("subscription", subscription_id))
    }

    async fn retrieve_product(&self, product_id: &str) -> Result<Product, StripeError> {
        self.state()
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| Self::missing("product", product_id))
    }

    async fn find_price_by_lookup_key(
        &self,
        lookup_key: &str,
    ) -> Result<Option<Price>, StripeError> {
        Ok(self
            .state()
            .prices
            .iter()
            .find(|p| p.lookup_key.as_deref() == Some(lookup_key))
            .cloned())
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription, StripeError> {
        let updated = self.apply_update(subscription_id, update)?;
        if let Some(hook) = self.after_update.lock().unwrap().take() {
            hook();
        }
        Ok(updated)
    }

    async fn cancel_subscription_now(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        let mut state = self.state();
        state.canceled_now.push(subscription_id.to_string());
        let subscription = state
            .subscriptions
            .get_mut(subscription_id)
            .ok_or_else(|| Self::missing("subscription", subscription_id))?;
        subscription.status = "canceled".into();
        subscription.ended_at = Some(Utc::now().timestamp());
        Ok(subscription.clone())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let mut state = self.state();
        state.checkout_requests.push(request.clone());
        let id = state.next_id("cs_test");
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.stripe.test/{id}")),
            customer: Some(request.customer_id.clone()),
            subscription: None,
            mode: Some("subscription".into()),
            metadata: request.metadata.clone().into_iter().collect(),
            id,
        })
    }

    async fn list_payment_methods(
        &self,
        customer_id: &str,
    ) -> Result<Vec<PaymentMethod>, StripeError> {
        Ok(self
            .state()
            .payment_methods
            .get(customer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<Invoice>, StripeError> {
        Ok(self
            .state()
            .invoices
            .get(customer_id)
            .map(|all| all.iter().take(limit as usize).cloned().collect())
            .unwrap_or_default())
    }
}

fn price(lookup_key: &str, cents: i64, tier: &str, interval: &str) -> Price {
    Price {
        id: format!("price_{lookup_key}"),
        lookup_key: Some(lookup_key.to_string()),
        unit_amount: Some(cents),
        product: format!("prod_{tier}"),
        recurring: Some(Recurring {
            interval: interval.to_string(),
        }),
    }
}

/// A provider subscription on `lookup_key`, created `months_ago` months back,
/// whose current period started today.
pub fn provider_subscription(
    id: &str,
    customer_id: &str,
    lookup_key: &str,
    months_ago: u32,
) -> Subscription {
    let now = Utc::now();
    let created = now
        .checked_sub_months(Months::new(months_ago))
        .unwrap()
        .timestamp();
    let (tier, _) = lookup_key.split_once('_').unwrap();
    let interval = if lookup_key.ends_with("yearly") {
        "year"
    } else {
        "month"
    };

    Subscription {
        id: id.to_string(),
        customer: customer_id.to_string(),
        status: "active".into(),
        current_period_start: now.timestamp(),
        current_period_end: (now + chrono::Duration::days(30)).timestamp(),
        cancel_at_period_end: false,
        created,
        ended_at: None,
        items: StripeList::of(vec![SubscriptionItem {
            id: format!("si_{id}"),
            price: price(lookup_key, 0, tier, interval),
        }]),
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Test harness with a service, its store and the fake provider.
pub struct TestHarness {
    pub server: TestServer,
    pub store: Arc<RocksStore>,
    pub provider: Arc<FakeProvider>,
    pub test_user_id: UserId,
    _temp_dir: TempDir,
}

impl TestHarness {
    /// A harness with billing configured.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// A harness without a payment provider.
    pub fn without_billing() -> Self {
        Self::build(false)
    }

    fn build(with_billing: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));
        let provider = Arc::new(FakeProvider::new());

        let config = ServiceConfig {
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_jwt_secret: Some(JWT_SECRET.into()),
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            ..ServiceConfig::default()
        };

        let billing = with_billing.then(|| provider.clone() as Arc<dyn BillingProvider>);
        let state = AppState::with_provider(store.clone(), config, billing);
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            store,
            provider,
            test_user_id: UserId::generate(),
            _temp_dir: temp_dir,
        }
    }

    /// Bearer header for the test user.
    pub fn user_auth_header(&self) -> HeaderValue {
        auth_header_for(&self.test_user_id)
    }

    /// Seed an active subscription for the test user, both at the provider
    /// and locally, with the customer linked on the profile.
    pub async fn seed_subscription(&self, id: &str, lookup_key: &str, months_ago: u32) {
        let customer_id = format!("cus_{id}");
        self.provider
            .insert_subscription(provider_subscription(id, &customer_id, lookup_key, months_ago));
        self.complete_checkout(id, &self.test_user_id, None).await;
    }

    /// Deliver `checkout.session.completed` for subscription `id`.
    pub async fn complete_checkout(&self, id: &str, user_id: &UserId, replaces: Option<&str>) {
        let customer_id = self.provider.subscription(id).customer;
        let mut metadata = json!({ "user_id": user_id.to_string() });
        if let Some(replaced) = replaces {
            metadata["replaces_subscription"] = json!(replaced);
        }
        self.send_event(
            "checkout.session.completed",
            json!({
                "id": format!("cs_{id}"),
                "customer": customer_id,
                "subscription": id,
                "mode": "subscription",
                "metadata": metadata,
            }),
        )
        .await
        .assert_status_ok();
    }

    /// Sign and deliver a webhook event.
    pub async fn send_event(&self, event_type: &str, object: Value) -> TestResponse {
        let payload = json!({
            "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
            "type": event_type,
            "data": { "object": object },
        })
        .to_string();
        let signature = sign_payload(payload.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp())
            .expect("Failed to sign payload");

        self.server
            .post("/webhooks/stripe")
            .add_header(
                HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(&signature).unwrap(),
            )
            .add_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .bytes(payload.into())
            .await
    }

    /// The locally stored record.
    pub fn record(&self, id: &str) -> SubscriptionRecord {
        self.store
            .get_subscription(id)
            .expect("Failed to read subscription")
            .expect("Subscription not stored")
    }
}

/// Bearer header carrying an HS256 token for `user_id`.
pub fn auth_header_for(user_id: &UserId) -> HeaderValue {
    let claims = JwtClaims {
        sub: user_id.to_string(),
        email: Some("owner@example.com".into()),
        aud: Some(json!("authenticated")),
        exp: (Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("Failed to sign token");
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}
