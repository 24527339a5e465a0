//! Plan pricing for crewcal.
//!
//! List prices are whole currency units per month. Yearly billing applies one
//! global discount to twelve monthly payments. The provider holds its own
//! price objects, addressed by lookup keys derived from tier and frequency.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Constants
// ============================================================================

/// Yearly discount applied to twelve monthly payments.
pub const DEFAULT_YEARLY_DISCOUNT: f64 = 0.25;

/// Calendar months a monthly subscription must run before the loyalty discount.
pub const LOYALTY_MIN_MONTHS: i32 = 4;

/// Invoice line amount (cents) that marks a subscription as still on full price.
pub const LOYALTY_FULL_AMOUNT_CENTS: i64 = 24_900;

/// Lookup key of the provider price used once the loyalty discount applies.
pub const LOYALTY_DISCOUNTED_LOOKUP_KEY: &str = "monthly_discounted";

// ============================================================================
// Tiers and frequencies
// ============================================================================

/// A subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Entry tier.
    Starter,
    /// Mid tier.
    Growth,
    /// Top self-serve tier.
    Pro,
    /// Sales-led tier with custom pricing.
    Enterprise,
}

impl PlanTier {
    /// All tiers, cheapest first.
    pub const ALL: [Self; 4] = [Self::Starter, Self::Growth, Self::Pro, Self::Enterprise];

    /// The plan identifier used in requests and stored on subscriptions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Growth => "growth",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Human readable plan name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Starter => "Starter",
            Self::Growth => "Growth",
            Self::Pro => "Pro",
            Self::Enterprise => "Enterprise",
        }
    }

    /// Position in the upgrade ladder, starting at 1.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Starter => 1,
            Self::Growth => 2,
            Self::Pro => 3,
            Self::Enterprise => 4,
        }
    }

    /// Parse a provider lookup key of the form `{tier}_{frequency}`.
    #[must_use]
    pub fn from_lookup_key(key: &str) -> Option<(Self, BillingFrequency)> {
        let (tier, frequency) = key.split_once('_')?;
        Some((tier.parse().ok()?, frequency.parse().ok()?))
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "growth" => Ok(Self::Growth),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(CoreError::UnknownPlan(s.to_string())),
        }
    }
}

/// How often a subscription is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    /// Billed every month.
    #[default]
    Monthly,
    /// Billed once a year at the discounted rate.
    Yearly,
}

impl BillingFrequency {
    /// Wire form (`monthly` / `yearly`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Map a provider recurring interval (`month` / `year`).
    #[must_use]
    pub fn from_interval(interval: &str) -> Option<Self> {
        match interval {
            "month" => Some(Self::Monthly),
            "year" => Some(Self::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for BillingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingFrequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "year" | "annual" => Ok(Self::Yearly),
            _ => Err(CoreError::UnknownFrequency(s.to_string())),
        }
    }
}

// ============================================================================
// Prices
// ============================================================================

/// A list price: a whole-unit amount, or "Custom" for sales-led plans.
///
/// Serializes as a bare number or the string `"Custom"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PriceRepr", try_from = "PriceRepr")]
pub enum PlanPrice {
    /// Fixed price in whole currency units.
    Fixed(u32),
    /// Negotiated per customer.
    Custom,
}

impl PlanPrice {
    /// The fixed amount, if any.
    #[must_use]
    pub const fn amount(self) -> Option<u32> {
        match self {
            Self::Fixed(amount) => Some(amount),
            Self::Custom => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PriceRepr {
    Fixed(u32),
    Label(String),
}

impl From<PlanPrice> for PriceRepr {
    fn from(price: PlanPrice) -> Self {
        match price {
            PlanPrice::Fixed(amount) => Self::Fixed(amount),
            PlanPrice::Custom => Self::Label("Custom".into()),
        }
    }
}

impl TryFrom<PriceRepr> for PlanPrice {
    type Error = String;

    fn try_from(repr: PriceRepr) -> Result<Self, Self::Error> {
        match repr {
            PriceRepr::Fixed(amount) => Ok(Self::Fixed(amount)),
            PriceRepr::Label(label) if label.eq_ignore_ascii_case("custom") => Ok(Self::Custom),
            PriceRepr::Label(label) => Err(format!("invalid price: {label}")),
        }
    }
}

impl fmt::Display for PlanPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(amount) => write!(f, "{amount}"),
            Self::Custom => f.write_str("Custom"),
        }
    }
}

/// Direction of a plan change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanChange {
    /// Moving to a higher tier.
    Upgrade,
    /// Moving to a lower tier.
    Downgrade,
    /// Same tier, possibly a different frequency.
    SameTier,
}

/// Rank of a plan identifier; unknown identifiers rank 0.
#[must_use]
pub fn tier_rank(plan_id: &str) -> u8 {
    plan_id.parse::<PlanTier>().map_or(0, PlanTier::rank)
}

/// Classify a move from `current` to `new` by tier rank.
#[must_use]
pub fn compare_plans(current: &str, new: &str) -> PlanChange {
    match tier_rank(new).cmp(&tier_rank(current)) {
        std::cmp::Ordering::Greater => PlanChange::Upgrade,
        std::cmp::Ordering::Less => PlanChange::Downgrade,
        std::cmp::Ordering::Equal => PlanChange::SameTier,
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Monthly list price of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPrice {
    /// The tier.
    pub tier: PlanTier,
    /// Monthly list price.
    pub monthly: PlanPrice,
}

/// Parameters of the loyalty discount granted to long-running monthly plans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyDiscount {
    /// Calendar months since creation before the discount is offered.
    pub min_months: i32,
    /// Invoice line amount (cents) expected while still on full price.
    pub full_amount_cents: i64,
    /// Provider lookup key of the discounted price.
    pub discounted_lookup_key: String,
}

impl Default for LoyaltyDiscount {
    fn default() -> Self {
        Self {
            min_months: LOYALTY_MIN_MONTHS,
            full_amount_cents: LOYALTY_FULL_AMOUNT_CENTS,
            discounted_lookup_key: LOYALTY_DISCOUNTED_LOOKUP_KEY.to_string(),
        }
    }
}

/// The pricing table shown to users plus discount parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Monthly list price per tier, in ladder order.
    pub tiers: Vec<TierPrice>,
    /// Fraction taken off twelve monthly payments when billed yearly.
    pub yearly_discount: f64,
    /// Loyalty discount for monthly subscriptions.
    pub loyalty: LoyaltyDiscount,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierPrice {
                    tier: PlanTier::Starter,
                    monthly: PlanPrice::Fixed(10),
                },
                TierPrice {
                    tier: PlanTier::Growth,
                    monthly: PlanPrice::Fixed(30),
                },
                TierPrice {
                    tier: PlanTier::Pro,
                    monthly: PlanPrice::Fixed(90),
                },
                TierPrice {
                    tier: PlanTier::Enterprise,
                    monthly: PlanPrice::Custom,
                },
            ],
            yearly_discount: DEFAULT_YEARLY_DISCOUNT,
            loyalty: LoyaltyDiscount::default(),
        }
    }
}

/// Quoted prices for one tier, as rendered on the plans page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanQuote {
    /// Plan identifier.
    pub id: PlanTier,
    /// Display name.
    pub name: String,
    /// Tier order (1 = cheapest).
    pub tier_order: u8,
    /// Monthly list price.
    pub monthly_price: PlanPrice,
    /// Yearly price after the yearly discount.
    pub yearly_price: PlanPrice,
    /// Amount saved per year by paying yearly, for fixed-price tiers.
    pub yearly_savings: Option<f64>,
}

impl PricingConfig {
    /// Monthly list price of a tier; tiers missing from the table are `Custom`.
    #[must_use]
    pub fn monthly_price(&self, tier: PlanTier) -> PlanPrice {
        self.tiers
            .iter()
            .find(|t| t.tier == tier)
            .map_or(PlanPrice::Custom, |t| t.monthly)
    }

    /// Yearly price for a monthly amount: `round(monthly * 12 * (1 - discount))`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn yearly_price(&self, monthly: u32) -> u32 {
        (f64::from(monthly) * 12.0 * (1.0 - self.yearly_discount)).round() as u32
    }

    /// Yearly savings for a monthly amount: `monthly * 12 * discount`.
    #[must_use]
    pub fn yearly_savings(&self, monthly: u32) -> f64 {
        f64::from(monthly) * 12.0 * self.yearly_discount
    }

    /// Price of a plan identifier at a frequency. Unknown plans are `Custom`.
    #[must_use]
    pub fn price_for_plan(&self, plan_id: &str, frequency: BillingFrequency) -> PlanPrice {
        let Ok(tier) = plan_id.parse::<PlanTier>() else {
            return PlanPrice::Custom;
        };
        match (self.monthly_price(tier), frequency) {
            (PlanPrice::Fixed(monthly), BillingFrequency::Yearly) => {
                PlanPrice::Fixed(self.yearly_price(monthly))
            }
            (price, _) => price,
        }
    }

    /// Discount label shown next to a price, e.g. `"25%"`. Only yearly billing is discounted.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn discount_percentage(&self, frequency: BillingFrequency) -> Option<String> {
        match frequency {
            BillingFrequency::Monthly => None,
            BillingFrequency::Yearly => {
                Some(format!("{}%", (self.yearly_discount * 100.0).round() as u32))
            }
        }
    }

    /// Provider price lookup key for a tier and frequency.
    #[must_use]
    pub fn lookup_key(tier: PlanTier, frequency: BillingFrequency) -> String {
        format!("{tier}_{frequency}")
    }

    /// Quote every tier in ladder order.
    #[must_use]
    pub fn quotes(&self) -> Vec<PlanQuote> {
        self.tiers
            .iter()
            .map(|t| {
                let (yearly_price, yearly_savings) = match t.monthly {
                    PlanPrice::Fixed(monthly) => (
                        PlanPrice::Fixed(self.yearly_price(monthly)),
                        Some(self.yearly_savings(monthly)),
                    ),
                    PlanPrice::Custom => (PlanPrice::Custom, None),
                };
                PlanQuote {
                    id: t.tier,
                    name: t.tier.display_name().to_string(),
                    tier_order: t.tier.rank(),
                    monthly_price: t.monthly,
                    yearly_price,
                    yearly_savings,
                }
            })
            .collect()
    }
}
