//! Subscription and Payment Types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Answer of `GET /user-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    /// Status message chosen by the backend.
    pub message: String,
    /// Whole days of premium access left, when a subscription exists.
    #[serde(default)]
    pub remaining_days: Option<i64>,
}

impl SubscriptionStatus {
    /// Whether premium content should be unlocked.
    pub fn is_active(&self) -> bool {
        self.remaining_days.is_some_and(|days| days > 0)
    }
}

/// Purchasable subscription periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    /// Trial period.
    OneMinute,
    /// Five days.
    FiveDays,
    /// Ten days.
    TenDays,
}

impl SubscriptionPlan {
    /// All plans, cheapest first.
    pub const fn all() -> [Self; 3] {
        [Self::OneMinute, Self::FiveDays, Self::TenDays]
    }

    /// Price in US cents.
    pub const fn price_cents(self) -> u64 {
        match self {
            Self::OneMinute => 100,
            Self::FiveDays => 1_000,
            Self::TenDays => 1_500,
        }
    }

    /// Length of the entitlement.
    pub const fn period(self) -> Duration {
        match self {
            Self::OneMinute => Duration::from_secs(60),
            Self::FiveDays => Duration::from_secs(5 * 24 * 60 * 60),
            Self::TenDays => Duration::from_secs(10 * 24 * 60 * 60),
        }
    }
}

/// Body of `POST /create-payment-intent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    /// Amount in US cents.
    pub price: u64,
}

/// Response of `POST /create-payment-intent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Secret handed to the payment processor's client SDK.
    pub client_secret: String,
}

/// Body of `PATCH /update-subscription`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    /// Subscriber email.
    pub email: String,
    /// Purchased plan.
    pub plan: SubscriptionPlan,
    /// Entitlement length in minutes.
    pub duration_minutes: u64,
}

impl SubscriptionUpdate {
    /// Build the update for a confirmed purchase.
    pub fn for_plan(email: impl Into<String>, plan: SubscriptionPlan) -> Self {
        Self {
            email: email.into(),
            plan,
            duration_minutes: plan.period().as_secs() / 60,
        }
    }
}
