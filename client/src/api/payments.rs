//! Subscription Purchase Endpoints

use ns_common::{
    PaymentIntent, PaymentIntentRequest, SubscriptionPlan, SubscriptionUpdate, WriteAck,
};
use reqwest::Method;

use super::{ApiClient, ApiResult};

impl ApiClient {
    /// Open a payment with the processor for `plan`.
    ///
    /// `POST /create-payment-intent`
    pub async fn create_payment_intent(&self, plan: SubscriptionPlan) -> ApiResult<PaymentIntent> {
        self.authed(
            Method::POST,
            "/create-payment-intent",
            Some(&PaymentIntentRequest {
                price: plan.price_cents(),
            }),
        )
        .await
    }

    /// Record a confirmed purchase.
    ///
    /// `PATCH /update-subscription`
    pub async fn update_subscription(&self, update: &SubscriptionUpdate) -> ApiResult<WriteAck> {
        self.authed(Method::PATCH, "/update-subscription", Some(update))
            .await
    }
}
