//! Subscription Status Resolver
//!
//! Per-identity cache of `/user-status` answers. Concurrent lookups for the
//! same identity wait on one slot lock, so a cache window costs at most one
//! network call. Failures are never cached.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use ns_common::{
    Article, Identity, PaymentIntent, SubscriptionPlan, SubscriptionStatus, SubscriptionUpdate,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiResult};

/// What a viewer may see of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PremiumAccess {
    /// Not a premium article.
    Open,
    /// Premium, and the viewer has an active subscription.
    Granted,
    /// Premium, and the viewer has no active subscription (or no identity).
    Locked,
    /// Premium, but the subscription lookup failed.
    Unavailable,
}

impl PremiumAccess {
    /// Decide from the article and the viewer's subscription lookup.
    ///
    /// `lookup` is `None` when nobody is signed in.
    pub fn evaluate(article: &Article, lookup: Option<&ApiResult<SubscriptionStatus>>) -> Self {
        if !article.is_premium {
            return Self::Open;
        }
        match lookup {
            None => Self::Locked,
            Some(Ok(status)) if status.is_active() => Self::Granted,
            Some(Ok(_)) => Self::Locked,
            Some(Err(_)) => Self::Unavailable,
        }
    }

    /// Whether the article body may be shown.
    pub const fn is_readable(self) -> bool {
        matches!(self, Self::Open | Self::Granted)
    }
}

struct CachedStatus {
    status: SubscriptionStatus,
    fetched_at: Instant,
}

type Slot = Arc<Mutex<Option<CachedStatus>>>;

/// Cached subscription lookups, keyed by identity uid.
pub struct SubscriptionResolver {
    api: ApiClient,
    ttl: Duration,
    slots: DashMap<String, Slot>,
}

impl SubscriptionResolver {
    /// Create a resolver whose answers stay fresh for `ttl`.
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        Self {
            api,
            ttl,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, uid: &str) -> Slot {
        // Shard guard is released at the end of this statement
        Arc::clone(
            &self
                .slots
                .entry(uid.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        )
    }

    /// Subscription status of `identity`.
    ///
    /// An error means "unknown", which is not the same as "not subscribed".
    #[tracing::instrument(skip(self, identity), fields(uid = %identity.uid))]
    pub async fn status(&self, identity: &Identity) -> ApiResult<SubscriptionStatus> {
        self.prune_expired();
        let slot = self.slot(&identity.uid);
        let mut cached = slot.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!("Subscription cache hit");
                return Ok(entry.status.clone());
            }
        }

        match self.api.user_status(&identity.email).await {
            Ok(status) => {
                debug!(active = status.is_active(), "Subscription status fetched");
                *cached = Some(CachedStatus {
                    status: status.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(status)
            }
            Err(e) => {
                warn!("Subscription lookup failed: {}", e);
                Err(e)
            }
        }
    }

    /// Premium access for `viewer` to `article`. Only looks up premium articles.
    pub async fn access(&self, article: &Article, viewer: Option<&Identity>) -> PremiumAccess {
        if !article.is_premium {
            return PremiumAccess::Open;
        }
        let lookup = match viewer {
            Some(identity) => Some(self.status(identity).await),
            None => None,
        };
        PremiumAccess::evaluate(article, lookup.as_ref())
    }

    /// Drop the cached answer for `identity`.
    ///
    /// A lookup already in flight keeps writing to the dropped slot, so the
    /// next call always goes to the backend.
    pub fn invalidate(&self, identity: &Identity) {
        if self.slots.remove(&identity.uid).is_some() {
            debug!(uid = %identity.uid, "Subscription cache invalidated");
        }
    }

    /// Drop slots holding no fresh answer.
    ///
    /// Slots are only handed out under the shard lock `retain` holds, so a
    /// slot nobody else references has no lookup waiting on it.
    pub fn prune_expired(&self) {
        let ttl = self.ttl;
        self.slots.retain(|_, slot| {
            Arc::strong_count(slot) > 1
                || slot.try_lock().is_ok_and(|cached| {
                    cached
                        .as_ref()
                        .is_some_and(|entry| entry.fetched_at.elapsed() < ttl)
                })
        });
    }

    /// Number of identities with a cache slot.
    pub fn cached_identities(&self) -> usize {
        self.slots.len()
    }

    /// Drop every cached answer.
    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Open a payment for `plan`. The returned secret goes to the payment
    /// processor's confirmation step.
    pub async fn begin_purchase(&self, plan: SubscriptionPlan) -> ApiResult<PaymentIntent> {
        let intent = self.api.create_payment_intent(plan).await?;
        info!(?plan, "Payment intent created");
        Ok(intent)
    }

    /// Record a payment the processor confirmed and refresh the cache.
    pub async fn complete_purchase(
        &self,
        identity: &Identity,
        plan: SubscriptionPlan,
    ) -> ApiResult<SubscriptionStatus> {
        let ack = self
            .api
            .update_subscription(&SubscriptionUpdate::for_plan(&identity.email, plan))
            .await?;
        if !ack.changed_anything() {
            warn!(uid = %identity.uid, ?plan, "Subscription update changed nothing");
        }
        self.invalidate(identity);
        info!(uid = %identity.uid, ?plan, "Subscription purchased");
        self.status(identity).await
    }
}

impl std::fmt::Debug for SubscriptionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionResolver")
            .field("ttl", &self.ttl)
            .field("cached", &self.slots.len())
            .finish_non_exhaustive()
    }
}
