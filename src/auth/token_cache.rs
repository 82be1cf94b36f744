use crate::error::{MomoError, MomoResult};
use crate::types::{AccessToken, Product};
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Per-client cache holding at most one live token per product.
///
/// Reads go through an `RwLock` fast path. A miss takes the product's refresh
/// mutex, re-checks the cache and only then runs the exchange, so concurrent
/// misses collapse into a single in-flight exchange. Callers that waited on a
/// failed exchange receive that same failure instead of issuing another one.
///
/// Each slot carries a generation that `invalidate` and `clear` bump. An
/// exchange that was already running when the generation moved still answers
/// its caller but never lands in the cache.
pub struct TokenCache {
    collection: TokenSlot,
    disbursement: TokenSlot,
    safety_margin: chrono::Duration,
}

#[derive(Default)]
struct TokenSlot {
    current: RwLock<Option<AccessToken>>,
    /// Outcome of the most recent failed exchange; guarded by the refresh lock.
    refresh: Mutex<Option<MomoError>>,
    /// Completed (successful or failed) exchanges.
    completed: AtomicU64,
    /// Bumped under the `current` write lock whenever the slot is invalidated.
    generation: AtomicU64,
}

impl TokenCache {
    pub fn new(safety_margin: Duration) -> Self {
        Self {
            collection: TokenSlot::default(),
            disbursement: TokenSlot::default(),
            safety_margin: chrono::Duration::from_std(safety_margin)
                .unwrap_or_else(|_| chrono::Duration::seconds(30)),
        }
    }

    fn slot(&self, product: Product) -> &TokenSlot {
        match product {
            Product::Collection => &self.collection,
            Product::Disbursement => &self.disbursement,
        }
    }

    async fn usable(&self, slot: &TokenSlot) -> Option<AccessToken> {
        let now = Utc::now();
        slot.current
            .read()
            .await
            .as_ref()
            .filter(|token| token.is_usable_at(now, self.safety_margin))
            .cloned()
    }

    /// The cached token for `product`, if it is still outside the safety margin.
    pub async fn cached(&self, product: Product) -> Option<AccessToken> {
        self.usable(self.slot(product)).await
    }

    /// Return the cached token or run `exchange` to obtain and store a new one.
    ///
    /// A failed exchange leaves the slot untouched.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        product: Product,
        exchange: F,
    ) -> MomoResult<AccessToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MomoResult<AccessToken>>,
    {
        let slot = self.slot(product);
        if let Some(token) = self.usable(slot).await {
            debug!(product = %product, "access token cache hit");
            return Ok(token);
        }

        let seen = slot.completed.load(Ordering::Acquire);
        let mut last_failure = slot.refresh.lock().await;

        // Someone else finished an exchange while we waited for the lock.
        if let Some(token) = self.usable(slot).await {
            debug!(product = %product, "access token refreshed by concurrent caller");
            return Ok(token);
        }
        if slot.completed.load(Ordering::Acquire) != seen {
            if let Some(err) = last_failure.as_ref() {
                return Err(err.clone());
            }
        }

        let generation = slot.generation.load(Ordering::Acquire);
        let outcome = exchange().await;
        slot.completed.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(token) => {
                if !token.is_usable_at(Utc::now(), self.safety_margin) {
                    warn!(
                        product = %product,
                        expires_at = %token.expires_at,
                        "issued access token expires within the safety margin"
                    );
                }
                *last_failure = None;
                let mut current = slot.current.write().await;
                if slot.generation.load(Ordering::Acquire) == generation {
                    *current = Some(token.clone());
                } else {
                    debug!(product = %product, "cache invalidated during exchange, token not stored");
                }
                Ok(token)
            }
            Err(err) => {
                // A failure from before an invalidation says nothing about the new credentials.
                *last_failure = if slot.generation.load(Ordering::Acquire) == generation {
                    Some(err.clone())
                } else {
                    None
                };
                Err(err)
            }
        }
    }

    /// Drop the cached token and discard any exchange still in flight.
    pub async fn invalidate(&self, product: Product) {
        let slot = self.slot(product);
        let mut current = slot.current.write().await;
        *current = None;
        slot.generation.fetch_add(1, Ordering::AcqRel);
        debug!(product = %product, "access token invalidated");
    }

    /// Drop the cached token only if it is still `rejected`; a newer token stays.
    pub async fn invalidate_if_current(&self, product: Product, rejected: &str) -> bool {
        let mut current = self.slot(product).current.write().await;
        if current.as_ref().is_some_and(|token| token.value == rejected) {
            *current = None;
            debug!(product = %product, "rejected access token invalidated");
            true
        } else {
            false
        }
    }

    pub async fn clear(&self) {
        self.invalidate(Product::Collection).await;
        self.invalidate(Product::Disbursement).await;
    }
}
