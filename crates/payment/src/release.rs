use common::UserId;
use store::{StoreError, StorefrontStore};

/// Empties a user's cart once their payment is attested.
#[derive(Clone)]
pub struct CartRelease<S> {
    store: S,
}

impl<S: StorefrontStore> CartRelease<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Deletes every cart line of the user and returns how many were
    /// removed. An already empty cart yields 0.
    #[tracing::instrument(skip(self))]
    pub async fn release_cart(&self, user_id: UserId) -> Result<u64, StoreError> {
        let removed = self.store.clear_cart(user_id).await?;

        metrics::counter!("cart_releases_total").increment(1);
        tracing::info!(%user_id, removed, "cart released");
        Ok(removed)
    }
}
