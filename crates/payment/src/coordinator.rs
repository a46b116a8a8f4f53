//! Payment coordinator driving manual UPI confirmation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{Money, OrderId, UserId};
use serde::Serialize;
use store::{
    Order, OrderStatus, PaymentStatus, PaymentUpdate, StoreError, StorefrontStore,
    StorefrontStoreExt,
};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{PaymentError, Result};
use crate::handoff::{self, Handoff, MerchantConfig};
use crate::release::CartRelease;
use crate::session::{PaymentSession, normalize_reference};
use crate::state::PaymentState;

/// Default cooldown between submitting a reference and completing.
pub const DEFAULT_SETTLING: Duration = Duration::from_secs(3);

/// Payment settings.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub settling: Duration,
    pub merchant: MerchantConfig,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            settling: DEFAULT_SETTLING,
            merchant: MerchantConfig::default(),
        }
    }
}

/// What the shopper needs to pay for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentPrompt {
    pub order_id: OrderId,
    pub order_number: String,
    pub amount: Money,
    pub upi_link: String,
    pub state: PaymentState,
}

/// Current progress of a payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentProgress {
    pub order_id: OrderId,
    pub state: PaymentState,
    pub payment_status: PaymentStatus,
    /// Milliseconds left in the settling cooldown, while settling.
    pub settle_remaining_ms: Option<u64>,
    pub handoff: Option<Handoff>,
}

type Sessions = Arc<RwLock<HashMap<OrderId, PaymentSession>>>;

/// Drives orders through reference entry, settling and completion.
///
/// Sessions are kept in memory. The order row is written once per stage:
/// `pending → attested` when the shopper completes, `attested → completed`
/// when the operator acknowledges.
#[derive(Clone)]
pub struct PaymentCoordinator<S> {
    store: S,
    release: CartRelease<S>,
    config: PaymentConfig,
    sessions: Sessions,
}

impl<S: StorefrontStore + Clone> PaymentCoordinator<S> {
    pub fn new(store: S, config: PaymentConfig) -> Self {
        Self {
            release: CartRelease::new(store.clone()),
            store,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Opens (or reopens) the payment session for a pending order.
    #[tracing::instrument(skip(self))]
    pub async fn begin(&self, user: Option<UserId>, order_id: OrderId) -> Result<PaymentPrompt> {
        let user_id = user.ok_or(PaymentError::AuthRequired)?;
        let order = self.load_owned(user_id, order_id).await?;
        ensure_payable(&order)?;

        let upi_link = handoff::upi_link(&self.config.merchant, &order)?;

        let state = {
            let mut sessions = self.sessions.write().await;
            sessions
                .entry(order_id)
                .or_insert_with(|| PaymentSession::new(&order))
                .state()
        };

        tracing::info!(%order_id, order_number = %order.order_number, %state, "payment started");
        Ok(PaymentPrompt {
            order_id,
            order_number: order.order_number,
            amount: order.final_amount,
            upi_link,
            state,
        })
    }

    /// Records the shopper's transaction reference and starts settling.
    ///
    /// Nothing is persisted here.
    #[tracing::instrument(skip(self, reference))]
    pub async fn submit_reference(
        &self,
        user: Option<UserId>,
        order_id: OrderId,
        reference: &str,
    ) -> Result<Handoff> {
        let user_id = user.ok_or(PaymentError::AuthRequired)?;
        let reference = normalize_reference(reference)?;

        let order = self.load_owned(user_id, order_id).await?;
        ensure_payable(&order)?;
        let items = self.store.get_order_items(order_id).await?;

        let handoff =
            handoff::build_handoff(&self.config.merchant, &order, &items, &reference)?;

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(order_id)
            .or_insert_with(|| PaymentSession::new(&order));
        session.submit_reference(reference, handoff.clone(), Instant::now())?;

        tracing::info!(%order_id, state = %session.state(), "payment reference submitted");
        Ok(handoff)
    }

    /// Reports the session state and remaining settling time.
    #[tracing::instrument(skip(self))]
    pub async fn status(&self, user: Option<UserId>, order_id: OrderId) -> Result<PaymentProgress> {
        let user_id = user.ok_or(PaymentError::AuthRequired)?;
        let order = self.load_owned(user_id, order_id).await?;

        let sessions = self.sessions.read().await;
        let progress = match sessions.get(&order_id) {
            Some(session) => PaymentProgress {
                order_id,
                state: session.state(),
                payment_status: order.payment_status,
                settle_remaining_ms: session
                    .remaining(self.config.settling, Instant::now())
                    .map(|d| d.as_millis() as u64),
                handoff: session.handoff().cloned(),
            },
            None => PaymentProgress {
                order_id,
                // Without a session the persisted status is all there is
                state: match order.payment_status {
                    PaymentStatus::Pending => PaymentState::AwaitingReference,
                    PaymentStatus::Attested | PaymentStatus::Completed => PaymentState::Completed,
                },
                payment_status: order.payment_status,
                settle_remaining_ms: None,
                handoff: None,
            },
        };

        Ok(progress)
    }

    /// Attests the payment and releases the cart once settling is over.
    ///
    /// Safe to call again after a partial failure: an order that is already
    /// attested is not written twice.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, user: Option<UserId>, order_id: OrderId) -> Result<Order> {
        let user_id = user.ok_or(PaymentError::AuthRequired)?;
        let order = self.load_owned(user_id, order_id).await?;

        let reference = {
            let sessions = self.sessions.read().await;
            let session = sessions.get(&order_id).ok_or(PaymentError::InvalidState {
                expected: PaymentState::Settling,
                actual: PaymentState::AwaitingReference,
            })?;
            session.ensure_settled(self.config.settling, Instant::now())?;
            session
                .reference()
                .map(str::to_string)
                .ok_or(PaymentError::EmptyReference)?
        };

        if order.payment_status == PaymentStatus::Pending {
            match self
                .store
                .update_payment(order_id, PaymentUpdate::attest(&reference))
                .await
            {
                Ok(_) => {
                    metrics::counter!("payment_attestations_total").increment(1);
                }
                // A concurrent completion got there first
                Err(StoreError::PaymentStatusConflict {
                    actual: PaymentStatus::Attested | PaymentStatus::Completed,
                    ..
                }) => {
                    tracing::debug!(%order_id, "payment already attested");
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.release.release_cart(user_id).await?;

        // The order row now carries the outcome
        self.sessions.write().await.remove(&order_id);

        tracing::info!(%order_id, order_number = %order.order_number, "payment completed");
        Ok(self.store.require_order(order_id).await?)
    }

    /// Drops the session. The order is not touched.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, user: Option<UserId>, order_id: OrderId) -> Result<bool> {
        let user_id = user.ok_or(PaymentError::AuthRequired)?;
        self.load_owned(user_id, order_id).await?;

        let removed = self.sessions.write().await.remove(&order_id).is_some();
        tracing::info!(%order_id, removed, "payment session cancelled");
        Ok(removed)
    }

    /// Operator acknowledgment: payment completed, order confirmed.
    #[tracing::instrument(skip(self))]
    pub async fn acknowledge(&self, order_id: OrderId) -> Result<Order> {
        let order = self
            .store
            .update_payment(order_id, PaymentUpdate::acknowledge())
            .await
            .map_err(|err| match err {
                StoreError::NotFound { .. } => PaymentError::OrderNotFound(order_id),
                other => other.into(),
            })?;

        self.sessions.write().await.remove(&order_id);
        tracing::info!(%order_id, order_number = %order.order_number, "payment acknowledged");
        Ok(order)
    }

    /// Drops sessions of orders that can no longer be paid.
    pub async fn forget(&self, order_ids: &[OrderId]) {
        if order_ids.is_empty() {
            return;
        }
        let mut sessions = self.sessions.write().await;
        for order_id in order_ids {
            sessions.remove(order_id);
        }
    }

    /// Returns the number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Loads an order owned by `user_id`. Foreign orders look missing.
    async fn load_owned(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        match self.store.get_order(order_id).await? {
            Some(order) if order.user_id == user_id => Ok(order),
            _ => Err(PaymentError::OrderNotFound(order_id)),
        }
    }
}

fn ensure_payable(order: &Order) -> Result<()> {
    match (order.status, order.payment_status) {
        (OrderStatus::Pending, PaymentStatus::Pending) => Ok(()),
        (OrderStatus::Abandoned, _) => Err(PaymentError::OrderAbandoned(order.id)),
        (status, payment_status) => Err(PaymentError::OrderNotPayable {
            status,
            payment_status,
        }),
    }
}
