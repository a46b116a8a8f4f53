use std::time::Duration;

use common::{Money, OrderId, UserId};
use store::Order;
use tokio::time::Instant;

use crate::error::{PaymentError, Result};
use crate::handoff::Handoff;
use crate::state::PaymentState;

/// In-progress payment confirmation for one order.
///
/// Sessions live in memory only; the persisted order changes once, when
/// completion attests the payment.
#[derive(Debug, Clone)]
pub struct PaymentSession {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub order_number: String,
    pub amount: Money,
    state: PaymentState,
    reference: Option<String>,
    handoff: Option<Handoff>,
    settling_since: Option<Instant>,
}

impl PaymentSession {
    /// Opens a session awaiting the transaction reference.
    pub fn new(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            order_number: order.order_number.clone(),
            amount: order.final_amount,
            state: PaymentState::AwaitingReference,
            reference: None,
            handoff: None,
            settling_since: None,
        }
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn handoff(&self) -> Option<&Handoff> {
        self.handoff.as_ref()
    }

    /// Records the reference and hand-off, then starts settling at `now`.
    pub fn submit_reference(
        &mut self,
        reference: String,
        handoff: Handoff,
        now: Instant,
    ) -> Result<()> {
        self.expect(PaymentState::AwaitingReference)?;

        self.reference = Some(reference);
        self.handoff = Some(handoff);
        self.state = PaymentState::ReferenceSubmitted;

        self.settling_since = Some(now);
        self.state = PaymentState::Settling;
        Ok(())
    }

    /// Time left before completion is allowed. `None` unless settling.
    pub fn remaining(&self, cooldown: Duration, now: Instant) -> Option<Duration> {
        match (self.state, self.settling_since) {
            (PaymentState::Settling, Some(since)) => {
                Some((since + cooldown).saturating_duration_since(now))
            }
            _ => None,
        }
    }

    /// Fails unless the session is settling and the cooldown has run out.
    pub fn ensure_settled(&self, cooldown: Duration, now: Instant) -> Result<()> {
        self.expect(PaymentState::Settling)?;
        match self.remaining(cooldown, now) {
            Some(remaining) if !remaining.is_zero() => {
                Err(PaymentError::SettlingNotElapsed { remaining })
            }
            _ => Ok(()),
        }
    }

    fn expect(&self, expected: PaymentState) -> Result<()> {
        if self.state != expected {
            return Err(PaymentError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}

/// Trims a shopper-entered transaction reference, rejecting blanks.
pub fn normalize_reference(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PaymentError::EmptyReference);
    }
    Ok(trimmed.to_string())
}
