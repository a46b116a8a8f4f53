//! Payment confirmation state machine.

use serde::{Deserialize, Serialize};

/// The state of a manual payment confirmation.
///
/// State transitions:
/// ```text
/// AwaitingReference ──► ReferenceSubmitted ──► Settling ──► Completed
/// ```
/// `ReferenceSubmitted` is transient: a submitted reference moves straight
/// on to `Settling` once the hand-off is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Waiting for the shopper to enter a transaction reference.
    #[default]
    AwaitingReference,

    /// A reference was entered and the hand-off is being built.
    ReferenceSubmitted,

    /// Cooldown before the shopper may confirm completion.
    Settling,

    /// Payment attested and cart released (terminal state).
    Completed,
}

impl PaymentState {
    /// Returns true if a transaction reference can be submitted.
    pub fn can_submit_reference(&self) -> bool {
        matches!(self, PaymentState::AwaitingReference)
    }

    /// Returns true if completion can be requested.
    pub fn can_complete(&self) -> bool {
        matches!(self, PaymentState::Settling)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentState::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::AwaitingReference => "awaiting_reference",
            PaymentState::ReferenceSubmitted => "reference_submitted",
            PaymentState::Settling => "settling",
            PaymentState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
