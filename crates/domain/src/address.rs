use serde::Serialize;

use crate::error::CheckoutError;

/// Default minimum length of a shipping address, in characters.
pub const DEFAULT_MIN_ADDRESS_LEN: usize = 10;

/// A trimmed shipping address of acceptable length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ShippingAddress(String);

impl ShippingAddress {
    /// Trims `raw` and checks it has at least `min_len` characters.
    pub fn parse(raw: &str, min_len: usize) -> Result<Self, CheckoutError> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < min_len {
            return Err(CheckoutError::validation(
                "shipping_address",
                format!("must be at least {min_len} characters"),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}
