//! Manual payment hand-off: the UPI deep link the shopper pays with and the
//! pre-filled WhatsApp message that tells the operator about the payment.

use std::fmt::Write as _;

use serde::Serialize;
use store::{Order, OrderItem};
use url::Url;

/// Merchant details used to build payment links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantConfig {
    /// UPI virtual payment address receiving the money.
    pub upi_id: String,
    /// Payee name shown by the UPI app.
    pub payee_name: String,
    /// Operator WhatsApp number, with country code.
    pub operator_whatsapp: String,
}

impl Default for MerchantConfig {
    fn default() -> Self {
        Self {
            upi_id: "storefront@upi".to_string(),
            payee_name: "Storefront".to_string(),
            operator_whatsapp: "910000000000".to_string(),
        }
    }
}

/// The message sent to the operator and the link that opens it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handoff {
    pub message: String,
    pub whatsapp_url: String,
}

/// Builds `upi://pay?pa=..&pn=..&am=..&cu=INR&tn=Order ..` for an order.
pub fn upi_link(merchant: &MerchantConfig, order: &Order) -> Result<String, url::ParseError> {
    let amount = order.final_amount.to_decimal_string();
    let note = format!("Order {}", order.order_number);
    let url = Url::parse_with_params(
        "upi://pay",
        &[
            ("pa", merchant.upi_id.as_str()),
            ("pn", merchant.payee_name.as_str()),
            ("am", amount.as_str()),
            ("cu", "INR"),
            ("tn", note.as_str()),
        ],
    )?;
    Ok(url.into())
}

/// Renders the operator message for an attested payment.
pub fn operator_message(order: &Order, items: &[OrderItem], reference: &str) -> String {
    let mut msg = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(msg, "Payment made for order {}", order.order_number);
    let _ = writeln!(msg);
    let _ = writeln!(msg, "Items:");
    for item in items {
        let mut options = Vec::new();
        if let Some(variant) = &item.variant {
            options.push(variant.label.clone());
        }
        if let Some(measurement) = &item.measurement {
            options.push(format!("{}: {}", measurement.label, measurement.value));
        }

        let _ = write!(msg, "- {}", item.product_name);
        if !options.is_empty() {
            let _ = write!(msg, " ({})", options.join(", "));
        }
        let _ = writeln!(msg, " x {} = {}", item.quantity, item.total_price);
    }
    let _ = writeln!(msg);
    let _ = writeln!(msg, "Subtotal: {}", order.total_amount);
    if order.discount_amount.is_positive() {
        match &order.coupon_code {
            Some(code) => {
                let _ = writeln!(msg, "Discount ({code}): -{}", order.discount_amount);
            }
            None => {
                let _ = writeln!(msg, "Discount: -{}", order.discount_amount);
            }
        }
    }
    let _ = writeln!(msg, "Total paid: {}", order.final_amount);
    let _ = writeln!(msg);
    let _ = writeln!(msg, "Ship to: {}", order.shipping_address);
    let _ = write!(msg, "Transaction reference: {reference}");

    msg
}

/// Builds the hand-off for an order whose payment reference was entered.
pub fn build_handoff(
    merchant: &MerchantConfig,
    order: &Order,
    items: &[OrderItem],
    reference: &str,
) -> Result<Handoff, url::ParseError> {
    let message = operator_message(order, items, reference);
    let phone: String = merchant
        .operator_whatsapp
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let url = Url::parse_with_params(&format!("https://wa.me/{phone}"), &[("text", &message)])?;

    Ok(Handoff {
        message,
        whatsapp_url: url.into(),
    })
}
