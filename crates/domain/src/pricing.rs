//! Price computation for carts, quotes and orders.
//!
//! Everything here is pure: the same lines and coupon always produce the
//! same breakdown, so carts, quotes and placed orders agree to the paisa.

use common::{Money, ProductId, Quantity};
use serde::Serialize;
use store::{CartItem, Coupon, CouponDiscount, MeasurementSelection, Product, VariantSelection};
use thiserror::Error;

/// The unit price a shopper pays: the offer price when it undercuts the list
/// price, the list price otherwise.
pub fn effective_unit_price(product: &Product) -> Money {
    match product.offer_price_per_unit {
        Some(offer) if offer < product.price_per_unit => offer,
        _ => product.price_per_unit,
    }
}

/// A line total or sum of amounts no longer fits in paise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("amount exceeds the supported range")]
pub struct AmountOverflow;

/// A cart line priced against a product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub line_total: Money,
    pub variant: Option<VariantSelection>,
    pub measurement: Option<MeasurementSelection>,
}

impl PricedLine {
    pub fn new(item: &CartItem, product: &Product) -> Result<Self, AmountOverflow> {
        let unit_price = effective_unit_price(product);
        Ok(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: item.quantity,
            unit_price,
            line_total: unit_price
                .checked_times(item.quantity)
                .ok_or(AmountOverflow)?,
            variant: item.variant.clone(),
            measurement: item.measurement.clone(),
        })
    }
}

/// Subtotal, discount and payable amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub discount: Money,
    #[serde(rename = "final")]
    pub final_amount: Money,
}

/// Sum of rounded line totals.
pub fn subtotal(lines: &[PricedLine]) -> Result<Money, AmountOverflow> {
    Money::checked_sum(lines.iter().map(|line| line.line_total)).ok_or(AmountOverflow)
}

/// Discount a coupon grants on `subtotal`, clamped to `[0, subtotal]`.
pub fn discount_for(discount: &CouponDiscount, subtotal: Money) -> Money {
    let raw = match *discount {
        CouponDiscount::Percentage {
            percent,
            max_discount,
        } => {
            // Overflow only happens for discounts far above the subtotal
            let amount = subtotal.checked_percent(percent).unwrap_or(
                if percent.is_sign_negative() {
                    Money::zero()
                } else {
                    subtotal
                },
            );
            match max_discount {
                Some(cap) => amount.min(cap),
                None => amount,
            }
        }
        CouponDiscount::Fixed { amount } => amount,
    };
    raw.clamp(Money::zero(), subtotal)
}

/// Prices a set of lines with an optional, already validated coupon.
pub fn evaluate(
    lines: &[PricedLine],
    coupon: Option<&Coupon>,
) -> Result<PriceBreakdown, AmountOverflow> {
    let subtotal = subtotal(lines)?;
    let discount = coupon
        .map(|c| discount_for(&c.discount, subtotal))
        .unwrap_or_else(Money::zero);

    Ok(PriceBreakdown {
        subtotal,
        discount,
        final_amount: subtotal.checked_sub(discount).ok_or(AmountOverflow)?,
    })
}
