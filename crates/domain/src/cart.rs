//! Shopping cart operations.

use common::{MAX_QUANTITY, Money, ProductId, Quantity, UserId};
use rust_decimal::Decimal;
use serde::Serialize;
use store::{
    CartItem, CartLine, MeasurementSelection, Product, StorefrontStore, VariantSelection,
};

use crate::coupon::{CouponError, CouponRejection, CouponValidator};
use crate::error::{CheckoutError, require_user};
use crate::pricing::{self, AmountOverflow, PriceBreakdown, PricedLine};

/// Request to put a product into the cart.
#[derive(Debug, Clone)]
pub struct AddToCart {
    pub product_id: ProductId,
    pub quantity: Decimal,
    /// Label of one of the product's variant options.
    pub variant: Option<String>,
    /// One of the product's measurement values.
    pub measurement: Option<String>,
}

impl AddToCart {
    pub fn new(product_id: ProductId, quantity: Decimal) -> Self {
        Self {
            product_id,
            quantity,
            variant: None,
            measurement: None,
        }
    }

    pub fn with_variant(mut self, label: impl Into<String>) -> Self {
        self.variant = Some(label.into());
        self
    }

    pub fn with_measurement(mut self, value: impl Into<String>) -> Self {
        self.measurement = Some(value.into());
        self
    }
}

/// Result of applying a coupon code to a cart view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CouponOutcome {
    Applied { code: String, discount: Money },
    Rejected { code: String, reason: CouponRejection },
}

/// The cart as the shopper sees it.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<PricedLine>,
    /// Lines whose product is gone or inactive. Not priced.
    pub unavailable: Vec<ProductId>,
    pub pricing: PriceBreakdown,
    pub coupon: Option<CouponOutcome>,
}

/// Splits cart lines into priced lines and unavailable product ids.
pub(crate) fn price_lines(
    lines: Vec<CartLine>,
) -> Result<(Vec<PricedLine>, Vec<ProductId>), AmountOverflow> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut unavailable = Vec::new();

    for line in lines {
        match line.product {
            Some(product) if product.is_active => {
                priced.push(PricedLine::new(&line.item, &product)?);
            }
            _ => unavailable.push(line.item.product_id),
        }
    }

    Ok((priced, unavailable))
}

fn parse_quantity(value: Decimal) -> Result<Quantity, CheckoutError> {
    Quantity::new(value)
        .map_err(|_| {
            CheckoutError::validation(
                "quantity",
                format!("must be greater than 0 and at most {MAX_QUANTITY}"),
            )
        })
}

fn select_variant(
    product: &Product,
    label: Option<&str>,
) -> Result<Option<VariantSelection>, CheckoutError> {
    let Some(label) = label else {
        return Ok(None);
    };

    let option = product
        .variants
        .as_ref()
        .and_then(|config| config.option(label))
        .ok_or_else(|| {
            CheckoutError::validation("variant", format!("'{label}' is not offered"))
        })?;

    Ok(Some(VariantSelection {
        label: option.label.clone(),
        image_url: option.image_url.clone(),
    }))
}

fn select_measurement(
    product: &Product,
    value: Option<&str>,
) -> Result<Option<MeasurementSelection>, CheckoutError> {
    let Some(value) = value else {
        return Ok(None);
    };

    match &product.measurements {
        Some(config) if config.contains(value) => Ok(Some(MeasurementSelection {
            label: config.title.clone(),
            value: value.to_string(),
        })),
        _ => Err(CheckoutError::validation(
            "measurement",
            format!("'{value}' is not offered"),
        )),
    }
}

/// Cart mutations and priced views.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    coupons: CouponValidator<S>,
}

impl<S: StorefrontStore + Clone> CartService<S> {
    pub fn new(store: S) -> Self {
        Self {
            coupons: CouponValidator::new(store.clone()),
            store,
        }
    }

    /// Adds a product, replacing any existing line for the same product.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user: Option<UserId>,
        request: AddToCart,
    ) -> Result<CartItem, CheckoutError> {
        let user_id = require_user(user)?;
        let quantity = parse_quantity(request.quantity)?;

        let product = self
            .store
            .get_product(request.product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or(CheckoutError::ProductUnavailable(request.product_id))?;

        let mut item = CartItem::new(user_id, product.id, quantity);
        item.variant = select_variant(&product, request.variant.as_deref())?;
        item.measurement = select_measurement(&product, request.measurement.as_deref())?;

        let item = self.store.upsert_cart_item(item).await?;
        tracing::debug!(%user_id, product_id = %product.id, %quantity, "cart line saved");
        Ok(item)
    }

    /// Sets the quantity of an existing line. Zero removes the line and
    /// returns `None`.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user: Option<UserId>,
        product_id: ProductId,
        quantity: Decimal,
    ) -> Result<Option<CartItem>, CheckoutError> {
        let user_id = require_user(user)?;

        if quantity.is_zero() {
            self.store.remove_cart_item(user_id, product_id).await?;
            return Ok(None);
        }
        let quantity = parse_quantity(quantity)?;

        let line = self
            .store
            .get_cart(user_id)
            .await?
            .into_iter()
            .find(|line| line.item.product_id == product_id)
            .ok_or_else(|| CheckoutError::NotFound {
                entity: "cart item",
                id: product_id.to_string(),
            })?;

        if !matches!(line.product, Some(ref p) if p.is_active) {
            return Err(CheckoutError::ProductUnavailable(product_id));
        }

        let item = CartItem {
            quantity,
            ..line.item
        };
        Ok(Some(self.store.upsert_cart_item(item).await?))
    }

    /// Removes a line. Removing a missing line is not an error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user: Option<UserId>,
        product_id: ProductId,
    ) -> Result<bool, CheckoutError> {
        let user_id = require_user(user)?;
        Ok(self.store.remove_cart_item(user_id, product_id).await?)
    }

    /// Returns the priced cart. A rejected coupon is reported in the view,
    /// never as an error.
    #[tracing::instrument(skip(self))]
    pub async fn view(
        &self,
        user: Option<UserId>,
        coupon_code: Option<&str>,
    ) -> Result<CartView, CheckoutError> {
        let user_id = require_user(user)?;
        let (lines, unavailable) = price_lines(self.store.get_cart(user_id).await?)?;
        let subtotal = pricing::subtotal(&lines)?;

        let (coupon, outcome) = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => match self.coupons.validate(code, subtotal).await {
                Ok(coupon) => {
                    let discount = pricing::discount_for(&coupon.discount, subtotal);
                    let outcome = CouponOutcome::Applied {
                        code: coupon.code.clone(),
                        discount,
                    };
                    (Some(coupon), Some(outcome))
                }
                Err(CouponError::Rejected(reason)) => (
                    None,
                    Some(CouponOutcome::Rejected {
                        code: code.to_string(),
                        reason,
                    }),
                ),
                Err(CouponError::Store(err)) => return Err(err.into()),
            },
            None => (None, None),
        };

        Ok(CartView {
            pricing: pricing::evaluate(&lines, coupon.as_ref())?,
            lines,
            unavailable,
            coupon: outcome,
        })
    }
}
