//! Row types persisted by the store.
//!
//! These mirror the relational tables one-to-one. Business rules (pricing,
//! coupon validity) live in the domain crate; the store only guards the
//! invariants a database constraint would.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, Quantity, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One selectable variant of a product (e.g. a colour swatch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantOption {
    pub label: String,
    pub image_url: Option<String>,
}

/// Variant configuration of a product: a title and its ordered options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantConfig {
    pub title: String,
    pub options: Vec<VariantOption>,
}

impl VariantConfig {
    /// Looks up an option by its exact label.
    pub fn option(&self, label: &str) -> Option<&VariantOption> {
        self.options.iter().find(|o| o.label == label)
    }
}

/// Measurement configuration of a product (e.g. "Weight": 250g, 500g, 1kg).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementConfig {
    pub title: String,
    pub values: Vec<String>,
}

impl MeasurementConfig {
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

/// Catalog product as read by checkout. Mutated only by the admin back office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price_per_unit: Money,
    pub offer_price_per_unit: Option<Money>,
    pub stock_quantity: i32,
    pub variants: Option<VariantConfig>,
    pub measurements: Option<MeasurementConfig>,
    pub is_active: bool,
}

impl Product {
    /// Creates an active product with only a list price.
    pub fn new(name: impl Into<String>, price_per_unit: Money) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price_per_unit,
            offer_price_per_unit: None,
            stock_quantity: 0,
            variants: None,
            measurements: None,
            is_active: true,
        }
    }

    pub fn with_offer_price(mut self, offer: Money) -> Self {
        self.offer_price_per_unit = Some(offer);
        self
    }

    pub fn with_variants(mut self, variants: VariantConfig) -> Self {
        self.variants = Some(variants);
        self
    }

    pub fn with_measurements(mut self, measurements: MeasurementConfig) -> Self {
        self.measurements = Some(measurements);
        self
    }
}

/// The variant a shopper picked, copied from the product's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSelection {
    pub label: String,
    pub image_url: Option<String>,
}

/// The measurement a shopper picked. `label` is the configuration title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSelection {
    pub label: String,
    pub value: String,
}

/// A cart line, unique per (user, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub variant: Option<VariantSelection>,
    pub measurement: Option<MeasurementSelection>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn new(user_id: UserId, product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            user_id,
            product_id,
            quantity,
            variant: None,
            measurement: None,
            added_at: Utc::now(),
        }
    }
}

/// A cart line joined with the live product row.
///
/// `product` is `None` when the product no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Option<Product>,
}

/// How a coupon reduces the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CouponDiscount {
    /// `percent` of the subtotal, optionally capped.
    Percentage {
        percent: Decimal,
        max_discount: Option<Money>,
    },
    /// A flat amount off.
    Fixed { amount: Money },
}

impl CouponDiscount {
    pub fn type_name(&self) -> &'static str {
        match self {
            CouponDiscount::Percentage { .. } => "percentage",
            CouponDiscount::Fixed { .. } => "fixed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Unique, compared case-insensitively.
    pub code: String,
    pub discount: CouponDiscount,
    pub min_order_amount: Option<Money>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Coupon {
    /// Creates an active coupon without minimum or expiry.
    pub fn new(code: impl Into<String>, discount: CouponDiscount) -> Self {
        Self {
            code: code.into(),
            discount,
            min_order_amount: None,
            valid_until: None,
            is_active: true,
        }
    }

    pub fn with_min_order_amount(mut self, amount: Money) -> Self {
        self.min_order_amount = Some(amount);
        self
    }

    pub fn with_valid_until(mut self, valid_until: DateTime<Utc>) -> Self {
        self.valid_until = Some(valid_until);
        self
    }
}

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    /// The operator acknowledged payment.
    Confirmed,
    /// Left unpaid past the stale-order window.
    Abandoned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "abandoned" => Ok(OrderStatus::Abandoned),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// Payment status of an order.
///
/// ```text
/// Pending ──(shopper attests)──► Attested ──(operator acknowledges)──► Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Attested,
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Attested => "attested",
            PaymentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "attested" => Ok(PaymentStatus::Attested),
            "completed" => Ok(PaymentStatus::Completed),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// Values for a new order row. Status fields always start as pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    /// Pre-discount subtotal.
    pub total_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub coupon_code: Option<String>,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Materializes the row as it looks right after insertion.
    pub fn into_order(self) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            total_amount: self.total_amount,
            discount_amount: self.discount_amount,
            final_amount: self.final_amount,
            coupon_code: self.coupon_code,
            shipping_address: self.shipping_address,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub total_amount: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub coupon_code: Option<String>,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    /// Transaction reference entered by the shopper when attesting payment.
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of one cart line at order time. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub price_per_unit: Money,
    pub total_price: Money,
    pub variant: Option<VariantSelection>,
    pub measurement: Option<MeasurementSelection>,
}

/// Compare-and-set update of an order's payment fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentUpdate {
    /// The update applies only if the current payment status equals this.
    pub expected: PaymentStatus,
    pub payment_status: PaymentStatus,
    pub order_status: Option<OrderStatus>,
    pub reference: Option<String>,
}

impl PaymentUpdate {
    /// Shopper attestation: pending → attested, recording the reference.
    pub fn attest(reference: impl Into<String>) -> Self {
        Self {
            expected: PaymentStatus::Pending,
            payment_status: PaymentStatus::Attested,
            order_status: None,
            reference: Some(reference.into()),
        }
    }

    /// Operator acknowledgment: attested → completed, order confirmed.
    pub fn acknowledge() -> Self {
        Self {
            expected: PaymentStatus::Attested,
            payment_status: PaymentStatus::Completed,
            order_status: Some(OrderStatus::Confirmed),
            reference: None,
        }
    }
}
