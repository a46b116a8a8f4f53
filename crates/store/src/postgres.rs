use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderItemId, ProductId, Quantity, UserId};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartItem, CartLine, Coupon, CouponDiscount, NewOrder, Order, OrderItem, OrderQuery,
    OrderStatus, PaymentStatus, PaymentUpdate, Product, Result, StoreError,
    records::{MeasurementConfig, MeasurementSelection, VariantConfig, VariantSelection},
    store::{StorefrontStore, validate_order_for_insert},
};

const PRODUCT_COLUMNS: &str = "p.id AS p_id, p.name AS p_name, p.price_per_unit AS p_price_per_unit, \
     p.offer_price_per_unit AS p_offer_price_per_unit, p.stock_quantity AS p_stock_quantity, \
     p.variants AS p_variants, p.measurements AS p_measurements, p.is_active AS p_is_active";

const ORDER_COLUMNS: &str = "id, order_number, user_id, total_amount, discount_amount, final_amount, \
     coupon_code, shipping_address, status, payment_status, payment_reference, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_product(row: &PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("p_id")?),
            name: row.try_get("p_name")?,
            price_per_unit: Money::from_paise(row.try_get("p_price_per_unit")?),
            offer_price_per_unit: row
                .try_get::<Option<i64>, _>("p_offer_price_per_unit")?
                .map(Money::from_paise),
            stock_quantity: row.try_get("p_stock_quantity")?,
            variants: row
                .try_get::<Option<Json<VariantConfig>>, _>("p_variants")?
                .map(|j| j.0),
            measurements: row
                .try_get::<Option<Json<MeasurementConfig>>, _>("p_measurements")?
                .map(|j| j.0),
            is_active: row.try_get("p_is_active")?,
        })
    }

    fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
        let item = CartItem {
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: decode_quantity(row.try_get("quantity")?)?,
            variant: row
                .try_get::<Option<Json<VariantSelection>>, _>("variant")?
                .map(|j| j.0),
            measurement: row
                .try_get::<Option<Json<MeasurementSelection>>, _>("measurement")?
                .map(|j| j.0),
            added_at: row.try_get("added_at")?,
        };

        let product = match row.try_get::<Option<Uuid>, _>("p_id")? {
            Some(_) => Some(Self::row_to_product(&row)?),
            None => None,
        };

        Ok(CartLine { item, product })
    }

    fn row_to_coupon(row: PgRow) -> Result<Coupon> {
        let discount_type: String = row.try_get("discount_type")?;
        let value: Decimal = row.try_get("discount_value")?;

        let discount = match discount_type.as_str() {
            "percentage" => CouponDiscount::Percentage {
                percent: value,
                max_discount: row
                    .try_get::<Option<i64>, _>("max_discount_amount")?
                    .map(Money::from_paise),
            },
            "fixed" => CouponDiscount::Fixed {
                amount: Money::from_paise(value.round().to_i64().ok_or_else(|| {
                    StoreError::CorruptRecord(format!("fixed discount {value} out of range"))
                })?),
            },
            other => {
                return Err(StoreError::CorruptRecord(format!(
                    "unknown discount type '{other}'"
                )));
            }
        };

        Ok(Coupon {
            code: row.try_get("code")?,
            discount,
            min_order_amount: row
                .try_get::<Option<i64>, _>("min_order_amount")?
                .map(Money::from_paise),
            valid_until: row.try_get("valid_until")?,
            is_active: row.try_get("is_active")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_number: row.try_get("order_number")?,
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            total_amount: Money::from_paise(row.try_get("total_amount")?),
            discount_amount: Money::from_paise(row.try_get("discount_amount")?),
            final_amount: Money::from_paise(row.try_get("final_amount")?),
            coupon_code: row.try_get("coupon_code")?,
            shipping_address: row.try_get("shipping_address")?,
            status: row
                .try_get::<String, _>("status")?
                .parse::<OrderStatus>()
                .map_err(StoreError::CorruptRecord)?,
            payment_status: row
                .try_get::<String, _>("payment_status")?
                .parse::<PaymentStatus>()
                .map_err(StoreError::CorruptRecord)?,
            payment_reference: row.try_get("payment_reference")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: decode_quantity(row.try_get("quantity")?)?,
            price_per_unit: Money::from_paise(row.try_get("price_per_unit")?),
            total_price: Money::from_paise(row.try_get("total_price")?),
            variant: row
                .try_get::<Option<Json<VariantSelection>>, _>("variant")?
                .map(|j| j.0),
            measurement: row
                .try_get::<Option<Json<MeasurementSelection>>, _>("measurement")?
                .map(|j| j.0),
        })
    }
}

fn decode_quantity(value: Decimal) -> Result<Quantity> {
    Quantity::new(value).map_err(|e| StoreError::CorruptRecord(e.to_string()))
}

/// Maps unique-constraint violations to `UniqueViolation`.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::UniqueViolation {
            constraint: db_err.constraint().unwrap_or("unknown").to_string(),
        };
    }
    StoreError::Database(e)
}

#[async_trait]
impl StorefrontStore for PostgresStore {
    async fn put_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_per_unit, offer_price_per_unit, stock_quantity, variants, measurements, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_per_unit = EXCLUDED.price_per_unit,
                offer_price_per_unit = EXCLUDED.offer_price_per_unit,
                stock_quantity = EXCLUDED.stock_quantity,
                variants = EXCLUDED.variants,
                measurements = EXCLUDED.measurements,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price_per_unit.paise())
        .bind(product.offer_price_per_unit.map(|m| m.paise()))
        .bind(product.stock_quantity)
        .bind(product.variants.map(Json))
        .bind(product.measurements.map(Json))
        .bind(product.is_active)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"))
                .bind(product_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| Self::row_to_product(&r)).transpose()
    }

    async fn put_coupon(&self, coupon: Coupon) -> Result<()> {
        let (value, max_discount) = match coupon.discount {
            CouponDiscount::Percentage {
                percent,
                max_discount,
            } => (percent, max_discount.map(|m| m.paise())),
            CouponDiscount::Fixed { amount } => (Decimal::from(amount.paise()), None),
        };

        sqlx::query(
            r#"
            INSERT INTO coupons (code, discount_type, discount_value, max_discount_amount, min_order_amount, valid_until, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT ((LOWER(code))) DO UPDATE SET
                code = EXCLUDED.code,
                discount_type = EXCLUDED.discount_type,
                discount_value = EXCLUDED.discount_value,
                max_discount_amount = EXCLUDED.max_discount_amount,
                min_order_amount = EXCLUDED.min_order_amount,
                valid_until = EXCLUDED.valid_until,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&coupon.code)
        .bind(coupon.discount.type_name())
        .bind(value)
        .bind(max_discount)
        .bind(coupon.min_order_amount.map(|m| m.paise()))
        .bind(coupon.valid_until)
        .bind(coupon.is_active)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn find_active_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT code, discount_type, discount_value, max_discount_amount, min_order_amount, valid_until, is_active
            FROM coupons
            WHERE LOWER(code) = LOWER($1) AND is_active
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_coupon).transpose()
    }

    async fn upsert_cart_item(&self, item: CartItem) -> Result<CartItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity, variant, measurement, added_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, product_id) DO UPDATE SET
                quantity = EXCLUDED.quantity,
                variant = EXCLUDED.variant,
                measurement = EXCLUDED.measurement
            RETURNING added_at
            "#,
        )
        .bind(item.user_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(item.quantity.value())
        .bind(item.variant.clone().map(Json))
        .bind(item.measurement.clone().map(Json))
        .bind(item.added_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Foreign key to products
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::NotFound {
                    entity: "product",
                    id: item.product_id.to_string(),
                };
            }
            map_write_error(e)
        })?;

        Ok(CartItem {
            added_at: row.try_get("added_at")?,
            ..item
        })
    }

    async fn remove_cart_item(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_uuid())
            .bind(product_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT c.user_id, c.product_id, c.quantity, c.variant, c.measurement, c.added_at, {PRODUCT_COLUMNS}
            FROM cart_items c
            LEFT JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.added_at ASC, c.product_id ASC
            "#
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart_line).collect()
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn create_order(&self, order: NewOrder, items: Vec<OrderItem>) -> Result<Order> {
        validate_order_for_insert(&order, &items)?;

        // Order and items commit together or not at all
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, user_id, total_amount, discount_amount, final_amount,
                                coupon_code, shipping_address, status, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', 'pending', $9, $9)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.order_number)
        .bind(order.user_id.as_uuid())
        .bind(order.total_amount.paise())
        .bind(order.discount_amount.paise())
        .bind(order.final_amount.paise())
        .bind(&order.coupon_code)
        .bind(&order.shipping_address)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, position, product_id, product_name, quantity,
                                         price_per_unit, total_price, variant, measurement)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_uuid())
            .bind(&item.product_name)
            .bind(item.quantity.value())
            .bind(item.price_per_unit.paise())
            .bind(item.total_price.paise())
            .bind(item.variant.clone().map(Json))
            .bind(item.measurement.clone().map(Json))
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        }

        tx.commit().await?;

        tracing::debug!(order_id = %order.id, items = items.len(), "order committed");
        Ok(order.into_order())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, price_per_unit, total_price, variant, measurement
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_item).collect()
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.payment_status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_status = ${param_count}"));
        }
        if query.created_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at < ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(payment_status) = query.payment_status {
            sqlx_query = sqlx_query.bind(payment_status.as_str());
        }
        if let Some(cutoff) = query.created_before {
            sqlx_query = sqlx_query.bind(cutoff);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn update_payment(&self, order_id: OrderId, update: PaymentUpdate) -> Result<Order> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE orders SET
                payment_status = $3,
                status = COALESCE($4, status),
                payment_reference = COALESCE($5, payment_reference),
                updated_at = NOW()
            WHERE id = $1 AND payment_status = $2 AND status <> 'abandoned'
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id.as_uuid())
        .bind(update.expected.as_str())
        .bind(update.payment_status.as_str())
        .bind(update.order_status.map(|s| s.as_str()))
        .bind(&update.reference)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_order(row);
        }

        // Nothing matched: report why
        let current = self
            .get_order(order_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;

        if current.status == OrderStatus::Abandoned {
            return Err(StoreError::OrderAbandoned(order_id));
        }

        Err(StoreError::PaymentStatusConflict {
            order_id,
            expected: update.expected,
            actual: current.payment_status,
        })
    }

    async fn abandon_stale_orders(&self, created_before: DateTime<Utc>) -> Result<Vec<OrderId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE orders SET status = 'abandoned', updated_at = NOW()
            WHERE status = 'pending' AND payment_status = 'pending' AND created_at < $1
            RETURNING id
            "#,
        )
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(OrderId::from_uuid).collect())
    }
}
