use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::enums::text_enum;

text_enum! {
    pub enum ProductStatus {
        Active => "active",
        Hidden => "hidden",
    }
}

text_enum! {
    pub enum OrderStatus {
        Placed => "placed",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub seller_name: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub stock: i32,
    pub unit: String,
    pub image_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ProductStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A cart row joined with the product it points at.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub unit: String,
    pub image_url: Option<String>,
    pub price_cents: i64,
    pub stock: i32,
    #[sqlx(try_from = "String")]
    pub status: ProductStatus,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub seller_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub total_cents: i64,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

#[derive(Debug)]
pub struct NewProduct {
    pub seller_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub stock: i32,
    pub unit: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub stock: Option<i32>,
    pub unit: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProductSearch {
    pub q: Option<String>,
    pub category: Option<String>,
    pub seller: Option<Uuid>,
}

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.seller_id, u.name AS seller_name, p.name, p.description, p.category,
           p.price_cents, p.stock, p.unit, p.image_url, p.status, p.created_at, p.updated_at
      FROM products p
      JOIN users u ON u.id = p.seller_id
"#;

const CART_SELECT: &str = r#"
    SELECT c.product_id, p.seller_id, p.name, p.unit, p.image_url, p.price_cents,
           p.stock, p.status, c.quantity
      FROM cart_items c
      JOIN products p ON p.id = c.product_id
"#;

pub async fn list_active(
    db: &PgPool,
    search: &ProductSearch,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Product>> {
    let sql = format!(
        r#"{PRODUCT_SELECT}
         WHERE p.status = 'active'
           AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%' OR p.description ILIKE '%' || $1 || '%')
           AND ($2::text IS NULL OR p.category = $2)
           AND ($3::uuid IS NULL OR p.seller_id = $3)
         ORDER BY p.created_at DESC
         LIMIT $4 OFFSET $5
        "#
    );
    sqlx::query_as::<_, Product>(&sql)
        .bind(search.q.as_deref())
        .bind(search.category.as_deref())
        .bind(search.seller)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
}

pub async fn get<'e, E: PgExecutor<'e>>(ex: E, id: Uuid) -> sqlx::Result<Option<Product>> {
    let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
    sqlx::query_as::<_, Product>(&sql).bind(id).fetch_optional(ex).await
}

pub async fn create(db: &PgPool, p: NewProduct) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO products (seller_id, name, description, category, price_cents, stock, unit, image_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(p.seller_id)
    .bind(p.name)
    .bind(p.description)
    .bind(p.category)
    .bind(p.price_cents)
    .bind(p.stock)
    .bind(p.unit)
    .bind(p.image_url)
    .fetch_one(db)
    .await
}

pub async fn update(db: &PgPool, id: Uuid, c: ProductChanges) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE products
           SET name = COALESCE($2, name),
               description = COALESCE($3, description),
               category = COALESCE($4, category),
               price_cents = COALESCE($5, price_cents),
               stock = COALESCE($6, stock),
               unit = COALESCE($7, unit),
               image_url = COALESCE($8, image_url),
               updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(c.name)
    .bind(c.description)
    .bind(c.category)
    .bind(c.price_cents)
    .bind(c.stock)
    .bind(c.unit)
    .bind(c.image_url)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn set_status(db: &PgPool, id: Uuid, status: ProductStatus) -> sqlx::Result<u64> {
    let res = sqlx::query("UPDATE products SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}

pub async fn cart_lines(db: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<CartLine>> {
    let sql = format!("{CART_SELECT} WHERE c.user_id = $1 ORDER BY c.added_at ASC");
    sqlx::query_as::<_, CartLine>(&sql).bind(user_id).fetch_all(db).await
}

/// Same as [`cart_lines`] but row-locks the cart lines and their products
/// until the transaction ends. Lines removed by a concurrent checkout drop out.
pub async fn cart_lines_for_update(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<Vec<CartLine>> {
    let sql = format!("{CART_SELECT} WHERE c.user_id = $1 ORDER BY p.id FOR UPDATE OF c, p");
    sqlx::query_as::<_, CartLine>(&sql).bind(user_id).fetch_all(conn).await
}

/// Adds to an existing line instead of replacing it. Returns false, leaving
/// the line untouched, when the combined quantity would exceed `max_quantity`.
pub async fn add_to_cart(
    db: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    max_quantity: i32,
) -> sqlx::Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO cart_items (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
         WHERE cart_items.quantity + EXCLUDED.quantity <= $4
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(max_quantity)
    .execute(db)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn set_cart_quantity(db: &PgPool, user_id: Uuid, product_id: Uuid, quantity: i32) -> sqlx::Result<bool> {
    let res = sqlx::query("UPDATE cart_items SET quantity = $3 WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(db)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn remove_from_cart(db: &PgPool, user_id: Uuid, product_id: Uuid) -> sqlx::Result<bool> {
    let res = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn clear_cart<'e, E: PgExecutor<'e>>(ex: E, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn decrement_stock<'e, E: PgExecutor<'e>>(ex: E, product_id: Uuid, quantity: i32) -> sqlx::Result<()> {
    sqlx::query("UPDATE products SET stock = stock - $2, updated_at = now() WHERE id = $1")
        .bind(product_id)
        .bind(quantity)
        .execute(ex)
        .await?;
    Ok(())
}

pub async fn insert_order<'e, E: PgExecutor<'e>>(ex: E, buyer_id: Uuid, total_cents: i64) -> sqlx::Result<Uuid> {
    sqlx::query_scalar::<_, Uuid>("INSERT INTO orders (buyer_id, total_cents) VALUES ($1, $2) RETURNING id")
        .bind(buyer_id)
        .bind(total_cents)
        .fetch_one(ex)
        .await
}

pub async fn insert_order_item<'e, E: PgExecutor<'e>>(ex: E, order_id: Uuid, line: &CartLine) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO order_items (order_id, product_id, seller_id, quantity, unit_price_cents)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(order_id)
    .bind(line.product_id)
    .bind(line.seller_id)
    .bind(line.quantity)
    .bind(line.price_cents)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn list_orders(db: &PgPool, buyer_id: Uuid, limit: i64, offset: i64) -> sqlx::Result<Vec<Order>> {
    let mut orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, buyer_id, total_cents, status, created_at
          FROM orders
         WHERE buyer_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#,
    )
    .bind(buyer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = items_for(db, &ids).await?;
    for order in &mut orders {
        order.items = items.iter().filter(|i| i.order_id == order.id).cloned().collect();
    }
    Ok(orders)
}

pub async fn get_order<'e, E>(ex: E, id: Uuid) -> sqlx::Result<Option<Order>>
where
    E: PgExecutor<'e> + Copy,
{
    let order = sqlx::query_as::<_, Order>(
        "SELECT id, buyer_id, total_cents, status, created_at FROM orders WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;
    match order {
        Some(mut o) => {
            o.items = items_for(ex, &[id]).await?;
            Ok(Some(o))
        }
        None => Ok(None),
    }
}

async fn items_for<'e, E: PgExecutor<'e>>(ex: E, order_ids: &[Uuid]) -> sqlx::Result<Vec<OrderItem>> {
    sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT i.order_id, i.product_id, p.name AS product_name, i.seller_id,
               i.quantity, i.unit_price_cents
          FROM order_items i
          JOIN products p ON p.id = i.product_id
         WHERE i.order_id = ANY($1)
         ORDER BY p.name
        "#,
    )
    .bind(order_ids)
    .fetch_all(ex)
    .await
}
