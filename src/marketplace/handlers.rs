use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{AddToCartRequest, CreateProductRequest, ProductFilter, SetQuantityRequest, UpdateProductRequest},
    repo::{self, NewProduct, Order, Product, ProductChanges, ProductSearch, ProductStatus},
    services::{check_price_and_stock, check_quantity, plan_checkout, Cart, MAX_LINE_QUANTITY},
};
use crate::{
    auth::{claims::Role, extractors::AuthUser},
    error::{AppError, AppResult},
    notifications,
    response::{created, non_empty, ok, ApiJson, ApiQuery, Envelope, Pagination},
    state::AppState,
};

const SELLERS: &[Role] = &[Role::Farmer, Role::Admin];

pub fn marketplace_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/cart", get(get_cart).post(add_to_cart))
        .route("/cart/checkout", post(checkout))
        .route("/cart/:product_id", put(set_quantity).delete(remove_from_cart))
        .route("/orders", get(list_orders))
}

async fn load_active(state: &AppState, id: Uuid) -> AppResult<Product> {
    repo::get(&state.db, id)
        .await?
        .filter(|p| p.status == ProductStatus::Active)
        .ok_or_else(|| AppError::not_found("Product"))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(p): ApiQuery<Pagination>,
    ApiQuery(f): ApiQuery<ProductFilter>,
) -> AppResult<Json<Envelope<Vec<Product>>>> {
    let search = ProductSearch {
        q: non_empty(f.q),
        category: non_empty(f.category).map(|c| c.to_lowercase()),
        seller: f.seller,
    };
    Ok(ok(repo::list_active(&state.db, &search, p.limit(), p.offset()).await?))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Envelope<Product>>> {
    Ok(ok(load_active(&state, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Envelope<Product>>)> {
    auth.require(SELLERS)?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    check_price_and_stock(Some(payload.price_cents), Some(payload.stock))?;

    let id = repo::create(
        &state.db,
        NewProduct {
            seller_id: auth.id,
            name: name.to_string(),
            description: payload.description.trim().to_string(),
            category: non_empty(payload.category)
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|| "produce".to_string()),
            price_cents: payload.price_cents,
            stock: payload.stock,
            unit: non_empty(payload.unit).unwrap_or_else(|| "unit".to_string()),
            image_url: non_empty(payload.image_url),
        },
    )
    .await?;
    let product = load_active(&state, id).await?;
    info!(product_id = %id, seller_id = %auth.id, "product listed");
    Ok(created(product))
}

#[instrument(skip(state, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UpdateProductRequest>,
) -> AppResult<Json<Envelope<Product>>> {
    let product = load_active(&state, id).await?;
    if product.seller_id != auth.id {
        return Err(AppError::forbidden("Only the seller can edit this product"));
    }
    if matches!(&payload.name, Some(n) if n.trim().is_empty()) {
        return Err(AppError::bad_request("Name cannot be empty"));
    }
    check_price_and_stock(payload.price_cents, payload.stock)?;

    let changes = ProductChanges {
        name: payload.name.map(|n| n.trim().to_string()),
        description: payload.description,
        category: non_empty(payload.category).map(|c| c.to_lowercase()),
        price_cents: payload.price_cents,
        stock: payload.stock,
        unit: non_empty(payload.unit),
        image_url: non_empty(payload.image_url),
    };
    repo::update(&state.db, id, changes).await?;
    info!(product_id = %id, "product updated");
    Ok(ok(load_active(&state, id).await?))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let product = load_active(&state, id).await?;
    auth.require_owner(product.seller_id)?;
    repo::set_status(&state.db, id, ProductStatus::Hidden).await?;
    info!(product_id = %id, by = %auth.id, "product hidden");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn get_cart(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Envelope<Cart>>> {
    Ok(ok(Cart::try_from(repo::cart_lines(&state.db, auth.id).await?)?))
}

#[instrument(skip(state, payload))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<AddToCartRequest>,
) -> AppResult<Json<Envelope<Cart>>> {
    check_quantity(payload.quantity)?;
    let product = load_active(&state, payload.product_id).await?;
    if product.seller_id == auth.id {
        return Err(AppError::bad_request("You cannot buy your own product"));
    }
    if !repo::add_to_cart(&state.db, auth.id, product.id, payload.quantity, MAX_LINE_QUANTITY).await? {
        return Err(AppError::bad_request(format!(
            "Quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(ok(Cart::try_from(repo::cart_lines(&state.db, auth.id).await?)?))
}

#[instrument(skip(state, payload))]
pub async fn set_quantity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(product_id): Path<Uuid>,
    ApiJson(payload): ApiJson<SetQuantityRequest>,
) -> AppResult<Json<Envelope<Cart>>> {
    let found = match payload.quantity {
        q if q < 0 => return Err(AppError::bad_request("Quantity cannot be negative")),
        0 => repo::remove_from_cart(&state.db, auth.id, product_id).await?,
        q => {
            check_quantity(q)?;
            repo::set_cart_quantity(&state.db, auth.id, product_id, q).await?
        }
    };
    if !found {
        return Err(AppError::not_found("Cart item"));
    }
    Ok(ok(Cart::try_from(repo::cart_lines(&state.db, auth.id).await?)?))
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Envelope<Cart>>> {
    if !repo::remove_from_cart(&state.db, auth.id, product_id).await? {
        return Err(AppError::not_found("Cart item"));
    }
    Ok(ok(Cart::try_from(repo::cart_lines(&state.db, auth.id).await?)?))
}

#[instrument(skip(state))]
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<(StatusCode, Json<Envelope<Order>>)> {
    let mut tx = state.db.begin().await?;
    let lines = repo::cart_lines_for_update(&mut *tx, auth.id).await?;
    let plan = plan_checkout(&lines)?;

    let order_id = repo::insert_order(&mut *tx, auth.id, plan.total_cents).await?;
    for line in &lines {
        repo::decrement_stock(&mut *tx, line.product_id, line.quantity).await?;
        repo::insert_order_item(&mut *tx, order_id, line).await?;
    }
    repo::clear_cart(&mut *tx, auth.id).await?;
    tx.commit().await?;

    for seller in &plan.sellers {
        notifications::notify(
            &state.db,
            *seller,
            "order",
            "New order",
            "A buyer placed an order for your products",
            Some("/orders"),
        )
        .await;
    }

    let order = repo::get_order(&state.db, order_id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    info!(%order_id, buyer_id = %auth.id, total_cents = plan.total_cents, "order placed");
    Ok(created(order))
}

#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(p): ApiQuery<Pagination>,
) -> AppResult<Json<Envelope<Vec<Order>>>> {
    Ok(ok(repo::list_orders(&state.db, auth.id, p.limit(), p.offset()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::jwt::JwtKeys};
    use axum::{body::Body, extract::FromRef, http::Request};
    use tower::ServiceExt;

    fn token(state: &AppState, role: Role) -> String {
        JwtKeys::from_ref(state).sign_access(Uuid::new_v4(), role).unwrap()
    }

    #[tokio::test]
    async fn buyers_cannot_list_products() {
        let state = AppState::fake();
        let t = token(&state, Role::Buyer);
        let res = build_app(state)
            .oneshot(
                Request::post("/api/products")
                    .header("authorization", format!("Bearer {t}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"Maize","price_cents":500,"stock":10}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn negative_price_is_400() {
        let state = AppState::fake();
        let t = token(&state, Role::Farmer);
        let res = build_app(state)
            .oneshot(
                Request::post("/api/products")
                    .header("authorization", format!("Bearer {t}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"Maize","price_cents":-5,"stock":10}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn zero_quantity_add_is_400() {
        let state = AppState::fake();
        let t = token(&state, Role::Buyer);
        let body = format!(r#"{{"product_id":"{}","quantity":0}}"#, Uuid::new_v4());
        let res = build_app(state)
            .oneshot(
                Request::post("/api/cart")
                    .header("authorization", format!("Bearer {t}"))
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn checkout_requires_auth() {
        let res = build_app(AppState::fake())
            .oneshot(Request::post("/api/cart/checkout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    mod with_db {
        use super::*;
        use crate::testing::{bearer, call, seed_user};
        use axum::http::Method;
        use serde_json::json;
        use sqlx::PgPool;

        async fn list_tomatoes(db: &PgPool, seller: Uuid, price_cents: i64, stock: i32) -> Uuid {
            repo::create(
                db,
                NewProduct {
                    seller_id: seller,
                    name: "Tomatoes".into(),
                    description: String::new(),
                    category: "produce".into(),
                    price_cents,
                    stock,
                    unit: "kg".into(),
                    image_url: None,
                },
            )
            .await
            .unwrap()
        }

        async fn stock_of(db: &PgPool, product: Uuid) -> i32 {
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                .bind(product)
                .fetch_one(db)
                .await
                .unwrap()
        }

        #[sqlx::test]
        async fn checkout_places_order_and_clears_cart(db: PgPool) {
            let seller = seed_user(&db, Role::Farmer).await;
            let buyer = seed_user(&db, Role::Buyer).await;
            let product = list_tomatoes(&db, seller, 250, 10).await;
            let state = AppState::fake_with_db(db.clone());
            let auth = bearer(&state, buyer, Role::Buyer);
            let app = build_app(state);

            let body = json!({ "product_id": product, "quantity": 3 });
            let (status, cart) = call(&app, Method::POST, "/api/cart", Some(&auth), Some(body)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(cart["data"]["total_cents"], 750);

            let (status, order) = call(&app, Method::POST, "/api/cart/checkout", Some(&auth), None).await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(order["data"]["total_cents"], 750);
            assert_eq!(order["data"]["items"][0]["quantity"], 3);
            assert_eq!(stock_of(&db, product).await, 7);

            let (_, cart) = call(&app, Method::GET, "/api/cart", Some(&auth), None).await;
            assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 0);

            let notified: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
                .bind(seller)
                .fetch_one(&db)
                .await
                .unwrap();
            assert_eq!(notified, 1);
        }

        #[sqlx::test]
        async fn concurrent_checkouts_place_one_order(db: PgPool) {
            let seller = seed_user(&db, Role::Farmer).await;
            let buyer = seed_user(&db, Role::Buyer).await;
            let product = list_tomatoes(&db, seller, 250, 10).await;
            let state = AppState::fake_with_db(db.clone());
            let auth = bearer(&state, buyer, Role::Buyer);
            let app = build_app(state);

            let body = json!({ "product_id": product, "quantity": 3 });
            let (status, _) = call(&app, Method::POST, "/api/cart", Some(&auth), Some(body)).await;
            assert_eq!(status, StatusCode::OK);

            let (first, second) = tokio::join!(
                call(&app, Method::POST, "/api/cart/checkout", Some(&auth), None),
                call(&app, Method::POST, "/api/cart/checkout", Some(&auth), None),
            );
            let mut codes = [first.0.as_u16(), second.0.as_u16()];
            codes.sort_unstable();
            assert_eq!(codes, [201, 400]);

            assert_eq!(stock_of(&db, product).await, 7);
            let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE buyer_id = $1")
                .bind(buyer)
                .fetch_one(&db)
                .await
                .unwrap();
            assert_eq!(orders, 1);
        }

        #[sqlx::test]
        async fn cart_line_quantity_is_capped(db: PgPool) {
            let seller = seed_user(&db, Role::Farmer).await;
            let buyer = seed_user(&db, Role::Buyer).await;
            let product = list_tomatoes(&db, seller, 250, 10).await;
            let state = AppState::fake_with_db(db.clone());
            let auth = bearer(&state, buyer, Role::Buyer);
            let app = build_app(state);

            let full = json!({ "product_id": product, "quantity": MAX_LINE_QUANTITY });
            let (status, _) = call(&app, Method::POST, "/api/cart", Some(&auth), Some(full)).await;
            assert_eq!(status, StatusCode::OK);

            let one_more = json!({ "product_id": product, "quantity": 1 });
            let (status, _) = call(&app, Method::POST, "/api/cart", Some(&auth), Some(one_more)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);

            let too_many = json!({ "product_id": product, "quantity": i32::MAX });
            let (status, _) = call(&app, Method::POST, "/api/cart", Some(&auth), Some(too_many)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);

            let (_, cart) = call(&app, Method::GET, "/api/cart", Some(&auth), None).await;
            assert_eq!(cart["data"]["items"][0]["quantity"], MAX_LINE_QUANTITY);
        }
    }
}
