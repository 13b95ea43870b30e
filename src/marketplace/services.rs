use serde::Serialize;
use uuid::Uuid;

use super::repo::{CartLine, ProductStatus};
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct Cart {
    pub items: Vec<CartLine>,
    pub total_cents: i64,
}

/// Upper bound for a listed price: 100 million in minor units.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;
/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

impl TryFrom<Vec<CartLine>> for Cart {
    type Error = AppError;

    fn try_from(items: Vec<CartLine>) -> AppResult<Self> {
        let total_cents = cart_total(&items)?;
        Ok(Cart { items, total_cents })
    }
}

pub fn cart_total(lines: &[CartLine]) -> AppResult<i64> {
    lines.iter().try_fold(0i64, |acc, l| {
        l.price_cents
            .checked_mul(i64::from(l.quantity))
            .and_then(|line_total| acc.checked_add(line_total))
            .ok_or_else(|| AppError::bad_request("Cart total is too large"))
    })
}

pub fn check_quantity(quantity: i32) -> AppResult<()> {
    if quantity < 1 {
        return Err(AppError::bad_request("Quantity must be at least 1"));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::bad_request(format!(
            "Quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// What a checkout will commit, computed before any write.
#[derive(Debug, PartialEq)]
pub struct CheckoutPlan {
    pub total_cents: i64,
    pub sellers: Vec<Uuid>,
}

pub fn plan_checkout(lines: &[CartLine]) -> AppResult<CheckoutPlan> {
    if lines.is_empty() {
        return Err(AppError::bad_request("Cart is empty"));
    }
    for l in lines {
        if l.status != ProductStatus::Active {
            return Err(AppError::bad_request(format!("{} is no longer available", l.name)));
        }
        if l.quantity > l.stock {
            return Err(AppError::bad_request(format!(
                "Insufficient stock for {} ({} left)",
                l.name, l.stock
            )));
        }
    }

    let mut sellers: Vec<Uuid> = lines.iter().map(|l| l.seller_id).collect();
    sellers.sort();
    sellers.dedup();

    Ok(CheckoutPlan {
        total_cents: cart_total(lines)?,
        sellers,
    })
}

pub fn check_price_and_stock(price_cents: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if matches!(price_cents, Some(p) if p < 0) {
        return Err(AppError::bad_request("Price cannot be negative"));
    }
    if matches!(price_cents, Some(p) if p > MAX_PRICE_CENTS) {
        return Err(AppError::bad_request("Price is too large"));
    }
    if matches!(stock, Some(s) if s < 0) {
        return Err(AppError::bad_request("Stock cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(seller: Uuid, price: i64, qty: i32, stock: i32) -> CartLine {
        CartLine {
            product_id: Uuid::new_v4(),
            seller_id: seller,
            name: "Tomatoes".into(),
            unit: "kg".into(),
            image_url: None,
            price_cents: price,
            stock,
            status: ProductStatus::Active,
            quantity: qty,
        }
    }

    #[test]
    fn totals_multiply_by_quantity() {
        let s = Uuid::new_v4();
        let cart = Cart::try_from(vec![line(s, 250, 4, 10), line(s, 1_000, 1, 1)]).unwrap();
        assert_eq!(cart.total_cents, 2_000);
        assert_eq!(Cart::try_from(Vec::<CartLine>::new()).unwrap().total_cents, 0);
    }

    #[test]
    fn overflowing_total_is_400_not_a_panic() {
        let s = Uuid::new_v4();
        let huge = line(s, i64::MAX / 2 + 1, 2, 5);
        let err = Cart::try_from(vec![huge]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);

        let near_max = line(s, i64::MAX - 10, 1, 5);
        let err = plan_checkout(&[near_max, line(s, 100, 1, 5)]).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn quantity_bounds() {
        assert!(check_quantity(1).is_ok());
        assert!(check_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(check_quantity(0).is_err());
        assert!(check_quantity(MAX_LINE_QUANTITY + 1).is_err());
        assert!(check_quantity(i32::MAX).is_err());
    }

    #[test]
    fn plan_dedups_sellers() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let plan = plan_checkout(&[line(a, 100, 1, 5), line(b, 200, 2, 5), line(a, 50, 2, 2)]).unwrap();
        assert_eq!(plan.total_cents, 600);
        assert_eq!(plan.sellers.len(), 2);
        assert!(plan.sellers.contains(&a) && plan.sellers.contains(&b));
    }

    #[test]
    fn empty_cart_and_short_stock_rejected() {
        assert!(matches!(plan_checkout(&[]), Err(AppError::BadRequest(_))));

        let short = line(Uuid::new_v4(), 100, 3, 2);
        assert!(matches!(plan_checkout(&[short]), Err(AppError::BadRequest(_))));

        let mut hidden = line(Uuid::new_v4(), 100, 1, 2);
        hidden.status = ProductStatus::Hidden;
        assert!(matches!(plan_checkout(&[hidden]), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn negative_price_or_stock() {
        assert!(check_price_and_stock(Some(0), Some(0)).is_ok());
        assert!(check_price_and_stock(None, None).is_ok());
        assert!(check_price_and_stock(Some(-1), None).is_err());
        assert!(check_price_and_stock(None, Some(-3)).is_err());
        assert!(check_price_and_stock(Some(MAX_PRICE_CENTS), None).is_ok());
        assert!(check_price_and_stock(Some(MAX_PRICE_CENTS + 1), None).is_err());
    }
}
