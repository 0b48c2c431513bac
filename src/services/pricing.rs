//! Pure money math for orders: per-line totals, order subtotal, and the
//! discount/tax derivation chain. No I/O; persistence is the caller's job.

use crate::errors::ServiceError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw line item as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
}

/// Line item with its computed total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub line_total: Decimal,
}

/// Derived order-level amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total_after_discount: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

/// Monetary inputs carry at most 2 fraction digits.
fn exceeds_money_scale(value: Decimal) -> bool {
    value.round_dp(2) != value
}

/// Computes each line's total and the order subtotal.
///
/// `line_total = quantity * unit_price - discount`, which the input
/// constraints keep non-negative. Returns the priced lines in input order
/// together with `subtotal = Σ line_total`.
pub fn aggregate(items: &[LineItemInput]) -> Result<(Vec<PricedLine>, Decimal), ServiceError> {
    let mut priced = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;

    for (index, item) in items.iter().enumerate() {
        if item.quantity <= 0 {
            return Err(ServiceError::InvalidLineItem(format!(
                "line {}: quantity must be positive, got {}",
                index, item.quantity
            )));
        }
        if item.unit_price.is_sign_negative() {
            return Err(ServiceError::InvalidLineItem(format!(
                "line {}: unit price must not be negative, got {}",
                index, item.unit_price
            )));
        }
        if item.discount.is_sign_negative() {
            return Err(ServiceError::InvalidLineItem(format!(
                "line {}: discount must not be negative, got {}",
                index, item.discount
            )));
        }
        if exceeds_money_scale(item.unit_price) || exceeds_money_scale(item.discount) {
            return Err(ServiceError::InvalidLineItem(format!(
                "line {}: monetary amounts are limited to 2 decimal places",
                index
            )));
        }

        let gross = Decimal::from(item.quantity) * item.unit_price;
        if item.discount > gross {
            return Err(ServiceError::InvalidLineItem(format!(
                "line {}: discount {} exceeds line amount {}",
                index, item.discount, gross
            )));
        }

        let line_total = gross - item.discount;
        subtotal += line_total;

        priced.push(PricedLine {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount,
            line_total,
        });
    }

    Ok((priced, subtotal))
}

/// Derives discount/tax/grand-total fields from the subtotal.
///
/// `total_after_discount` is deliberately NOT clamped at zero: an overall
/// discount larger than the subtotal propagates a negative payable chain,
/// matching the upstream business rule until product owners decide
/// otherwise. The tax amount is rounded to 2 decimal places.
pub fn compute_totals(
    subtotal: Decimal,
    overall_discount: Decimal,
    tax_percentage: Decimal,
) -> Result<Totals, ServiceError> {
    if overall_discount.is_sign_negative() {
        return Err(ServiceError::ValidationError(format!(
            "overall discount must not be negative, got {}",
            overall_discount
        )));
    }
    if exceeds_money_scale(overall_discount) {
        return Err(ServiceError::ValidationError(
            "overall discount is limited to 2 decimal places".to_string(),
        ));
    }
    if tax_percentage.is_sign_negative() {
        return Err(ServiceError::ValidationError(format!(
            "tax percentage must not be negative, got {}",
            tax_percentage
        )));
    }

    let total_after_discount = subtotal - overall_discount;
    let tax_amount = (total_after_discount * tax_percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let grand_total = total_after_discount + tax_amount;

    Ok(Totals {
        total_after_discount,
        tax_amount,
        grand_total,
    })
}
