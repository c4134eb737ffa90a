//! Pure price computations shared by checkout and the hosted-checkout
//! session builder.
//!
//! The rounding direction is a business rule: the discount amount is
//! rounded *up* to a whole currency unit, so the charged price rounds
//! down. Callers depend on this being exact.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Price after applying a percentage discount.
///
/// `discounted_price(p, d) = p - ceil(p * d / 100)`
pub fn discounted_price(price: Decimal, discount_percent: Decimal) -> Decimal {
    let discount_amount = (price * discount_percent / Decimal::ONE_HUNDRED).ceil();
    price - discount_amount
}

/// Converts a major-unit amount to minor currency units (paise/cents),
/// rounding half away from zero. Returns `None` when the amount does not
/// fit an i64.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// A cart line as the pricing engine sees it. Fields are optional because
/// callers pass partially-populated line items; a line missing price or
/// quantity is excluded from every aggregate rather than failing the
/// whole computation. An absent discount means no discount.
#[derive(Debug, Clone, Default)]
pub struct PricedLine {
    pub price: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub quantity: Option<u32>,
}

/// Aggregate totals over a cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartTotals {
    /// Σ quantity · discounted_price(price, discount)
    pub total_with_discount: Decimal,
    /// Σ quantity · price
    pub total_without_discount: Decimal,
    /// total_without_discount - total_with_discount
    pub total_saved: Decimal,
}

pub fn cart_totals(lines: &[PricedLine]) -> CartTotals {
    let mut with_discount = Decimal::ZERO;
    let mut without_discount = Decimal::ZERO;

    for line in lines {
        let (price, quantity) = match (line.price, line.quantity) {
            (Some(price), Some(quantity)) => (price, Decimal::from(quantity)),
            _ => continue,
        };
        let discount = line.discount.unwrap_or(Decimal::ZERO);

        with_discount += quantity * discounted_price(price, discount);
        without_discount += quantity * price;
    }

    CartTotals {
        total_with_discount: with_discount,
        total_without_discount: without_discount,
        total_saved: without_discount - with_discount,
    }
}
