//! Landed cost computation
//!
//! All arithmetic is exact base-10 (`BigDecimal`). Premium and tax are each
//! rounded half-up to cents at the step that produces them; the total is never
//! re-rounded.

use bigdecimal::BigDecimal;
use serde::Serialize;
use tracing::warn;

/// Round half away from zero to `scale` decimal places
pub fn round_half_up(value: &BigDecimal, scale: i64) -> BigDecimal {
    let half = BigDecimal::new(5.into(), scale + 1);
    let zero = BigDecimal::from(0);
    // with_scale drops digits toward zero
    if *value >= zero {
        (value + &half).with_scale(scale)
    } else {
        (value - &half).with_scale(scale)
    }
}

fn round2(value: &BigDecimal) -> BigDecimal {
    round_half_up(value, 2)
}

/// Inputs for one line item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostInput {
    pub bid_amount: BigDecimal,
    pub premium_percent: BigDecimal,
    pub tax_percent: BigDecimal,
    pub shipping_cost: BigDecimal,
    pub quantity: i32,
}

impl CostInput {
    pub fn new(bid_amount: BigDecimal, premium_percent: BigDecimal, tax_percent: BigDecimal) -> Self {
        Self {
            bid_amount,
            premium_percent,
            tax_percent,
            shipping_cost: BigDecimal::from(0),
            quantity: 1,
        }
    }

    pub fn with_shipping(mut self, shipping_cost: BigDecimal) -> Self {
        self.shipping_cost = shipping_cost;
        self
    }

    pub fn with_quantity(mut self, quantity: i32) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Computed cost components
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostBreakdown {
    pub premium: BigDecimal,
    pub tax: BigDecimal,
    pub total_cost: BigDecimal,
    pub cost_per_item: BigDecimal,
    /// Quantity actually used for the per-item division
    pub quantity: i32,
}

/// Computes buyer's premium, sales tax, and landed cost
#[derive(Debug, Clone, Copy, Default)]
pub struct FinancialCalculator;

impl FinancialCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(&self, input: &CostInput) -> CostBreakdown {
        let hundred = BigDecimal::from(100);

        let quantity = if input.quantity < 1 {
            warn!(quantity = input.quantity, "Non-positive quantity, using 1");
            1
        } else {
            input.quantity
        };

        let premium = round2(&(&input.bid_amount * &input.premium_percent / &hundred));
        let subtotal = &input.bid_amount + &premium;
        let tax = round2(&(&subtotal * &input.tax_percent / &hundred));
        let total_cost = &subtotal + &tax + &input.shipping_cost;
        let cost_per_item = round2(&(&total_cost / &BigDecimal::from(quantity)));

        CostBreakdown {
            premium,
            tax,
            total_cost,
            cost_per_item,
            quantity,
        }
    }
}
