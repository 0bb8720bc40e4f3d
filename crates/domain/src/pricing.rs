//! Order pricing: subtotal, shipping, tax and total.

use serde::{Deserialize, Serialize};

use crate::money::{Money, TaxRate};

/// Configurable pricing rules applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Subtotals strictly above this ship for free.
    pub free_shipping_threshold: Money,
    /// Flat fee charged at or below the threshold.
    pub flat_shipping_fee: Money,
    pub tax_rate: TaxRate,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            free_shipping_threshold: Money::from_units(500),
            flat_shipping_fee: Money::from_units(25),
            tax_rate: TaxRate::from_percent(5),
        }
    }
}

/// The financial breakdown frozen into an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub tax: Money,
    pub total: Money,
}

impl PricingPolicy {
    /// Prices a sequence of `(unit price, quantity)` pairs.
    pub fn quote<I>(&self, lines: I) -> OrderTotals
    where
        I: IntoIterator<Item = (Money, u32)>,
    {
        let subtotal: Money = lines
            .into_iter()
            .map(|(price, quantity)| price.multiply(quantity))
            .sum();
        self.totals_for_subtotal(subtotal)
    }

    /// Derives shipping, tax and total from an already summed subtotal.
    pub fn totals_for_subtotal(&self, subtotal: Money) -> OrderTotals {
        let shipping_fee = self.shipping_fee_for(subtotal);
        let tax = subtotal.apply_rate(self.tax_rate);
        OrderTotals {
            subtotal,
            shipping_fee,
            tax,
            total: subtotal + shipping_fee + tax,
        }
    }

    pub fn shipping_fee_for(&self, subtotal: Money) -> Money {
        if subtotal > self.free_shipping_threshold {
            Money::zero()
        } else {
            self.flat_shipping_fee
        }
    }
}
