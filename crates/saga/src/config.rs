//! Checkout tuning knobs.

use std::time::Duration;

use domain::PricingPolicy;

/// Settings for one [`OrderAssembler`](crate::OrderAssembler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaConfig {
    pub pricing: PricingPolicy,
    /// Deadline applied by [`OrderAssembler::place_order`](crate::OrderAssembler::place_order).
    pub checkout_timeout: Duration,
    /// Budget for each release call while compensating, and for the cart clear.
    pub compensation_grace: Duration,
    /// Order numbers tried before a collision becomes a persistence failure.
    pub order_number_attempts: u32,
}

impl SagaConfig {
    pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_COMPENSATION_GRACE: Duration = Duration::from_secs(5);
    pub const DEFAULT_ORDER_NUMBER_ATTEMPTS: u32 = 3;

    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_checkout_timeout(mut self, timeout: Duration) -> Self {
        self.checkout_timeout = timeout;
        self
    }

    pub fn with_compensation_grace(mut self, grace: Duration) -> Self {
        self.compensation_grace = grace;
        self
    }

    /// Values below one are treated as one.
    pub fn with_order_number_attempts(mut self, attempts: u32) -> Self {
        self.order_number_attempts = attempts.max(1);
        self
    }
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            checkout_timeout: Self::DEFAULT_CHECKOUT_TIMEOUT,
            compensation_grace: Self::DEFAULT_COMPENSATION_GRACE,
            order_number_attempts: Self::DEFAULT_ORDER_NUMBER_ATTEMPTS,
        }
    }
}
