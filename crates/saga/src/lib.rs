//! Inventory-reserving checkout saga.
//!
//! This crate turns a buyer's cart into a durable order while protecting
//! per-product stock against over-selling. The saga follows these steps:
//! 1. Look up each cart line in the catalog and reserve its stock
//! 2. Price the order and draw an order number
//! 3. Persist the order
//! 4. Clear the cart (best effort)
//!
//! If a step before the order is persisted fails, every reservation made so
//! far is released before the error is returned.

pub mod assembler;
pub mod compensation;
pub mod config;
pub mod error;
pub mod state;

pub use assembler::OrderAssembler;
pub use compensation::{
    CompensationReport, CompensationSupervisor, FailedRelease, Reservation, ReservationGuard,
};
pub use config::SagaConfig;
pub use error::SagaError;
pub use state::SagaState;
