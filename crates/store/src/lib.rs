//! Storage for marketplace checkout.
//!
//! Four narrow traits cover what the checkout saga and the HTTP layer need:
//! - [`StockLedger`]: conditional reserve/release of per-product stock
//! - [`ProductCatalog`]: authoritative product reads
//! - [`CartStore`]: buyer carts
//! - [`OrderStore`]: placed orders
//!
//! [`InMemoryStore`] and [`PostgresStore`] implement all four.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{ORDER_NUMBER_CONSTRAINT, Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{
    CartStore, OrderStore, ProductCatalog, ReleaseOutcome, ReserveOutcome, StockLedger,
};
