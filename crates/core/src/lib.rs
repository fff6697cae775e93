//! Core types for tally
//!
//! This crate defines the foundational types used throughout the system:
//! - Sku, OrderId: identities of inventory rows and orders
//! - TypeTag, RowKey: table discrimination and composite keys
//! - Row and its variants: inventory, order, payment, projection records
//! - TallyError: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod rows;
pub mod types;

pub use error::{TallyError, TallyResult};
pub use rows::{
    Cents, InventoryItem, Order, OrderLine, OrderLines, OrderStatus, Payment, PaymentStatus,
    ProjectionRecord, Row,
};
pub use types::{OrderId, RowKey, Sku, TypeTag};
