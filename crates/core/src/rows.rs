//! Row types stored by every backend model
//!
//! The engine never keeps these in process memory beyond a single
//! operation; they live in the backend and are read back by the verifier.

use crate::types::{OrderId, RowKey, Sku};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Money in integer cents
pub type Cents = i64;

/// Order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, reservation in progress
    Pending,
    /// Reserved and paid
    Paid,
    /// Out of stock or compensated after a late failure
    Cancelled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Money taken from the customer
    Captured,
    /// Money returned by compensation
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Captured => "CAPTURED",
            PaymentStatus::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

/// One line of a cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Reserved SKU
    pub sku: Sku,
    /// Units reserved
    pub qty: i64,
    /// Price per unit
    pub unit_price: Cents,
}

/// Order lines; carts hold one to three lines
pub type OrderLines = SmallVec<[OrderLine; 3]>;

/// Inventory row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Key
    pub sku: Sku,
    /// Stock seeded by setup
    pub initial: i64,
    /// Stock currently available
    pub available: i64,
}

impl InventoryItem {
    /// Freshly seeded row with `available == initial`
    pub fn seeded(sku: Sku, initial: i64) -> Self {
        Self {
            sku,
            initial,
            available: initial,
        }
    }
}

/// Order row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Identity
    pub id: OrderId,
    /// Lifecycle state
    pub status: OrderStatus,
    /// Cart lines
    pub lines: OrderLines,
    /// Sum of `qty * unit_price`
    pub total: Cents,
}

impl Order {
    /// New PENDING order for the given cart
    pub fn pending(id: OrderId, lines: OrderLines) -> Self {
        let total = lines.iter().map(|l| l.qty * l.unit_price).sum();
        Self {
            id,
            status: OrderStatus::Pending,
            lines,
            total,
        }
    }

    /// Units of `sku` across all lines
    pub fn units_of(&self, sku: &Sku) -> i64 {
        self.lines
            .iter()
            .filter(|l| &l.sku == sku)
            .map(|l| l.qty)
            .sum()
    }
}

/// Payment row, keyed by its order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Linked order
    pub order_id: OrderId,
    /// Payment state
    pub status: PaymentStatus,
    /// Captured amount
    pub amount: Cents,
}

/// Eventually-consistent copy of an order's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionRecord {
    /// Mirrored order
    pub order_id: OrderId,
    /// Status as of the last sweep that touched it
    pub status: OrderStatus,
    /// Total as of that sweep
    pub total: Cents,
    /// When the reconciler wrote it
    pub last_update: DateTime<Utc>,
}

/// Unified row enum for all tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Row {
    /// Inventory table
    Inventory(InventoryItem),
    /// Orders table
    Order(Order),
    /// Payments table
    Payment(Payment),
    /// Projection table
    Projection(ProjectionRecord),
}

impl Row {
    /// Key under which this row is stored
    pub fn key(&self) -> RowKey {
        match self {
            Row::Inventory(item) => RowKey::Inventory(item.sku.clone()),
            Row::Order(order) => RowKey::Order(order.id),
            Row::Payment(payment) => RowKey::Payment(payment.order_id),
            Row::Projection(record) => RowKey::Projection(record.order_id),
        }
    }

    /// Borrow as inventory row
    pub fn as_inventory(&self) -> Option<&InventoryItem> {
        match self {
            Row::Inventory(item) => Some(item),
            _ => None,
        }
    }

    /// Borrow as order row
    pub fn as_order(&self) -> Option<&Order> {
        match self {
            Row::Order(order) => Some(order),
            _ => None,
        }
    }

    /// Borrow as payment row
    pub fn as_payment(&self) -> Option<&Payment> {
        match self {
            Row::Payment(payment) => Some(payment),
            _ => None,
        }
    }

    /// Borrow as projection row
    pub fn as_projection(&self) -> Option<&ProjectionRecord> {
        match self {
            Row::Projection(record) => Some(record),
            _ => None,
        }
    }
}
