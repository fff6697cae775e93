//! Identifier and key types
//!
//! This module defines the foundational types:
//! - Sku: inventory key
//! - OrderId: order identity (payments and projections share it)
//! - TypeTag: discriminates the logical tables of a backend
//! - RowKey: composite key (type tag + identity) used by every store

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stock keeping unit, the key of an inventory row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    /// Create a SKU from any string
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// SKU of the `index`-th hot key (`SKU-000`, `SKU-001`, ...)
    pub fn hot(index: usize) -> Self {
        Self(format!("SKU-{:03}", index))
    }

    /// Borrow the SKU text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for an order
///
/// Wraps a UUID v4. Workers build ids from their own seeded RNG via
/// [`OrderId::from_random_bytes`] so seeded runs stay reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// Create a new random OrderId using the OS entropy source
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a v4 UUID from caller-supplied random bytes
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type tag for the logical tables of a backend
///
/// Ordering: Inventory < Order < Payment < Projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TypeTag {
    /// Inventory rows keyed by SKU
    Inventory = 0x01,
    /// Orders keyed by id
    Order = 0x02,
    /// Payments keyed by order id
    Payment = 0x03,
    /// Eventually-consistent order projection keyed by order id
    Projection = 0x04,
}

impl TypeTag {
    /// Table name as the backend schemas spell it
    pub fn table_name(&self) -> &'static str {
        match self {
            TypeTag::Inventory => "inventory_by_sku",
            TypeTag::Order => "orders_by_id",
            TypeTag::Payment => "payments_by_order",
            TypeTag::Projection => "orders_projection_by_id",
        }
    }
}

/// Composite row key: table plus identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RowKey {
    /// Inventory row
    Inventory(Sku),
    /// Order row
    Order(OrderId),
    /// Payment row (1:1 with its order)
    Payment(OrderId),
    /// Projection row (1:1 with its order)
    Projection(OrderId),
}

impl RowKey {
    /// Table this key belongs to
    pub fn type_tag(&self) -> TypeTag {
        match self {
            RowKey::Inventory(_) => TypeTag::Inventory,
            RowKey::Order(_) => TypeTag::Order,
            RowKey::Payment(_) => TypeTag::Payment,
            RowKey::Projection(_) => TypeTag::Projection,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Inventory(sku) => write!(f, "{}/{}", self.type_tag().table_name(), sku),
            RowKey::Order(id) | RowKey::Payment(id) | RowKey::Projection(id) => {
                write!(f, "{}/{}", self.type_tag().table_name(), id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hot_sku_naming() {
        assert_eq!(Sku::hot(0).as_str(), "SKU-000");
        assert_eq!(Sku::hot(49).as_str(), "SKU-049");
    }

    #[test]
    fn test_order_id_from_bytes_is_deterministic() {
        let a = OrderId::from_random_bytes([7u8; 16]);
        let b = OrderId::from_random_bytes([7u8; 16]);
        assert_eq!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn test_row_key_type_tag() {
        let id = OrderId::new();
        assert_eq!(RowKey::Inventory(Sku::hot(1)).type_tag(), TypeTag::Inventory);
        assert_eq!(RowKey::Order(id).type_tag(), TypeTag::Order);
        assert_eq!(RowKey::Payment(id).type_tag(), TypeTag::Payment);
        assert_eq!(RowKey::Projection(id).type_tag(), TypeTag::Projection);
    }

    #[test]
    fn test_row_key_display_includes_table() {
        let key = RowKey::Inventory(Sku::new("SKU-HOT"));
        assert_eq!(key.to_string(), "inventory_by_sku/SKU-HOT");
    }

    #[test]
    fn test_type_tag_ordering() {
        assert!(TypeTag::Inventory < TypeTag::Order);
        assert!(TypeTag::Order < TypeTag::Payment);
        assert!(TypeTag::Payment < TypeTag::Projection);
    }
}
