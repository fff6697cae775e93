//! Carts, seed inventory and prices of the two order scenarios

use crate::config::{Scenario, WorkloadConfig};
use rand::Rng;
use smallvec::{smallvec, SmallVec};
use tally_core::{Cents, InventoryItem, OrderLine, OrderLines, Sku};

/// SKU every worker competes for in the concurrent-orders scenario
pub const HOT_SKU: &str = "SKU-HOT";
/// Unit price of [`HOT_SKU`]
pub const HOT_UNIT_PRICE: Cents = 4_900;
/// Price of the first line of a rollback cart
pub const LEAD_LINE_PRICE: Cents = 49_900;
/// Price of every extra line of a rollback cart
pub const EXTRA_LINE_PRICE: Cents = 1_900;
/// Extra lines a rollback cart may carry on top of the first
pub const MAX_EXTRA_LINES: usize = 2;

/// Lines whose stock was actually taken; what compensation gives back
pub type Reserved = SmallVec<[(Sku, i64); 3]>;

/// Inventory rows `setup` seeds for the configured scenario
pub fn seed_inventory(config: &WorkloadConfig) -> Vec<InventoryItem> {
    match config.scenario {
        Scenario::ConcurrentOrders => {
            vec![InventoryItem::seeded(Sku::new(HOT_SKU), config.initial_stock)]
        }
        Scenario::Rollback => (0..config.hot_skus)
            .map(|i| InventoryItem::seeded(Sku::hot(i), config.initial_stock))
            .collect(),
    }
}

/// One unit of the hot SKU
pub fn hot_unit() -> OrderLines {
    smallvec![OrderLine {
        sku: Sku::new(HOT_SKU),
        qty: 1,
        unit_price: HOT_UNIT_PRICE,
    }]
}

/// Random cart of one to three single-unit lines over `hot_skus` SKUs
///
/// SKUs are drawn independently, so a cart may name the same SKU twice.
pub fn random_cart<R: Rng>(rng: &mut R, hot_skus: usize) -> OrderLines {
    let hot_skus = hot_skus.max(1);
    let mut lines: OrderLines = smallvec![OrderLine {
        sku: Sku::hot(rng.gen_range(0..hot_skus)),
        qty: 1,
        unit_price: LEAD_LINE_PRICE,
    }];
    for _ in 0..rng.gen_range(0..=MAX_EXTRA_LINES) {
        lines.push(OrderLine {
            sku: Sku::hot(rng.gen_range(0..hot_skus)),
            qty: 1,
            unit_price: EXTRA_LINE_PRICE,
        });
    }
    lines
}

/// Cart for the configured scenario
pub fn cart_for<R: Rng>(rng: &mut R, config: &WorkloadConfig) -> OrderLines {
    match config.scenario {
        Scenario::ConcurrentOrders => hot_unit(),
        Scenario::Rollback => random_cart(rng, config.hot_skus),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tally_core::{Order, OrderId};

    #[test]
    fn test_seed_inventory_per_scenario() {
        let config = WorkloadConfig::default().with_initial_stock(10);
        let items = seed_inventory(&config);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku.as_str(), HOT_SKU);

        let config = config.with_scenario(Scenario::Rollback).with_hot_skus(3);
        let items = seed_inventory(&config);
        let skus: Vec<_> = items.iter().map(|i| i.sku.as_str().to_string()).collect();
        assert_eq!(skus, ["SKU-000", "SKU-001", "SKU-002"]);
        assert!(items.iter().all(|i| i.available == 10 && i.initial == 10));
    }

    #[test]
    fn test_random_cart_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let lines = random_cart(&mut rng, 50);
            assert!((1..=3).contains(&lines.len()));
            assert_eq!(lines[0].unit_price, LEAD_LINE_PRICE);
            assert!(lines[1..].iter().all(|l| l.unit_price == EXTRA_LINE_PRICE));
            assert!(lines.iter().all(|l| l.qty == 1));
        }
    }

    #[test]
    fn test_cart_total() {
        let mut rng = StdRng::seed_from_u64(1);
        let lines = random_cart(&mut rng, 5);
        let extra = (lines.len() - 1) as i64;
        let order = Order::pending(OrderId::new(), lines);
        assert_eq!(order.total, LEAD_LINE_PRICE + extra * EXTRA_LINE_PRICE);
    }
}
