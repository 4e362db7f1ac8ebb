use std::sync::{Arc, RwLock};

use backroom_catalog::ProductId;
use backroom_core::{DomainError, DomainResult};
use backroom_inventory::StockMovement;

/// Append-only stock movement ledger.
///
/// Entries are immutable facts; there is no update or delete. Queries return
/// movements newest-first.
pub trait StockLedger: Send + Sync {
    fn append(&self, movement: StockMovement) -> DomainResult<()>;

    /// Movements in reverse-chronological order, optionally filtered by
    /// product and/or reference.
    fn query(&self, product_id: Option<ProductId>, reference: Option<&str>) -> Vec<StockMovement>;
}

impl<L> StockLedger for Arc<L>
where
    L: StockLedger + ?Sized,
{
    fn append(&self, movement: StockMovement) -> DomainResult<()> {
        (**self).append(movement)
    }

    fn query(&self, product_id: Option<ProductId>, reference: Option<&str>) -> Vec<StockMovement> {
        (**self).query(product_id, reference)
    }
}

/// In-memory ledger for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    movements: RwLock<Vec<StockMovement>>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StockLedger for InMemoryStockLedger {
    fn append(&self, movement: StockMovement) -> DomainResult<()> {
        // The constructor already validated the snapshot arithmetic; re-check
        // here so a hand-built record cannot sneak past the invariant.
        let expected = i64::from(movement.previous_stock)
            .checked_add(movement.quantity)
            .ok_or_else(|| DomainError::invariant("stock movement quantity overflowed"))?;
        if expected != i64::from(movement.new_stock) {
            return Err(DomainError::invariant(format!(
                "stock snapshot mismatch: {} + {} != {}",
                movement.previous_stock, movement.quantity, movement.new_stock
            )));
        }

        let mut movements = self
            .movements
            .write()
            .map_err(|_| DomainError::invariant("ledger lock poisoned"))?;
        movements.push(movement);
        Ok(())
    }

    fn query(&self, product_id: Option<ProductId>, reference: Option<&str>) -> Vec<StockMovement> {
        let movements = match self.movements.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        let mut result: Vec<StockMovement> = movements
            .iter()
            .filter(|m| product_id.is_none_or(|p| m.product_id == p))
            .filter(|m| reference.is_none_or(|r| m.reference == r))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backroom_core::{AggregateId, Money, UserId};
    use backroom_inventory::MovementType;
    use chrono::{Duration, Utc};

    fn movement(product: ProductId, reference: &str, hours_ago: i64) -> StockMovement {
        StockMovement::new(
            product,
            MovementType::Purchase,
            5,
            0,
            5,
            Money::from_minor(100),
            reference,
            None,
            UserId::new(),
            Utc::now() - Duration::hours(hours_ago),
        )
        .unwrap()
    }

    #[test]
    fn query_filters_and_sorts_newest_first() {
        let ledger = InMemoryStockLedger::new();
        let p1 = ProductId::new(AggregateId::new());
        let p2 = ProductId::new(AggregateId::new());

        ledger.append(movement(p1, "PO-20260827-0001", 3)).unwrap();
        ledger.append(movement(p1, "PO-20260827-0002", 1)).unwrap();
        ledger.append(movement(p2, "PO-20260827-0001", 2)).unwrap();

        let for_p1 = ledger.query(Some(p1), None);
        assert_eq!(for_p1.len(), 2);
        assert_eq!(for_p1[0].reference, "PO-20260827-0002");

        let for_ref = ledger.query(None, Some("PO-20260827-0001"));
        assert_eq!(for_ref.len(), 2);
        assert!(for_ref[0].occurred_at >= for_ref[1].occurred_at);
    }

    #[test]
    fn tampered_snapshot_is_rejected_on_append() {
        let ledger = InMemoryStockLedger::new();
        let mut m = movement(ProductId::new(AggregateId::new()), "adj", 0);
        m.new_stock = 99;
        assert!(ledger.append(m).is_err());
        assert!(ledger.query(None, None).is_empty());
    }
}
