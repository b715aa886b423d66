use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::domain::product::Product;
use crate::persistence::{PersistenceResult, ProductRepository};
use super::errors::InventoryError;

// ============================================================================
// Inventory Ledger - check-and-decrement of product stock
// ============================================================================
//
// The ledger works on row-locked copies of the products a workflow touches.
// Rows are locked in ascending id order so two workflows contending for the
// same products always queue instead of deadlocking. Decrements happen in
// memory; `stage` hands the modified rows back to the session, and they only
// become visible when the session commits.
//
// ============================================================================

pub struct InventoryLedger {
    rows: BTreeMap<i64, Product>,
    touched: BTreeSet<i64>,
}

impl InventoryLedger {
    /// Lock and load every distinct product in `ids`. Missing ids are simply
    /// absent; `try_reserve` reports them.
    pub async fn lock(
        products: &mut dyn ProductRepository,
        ids: impl IntoIterator<Item = i64>,
    ) -> PersistenceResult<Self> {
        let ids: BTreeSet<i64> = ids.into_iter().collect();
        let mut rows = BTreeMap::new();

        for id in ids {
            if let Some(product) = products.get_for_update(id).await? {
                rows.insert(id, product);
            }
        }

        tracing::debug!(locked = rows.len(), "Locked product rows for reservation");

        Ok(Self {
            rows,
            touched: BTreeSet::new(),
        })
    }

    #[cfg(test)]
    fn product(&self, id: i64) -> Option<&Product> {
        self.rows.get(&id)
    }

    /// Reserve `quantity` units and return the unit price at this moment.
    pub fn try_reserve(
        &mut self,
        product_id: i64,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<f64, InventoryError> {
        debug_assert!(quantity > 0, "quantities are validated before reserving");

        let product = self
            .rows
            .get_mut(&product_id)
            .ok_or(InventoryError::NotFound(product_id))?;

        if product.stock == 0 {
            return Err(InventoryError::OutOfStock {
                product_id,
                name: product.name.clone(),
            });
        }

        if product.stock < quantity {
            return Err(InventoryError::InsufficientStock {
                product_id,
                name: product.name.clone(),
                available: product.stock,
                requested: quantity,
            });
        }

        product.stock -= quantity;
        product.updated_at = Some(now);
        self.touched.insert(product_id);

        tracing::debug!(
            product_id = product_id,
            reserved = quantity,
            remaining = product.stock,
            "Reserved stock"
        );

        Ok(product.price)
    }

    /// Stage every decremented row on the session.
    pub async fn stage(&self, products: &mut dyn ProductRepository) -> PersistenceResult<()> {
        for id in &self.touched {
            if let Some(product) = self.rows.get(id) {
                products.update(product).await?;
            }
        }
        Ok(())
    }

    /// Post-reservation view of the locked products, keyed by id.
    pub fn into_catalog(self) -> HashMap<i64, Product> {
        self.rows.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::ProductDetails;
    use crate::persistence::{InMemoryStore, Store, UnitOfWork};

    async fn store_with(stock: &[(i32, f64)]) -> InMemoryStore {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        for (i, (qty, price)) in stock.iter().enumerate() {
            uow.products()
                .add(ProductDetails::new(format!("P{}", i + 1), "", *price, *qty), Utc::now())
                .await
                .unwrap();
        }
        uow.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_reserve_decrements_and_returns_price() {
        let store = store_with(&[(5, 30.0)]).await;
        let mut uow = store.begin().await.unwrap();
        let mut ledger = InventoryLedger::lock(uow.products(), [1]).await.unwrap();

        let now = Utc::now();
        assert_eq!(ledger.try_reserve(1, 2, now).unwrap(), 30.0);
        assert_eq!(ledger.product(1).unwrap().stock, 3);
        assert_eq!(ledger.product(1).unwrap().updated_at, Some(now));
    }

    #[tokio::test]
    async fn test_reserve_error_taxonomy() {
        let store = store_with(&[(0, 10.0), (3, 10.0)]).await;
        let mut uow = store.begin().await.unwrap();
        let mut ledger = InventoryLedger::lock(uow.products(), [1, 2, 99]).await.unwrap();
        let now = Utc::now();

        assert_eq!(ledger.try_reserve(99, 1, now), Err(InventoryError::NotFound(99)));
        assert!(matches!(
            ledger.try_reserve(1, 1, now),
            Err(InventoryError::OutOfStock { product_id: 1, .. })
        ));
        assert_eq!(
            ledger.try_reserve(2, 5, now),
            Err(InventoryError::InsufficientStock {
                product_id: 2,
                name: "P2".to_string(),
                available: 3,
                requested: 5,
            })
        );
        assert_eq!(ledger.product(2).unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_successive_reservations_see_earlier_decrements() {
        let store = store_with(&[(3, 1.0)]).await;
        let mut uow = store.begin().await.unwrap();
        let mut ledger = InventoryLedger::lock(uow.products(), [1, 1]).await.unwrap();
        let now = Utc::now();

        ledger.try_reserve(1, 2, now).unwrap();
        assert!(matches!(
            ledger.try_reserve(1, 2, now),
            Err(InventoryError::InsufficientStock { available: 1, requested: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_rolled_back_reservations_never_reach_the_store() {
        let store = store_with(&[(4, 1.0)]).await;
        {
            let mut uow = store.begin().await.unwrap();
            let mut ledger = InventoryLedger::lock(uow.products(), [1]).await.unwrap();
            ledger.try_reserve(1, 4, Utc::now()).unwrap();
            ledger.stage(uow.products()).await.unwrap();
            uow.rollback().await.unwrap();
        }

        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.products().get_by_id(1).await.unwrap().unwrap().stock, 4);
    }
}
