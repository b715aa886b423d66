use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::persistence::{Store, UnitOfWork};

use super::aggregate::Product;
use super::commands::ProductDetails;
use super::errors::ProductError;

// ============================================================================
// Product Command Handler - catalog maintenance
// ============================================================================

pub struct ProductCommandHandler<S: Store> {
    store: Arc<S>,
}

impl<S: Store> ProductCommandHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, details), fields(name = %details.name))]
    pub async fn create(&self, details: ProductDetails) -> Result<Product, ProductError> {
        details.validate()?;

        let mut uow = self.store.begin().await?;
        let product = uow.products().add(details, Utc::now()).await?;
        uow.commit().await?;

        tracing::info!(product_id = product.id, stock = product.stock, "Product created");
        Ok(product)
    }

    /// Overwrite name, description, price and stock. Holds the row lock so a
    /// concurrent order cannot reserve against the old stock level.
    #[instrument(skip(self, details))]
    pub async fn update(
        &self,
        id: i64,
        details: ProductDetails,
    ) -> Result<Option<Product>, ProductError> {
        details.validate()?;

        let mut uow = self.store.begin().await?;
        let Some(mut product) = uow.products().get_for_update(id).await? else {
            uow.rollback().await?;
            return Ok(None);
        };

        product.apply_details(details, Utc::now());
        uow.products().update(&product).await?;
        uow.commit().await?;

        tracing::info!(price = product.price, stock = product.stock, "Product updated");
        Ok(Some(product))
    }

    /// Products referenced by any order line cannot be deleted.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<bool, ProductError> {
        let mut uow = self.store.begin().await?;
        if !uow.products().exists(id).await? {
            uow.rollback().await?;
            return Ok(false);
        }
        if uow.products().is_referenced(id).await? {
            tracing::warn!("Refusing to delete product referenced by orders");
            return Err(ProductError::ReferencedByOrders(id));
        }

        uow.products().delete(id).await?;
        uow.commit().await?;

        tracing::info!("Product deleted");
        Ok(true)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Product>, ProductError> {
        let mut uow = self.store.begin().await?;
        let product = uow.products().get_by_id(id).await?;
        uow.rollback().await?;
        Ok(product)
    }

    pub async fn list(&self) -> Result<Vec<Product>, ProductError> {
        let mut uow = self.store.begin().await?;
        let products = uow.products().get_all().await?;
        uow.rollback().await?;
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::customer::CustomerDetails;
    use crate::domain::order::NewOrder;
    use crate::persistence::InMemoryStore;

    fn handler() -> (Arc<InMemoryStore>, ProductCommandHandler<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), ProductCommandHandler::new(store))
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (_, handler) = handler();

        let laptop = handler
            .create(ProductDetails::new("Laptop", "High performance laptop", 1200.0, 50))
            .await
            .unwrap();
        handler
            .create(ProductDetails::new("Tablet", "", 500.0, 75))
            .await
            .unwrap();

        assert!(laptop.updated_at.is_none());
        assert_eq!(handler.get(laptop.id).await.unwrap().unwrap(), laptop);
        assert_eq!(handler.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_negative_stock() {
        let (_, handler) = handler();

        let err = handler
            .create(ProductDetails::new("Laptop", "", 1200.0, -1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::NegativeStock(-1)));
        assert!(handler.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_overwrites_and_stamps() {
        let (_, handler) = handler();
        let laptop = handler
            .create(ProductDetails::new("Laptop", "", 1200.0, 50))
            .await
            .unwrap();

        let updated = handler
            .update(laptop.id, ProductDetails::new("Laptop Pro", "Refreshed", 1400.0, 20))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Laptop Pro");
        assert_eq!(updated.price, 1400.0);
        assert_eq!(updated.stock, 20);
        assert_eq!(updated.created_at, laptop.created_at);
        assert!(updated.updated_at.is_some());

        let missing = handler
            .update(999, ProductDetails::new("Ghost", "", 1.0, 1))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_delete_is_restricted_by_order_lines() {
        let (store, handler) = handler();
        let laptop = handler
            .create(ProductDetails::new("Laptop", "", 1200.0, 50))
            .await
            .unwrap();
        let tablet = handler
            .create(ProductDetails::new("Tablet", "", 500.0, 75))
            .await
            .unwrap();

        let mut uow = store.begin().await.unwrap();
        let customer = uow
            .customers()
            .add(CustomerDetails::new("John Doe", "john.doe@example.com", ""))
            .await
            .unwrap();
        let mut order = NewOrder::pending(customer.id, Utc::now());
        order.add_line(laptop.id, 1, laptop.price);
        uow.orders().add(order).await.unwrap();
        uow.commit().await.unwrap();

        let err = handler.delete(laptop.id).await.unwrap_err();
        assert!(matches!(err, ProductError::ReferencedByOrders(id) if id == laptop.id));
        assert!(handler.get(laptop.id).await.unwrap().is_some());

        assert!(handler.delete(tablet.id).await.unwrap());
        assert!(!handler.delete(tablet.id).await.unwrap());
    }
}
