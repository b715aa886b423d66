use std::sync::Arc;

use tracing::instrument;

use crate::persistence::{Store, UnitOfWork};

use super::aggregate::Customer;
use super::commands::CustomerDetails;
use super::errors::CustomerError;

// ============================================================================
// Customer Command Handler
// ============================================================================
//
// Registration and profile maintenance. Email uniqueness is exact and
// case-sensitive; the unique constraint in storage backs the pre-check.
//
// ============================================================================

pub struct CustomerCommandHandler<S: Store> {
    store: Arc<S>,
}

impl<S: Store> CustomerCommandHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, details), fields(email = %details.email.as_str()))]
    pub async fn register(&self, details: CustomerDetails) -> Result<Customer, CustomerError> {
        details.validate()?;

        let mut uow = self.store.begin().await?;
        if !uow.customers().is_email_unique(&details.email, None).await? {
            return Err(CustomerError::DuplicateEmail(details.email.as_str().to_string()));
        }

        let customer = uow.customers().add(details).await?;
        uow.commit().await?;

        tracing::info!(customer_id = customer.id, "Customer registered");
        Ok(customer)
    }

    /// Returns `Ok(false)` when the customer does not exist.
    #[instrument(skip(self, details))]
    pub async fn update(&self, id: i64, details: CustomerDetails) -> Result<bool, CustomerError> {
        details.validate()?;

        let mut uow = self.store.begin().await?;
        let Some(mut customer) = uow.customers().get_by_id(id).await? else {
            uow.rollback().await?;
            return Ok(false);
        };

        if !uow.customers().is_email_unique(&details.email, Some(id)).await? {
            return Err(CustomerError::DuplicateEmail(details.email.as_str().to_string()));
        }

        customer.apply_details(details);
        uow.customers().update(&customer).await?;
        uow.commit().await?;

        tracing::info!("Customer updated");
        Ok(true)
    }

    /// Deletes the customer together with all of their orders.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<bool, CustomerError> {
        let mut uow = self.store.begin().await?;
        if !uow.customers().exists(id).await? {
            uow.rollback().await?;
            return Ok(false);
        }

        uow.customers().delete(id).await?;
        uow.commit().await?;

        tracing::info!("Customer deleted");
        Ok(true)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Customer>, CustomerError> {
        let mut uow = self.store.begin().await?;
        let customer = uow.customers().get_by_id(id).await?;
        uow.rollback().await?;
        Ok(customer)
    }

    pub async fn list(&self) -> Result<Vec<Customer>, CustomerError> {
        let mut uow = self.store.begin().await?;
        let customers = uow.customers().get_all().await?;
        uow.rollback().await?;
        Ok(customers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::order::NewOrder;
    use crate::domain::product::ProductDetails;
    use crate::persistence::InMemoryStore;

    fn handler() -> (Arc<InMemoryStore>, CustomerCommandHandler<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (store.clone(), CustomerCommandHandler::new(store))
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let (_, handler) = handler();

        let customer = handler
            .register(CustomerDetails::new("John Doe", "john.doe@example.com", "123-456-7890"))
            .await
            .unwrap();

        let fetched = handler.get(customer.id).await.unwrap().unwrap();
        assert_eq!(fetched, customer);
        assert_eq!(handler.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let (_, handler) = handler();
        handler
            .register(CustomerDetails::new("John Doe", "john.doe@example.com", ""))
            .await
            .unwrap();

        let err = handler
            .register(CustomerDetails::new("Johnny", "john.doe@example.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, CustomerError::DuplicateEmail(ref e) if e == "john.doe@example.com"));
        assert!(err.is_client_error());

        // Uniqueness is case-sensitive.
        handler
            .register(CustomerDetails::new("John Upper", "John.Doe@example.com", ""))
            .await
            .unwrap();
        assert_eq!(handler.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_register_validates_before_touching_storage() {
        let (_, handler) = handler();

        let err = handler
            .register(CustomerDetails::new("", "nobody@example.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, CustomerError::EmptyName));
        assert!(handler.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_own_email_and_rejects_taken_one() {
        let (_, handler) = handler();
        let john = handler
            .register(CustomerDetails::new("John Doe", "john.doe@example.com", ""))
            .await
            .unwrap();
        handler
            .register(CustomerDetails::new("Jane Smith", "jane.smith@example.com", ""))
            .await
            .unwrap();

        let updated = handler
            .update(john.id, CustomerDetails::new("John D.", "john.doe@example.com", "555"))
            .await
            .unwrap();
        assert!(updated);
        assert_eq!(handler.get(john.id).await.unwrap().unwrap().name, "John D.");

        let err = handler
            .update(john.id, CustomerDetails::new("John D.", "jane.smith@example.com", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, CustomerError::DuplicateEmail(_)));

        let missing = handler
            .update(999, CustomerDetails::new("Ghost", "ghost@example.com", ""))
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_delete_cascades_orders() {
        let (store, handler) = handler();
        let john = handler
            .register(CustomerDetails::new("John Doe", "john.doe@example.com", ""))
            .await
            .unwrap();

        let mut uow = store.begin().await.unwrap();
        let product = uow
            .products()
            .add(ProductDetails::new("Laptop", "", 1200.0, 5), Utc::now())
            .await
            .unwrap();
        let mut order = NewOrder::pending(john.id, Utc::now());
        order.add_line(product.id, 1, product.price);
        uow.orders().add(order).await.unwrap();
        uow.commit().await.unwrap();

        assert!(handler.delete(john.id).await.unwrap());
        assert!(!handler.delete(john.id).await.unwrap());

        let mut uow = store.begin().await.unwrap();
        assert!(uow.orders().get_all().await.unwrap().is_empty());
    }
}
