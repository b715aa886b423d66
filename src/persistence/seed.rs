use chrono::{TimeZone, Utc};

use crate::domain::customer::CustomerDetails;
use crate::domain::product::ProductDetails;
use super::unit_of_work::{PersistenceResult, Store, UnitOfWork};

fn catalog() -> Vec<ProductDetails> {
    vec![
        ProductDetails::new("Laptop", "High performance laptop", 1200.00, 50),
        ProductDetails::new("Smartphone", "Latest model smartphone", 800.00, 100),
        ProductDetails::new("Headphones", "Wireless noise-cancelling headphones", 200.00, 150),
        ProductDetails::new("Tablet", "10-inch tablet with retina display", 500.00, 75),
        ProductDetails::new("Smartwatch", "Fitness tracking smartwatch", 250.00, 80),
    ]
}

fn customers() -> Vec<CustomerDetails> {
    vec![
        CustomerDetails::new("John Doe", "john.doe@example.com", "123-456-7890"),
        CustomerDetails::new("Jane Smith", "jane.smith@example.com", "987-654-3210"),
    ]
}

/// Load the demo catalog and customers into an empty store.
///
/// Returns `false` without writing anything when the store already holds
/// customers or products.
pub async fn seed_demo_data<S: Store>(store: &S) -> PersistenceResult<bool> {
    let mut uow = store.begin().await?;

    let populated = !uow.customers().get_all().await?.is_empty()
        || !uow.products().get_all().await?.is_empty();
    if populated {
        uow.rollback().await?;
        tracing::debug!("Store already populated, skipping demo data");
        return Ok(false);
    }

    let created_at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now);
    for details in catalog() {
        uow.products().add(details, created_at).await?;
    }
    for details in customers() {
        uow.customers().add(details).await?;
    }

    uow.commit().await?;
    tracing::info!("Seeded demo catalog and customers");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;

    #[tokio::test]
    async fn test_seed_populates_empty_store_once() {
        let store = InMemoryStore::new();
        assert!(seed_demo_data(&store).await.unwrap());
        assert!(!seed_demo_data(&store).await.unwrap());

        let mut uow = store.begin().await.unwrap();
        let products = uow.products().get_all().await.unwrap();
        assert_eq!(products.len(), 5);
        assert_eq!(products[0].name, "Laptop");
        assert_eq!(products[0].stock, 50);
        assert_eq!(uow.customers().get_all().await.unwrap().len(), 2);
    }
}
