use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commands::ProductDetails;
use super::errors::ProductError;

/// Catalog entry. `stock >= 0` holds for every committed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn from_details(id: i64, details: ProductDetails, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: details.name,
            description: details.description,
            price: details.price,
            stock: details.stock,
            created_at,
            updated_at: None,
        }
    }

    /// Overwrite the catalog fields and stamp `updated_at`.
    pub fn apply_details(&mut self, details: ProductDetails, now: DateTime<Utc>) {
        self.name = details.name;
        self.description = details.description;
        self.price = details.price;
        self.stock = details.stock;
        self.updated_at = Some(now);
    }
}

impl ProductDetails {
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() {
            return Err(ProductError::EmptyName);
        }
        if !(self.price >= 0.0) {
            return Err(ProductError::NegativePrice(self.price));
        }
        if self.stock < 0 {
            return Err(ProductError::NegativeStock(self.stock));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rules() {
        assert!(ProductDetails::new("Laptop", "", 0.0, 0).validate().is_ok());
        assert!(matches!(
            ProductDetails::new("", "", 1.0, 1).validate(),
            Err(ProductError::EmptyName)
        ));
        assert!(matches!(
            ProductDetails::new("Laptop", "", -0.01, 1).validate(),
            Err(ProductError::NegativePrice(_))
        ));
        assert!(matches!(
            ProductDetails::new("Laptop", "", f64::NAN, 1).validate(),
            Err(ProductError::NegativePrice(_))
        ));
        assert!(matches!(
            ProductDetails::new("Laptop", "", 1.0, -1).validate(),
            Err(ProductError::NegativeStock(-1))
        ));
    }

    #[test]
    fn test_apply_details_stamps_updated_at() {
        let created = Utc::now();
        let mut product = Product::from_details(3, ProductDetails::new("Tablet", "10-inch", 500.0, 75), created);
        assert!(product.updated_at.is_none());

        let later = created + chrono::Duration::seconds(5);
        product.apply_details(ProductDetails::new("Tablet", "11-inch", 450.0, 70), later);

        assert_eq!(product.description, "11-inch");
        assert_eq!(product.price, 450.0);
        assert_eq!(product.stock, 70);
        assert_eq!(product.created_at, created);
        assert_eq!(product.updated_at, Some(later));
    }
}
