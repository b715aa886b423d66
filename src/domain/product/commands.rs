use serde::{Deserialize, Serialize};

/// Catalog payload used for both creation and full overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub stock: i32,
}

impl ProductDetails {
    pub fn new(name: impl Into<String>, description: impl Into<String>, price: f64, stock: i32) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price,
            stock,
        }
    }
}
