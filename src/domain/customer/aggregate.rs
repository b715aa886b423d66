use serde::{Deserialize, Serialize};

use super::commands::CustomerDetails;
use super::errors::CustomerError;
use super::value_objects::{Email, PhoneNumber};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Email,
    pub phone: PhoneNumber,
}

impl Customer {
    pub fn from_details(id: i64, details: CustomerDetails) -> Self {
        Self {
            id,
            name: details.name,
            email: details.email,
            phone: details.phone,
        }
    }

    /// Overwrite the profile with already-validated details.
    pub fn apply_details(&mut self, details: CustomerDetails) {
        self.name = details.name;
        self.email = details.email;
        self.phone = details.phone;
    }
}

impl CustomerDetails {
    /// Validate the shape rules that do not need storage access.
    pub fn validate(&self) -> Result<(), CustomerError> {
        if self.name.trim().is_empty() {
            return Err(CustomerError::EmptyName);
        }
        if self.email.as_str().is_empty() {
            return Err(CustomerError::EmptyEmail);
        }
        if !self.email.as_str().contains('@') {
            return Err(CustomerError::InvalidEmail(self.email.as_str().to_string()));
        }
        Ok(())
    }
}
