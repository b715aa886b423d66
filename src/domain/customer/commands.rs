use serde::{Deserialize, Serialize};

use super::value_objects::{Email, PhoneNumber};

// ============================================================================
// Customer Commands - Represent user intent
// ============================================================================

/// Payload for registering a customer or overwriting an existing profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: PhoneNumber,
}

impl CustomerDetails {
    pub fn new(name: impl Into<String>, email: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: Email::new(email),
            phone: PhoneNumber::new(phone),
        }
    }
}
