use serde::{Deserialize, Serialize};

// ============================================================================
// Customer Value Objects
// ============================================================================

/// Customer email address. Compared by exact, case-sensitive match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(pub String);

impl Email {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Customer phone number
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(pub String);

impl PhoneNumber {
    pub fn new(phone: impl Into<String>) -> Self {
        Self(phone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_comparison_is_case_sensitive() {
        assert_eq!(Email::new("jane@example.com"), Email::new("jane@example.com"));
        assert_ne!(Email::new("Jane@example.com"), Email::new("jane@example.com"));
    }

    #[test]
    fn test_value_objects_serialize_as_plain_strings() {
        let json = serde_json::to_string(&Email::new("a@b.c")).unwrap();
        assert_eq!(json, "\"a@b.c\"");

        let phone: PhoneNumber = serde_json::from_str("\"123-456-7890\"").unwrap();
        assert_eq!(phone.as_str(), "123-456-7890");
    }
}
