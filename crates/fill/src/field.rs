use std::fmt;

use matcher::CredentialEntry;
use serde::{Deserialize, Serialize};

/// Semantic role of an input field, as classified by the platform parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldHint {
    Username,
    Email,
    Password,
    NewPassword,
    Phone,
    PostalAddress,
    PostalCode,
    PersonName,
    CardNumber,
    CardExpiry,
    CardCvv,
    Other,
}

impl FieldHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldHint::Username => "USERNAME",
            FieldHint::Email => "EMAIL",
            FieldHint::Password => "PASSWORD",
            FieldHint::NewPassword => "NEW_PASSWORD",
            FieldHint::Phone => "PHONE",
            FieldHint::PostalAddress => "POSTAL_ADDRESS",
            FieldHint::PostalCode => "POSTAL_CODE",
            FieldHint::PersonName => "PERSON_NAME",
            FieldHint::CardNumber => "CARD_NUMBER",
            FieldHint::CardExpiry => "CARD_EXPIRY",
            FieldHint::CardCvv => "CARD_CVV",
            FieldHint::Other => "OTHER",
        }
    }

    pub fn is_username_like(&self) -> bool {
        matches!(self, FieldHint::Username | FieldHint::Email)
    }

    pub fn is_password_like(&self) -> bool {
        matches!(self, FieldHint::Password | FieldHint::NewPassword)
    }
}

impl fmt::Display for FieldHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque platform reference to an input field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FieldId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A field of the current request together with its role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub hint: FieldHint,
    /// Whether the field had input focus when the request was made.
    #[serde(default)]
    pub focused: bool,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<FieldId>, hint: FieldHint) -> Self {
        Self {
            id: id.into(),
            hint,
            focused: false,
        }
    }

    pub fn focused(mut self) -> Self {
        self.focused = true;
        self
    }
}

/// The entry's value for a field of role `hint`, if it has one.
///
/// Email fields only take the username when it looks like an address.
pub fn value_for_hint(entry: &CredentialEntry, hint: FieldHint) -> Option<&str> {
    match hint {
        FieldHint::Username => Some(entry.username.as_str()),
        FieldHint::Email => entry
            .username
            .contains('@')
            .then_some(entry.username.as_str()),
        FieldHint::Password | FieldHint::NewPassword => Some(entry.password.as_str()),
        FieldHint::Phone => entry.phone.as_deref(),
        FieldHint::PostalAddress => entry.address_line.as_deref(),
        FieldHint::PostalCode => entry.postal_code.as_deref(),
        FieldHint::PersonName => entry.card_holder.as_deref(),
        FieldHint::CardNumber => entry.card_number.as_deref(),
        FieldHint::CardExpiry => entry.card_expiry.as_deref(),
        FieldHint::CardCvv => entry.card_cvv.as_deref(),
        FieldHint::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_entry() -> CredentialEntry {
        CredentialEntry::new(1, "Everything")
            .with_username("alice@example.com")
            .with_password("pw")
            .with_phone("+100")
            .with_address("1 Main St", "12345")
            .with_card("Alice A", "4111", "01/29", "999")
    }

    #[test]
    fn every_hint_maps_to_its_attribute() {
        let entry = full_entry();
        let cases = [
            (FieldHint::Username, Some("alice@example.com")),
            (FieldHint::Email, Some("alice@example.com")),
            (FieldHint::Password, Some("pw")),
            (FieldHint::NewPassword, Some("pw")),
            (FieldHint::Phone, Some("+100")),
            (FieldHint::PostalAddress, Some("1 Main St")),
            (FieldHint::PostalCode, Some("12345")),
            (FieldHint::PersonName, Some("Alice A")),
            (FieldHint::CardNumber, Some("4111")),
            (FieldHint::CardExpiry, Some("01/29")),
            (FieldHint::CardCvv, Some("999")),
            (FieldHint::Other, None),
        ];
        for (hint, expected) in cases {
            assert_eq!(value_for_hint(&entry, hint), expected, "hint {hint}");
        }
    }

    #[test]
    fn email_requires_at_sign() {
        let entry = CredentialEntry::new(2, "Plain").with_username("alice");
        assert_eq!(value_for_hint(&entry, FieldHint::Email), None);
        assert_eq!(value_for_hint(&entry, FieldHint::Username), Some("alice"));
    }

    #[test]
    fn descriptor_deserializes_with_default_focus() {
        let field: FieldDescriptor =
            serde_json::from_str(r#"{"id":"username-1","hint":"NEW_PASSWORD"}"#).unwrap();
        assert_eq!(field, FieldDescriptor::new("username-1", FieldHint::NewPassword));
        assert!(!field.focused);
    }
}
