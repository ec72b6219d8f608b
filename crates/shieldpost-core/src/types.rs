use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::amount::TokenAmount;
use crate::error::{CoreError, Result};

/// Primitive type tag of a protected data field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Bool,
    F64,
    I128,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::F64 => "f64",
            Self::I128 => "i128",
        }
    }
}

/// Field name to type mapping describing what a protected data item holds.
///
/// Two schemas match only when they are equal: a data item carrying extra
/// fields is a different kind of data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataSchema(BTreeMap<String, SchemaType>);

impl DataSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, kind: SchemaType) -> Self {
        self.0.insert(name.into(), kind);
        self
    }

    pub fn get(&self, name: &str) -> Option<SchemaType> {
        self.0.get(name).copied()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, SchemaType)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches_exactly(&self, other: &DataSchema) -> bool {
        self == other
    }

    /// Check that `values` provides every field of this schema with a value
    /// of the declared type and nothing else.
    pub fn validate(&self, values: &FieldValues) -> Result<()> {
        for (name, kind) in self.fields() {
            let value = values
                .get(name)
                .ok_or_else(|| CoreError::validation(format!("missing field \"{name}\"")))?;
            if !value.fits(kind) {
                return Err(CoreError::validation(format!(
                    "field \"{name}\" must be of type {}",
                    kind.as_str()
                )));
            }
            if let FieldValue::Text(text) = value
                && text.trim().is_empty()
            {
                return Err(CoreError::validation(format!(
                    "field \"{name}\" must not be empty"
                )));
            }
        }
        if let Some(extra) = values.keys().find(|k| self.get(k).is_none()) {
            return Err(CoreError::validation(format!(
                "field \"{extra}\" is not part of the schema"
            )));
        }
        Ok(())
    }
}

/// Raw value of a field handed to the data protector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn schema_type(&self) -> SchemaType {
        match self {
            Self::Bool(_) => SchemaType::Bool,
            Self::Integer(_) => SchemaType::I128,
            Self::Float(_) => SchemaType::F64,
            Self::Text(_) => SchemaType::String,
        }
    }

    fn fits(&self, kind: SchemaType) -> bool {
        matches!(
            (self, kind),
            (Self::Bool(_), SchemaType::Bool)
                | (Self::Integer(_), SchemaType::I128 | SchemaType::F64)
                | (Self::Float(_), SchemaType::F64)
                | (Self::Text(_), SchemaType::String)
        )
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type FieldValues = BTreeMap<String, FieldValue>;

/// A protected data item as listed by the data protector.
///
/// Raw field values are write-once and never come back from the service;
/// they only exist in the [`ProtectDataRequest`] that created the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedData {
    pub address: String,
    pub name: String,
    pub owner: String,
    pub schema: DataSchema,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Request to encrypt and store a new data item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectDataRequest {
    pub name: String,
    pub data: FieldValues,
}

/// What to protect when no matching data item exists yet
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredData {
    pub name: String,
    pub fields: FieldValues,
}

impl DesiredData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: FieldValues::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Remaining uses of a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum AccessCount {
    Limited(u64),
    Unlimited,
}

impl AccessCount {
    /// Wire value used for "no limit"
    pub const UNLIMITED_SENTINEL: u64 = u64::MAX;
}

impl From<u64> for AccessCount {
    fn from(value: u64) -> Self {
        if value == Self::UNLIMITED_SENTINEL {
            Self::Unlimited
        } else {
            Self::Limited(value)
        }
    }
}

impl From<AccessCount> for u64 {
    fn from(value: AccessCount) -> Self {
        match value {
            AccessCount::Limited(n) => n,
            AccessCount::Unlimited => AccessCount::UNLIMITED_SENTINEL,
        }
    }
}

impl fmt::Display for AccessCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{n}"),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

impl FromStr for AccessCount {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::Unlimited);
        }
        let count: u64 = s
            .parse()
            .map_err(|_| CoreError::validation(format!("invalid access count \"{s}\"")))?;
        if count == 0 {
            return Err(CoreError::validation("access count must be at least 1"));
        }
        Ok(Self::Limited(count))
    }
}

/// Permission for one app/user pair to use one protected data item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub id: String,
    pub dataset: String,
    pub authorized_app: String,
    pub authorized_user: String,
    pub price_per_access: TokenAmount,
    pub remaining_access: AccessCount,
}

/// Terms of a grant to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantSpec {
    pub authorized_app: String,
    pub authorized_user: String,
    pub price_per_access: TokenAmount,
    pub number_of_access: AccessCount,
}

impl GrantSpec {
    pub fn validate(&self) -> Result<()> {
        if self.authorized_app.trim().is_empty() {
            return Err(CoreError::validation("authorized app must not be empty"));
        }
        if self.authorized_user.trim().is_empty() {
            return Err(CoreError::validation("authorized user must not be empty"));
        }
        if self.number_of_access == AccessCount::Limited(0) {
            return Err(CoreError::validation("number of access must be at least 1"));
        }
        Ok(())
    }
}

/// A protected data item the caller may message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub accessible_since: Option<OffsetDateTime>,
}

/// Message submitted through a relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// Account balance held by the account service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub stake: TokenAmount,
    pub locked: TokenAmount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_schema() -> DataSchema {
        DataSchema::new().with_field("email", SchemaType::String)
    }

    #[test]
    fn test_schema_exact_match_rejects_superset() {
        let superset = email_schema().with_field("name", SchemaType::String);
        assert!(email_schema().matches_exactly(&email_schema()));
        assert!(!email_schema().matches_exactly(&superset));
        assert!(!superset.matches_exactly(&email_schema()));
    }

    #[test]
    fn test_schema_type_mismatch() {
        let other = DataSchema::new().with_field("email", SchemaType::Bool);
        assert!(!email_schema().matches_exactly(&other));
    }

    #[test]
    fn test_schema_serializes_as_map() {
        let schema = email_schema().with_field("shieldpost", SchemaType::Bool);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json, serde_json::json!({"email": "string", "shieldpost": "bool"}));
    }

    #[test]
    fn test_validate_fields() {
        let mut values = FieldValues::new();
        assert!(email_schema().validate(&values).is_err());

        values.insert("email".into(), FieldValue::from("  "));
        assert!(email_schema().validate(&values).is_err());

        values.insert("email".into(), FieldValue::from("a@b.com"));
        assert!(email_schema().validate(&values).is_ok());

        values.insert("email".into(), FieldValue::Bool(true));
        assert!(email_schema().validate(&values).is_err());

        values.insert("email".into(), FieldValue::from("a@b.com"));
        values.insert("extra".into(), FieldValue::Integer(1));
        assert!(email_schema().validate(&values).is_err());
    }

    #[test]
    fn test_access_count_parse() {
        assert_eq!("unlimited".parse::<AccessCount>().unwrap(), AccessCount::Unlimited);
        assert_eq!("5".parse::<AccessCount>().unwrap(), AccessCount::Limited(5));
        assert!("0".parse::<AccessCount>().is_err());
        assert!("many".parse::<AccessCount>().is_err());
    }

    #[test]
    fn test_access_count_wire_format() {
        let json = serde_json::to_value(AccessCount::Unlimited).unwrap();
        assert_eq!(json, serde_json::json!(u64::MAX));
        let back: AccessCount = serde_json::from_value(serde_json::json!(3)).unwrap();
        assert_eq!(back, AccessCount::Limited(3));
    }

    #[test]
    fn test_grant_spec_validation() {
        let spec = GrantSpec {
            authorized_app: "app.eth".into(),
            authorized_user: "0x1".into(),
            price_per_access: TokenAmount::ZERO,
            number_of_access: AccessCount::Limited(0),
        };
        assert!(spec.validate().is_err());

        let spec = GrantSpec {
            number_of_access: AccessCount::Unlimited,
            ..spec
        };
        assert!(spec.validate().is_ok());

        let spec = GrantSpec {
            authorized_app: String::new(),
            ..spec
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_contact_deserialize() {
        let contact: Contact = serde_json::from_value(serde_json::json!({
            "address": "0xdata",
            "owner": "0xowner",
            "accessibleSince": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(contact.address, "0xdata");
        assert!(contact.accessible_since.is_some());

        let bare: Contact = serde_json::from_value(serde_json::json!({"address": "0x2"})).unwrap();
        assert_eq!(bare.owner, None);
    }
}
