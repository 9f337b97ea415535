// src/domain/message.rs

//! Message and field types.
//!
//! A message is an ordered set of named values. Names are unique within a
//! message: setting a name that is already present replaces its value and
//! keeps its original position. Order of first insertion is the order in
//! which fields appear on the wire and in [`Message`]'s `Display` output.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{PublishError, Result};

/// Longest accepted field name, in bytes.
pub const MAX_FIELD_NAME_LEN: usize = 255;

/// Largest accepted opaque field value, in bytes.
pub const MAX_OPAQUE_LEN: usize = 12_000;

/// A typed field value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    String(String),
    Long(i64),
    Double(f64),
    Opaque(Bytes),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        // ---
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Long(_) => "long",
            FieldValue::Double(_) => "double",
            FieldValue::Opaque(_) => "opaque",
        }
    }

    /// Borrow the value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<Bytes> for FieldValue {
    fn from(value: Bytes) -> Self {
        FieldValue::Opaque(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        match self {
            FieldValue::String(s) => write!(f, "{s:?}"),
            FieldValue::Long(n) => write!(f, "{n}"),
            FieldValue::Double(d) => write!(f, "{d}"),
            FieldValue::Opaque(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Check a field name and value against the message format limits.
pub fn validate_field(name: &str, value: &FieldValue) -> Result<()> {
    // ---
    let invalid = |reason: String| PublishError::InvalidField {
        name: name.to_owned(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("field name is empty".into()));
    }
    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(invalid(format!(
            "field name is {} bytes, limit is {MAX_FIELD_NAME_LEN}",
            name.len()
        )));
    }
    match value {
        FieldValue::Opaque(bytes) if bytes.len() > MAX_OPAQUE_LEN => Err(invalid(format!(
            "opaque value is {} bytes, limit is {MAX_OPAQUE_LEN}",
            bytes.len()
        ))),
        // JSON frames cannot carry NaN or infinities.
        FieldValue::Double(d) if !d.is_finite() => {
            Err(invalid(format!("double value {d} is not finite")))
        }
        _ => Ok(()),
    }
}

/// Caller-supplied envelope contents, in the order they should be set.
///
/// # Example
///
/// ```
/// use realm_publisher::Fields;
///
/// let fields = Fields::new().with("type", "hello").with("message", "ping");
/// assert_eq!(fields.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields(Vec<(String, FieldValue)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Append a field.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Validate every field without touching the bus.
    pub fn validate(&self) -> Result<()> {
        // ---
        for (name, value) in self.iter() {
            validate_field(name, value)?;
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        // ---
        Fields(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.write_str("[")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("]")
    }
}

/// A bus message.
///
/// Messages are created by a [`Realm`](crate::Realm) and handed back to it
/// for destruction once sent. The representation is inspectable so that a
/// value set with [`set`](Self::set) reads back unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    fields: Vec<(String, FieldValue)>,
}

impl Message {
    /// Create an empty message.
    ///
    /// Bus backends call this from `Realm::create_message`; callers should go
    /// through the realm so creation and destruction stay paired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any existing value with the same name.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
        // ---
        validate_field(name, &value)?;

        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_owned(), value)),
        }
        Ok(())
    }

    /// Set a string field.
    pub fn set_string(&mut self, name: &str, value: &str) -> Result<()> {
        self.set(name, FieldValue::String(value.to_owned()))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    /// Read a string field; `None` if absent or of another type.
    pub fn get_string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn is_field_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove a field. Returns whether it was present.
    pub fn clear_field(&mut self, name: &str) -> bool {
        // ---
        let before = self.fields.len();
        self.fields.retain(|(n, _)| n != name);
        before != self.fields.len()
    }

    pub fn clear_all_fields(&mut self) {
        self.fields.clear();
    }

    /// Field names in wire order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.write_str("{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{name}={value}", value.kind())?;
        }
        f.write_str("}")
    }
}
