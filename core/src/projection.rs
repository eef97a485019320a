//! Product projection records.
//!
//! # Overview
//!
//! A [`ProductProjection`] is the **read side** of product data: a
//! denormalized snapshot of one product, written by a population process and
//! served to readers straight from the key-value backend.
//!
//! ```text
//! Authoritative DB  →  population process  →  save()  →  product:<id>
//!                                                     →  products:all (index)
//! HTTP boundary     ←  find() / find_all()  ←───────────┘
//! ```
//!
//! The cache never interprets the payload fields. They are encoded and decoded
//! as a whole (see [`crate::codec`]), so a record is only ever replaced by a
//! full overwrite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a cached product.
///
/// Wraps the authoritative database ID. No range validation is applied: any
/// integer is forwarded to the backend verbatim.
///
/// # Example
///
/// ```
/// use product_projection_core::ProductId;
///
/// let id = ProductId::new(105_069);
/// assert_eq!(id.to_string(), "105069");
/// assert_eq!(ProductId::parse("105069"), Some(id));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    /// Create a product ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw integer value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Parse an ID as stored in the index set.
    ///
    /// Only the canonical decimal form written by [`fmt::Display`] is
    /// accepted; `"07"`, `"+7"` or `" 7"` return `None` so that every ID maps
    /// back to exactly one member and one primary key.
    #[must_use]
    pub fn parse(member: &str) -> Option<Self> {
        member
            .parse::<i64>()
            .ok()
            .filter(|id| id.to_string() == member)
            .map(Self)
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Denormalized snapshot of a product.
///
/// Immutable by convention: updates replace the whole record through
/// [`crate::ProductProjectionRepository::save`].
///
/// # Example
///
/// ```
/// use product_projection_core::ProductProjection;
///
/// let widget = ProductProjection::new(105_069, "Widget")
///     .with_price(1999, "EUR")
///     .with_attribute("color", "blue");
///
/// assert_eq!(widget.id.get(), 105_069);
/// assert_eq!(widget.attributes.get("color").map(String::as_str), Some("blue"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductProjection {
    /// Product ID (sole lookup key)
    pub id: ProductId,

    /// Display name
    pub name: String,

    /// Stock keeping unit
    #[serde(default)]
    pub sku: Option<String>,

    /// Long description
    #[serde(default)]
    pub description: Option<String>,

    /// Price in minor currency units
    #[serde(default)]
    pub price_cents: Option<i64>,

    /// ISO 4217 currency code for `price_cents`
    #[serde(default)]
    pub currency: Option<String>,

    /// Free-form attributes (ordered for stable encoding)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// When the source row was last modified
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProductProjection {
    /// Create a projection with only an ID and a name.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sku: None,
            description: None,
            price_cents: None,
            currency: None,
            attributes: BTreeMap::new(),
            updated_at: None,
        }
    }

    /// Set the SKU.
    #[must_use]
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the price and its currency.
    #[must_use]
    pub fn with_price(mut self, price_cents: i64, currency: impl Into<String>) -> Self {
        self.price_cents = Some(price_cents);
        self.currency = Some(currency.into());
        self
    }

    /// Add or replace one attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the source modification timestamp.
    #[must_use]
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_parse() {
        assert_eq!(ProductId::parse("42"), Some(ProductId::new(42)));
        assert_eq!(ProductId::parse("-7"), Some(ProductId::new(-7)));
        assert_eq!(ProductId::parse("abc"), None);
        assert_eq!(ProductId::parse(""), None);
    }

    #[test]
    fn test_product_id_parse_rejects_non_canonical_forms() {
        for member in ["07", "+7", " 7", "7 ", "-0", "0x7", "1_000"] {
            assert_eq!(ProductId::parse(member), None, "{member:?}");
        }
        assert_eq!(ProductId::parse("0"), Some(ProductId::new(0)));
        assert_eq!(
            ProductId::parse(&i64::MIN.to_string()),
            Some(ProductId::new(i64::MIN))
        );
    }

    #[test]
    fn test_builder_sets_fields() {
        let p = ProductProjection::new(1, "Widget")
            .with_sku("W-1")
            .with_description("A widget")
            .with_price(250, "USD")
            .with_attribute("size", "M")
            .with_attribute("size", "L");

        assert_eq!(p.sku.as_deref(), Some("W-1"));
        assert_eq!(p.description.as_deref(), Some("A widget"));
        assert_eq!(p.price_cents, Some(250));
        assert_eq!(p.currency.as_deref(), Some("USD"));
        assert_eq!(p.attributes.len(), 1);
        assert_eq!(p.attributes["size"], "L");
    }

    #[test]
    fn test_json_shape_for_http_boundary() {
        let p = ProductProjection::new(105_069, "Widget");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["id"], 105_069);
        assert_eq!(json["name"], "Widget");

        let decoded: ProductProjection =
            serde_json::from_str(r#"{"id":3,"name":"Gadget"}"#).unwrap();
        assert_eq!(decoded, ProductProjection::new(3, "Gadget"));
    }
}
