//! Backend key layout.
//!
//! | Key pattern     | Type   | Purpose                  |
//! |-----------------|--------|--------------------------|
//! | `product:<id>`  | string | one encoded projection   |
//! | `products:all`  | set    | enumeration index of IDs |

use crate::projection::ProductId;

/// Default prefix of primary keys.
pub const DEFAULT_KEY_PREFIX: &str = "product:";

/// Default key of the "all IDs" index set.
pub const DEFAULT_INDEX_KEY: &str = "products:all";

/// Namespacing of primary keys and the index key.
///
/// # Example
///
/// ```
/// use product_projection_core::{KeySpace, ProductId};
///
/// let keys = KeySpace::default();
/// assert_eq!(keys.primary_key(ProductId::new(7)), "product:7");
/// assert_eq!(keys.index_key(), "products:all");
/// assert_eq!(keys.id_from_primary_key("product:7"), Some(ProductId::new(7)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
    index_key: String,
}

impl KeySpace {
    /// Create a key space with a custom prefix and index key.
    ///
    /// Mostly useful for isolating test runs that share one backend.
    #[must_use]
    pub fn new(prefix: impl Into<String>, index_key: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            index_key: index_key.into(),
        }
    }

    /// Primary key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the index set.
    #[must_use]
    pub fn index_key(&self) -> &str {
        &self.index_key
    }

    /// Primary key for `id`.
    #[must_use]
    pub fn primary_key(&self, id: ProductId) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// Primary key for a raw index member, whether or not it parses as an ID.
    #[must_use]
    pub fn primary_key_for_member(&self, member: &str) -> String {
        format!("{}{}", self.prefix, member)
    }

    /// Primary keys for a batch of IDs, in the same order.
    #[must_use]
    pub fn primary_keys(&self, ids: &[ProductId]) -> Vec<String> {
        ids.iter().map(|id| self.primary_key(*id)).collect()
    }

    /// Glob pattern matching every primary key (for backend scans).
    #[must_use]
    pub fn scan_pattern(&self) -> String {
        format!("{}*", self.prefix)
    }

    /// Recover the ID from a primary key; `None` for foreign keys.
    #[must_use]
    pub fn id_from_primary_key(&self, key: &str) -> Option<ProductId> {
        key.strip_prefix(&self.prefix).and_then(ProductId::parse)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX, DEFAULT_INDEX_KEY)
    }
}
