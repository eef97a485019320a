//! Versioned record encoding for cached projections.
//!
//! # Format
//!
//! ```text
//! ┌───────┬─────────┬──────────────────────────────┐
//! │ 0x50  │ version │ bincode(ProductProjection)   │
//! │ magic │   u8    │                              │
//! └───────┴─────────┴──────────────────────────────┘
//! ```
//!
//! The two-byte header lets a reader reject bytes that were not written by
//! this codec, and lets the body schema evolve: a new layout gets a new
//! version number and a new decode arm.

use crate::error::{ProjectionError, Result};
use crate::projection::ProductProjection;

/// First byte of every encoded record.
pub const RECORD_MAGIC: u8 = b'P';

/// Schema version written by [`ProjectionCodec::encode`].
pub const SCHEMA_VERSION: u8 = 1;

const HEADER_LEN: usize = 2;

/// Encoder/decoder for projection records.
///
/// # Example
///
/// ```
/// use product_projection_core::{ProductProjection, ProjectionCodec};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let widget = ProductProjection::new(105_069, "Widget");
/// let bytes = ProjectionCodec::encode(&widget)?;
/// assert_eq!(ProjectionCodec::decode(&bytes)?, widget);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionCodec;

impl ProjectionCodec {
    /// Encode a projection with the current schema version.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Encode`] if serialization fails.
    pub fn encode(projection: &ProductProjection) -> Result<Vec<u8>> {
        let body = bincode::serialize(projection).map_err(|e| ProjectionError::Encode {
            id: projection.id.get(),
            reason: e.to_string(),
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.push(RECORD_MAGIC);
        bytes.push(SCHEMA_VERSION);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Decode a record that is not tied to a backend key.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Decode`] if the header or body is invalid.
    pub fn decode(bytes: &[u8]) -> Result<ProductProjection> {
        Self::decode_keyed("<unkeyed>", bytes)
    }

    /// Decode a record read from `key`; the key is carried into any error.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Decode`] if the magic byte is wrong, the
    /// version is unknown, the record is truncated, or the body is malformed.
    pub fn decode_keyed(key: &str, bytes: &[u8]) -> Result<ProductProjection> {
        let decode_error = |reason: String| ProjectionError::Decode {
            key: key.to_string(),
            reason,
        };

        let [magic, version, body @ ..] = bytes else {
            return Err(decode_error(format!(
                "record too short ({} bytes)",
                bytes.len()
            )));
        };

        if *magic != RECORD_MAGIC {
            return Err(decode_error(format!("unexpected magic byte 0x{magic:02x}")));
        }

        match *version {
            1 => bincode::deserialize(body).map_err(|e| decode_error(e.to_string())),
            other => Err(decode_error(format!("unsupported schema version {other}"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn full_projection() -> ProductProjection {
        ProductProjection::new(105_069, "Widget")
            .with_sku("W-105069")
            .with_description("Blue widget, large")
            .with_price(1999, "EUR")
            .with_attribute("color", "blue")
            .with_attribute("size", "L")
            .with_updated_at(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_encode_writes_header() {
        let bytes = ProjectionCodec::encode(&full_projection()).unwrap();
        assert_eq!(bytes[0], RECORD_MAGIC);
        assert_eq!(bytes[1], SCHEMA_VERSION);
        assert!(bytes.len() > HEADER_LEN);
    }

    #[test]
    fn test_all_fields_survive() {
        let original = full_projection();
        let bytes = ProjectionCodec::encode(&original).unwrap();
        assert_eq!(ProjectionCodec::decode(&bytes).unwrap(), original);
    }

    #[test]
    fn test_rejects_empty_and_truncated_records() {
        let err = ProjectionCodec::decode_keyed("product:1", &[]).unwrap_err();
        assert!(matches!(err, ProjectionError::Decode { ref key, .. } if key == "product:1"));

        let bytes = ProjectionCodec::encode(&full_projection()).unwrap();
        let err = ProjectionCodec::decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_rejects_foreign_bytes() {
        // Record left behind by a legacy writer
        let err = ProjectionCodec::decode(b"O:8:\"stdClass\":0:{}").unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = ProjectionCodec::encode(&full_projection()).unwrap();
        bytes[1] = 9;
        let err = ProjectionCodec::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version 9"));
    }

    proptest::proptest! {
        #[test]
        fn prop_arbitrary_bodies_never_panic(body in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let mut bytes = vec![RECORD_MAGIC, SCHEMA_VERSION];
            bytes.extend_from_slice(&body);
            if let Err(e) = ProjectionCodec::decode_keyed("product:1", &bytes) {
                proptest::prop_assert!(e.is_decode());
            }
        }
    }
}
