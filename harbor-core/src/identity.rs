//! Identity types for Harbor entities

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ValidationError;

/// Caller-assigned entity identifier. Opaque to the store.
pub type EntityId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Delimiter between the kind tag and the id inside a sort key.
/// Identifiers may never contain it.
pub const KEY_DELIMITER: char = '#';

/// Longest identifier accepted, in bytes. Two ids plus the separator and
/// the longest kind tag stay under LMDB's 511-byte key limit.
pub const MAX_ID_LEN: usize = 200;

/// Generate a new UUIDv7 identifier (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7().to_string()
}

/// Check that `value` can be used as an identifier in a storage key.
pub fn validate_id(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    if value.contains(KEY_DELIMITER) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("must not contain '{}'", KEY_DELIMITER),
        });
    }
    if value.len() > MAX_ID_LEN {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("must be at most {} bytes, got {}", MAX_ID_LEN, value.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_id_is_valid_key_segment() {
        let id = new_entity_id();
        assert!(validate_id("teamId", &id).is_ok());
        assert_ne!(id, new_entity_id());
    }

    #[test]
    fn test_validate_id_rejects_empty() {
        let err = validate_id("projectId", "").unwrap_err();
        assert_eq!(
            err,
            ValidationError::RequiredFieldMissing {
                field: "projectId".to_string()
            }
        );
    }

    #[test]
    fn test_validate_id_rejects_delimiter() {
        let err = validate_id("codebaseId", "a#b").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_validate_id_length_limit() {
        assert!(validate_id("teamId", &"a".repeat(MAX_ID_LEN)).is_ok());

        let err = validate_id("teamId", &"a".repeat(MAX_ID_LEN + 1)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidValue { ref field, .. } if field == "teamId"
        ));

        // Multi-byte characters count by encoded length.
        assert!(validate_id("teamId", &"é".repeat(MAX_ID_LEN / 2 + 1)).is_err());
    }
}
